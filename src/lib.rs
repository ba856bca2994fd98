//! # Trading Data Adapter
//!
//! Persistence abstraction layer between a trading engine and its backing
//! stores (PostgreSQL and Redis).
//!
//! The engine consumes six repository contracts — strategies, orders,
//! trades, positions, service discovery, and caching — and never touches a
//! driver directly. Each contract has a real-backend implementation and an
//! in-memory stub; [`TradingDataAdapter::connect`] probes both stores at
//! construction and independently degrades to the stubs for whichever does
//! not answer, so the engine starts (and keeps trading on process-local
//! state) even with every backend down.
//!
//! Instances sharing one deployment are isolated by naming: the instance
//! name derives a PostgreSQL schema (`algo-trader-1` →
//! `trading_algo_trader_1`) and a Redis key namespace
//! (`trading:algo-trader-1`).
//!
//! ## Layers
//!
//! - [`domain`]: entities and value objects, free of storage concerns
//! - [`infrastructure`]: repository contracts and their backends
//! - [`config`]: per-instance configuration and naming derivation
//! - [`factory`]: backend probing and the repository facade
//!
//! ## Quick Start
//!
//! ```no_run
//! use trading_data_adapter::{AdapterConfig, TradingDataAdapter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AdapterConfig::new("algo-trader-1")?;
//! let adapter = TradingDataAdapter::connect(config).await;
//!
//! let report = adapter.health_check().await;
//! tracing::info!(?report.status, "adapter ready");
//!
//! let strategies = adapter.strategies();
//! let count = strategies.count().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod factory;
pub mod infrastructure;

pub use config::{AdapterConfig, ConfigError};
pub use factory::{
    BackendHealth, BackendStatus, ConnectionStatus, HealthReport, TradingDataAdapter,
};
pub use infrastructure::persistence::traits::{
    CacheRepository, KeyTtl, OrdersRepository, PositionsRepository, RepositoryError,
    RepositoryResult, ServiceDiscoveryRepository, StrategiesRepository, StrategyFilter,
    TradesRepository,
};
