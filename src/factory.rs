//! # Adapter Factory
//!
//! Backend selection and the repository facade handed to the trading
//! engine.
//!
//! [`TradingDataAdapter::connect`] probes each backing store once, bounded
//! by the configured health-check timeout, and independently falls back to
//! the in-memory stubs for any store that does not answer. Construction
//! always succeeds; the engine keeps running on process-local storage and
//! the degradation is visible through [`TradingDataAdapter::health_check`].
//!
//! Backend selection is fixed for the lifetime of the facade. A store that
//! comes back after construction is only picked up by building a new
//! facade.

use crate::config::AdapterConfig;
use crate::domain::value_objects::ServiceStatus;
use crate::infrastructure::persistence::in_memory::{
    InMemoryCacheRepository, InMemoryOrdersRepository, InMemoryPositionsRepository,
    InMemoryServiceDiscoveryRepository, InMemoryStrategiesRepository, InMemoryTradesRepository,
};
use crate::infrastructure::persistence::postgres::{
    PostgresOrdersRepository, PostgresPositionsRepository, PostgresStrategiesRepository,
    PostgresTradesRepository,
};
use crate::infrastructure::persistence::redis::{
    RedisCacheRepository, RedisServiceDiscoveryRepository,
};
use crate::infrastructure::persistence::traits::{
    CacheRepository, OrdersRepository, PositionsRepository, ServiceDiscoveryRepository,
    StrategiesRepository, TradesRepository,
};
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::timeout;
use tracing::{info, warn};

/// Probe outcome for one backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendStatus {
    /// True when the real store answered the last probe.
    pub connected: bool,
    /// When the last probe ran.
    pub last_check: DateTime<Utc>,
    /// Probe failure description, when not connected.
    pub error: Option<String>,
}

impl BackendStatus {
    fn up(at: DateTime<Utc>) -> Self {
        Self {
            connected: true,
            last_check: at,
            error: None,
        }
    }

    fn down(at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            connected: false,
            last_check: at,
            error: Some(error.into()),
        }
    }
}

/// Probe outcomes for both backing stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionStatus {
    /// Relational store.
    pub postgres: BackendStatus,
    /// Cache/registry store.
    pub redis: BackendStatus,
}

/// Health of one backend as reported by [`TradingDataAdapter::health_check`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendHealth {
    /// True when the real store is in use and answered the re-probe.
    pub available: bool,
    /// True when the in-memory fallback is serving this backend.
    pub degraded: bool,
    /// Last failure description, if any.
    pub error: Option<String>,
}

/// Aggregated health report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    /// Overall status: healthy when both real stores answer, degraded
    /// otherwise.
    pub status: ServiceStatus,
    /// Relational-store health.
    pub postgres: BackendHealth,
    /// Cache/registry-store health.
    pub redis: BackendHealth,
    /// PostgreSQL schema this instance writes to.
    pub schema_name: String,
    /// Redis key namespace this instance writes to.
    pub cache_namespace: String,
}

/// Repository facade over the selected backends.
///
/// One accessor per repository contract; callers hold `Arc<dyn Trait>`
/// handles and never observe which variant backs them.
pub struct TradingDataAdapter {
    config: AdapterConfig,
    strategies: Arc<dyn StrategiesRepository>,
    orders: Arc<dyn OrdersRepository>,
    trades: Arc<dyn TradesRepository>,
    positions: Arc<dyn PositionsRepository>,
    service_discovery: Arc<dyn ServiceDiscoveryRepository>,
    cache: Arc<dyn CacheRepository>,
    pg_pool: Option<PgPool>,
    redis_conn: Option<ConnectionManager>,
    status: RwLock<ConnectionStatus>,
}

impl fmt::Debug for TradingDataAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TradingDataAdapter")
            .field("instance_name", &self.config.instance_name)
            .field("postgres_connected", &self.pg_pool.is_some())
            .field("redis_connected", &self.redis_conn.is_some())
            .finish_non_exhaustive()
    }
}

async fn probe_postgres(config: &AdapterConfig) -> Result<PgPool, String> {
    let connect = async {
        let pool = PgPoolOptions::new()
            .max_connections(config.postgres_max_connections())
            .acquire_timeout(config.postgres_pool_timeout)
            .connect(&config.postgres_url)
            .await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok::<PgPool, sqlx::Error>(pool)
    };
    match timeout(config.health_check_timeout, connect).await {
        Ok(Ok(pool)) => Ok(pool),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!(
            "probe timed out after {:?}",
            config.health_check_timeout
        )),
    }
}

async fn probe_redis(config: &AdapterConfig) -> Result<ConnectionManager, String> {
    let connect = async {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let mut conn = ConnectionManager::new(client).await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok::<ConnectionManager, redis::RedisError>(conn)
    };
    match timeout(config.health_check_timeout, connect).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!(
            "probe timed out after {:?}",
            config.health_check_timeout
        )),
    }
}

impl TradingDataAdapter {
    /// Probes both backing stores and builds the facade, falling back to
    /// in-memory stubs for any store that does not answer within the
    /// health-check timeout.
    ///
    /// Never fails: a backend probe failure degrades that backend instead
    /// of surfacing an error.
    pub async fn connect(config: AdapterConfig) -> Self {
        let now = Utc::now();
        let schema = config.schema_name();
        let namespace = config.cache_namespace();

        // The stores are independent; probe them concurrently.
        let (pg_probe, redis_probe) =
            futures::future::join(probe_postgres(&config), probe_redis(&config)).await;

        let (pg_pool, pg_status) = match pg_probe {
            Ok(pool) => {
                info!(instance = %config.instance_name, schema = %schema, "postgres connected");
                (Some(pool), BackendStatus::up(now))
            }
            Err(error) => {
                warn!(
                    instance = %config.instance_name,
                    %error,
                    "postgres unreachable, using in-memory repositories"
                );
                (None, BackendStatus::down(now, error))
            }
        };
        let (redis_conn, redis_status) = match redis_probe {
            Ok(conn) => {
                info!(instance = %config.instance_name, namespace = %namespace, "redis connected");
                (Some(conn), BackendStatus::up(now))
            }
            Err(error) => {
                warn!(
                    instance = %config.instance_name,
                    %error,
                    "redis unreachable, using in-memory repositories"
                );
                (None, BackendStatus::down(now, error))
            }
        };

        let (strategies, orders, trades, positions): (
            Arc<dyn StrategiesRepository>,
            Arc<dyn OrdersRepository>,
            Arc<dyn TradesRepository>,
            Arc<dyn PositionsRepository>,
        ) = match &pg_pool {
            Some(pool) => (
                Arc::new(PostgresStrategiesRepository::new(pool.clone(), &schema)),
                Arc::new(PostgresOrdersRepository::new(pool.clone(), &schema)),
                Arc::new(PostgresTradesRepository::new(pool.clone(), &schema)),
                Arc::new(PostgresPositionsRepository::new(pool.clone(), &schema)),
            ),
            None => (
                Arc::new(InMemoryStrategiesRepository::new()),
                Arc::new(InMemoryOrdersRepository::new()),
                Arc::new(InMemoryTradesRepository::new()),
                Arc::new(InMemoryPositionsRepository::new()),
            ),
        };
        let (service_discovery, cache): (
            Arc<dyn ServiceDiscoveryRepository>,
            Arc<dyn CacheRepository>,
        ) = match &redis_conn {
            Some(conn) => (
                Arc::new(RedisServiceDiscoveryRepository::new(conn.clone(), &namespace)),
                Arc::new(RedisCacheRepository::new(conn.clone(), &namespace)),
            ),
            None => (
                Arc::new(InMemoryServiceDiscoveryRepository::new()),
                Arc::new(InMemoryCacheRepository::new()),
            ),
        };

        Self {
            config,
            strategies,
            orders,
            trades,
            positions,
            service_discovery,
            cache,
            pg_pool,
            redis_conn,
            status: RwLock::new(ConnectionStatus {
                postgres: pg_status,
                redis: redis_status,
            }),
        }
    }

    /// Builds a facade backed entirely by in-memory stubs, skipping the
    /// probes. Intended for tests and offline tooling.
    #[must_use]
    pub fn stub(config: AdapterConfig) -> Self {
        let now = Utc::now();
        let status = ConnectionStatus {
            postgres: BackendStatus::down(now, "stub construction"),
            redis: BackendStatus::down(now, "stub construction"),
        };
        Self {
            config,
            strategies: Arc::new(InMemoryStrategiesRepository::new()),
            orders: Arc::new(InMemoryOrdersRepository::new()),
            trades: Arc::new(InMemoryTradesRepository::new()),
            positions: Arc::new(InMemoryPositionsRepository::new()),
            service_discovery: Arc::new(InMemoryServiceDiscoveryRepository::new()),
            cache: Arc::new(InMemoryCacheRepository::new()),
            pg_pool: None,
            redis_conn: None,
            status: RwLock::new(status),
        }
    }

    /// The configuration this facade was built from.
    #[must_use]
    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Strategy persistence.
    #[must_use]
    pub fn strategies(&self) -> Arc<dyn StrategiesRepository> {
        Arc::clone(&self.strategies)
    }

    /// Order persistence.
    #[must_use]
    pub fn orders(&self) -> Arc<dyn OrdersRepository> {
        Arc::clone(&self.orders)
    }

    /// Trade persistence.
    #[must_use]
    pub fn trades(&self) -> Arc<dyn TradesRepository> {
        Arc::clone(&self.trades)
    }

    /// Position persistence.
    #[must_use]
    pub fn positions(&self) -> Arc<dyn PositionsRepository> {
        Arc::clone(&self.positions)
    }

    /// Service registration and lookup.
    #[must_use]
    pub fn service_discovery(&self) -> Arc<dyn ServiceDiscoveryRepository> {
        Arc::clone(&self.service_discovery)
    }

    /// Key-value caching.
    #[must_use]
    pub fn cache(&self) -> Arc<dyn CacheRepository> {
        Arc::clone(&self.cache)
    }

    /// Probe outcomes recorded at construction and refreshed by
    /// [`health_check`](Self::health_check).
    pub async fn connection_status(&self) -> ConnectionStatus {
        self.status.read().await.clone()
    }

    /// Re-probes the live backends and reports per-backend health.
    ///
    /// Backends served by the in-memory fallback are reported degraded
    /// without being probed; selection never changes here.
    pub async fn health_check(&self) -> HealthReport {
        let now = Utc::now();
        let postgres = match &self.pg_pool {
            Some(pool) => {
                let probe = timeout(
                    self.config.health_check_timeout,
                    sqlx::query("SELECT 1").execute(pool),
                )
                .await;
                match probe {
                    Ok(Ok(_)) => (BackendStatus::up(now), BackendHealth {
                        available: true,
                        degraded: false,
                        error: None,
                    }),
                    Ok(Err(e)) => {
                        let error = e.to_string();
                        (BackendStatus::down(now, error.clone()), BackendHealth {
                            available: false,
                            degraded: false,
                            error: Some(error),
                        })
                    }
                    Err(_) => {
                        let error = "probe timed out".to_string();
                        (BackendStatus::down(now, error.clone()), BackendHealth {
                            available: false,
                            degraded: false,
                            error: Some(error),
                        })
                    }
                }
            }
            None => {
                let status = self.status.read().await.postgres.clone();
                (status.clone(), BackendHealth {
                    available: false,
                    degraded: true,
                    error: status.error,
                })
            }
        };
        let redis = match &self.redis_conn {
            Some(conn) => {
                let mut conn = conn.clone();
                let probe = timeout(
                    self.config.health_check_timeout,
                    redis::cmd("PING").query_async::<String>(&mut conn),
                )
                .await;
                match probe {
                    Ok(Ok(_)) => (BackendStatus::up(now), BackendHealth {
                        available: true,
                        degraded: false,
                        error: None,
                    }),
                    Ok(Err(e)) => {
                        let error = e.to_string();
                        (BackendStatus::down(now, error.clone()), BackendHealth {
                            available: false,
                            degraded: false,
                            error: Some(error),
                        })
                    }
                    Err(_) => {
                        let error = "probe timed out".to_string();
                        (BackendStatus::down(now, error.clone()), BackendHealth {
                            available: false,
                            degraded: false,
                            error: Some(error),
                        })
                    }
                }
            }
            None => {
                let status = self.status.read().await.redis.clone();
                (status.clone(), BackendHealth {
                    available: false,
                    degraded: true,
                    error: status.error,
                })
            }
        };

        {
            let mut status = self.status.write().await;
            status.postgres = postgres.0;
            status.redis = redis.0;
        }

        let overall = if postgres.1.available && redis.1.available {
            ServiceStatus::Healthy
        } else {
            ServiceStatus::Degraded
        };
        HealthReport {
            status: overall,
            postgres: postgres.1,
            redis: redis.1,
            schema_name: self.config.schema_name(),
            cache_namespace: self.config.cache_namespace(),
        }
    }

    /// Closes the connection pool. Stub-backed repositories are
    /// unaffected; further calls through a live Postgres handle fail with
    /// a connection error.
    pub async fn close(&self) {
        if let Some(pool) = &self.pg_pool {
            pool.close().await;
            info!(instance = %self.config.instance_name, "postgres pool closed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::entities::Strategy;
    use crate::domain::value_objects::{StrategyId, StrategyType};

    fn config() -> AdapterConfig {
        AdapterConfig::new("factory-test").unwrap()
    }

    #[tokio::test]
    async fn stub_facade_serves_all_contracts() {
        let adapter = TradingDataAdapter::stub(config());
        let strategy = Strategy::new(
            StrategyId::new("strat-001"),
            "mm",
            StrategyType::MarketMaking,
        );
        adapter.strategies().create(&strategy).await.unwrap();
        assert_eq!(adapter.strategies().count().await.unwrap(), 1);
        assert_eq!(adapter.orders().count().await.unwrap(), 0);
        assert_eq!(adapter.trades().count().await.unwrap(), 0);
        assert!(adapter.positions().list_open().await.unwrap().is_empty());
        assert!(adapter.service_discovery().list_all().await.unwrap().is_empty());
        adapter.cache().set("k", "v", None).await.unwrap();
        assert_eq!(adapter.cache().get("k").await.unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn stub_facade_reports_degraded() {
        let adapter = TradingDataAdapter::stub(config());
        let report = adapter.health_check().await;
        assert_eq!(report.status, ServiceStatus::Degraded);
        assert!(report.postgres.degraded);
        assert!(report.redis.degraded);
        assert!(!report.postgres.available);
        assert_eq!(report.schema_name, "trading_factory_test");
        assert_eq!(report.cache_namespace, "trading:factory-test");
    }

    #[tokio::test]
    async fn accessors_share_one_stub_instance() {
        let adapter = TradingDataAdapter::stub(config());
        adapter.cache().set("shared", "1", None).await.unwrap();
        assert!(adapter.cache().exists("shared").await.unwrap());
    }

    #[tokio::test]
    async fn connection_status_records_stub_construction() {
        let adapter = TradingDataAdapter::stub(config());
        let status = adapter.connection_status().await;
        assert!(!status.postgres.connected);
        assert!(!status.redis.connected);
        assert!(status.postgres.error.is_some());
    }
}
