//! # In-Memory Repositories
//!
//! Stub implementations of every repository contract using process-local
//! storage. They serve two roles: contract-conformance testing without
//! network I/O, and graceful-degradation fallback when a backing store is
//! unreachable at factory construction time.
//!
//! ## Available Repositories
//!
//! - [`InMemoryStrategiesRepository`]
//! - [`InMemoryOrdersRepository`]
//! - [`InMemoryTradesRepository`]
//! - [`InMemoryPositionsRepository`]
//! - [`InMemoryServiceDiscoveryRepository`]
//! - [`InMemoryCacheRepository`]
//!
//! ## Thread Safety
//!
//! Each repository owns one `Arc<RwLock<BTreeMap>>` per entity type. State
//! is scoped to the repository instance, never process-wide, so isolated
//! instances in tests cannot cross-contaminate.

pub mod cache_repository;
pub mod orders_repository;
pub mod positions_repository;
pub mod service_discovery_repository;
pub mod strategies_repository;
pub mod trades_repository;

pub use cache_repository::InMemoryCacheRepository;
pub use orders_repository::InMemoryOrdersRepository;
pub use positions_repository::InMemoryPositionsRepository;
pub use service_discovery_repository::InMemoryServiceDiscoveryRepository;
pub use strategies_repository::InMemoryStrategiesRepository;
pub use trades_repository::InMemoryTradesRepository;
