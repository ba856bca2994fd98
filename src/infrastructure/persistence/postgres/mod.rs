//! # PostgreSQL Repositories
//!
//! Relational implementations of the entity repository contracts using
//! sqlx connection pooling.
//!
//! All tables live under the schema derived from the instance name
//! ([`crate::config::AdapterConfig::schema_name`]); the schema string is
//! produced by configuration validation and contains only `[a-z0-9_]`, so
//! it is interpolated into query text while all values are bound.
//!
//! One logical repository operation maps to one statement or one short
//! transaction; no cross-repository transactions are offered.

pub mod orders_repository;
pub mod positions_repository;
pub mod strategies_repository;
pub mod trades_repository;

pub use orders_repository::PostgresOrdersRepository;
pub use positions_repository::PostgresPositionsRepository;
pub use strategies_repository::PostgresStrategiesRepository;
pub use trades_repository::PostgresTradesRepository;

use crate::infrastructure::persistence::traits::RepositoryError;

/// Maps a sqlx error onto the repository taxonomy.
///
/// Transport-level failures surface as [`RepositoryError::Connection`];
/// unique violations surface as [`RepositoryError::Conflict`] with the
/// given entity type and id; everything else is internal.
pub(crate) fn map_sqlx_err(
    e: sqlx::Error,
    entity_type: &'static str,
    id: &str,
) -> RepositoryError {
    match &e {
        sqlx::Error::Database(db) if db.kind() == sqlx::error::ErrorKind::UniqueViolation => {
            RepositoryError::conflict(entity_type, id)
        }
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => RepositoryError::connection(e.to_string()),
        _ => RepositoryError::internal(e.to_string()),
    }
}
