//! # Redis Repositories
//!
//! Redis-backed implementations of the cache and service discovery
//! contracts over a multiplexed [`redis::aio::ConnectionManager`].
//!
//! Every key is prefixed with the cache namespace derived from the instance
//! name ([`crate::config::AdapterConfig::cache_namespace`]), so several
//! engine instances can share one Redis deployment without key collisions.
//! Pattern operations prepend the prefix before scanning and strip it from
//! returned keys, keeping the namespace invisible to callers.

pub mod cache_repository;
pub mod service_discovery_repository;

pub use cache_repository::RedisCacheRepository;
pub use service_discovery_repository::RedisServiceDiscoveryRepository;

use crate::infrastructure::persistence::traits::RepositoryError;

/// Maps a redis error onto the repository taxonomy.
///
/// I/O and connection-drop failures surface as
/// [`RepositoryError::Connection`]; everything else is internal.
pub(crate) fn map_redis_err(e: redis::RedisError) -> RepositoryError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        RepositoryError::connection(e.to_string())
    } else {
        RepositoryError::internal(e.to_string())
    }
}

/// Collects all keys matching `pattern` with an iterated `SCAN`.
///
/// `KEYS` blocks the server on large keyspaces; `SCAN` trades that for a
/// cursor loop.
pub(crate) async fn scan_keys(
    conn: &mut redis::aio::ConnectionManager,
    pattern: &str,
) -> Result<Vec<String>, RepositoryError> {
    let mut keys = Vec::new();
    let mut cursor: u64 = 0;
    loop {
        let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(100)
            .query_async(conn)
            .await
            .map_err(map_redis_err)?;
        keys.extend(batch);
        cursor = next;
        if cursor == 0 {
            break;
        }
    }
    Ok(keys)
}
