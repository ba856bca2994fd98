//! # Redis Cache Repository
//!
//! Redis-backed implementation of [`CacheRepository`]. TTLs map directly to
//! Redis key expiry (`PX`/`PEXPIRE`), so expiration is enforced server-side
//! rather than recomputed here.

use crate::infrastructure::persistence::redis::{map_redis_err, scan_keys};
use crate::infrastructure::persistence::traits::{
    CacheRepository, KeyTtl, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Redis-backed implementation of [`CacheRepository`].
///
/// Cloning is cheap; the underlying connection manager multiplexes all
/// clones over one reconnecting connection.
#[derive(Clone)]
pub struct RedisCacheRepository {
    conn: ConnectionManager,
    namespace: String,
}

impl fmt::Debug for RedisCacheRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCacheRepository")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl RedisCacheRepository {
    /// Creates a repository over an established connection, scoped to
    /// `namespace`.
    #[must_use]
    pub fn new(conn: ConnectionManager, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
        }
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}:{key}", self.namespace)
    }

    fn strip_prefix<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(&self.namespace)
            .and_then(|k| k.strip_prefix(':'))
            .unwrap_or(key)
    }

    fn px(ttl: Duration) -> u64 {
        (ttl.as_millis() as u64).max(1)
    }
}

fn map_arithmetic_err(e: redis::RedisError) -> RepositoryError {
    // INCRBY on a non-numeric value is a caller mistake, not a backend one.
    if e.to_string().contains("not an integer") {
        RepositoryError::validation("value is not an integer")
    } else {
        map_redis_err(e)
    }
}

#[async_trait]
impl CacheRepository for RedisCacheRepository {
    async fn get(&self, key: &str) -> RepositoryResult<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(self.prefixed(key))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RepositoryResult<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.prefixed(key)).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(Self::px(ttl));
        }
        cmd.query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_err)
    }

    async fn delete(&self, key: &str) -> RepositoryResult<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(self.prefixed(key))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> RepositoryResult<bool> {
        let mut conn = self.conn.clone();
        let found: u64 = redis::cmd("EXISTS")
            .arg(self.prefixed(key))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        Ok(found > 0)
    }

    async fn increment(&self, key: &str, amount: i64) -> RepositoryResult<i64> {
        let mut conn = self.conn.clone();
        redis::cmd("INCRBY")
            .arg(self.prefixed(key))
            .arg(amount)
            .query_async(&mut conn)
            .await
            .map_err(map_arithmetic_err)
    }

    async fn decrement(&self, key: &str, amount: i64) -> RepositoryResult<i64> {
        let mut conn = self.conn.clone();
        redis::cmd("DECRBY")
            .arg(self.prefixed(key))
            .arg(amount)
            .query_async(&mut conn)
            .await
            .map_err(map_arithmetic_err)
    }

    async fn get_many(&self, keys: &[String]) -> RepositoryResult<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("MGET");
        for key in keys {
            cmd.arg(self.prefixed(key));
        }
        cmd.query_async(&mut conn).await.map_err(map_redis_err)
    }

    async fn set_many(
        &self,
        items: &HashMap<String, String>,
        ttl: Option<Duration>,
    ) -> RepositoryResult<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for (key, value) in items {
            let cmd = pipe.cmd("SET").arg(self.prefixed(key)).arg(value);
            if let Some(ttl) = ttl {
                cmd.arg("PX").arg(Self::px(ttl));
            }
            cmd.ignore();
        }
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_err)
    }

    async fn delete_pattern(&self, pattern: &str) -> RepositoryResult<u64> {
        let mut conn = self.conn.clone();
        let keys = scan_keys(&mut conn, &self.prefixed(pattern)).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut cmd = redis::cmd("DEL");
        for key in &keys {
            cmd.arg(key);
        }
        cmd.query_async(&mut conn).await.map_err(map_redis_err)
    }

    async fn list_keys(&self, pattern: &str) -> RepositoryResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let keys = scan_keys(&mut conn, &self.prefixed(pattern)).await?;
        let mut keys: Vec<String> = keys
            .iter()
            .map(|k| self.strip_prefix(k).to_string())
            .collect();
        keys.sort_unstable();
        Ok(keys)
    }

    async fn get_json(&self, key: &str) -> RepositoryResult<Option<Value>> {
        match self.get(key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| RepositoryError::serialization(e.to_string())),
            None => Ok(None),
        }
    }

    async fn set_json(
        &self,
        key: &str,
        value: &Value,
        ttl: Option<Duration>,
    ) -> RepositoryResult<()> {
        let raw = serde_json::to_string(value)
            .map_err(|e| RepositoryError::serialization(e.to_string()))?;
        self.set(key, &raw, ttl).await
    }

    async fn ttl(&self, key: &str) -> RepositoryResult<KeyTtl> {
        let mut conn = self.conn.clone();
        let millis: i64 = redis::cmd("PTTL")
            .arg(self.prefixed(key))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        Ok(match millis {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::Persistent,
            ms => KeyTtl::Remaining(Duration::from_millis(ms.max(0) as u64)),
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> RepositoryResult<bool> {
        let mut conn = self.conn.clone();
        let set: u64 = redis::cmd("PEXPIRE")
            .arg(self.prefixed(key))
            .arg(Self::px(ttl))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        Ok(set > 0)
    }
}
