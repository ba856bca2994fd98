//! # In-Memory Cache Repository
//!
//! In-memory implementation of [`CacheRepository`] with lazy TTL expiry.
//!
//! Expiry is checked on each read: an expired key behaves as absent and is
//! purged at that point. Stale entries occupy memory until the next read or
//! listing touches them; there is no background sweep.

use crate::infrastructure::persistence::traits::{
    CacheRepository, KeyTtl, RepositoryError, RepositoryResult,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Matches redis-style glob patterns: `*` matches any run of characters,
/// `?` matches exactly one.
fn glob_match(pattern: &str, key: &str) -> bool {
    fn matches(pattern: &[char], key: &[char]) -> bool {
        match (pattern.split_first(), key.split_first()) {
            (None, None) => true,
            (Some((&'*', rest)), _) => {
                matches(rest, key) || key.split_first().is_some_and(|(_, k)| matches(pattern, k))
            }
            (Some((&'?', rest)), Some((_, k))) => matches(rest, k),
            (Some((p, rest)), Some((c, k))) => p == c && matches(rest, k),
            _ => false,
        }
    }
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();
    matches(&pattern, &key)
}

/// In-memory implementation of [`CacheRepository`].
///
/// State is scoped to this instance (and its clones); separate instances
/// never share entries, so isolated facades in tests cannot
/// cross-contaminate.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCacheRepository {
    storage: Arc<RwLock<BTreeMap<String, CacheEntry>>>,
}

impl InMemoryCacheRepository {
    /// Creates a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all entries.
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }

    /// Reads a live entry, purging it when expired.
    async fn read_live(&self, key: &str) -> Option<CacheEntry> {
        let now = Instant::now();
        let mut storage = self.storage.write().await;
        match storage.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                storage.remove(key);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }
}

#[async_trait]
impl CacheRepository for InMemoryCacheRepository {
    async fn get(&self, key: &str) -> RepositoryResult<Option<String>> {
        Ok(self.read_live(key).await.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RepositoryResult<()> {
        let entry = CacheEntry {
            value: value.to_string(),
            expires_at: ttl.map(|t| Instant::now() + t),
        };
        self.storage.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> RepositoryResult<bool> {
        Ok(self.storage.write().await.remove(key).is_some())
    }

    async fn exists(&self, key: &str) -> RepositoryResult<bool> {
        Ok(self.read_live(key).await.is_some())
    }

    async fn increment(&self, key: &str, amount: i64) -> RepositoryResult<i64> {
        let now = Instant::now();
        let mut storage = self.storage.write().await;
        let live = storage.get(key).filter(|e| !e.is_expired_at(now)).cloned();
        let current = match &live {
            Some(entry) => entry.value.parse::<i64>().map_err(|_| {
                RepositoryError::validation(format!(
                    "value at {key} is not an integer: {}",
                    entry.value
                ))
            })?,
            None => 0,
        };
        let next = current + amount;
        // Counter keeps the TTL of a live entry; a fresh counter is persistent.
        let expires_at = live.and_then(|e| e.expires_at);
        storage.insert(
            key.to_string(),
            CacheEntry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn decrement(&self, key: &str, amount: i64) -> RepositoryResult<i64> {
        self.increment(key, -amount).await
    }

    async fn get_many(&self, keys: &[String]) -> RepositoryResult<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.read_live(key).await.map(|e| e.value));
        }
        Ok(values)
    }

    async fn set_many(
        &self,
        items: &HashMap<String, String>,
        ttl: Option<Duration>,
    ) -> RepositoryResult<()> {
        let expires_at = ttl.map(|t| Instant::now() + t);
        let mut storage = self.storage.write().await;
        for (key, value) in items {
            storage.insert(
                key.clone(),
                CacheEntry {
                    value: value.clone(),
                    expires_at,
                },
            );
        }
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> RepositoryResult<u64> {
        let now = Instant::now();
        let mut storage = self.storage.write().await;
        let expired: Vec<String> = storage
            .iter()
            .filter(|(_, e)| e.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            storage.remove(key);
        }
        let matching: Vec<String> = storage
            .keys()
            .filter(|k| glob_match(pattern, k))
            .cloned()
            .collect();
        for key in &matching {
            storage.remove(key);
        }
        Ok(matching.len() as u64)
    }

    async fn list_keys(&self, pattern: &str) -> RepositoryResult<Vec<String>> {
        let now = Instant::now();
        let mut storage = self.storage.write().await;
        let expired: Vec<String> = storage
            .iter()
            .filter(|(_, e)| e.is_expired_at(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            storage.remove(key);
        }
        Ok(storage.keys().filter(|k| glob_match(pattern, k)).cloned().collect())
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
        let raw =
            serde_json::to_string(value).map_err(|e| RepositoryError::serialization(e.to_string()))?;
        self.set(key, &raw, ttl).await
    }

    async fn ttl(&self, key: &str) -> RepositoryResult<KeyTtl> {
        let now = Instant::now();
        match self.read_live(key).await {
            None => Ok(KeyTtl::Missing),
            Some(CacheEntry {
                expires_at: None, ..
            }) => Ok(KeyTtl::Persistent),
            Some(CacheEntry {
                expires_at: Some(at),
                ..
            }) => Ok(KeyTtl::Remaining(at.saturating_duration_since(now))),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> RepositoryResult<bool> {
        let now = Instant::now();
        let mut storage = self.storage.write().await;
        match storage.get_mut(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            Some(_) => {
                storage.remove(key);
                Ok(false)
            }
            None => Ok(false),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::sleep;

    #[test]
    fn glob_match_semantics() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("trading:*", "trading:positions:BTC-USD"));
        assert!(!glob_match("trading:*", "other:positions"));
        assert!(glob_match("k?y", "key"));
        assert!(!glob_match("k?y", "kezzy"));
        assert!(glob_match("a*c*e", "abcde"));
        assert!(!glob_match("a*c*e", "abde"));
        assert!(glob_match("", ""));
    }

    #[tokio::test]
    async fn set_then_get() {
        let cache = InMemoryCacheRepository::new();
        cache.set("k", "v", None).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("v"));
        assert!(cache.exists("k").await.unwrap());
        assert!(cache.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_key_behaves_as_absent() {
        let cache = InMemoryCacheRepository::new();
        cache.set("k", "v", Some(Duration::from_millis(20))).await.unwrap();
        assert!(cache.exists("k").await.unwrap());

        sleep(Duration::from_millis(40)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(!cache.exists("k").await.unwrap());
        assert!(cache.list_keys("*").await.unwrap().is_empty());
        assert_eq!(cache.ttl("k").await.unwrap(), KeyTtl::Missing);
    }

    #[tokio::test]
    async fn ttl_reports_remaining_time() {
        let cache = InMemoryCacheRepository::new();
        cache.set("persistent", "v", None).await.unwrap();
        cache.set("expiring", "v", Some(Duration::from_secs(60))).await.unwrap();

        assert_eq!(cache.ttl("persistent").await.unwrap(), KeyTtl::Persistent);
        match cache.ttl("expiring").await.unwrap() {
            KeyTtl::Remaining(left) => assert!(left <= Duration::from_secs(60)),
            other => panic!("unexpected ttl: {other:?}"),
        }
    }

    #[tokio::test]
    async fn expire_adds_ttl_to_existing_key() {
        let cache = InMemoryCacheRepository::new();
        cache.set("k", "v", None).await.unwrap();
        assert!(cache.expire("k", Duration::from_millis(20)).await.unwrap());

        sleep(Duration::from_millis(40)).await;
        assert!(cache.get("k").await.unwrap().is_none());
        assert!(!cache.expire("missing", Duration::from_secs(1)).await.unwrap());
    }

    #[tokio::test]
    async fn increment_and_decrement() {
        let cache = InMemoryCacheRepository::new();
        assert_eq!(cache.increment("counter", 1).await.unwrap(), 1);
        assert_eq!(cache.increment("counter", 5).await.unwrap(), 6);
        assert_eq!(cache.decrement("counter", 2).await.unwrap(), 4);

        cache.set("text", "not-a-number", None).await.unwrap();
        assert!(cache.increment("text", 1).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn increment_preserves_ttl() {
        let cache = InMemoryCacheRepository::new();
        cache.set("counter", "1", Some(Duration::from_secs(60))).await.unwrap();
        cache.increment("counter", 1).await.unwrap();
        assert!(matches!(
            cache.ttl("counter").await.unwrap(),
            KeyTtl::Remaining(_)
        ));
    }

    #[tokio::test]
    async fn get_many_aligns_with_keys() {
        let cache = InMemoryCacheRepository::new();
        cache.set("a", "1", None).await.unwrap();
        cache.set("c", "3", None).await.unwrap();

        let values = cache
            .get_many(&["a".to_string(), "b".to_string(), "c".to_string()])
            .await
            .unwrap();
        assert_eq!(
            values,
            vec![Some("1".to_string()), None, Some("3".to_string())]
        );
    }

    #[tokio::test]
    async fn set_many_and_delete_pattern() {
        let cache = InMemoryCacheRepository::new();
        let items: HashMap<String, String> = [
            ("orders:1".to_string(), "a".to_string()),
            ("orders:2".to_string(), "b".to_string()),
            ("positions:1".to_string(), "c".to_string()),
        ]
        .into();
        cache.set_many(&items, None).await.unwrap();

        assert_eq!(cache.list_keys("orders:*").await.unwrap().len(), 2);
        assert_eq!(cache.delete_pattern("orders:*").await.unwrap(), 2);
        assert!(cache.list_keys("orders:*").await.unwrap().is_empty());
        assert!(cache.exists("positions:1").await.unwrap());
    }

    #[tokio::test]
    async fn json_round_trip() {
        let cache = InMemoryCacheRepository::new();
        let value = json!({"spread": 0.001, "instruments": ["BTC-USD"]});
        cache.set_json("params", &value, None).await.unwrap();

        assert_eq!(cache.get_json("params").await.unwrap(), Some(value));
        assert!(cache.get_json("missing").await.unwrap().is_none());

        cache.set("broken", "{not json", None).await.unwrap();
        assert!(cache.get_json("broken").await.unwrap_err().to_string().contains("serialization"));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let cache = InMemoryCacheRepository::new();
        cache.set("k", "v", None).await.unwrap();
        assert!(cache.delete("k").await.unwrap());
        assert!(!cache.delete("k").await.unwrap());
    }
}
