//! # Redis Service Discovery Repository
//!
//! Redis-backed implementation of [`ServiceDiscoveryRepository`].
//!
//! Registrations are stored as JSON documents under
//! `<namespace>:services:<id>` without a Redis key TTL: staleness is
//! computed from the recorded heartbeat, so stale entries remain listable
//! and purgeable instead of silently vanishing.

use crate::domain::entities::ServiceInfo;
use crate::domain::value_objects::{ServiceId, ServiceStatus};
use crate::infrastructure::persistence::redis::{map_redis_err, scan_keys};
use crate::infrastructure::persistence::traits::{
    RepositoryError, RepositoryResult, ServiceDiscoveryRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use std::fmt;

/// Redis-backed implementation of [`ServiceDiscoveryRepository`].
#[derive(Clone)]
pub struct RedisServiceDiscoveryRepository {
    conn: ConnectionManager,
    namespace: String,
}

impl fmt::Debug for RedisServiceDiscoveryRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisServiceDiscoveryRepository")
            .field("namespace", &self.namespace)
            .finish_non_exhaustive()
    }
}

impl RedisServiceDiscoveryRepository {
    /// Creates a repository over an established connection, scoped to
    /// `namespace`.
    #[must_use]
    pub fn new(conn: ConnectionManager, namespace: impl Into<String>) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
        }
    }

    fn key(&self, id: &ServiceId) -> String {
        format!("{}:services:{}", self.namespace, id.as_str())
    }

    async fn store(&self, service: &ServiceInfo) -> RepositoryResult<()> {
        let raw = serde_json::to_string(service)
            .map_err(|e| RepositoryError::serialization(e.to_string()))?;
        let mut conn = self.conn.clone();
        redis::cmd("SET")
            .arg(self.key(&service.service_id))
            .arg(raw)
            .query_async::<()>(&mut conn)
            .await
            .map_err(map_redis_err)
    }

    async fn load(&self, id: &ServiceId) -> RepositoryResult<Option<ServiceInfo>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = redis::cmd("GET")
            .arg(self.key(id))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        raw.map(|r| {
            serde_json::from_str(&r).map_err(|e| RepositoryError::serialization(e.to_string()))
        })
        .transpose()
    }

    async fn load_required(&self, id: &ServiceId) -> RepositoryResult<ServiceInfo> {
        self.load(id)
            .await?
            .ok_or_else(|| RepositoryError::not_found("ServiceInfo", id.as_str()))
    }

    async fn load_all(&self) -> RepositoryResult<Vec<ServiceInfo>> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}:services:*", self.namespace);
        let mut keys = scan_keys(&mut conn, &pattern).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        keys.sort_unstable();
        let mut cmd = redis::cmd("MGET");
        for key in &keys {
            cmd.arg(key);
        }
        let raws: Vec<Option<String>> = cmd.query_async(&mut conn).await.map_err(map_redis_err)?;
        raws.into_iter()
            .flatten()
            .map(|r| {
                serde_json::from_str(&r)
                    .map_err(|e| RepositoryError::serialization(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl ServiceDiscoveryRepository for RedisServiceDiscoveryRepository {
    async fn register(&self, service: &ServiceInfo) -> RepositoryResult<()> {
        let mut record = service.clone();
        record.heartbeat_at(Utc::now());
        self.store(&record).await
    }

    async fn heartbeat(&self, id: &ServiceId) -> RepositoryResult<ServiceInfo> {
        let mut service = self.load_required(id).await?;
        service.heartbeat_at(Utc::now());
        self.store(&service).await?;
        Ok(service)
    }

    async fn deregister(&self, id: &ServiceId) -> RepositoryResult<bool> {
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(self.key(id))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_err)?;
        Ok(removed > 0)
    }

    async fn lookup_by_name(&self, service_name: &str) -> RepositoryResult<Option<ServiceInfo>> {
        let services = self.load_all().await?;
        Ok(services
            .into_iter()
            .filter(|s| s.service_name == service_name)
            .max_by_key(|s| s.last_heartbeat))
    }

    async fn get_by_id(&self, id: &ServiceId) -> RepositoryResult<Option<ServiceInfo>> {
        self.load(id).await
    }

    async fn list_all(&self) -> RepositoryResult<Vec<ServiceInfo>> {
        self.load_all().await
    }

    async fn list_healthy(&self) -> RepositoryResult<Vec<ServiceInfo>> {
        let now = Utc::now();
        let services = self.load_all().await?;
        Ok(services
            .into_iter()
            .filter(|s| s.status == ServiceStatus::Healthy && !s.is_stale_at(now))
            .collect())
    }

    async fn list_stale(&self) -> RepositoryResult<Vec<ServiceInfo>> {
        let now = Utc::now();
        let services = self.load_all().await?;
        Ok(services.into_iter().filter(|s| s.is_stale_at(now)).collect())
    }

    async fn purge_stale(&self) -> RepositoryResult<u64> {
        let stale = self.list_stale().await?;
        if stale.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("DEL");
        for service in &stale {
            cmd.arg(self.key(&service.service_id));
        }
        cmd.query_async(&mut conn).await.map_err(map_redis_err)
    }

    async fn update_status(
        &self,
        id: &ServiceId,
        status: ServiceStatus,
    ) -> RepositoryResult<ServiceInfo> {
        let mut service = self.load_required(id).await?;
        service.status = status;
        self.store(&service).await?;
        Ok(service)
    }
}
