//! # In-Memory Service Discovery Repository
//!
//! In-memory implementation of [`ServiceDiscoveryRepository`]. Staleness is
//! evaluated lazily against the wall clock on each listing; nothing runs in
//! the background.

use crate::domain::entities::ServiceInfo;
use crate::domain::value_objects::{ServiceId, ServiceStatus};
use crate::infrastructure::persistence::traits::{
    RepositoryError, RepositoryResult, ServiceDiscoveryRepository,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory implementation of [`ServiceDiscoveryRepository`].
#[derive(Debug, Clone, Default)]
pub struct InMemoryServiceDiscoveryRepository {
    storage: Arc<RwLock<BTreeMap<ServiceId, ServiceInfo>>>,
}

impl InMemoryServiceDiscoveryRepository {
    /// Creates a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all registrations.
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl ServiceDiscoveryRepository for InMemoryServiceDiscoveryRepository {
    async fn register(&self, service: &ServiceInfo) -> RepositoryResult<()> {
        let mut registration = service.clone();
        registration.heartbeat_at(Utc::now());
        self.storage
            .write()
            .await
            .insert(registration.service_id.clone(), registration);
        Ok(())
    }

    async fn heartbeat(&self, id: &ServiceId) -> RepositoryResult<ServiceInfo> {
        let mut storage = self.storage.write().await;
        let service = storage
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found("ServiceInfo", id.as_str()))?;
        service.heartbeat_at(Utc::now());
        Ok(service.clone())
    }

    async fn deregister(&self, id: &ServiceId) -> RepositoryResult<bool> {
        Ok(self.storage.write().await.remove(id).is_some())
    }

    async fn lookup_by_name(&self, service_name: &str) -> RepositoryResult<Option<ServiceInfo>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|s| s.service_name == service_name)
            .max_by_key(|s| s.last_heartbeat)
            .cloned())
    }

    async fn get_by_id(&self, id: &ServiceId) -> RepositoryResult<Option<ServiceInfo>> {
        Ok(self.storage.read().await.get(id).cloned())
    }

    async fn list_all(&self) -> RepositoryResult<Vec<ServiceInfo>> {
        Ok(self.storage.read().await.values().cloned().collect())
    }

    async fn list_healthy(&self) -> RepositoryResult<Vec<ServiceInfo>> {
        let now = Utc::now();
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|s| s.status == ServiceStatus::Healthy && !s.is_stale_at(now))
            .cloned()
            .collect())
    }

    async fn list_stale(&self) -> RepositoryResult<Vec<ServiceInfo>> {
        let now = Utc::now();
        let storage = self.storage.read().await;
        Ok(storage.values().filter(|s| s.is_stale_at(now)).cloned().collect())
    }

    async fn purge_stale(&self) -> RepositoryResult<u64> {
        let now = Utc::now();
        let mut storage = self.storage.write().await;
        let stale: Vec<ServiceId> = storage
            .values()
            .filter(|s| s.is_stale_at(now))
            .map(|s| s.service_id.clone())
            .collect();
        for id in &stale {
            storage.remove(id);
        }
        Ok(stale.len() as u64)
    }

    async fn update_status(
        &self,
        id: &ServiceId,
        status: ServiceStatus,
    ) -> RepositoryResult<ServiceInfo> {
        let mut storage = self.storage.write().await;
        let service = storage
            .get_mut(id)
            .ok_or_else(|| RepositoryError::not_found("ServiceInfo", id.as_str()))?;
        service.status = status;
        Ok(service.clone())
    }
}
