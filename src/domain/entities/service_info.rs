//! # Service Registration
//!
//! Registration record for service discovery.
//!
//! Staleness is time-based: an entry is stale once more than its TTL has
//! elapsed since the last heartbeat. Registration and heartbeat both reset
//! the clock.

use crate::domain::value_objects::{ServiceId, ServiceStatus};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A registered service instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Unique registration identifier.
    pub service_id: ServiceId,
    /// Logical service name used for lookup.
    pub service_name: String,
    /// Service version string.
    pub version: String,
    /// Reachable host.
    pub host: String,
    /// Reachable port.
    pub port: u16,
    /// Reported health status.
    pub status: ServiceStatus,
    /// Free-form registration metadata.
    pub metadata: HashMap<String, String>,
    /// Seconds after the last heartbeat at which the entry is stale.
    pub ttl_seconds: u64,
    /// When the service first registered.
    pub registered_at: DateTime<Utc>,
    /// Last heartbeat timestamp.
    pub last_heartbeat: DateTime<Utc>,
}

impl ServiceInfo {
    /// Creates a healthy registration with the heartbeat clock started now.
    #[must_use]
    pub fn new(
        service_id: ServiceId,
        service_name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        ttl_seconds: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            service_id,
            service_name: service_name.into(),
            version: String::new(),
            host: host.into(),
            port,
            status: ServiceStatus::Healthy,
            metadata: HashMap::new(),
            ttl_seconds,
            registered_at: now,
            last_heartbeat: now,
        }
    }

    /// Sets the version string.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the registration metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns true if more than the TTL has elapsed since the last
    /// heartbeat, measured at `now`.
    #[must_use]
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        now - self.last_heartbeat > Duration::seconds(self.ttl_seconds as i64)
    }

    /// Resets the heartbeat clock to `now`.
    pub fn heartbeat_at(&mut self, now: DateTime<Utc>) {
        self.last_heartbeat = now;
    }

    /// The `host:port` address of the service.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn fresh_registration_is_not_stale() {
        let svc = ServiceInfo::new(ServiceId::new("svc-1"), "order-gateway", "10.0.0.5", 9090, 30);
        assert!(!svc.is_stale_at(Utc::now()));
        assert_eq!(svc.address(), "10.0.0.5:9090");
        assert_eq!(svc.status, ServiceStatus::Healthy);
    }

    #[test]
    fn entry_goes_stale_after_ttl() {
        let svc = ServiceInfo::new(ServiceId::new("svc-1"), "order-gateway", "10.0.0.5", 9090, 30);
        let later = svc.last_heartbeat + Duration::seconds(31);
        assert!(svc.is_stale_at(later));
        let within = svc.last_heartbeat + Duration::seconds(30);
        assert!(!svc.is_stale_at(within));
    }

    #[test]
    fn heartbeat_resets_the_clock() {
        let mut svc = ServiceInfo::new(ServiceId::new("svc-1"), "order-gateway", "10.0.0.5", 9090, 30);
        let later = svc.last_heartbeat + Duration::seconds(60);
        assert!(svc.is_stale_at(later));
        svc.heartbeat_at(later);
        assert!(!svc.is_stale_at(later));
    }
}
