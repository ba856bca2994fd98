//! # Repository Traits
//!
//! Port definitions for the persistence abstraction.
//!
//! This module defines the six repository contracts the trading engine
//! consumes. Each contract has two implementation variants - a real backend
//! (PostgreSQL or Redis) and an in-memory stub - selected by the factory at
//! construction time. Callers depend only on these traits and never observe
//! which variant backs a call.
//!
//! # Available Repositories
//!
//! - [`StrategiesRepository`]: Persistence for trading strategies
//! - [`OrdersRepository`]: Persistence for orders
//! - [`TradesRepository`]: Persistence for executed trades
//! - [`PositionsRepository`]: Persistence for aggregated positions
//! - [`ServiceDiscoveryRepository`]: Service registration and lookup
//! - [`CacheRepository`]: Key-value caching with TTL
//!
//! # Examples
//!
//! ```ignore
//! use trading_data_adapter::infrastructure::persistence::traits::OrdersRepository;
//!
//! async fn open_order_count(repo: &dyn OrdersRepository) -> u64 {
//!     repo.list_open().await.map(|orders| orders.len() as u64).unwrap_or(0)
//! }
//! ```

use crate::domain::entities::{Order, Position, ServiceInfo, Strategy, Trade};
use crate::domain::value_objects::{
    InstrumentId, OrderId, OrderStatus, PositionId, ServiceId, ServiceStatus, StrategyId,
    StrategyStatus, StrategyType, TradeId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Error type for repository operations.
///
/// Real-backend variants may return [`RepositoryError::Connection`]; the
/// in-memory stubs never do.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Entity not found on an operation that requires existence.
    #[error("entity not found: {entity_type} with id {id}")]
    NotFound {
        /// Type of entity.
        entity_type: &'static str,
        /// Entity identifier.
        id: String,
    },

    /// Uniqueness violation on create.
    #[error("conflict: {entity_type} with id {id} already exists")]
    Conflict {
        /// Type of entity.
        entity_type: &'static str,
        /// Entity identifier.
        id: String,
    },

    /// Malformed input shape or range.
    #[error("validation error: {0}")]
    Validation(String),

    /// Backend unreachable. Only real-backend variants produce this.
    #[error("connection error: {0}")]
    Connection(String),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RepositoryError {
    /// Creates a not found error.
    #[must_use]
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a conflict error.
    #[must_use]
    pub fn conflict(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::Conflict {
            entity_type,
            id: id.into(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns true if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true if this is a conflict error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true if this is a validation error.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this is a connection error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

/// Result type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Filter for strategy listings. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyFilter {
    /// Match strategies in this status.
    pub status: Option<StrategyStatus>,
    /// Match strategies of this type.
    pub strategy_type: Option<StrategyType>,
    /// Match strategies trading this instrument.
    pub instrument: Option<InstrumentId>,
}

impl StrategyFilter {
    /// Returns true if `strategy` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, strategy: &Strategy) -> bool {
        self.status.is_none_or(|s| strategy.status == s)
            && self.strategy_type.is_none_or(|t| strategy.strategy_type == t)
            && self
                .instrument
                .as_ref()
                .is_none_or(|i| strategy.trades_instrument(i))
    }
}

/// Remaining time-to-live of a cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// The key does not exist (or has expired).
    Missing,
    /// The key exists and never expires.
    Persistent,
    /// The key exists and expires after the contained duration.
    Remaining(Duration),
}

/// Repository for trading strategies.
///
/// Mutation methods return the post-mutation entity. Status updates enforce
/// the strategy lifecycle transition rules.
#[async_trait]
pub trait StrategiesRepository: Send + Sync + fmt::Debug {
    /// Creates a new strategy.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] if a strategy with the same id
    /// already exists, or [`RepositoryError::Validation`] if the entity
    /// violates its invariants.
    async fn create(&self, strategy: &Strategy) -> RepositoryResult<()>;

    /// Gets a strategy by id. Returns `None` if it does not exist.
    async fn get_by_id(&self, id: &StrategyId) -> RepositoryResult<Option<Strategy>>;

    /// Lists strategies matching the filter.
    async fn list(&self, filter: &StrategyFilter) -> RepositoryResult<Vec<Strategy>>;

    /// Updates the strategy status.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Validation`] when the transition is not
    /// allowed and [`RepositoryError::NotFound`] when the strategy is
    /// missing.
    async fn update_status(
        &self,
        id: &StrategyId,
        status: StrategyStatus,
    ) -> RepositoryResult<Strategy>;

    /// Replaces the strategy parameters.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when the strategy is missing.
    async fn update_parameters(
        &self,
        id: &StrategyId,
        parameters: Map<String, Value>,
    ) -> RepositoryResult<Strategy>;

    /// Updates the cumulative and daily P&L.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when the strategy is missing.
    async fn update_pnl(
        &self,
        id: &StrategyId,
        total_pnl: Decimal,
        daily_pnl: Decimal,
    ) -> RepositoryResult<Strategy>;

    /// Increments the executed trade count by one.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when the strategy is missing.
    async fn increment_trade_count(&self, id: &StrategyId) -> RepositoryResult<Strategy>;

    /// Deletes a strategy. Idempotent: returns `Ok(false)` when absent.
    async fn delete(&self, id: &StrategyId) -> RepositoryResult<bool>;

    /// Counts all strategies.
    async fn count(&self) -> RepositoryResult<u64>;

    /// Returns true if a strategy with the given id exists.
    async fn exists(&self, id: &StrategyId) -> RepositoryResult<bool>;
}

/// Repository for orders.
#[async_trait]
pub trait OrdersRepository: Send + Sync + fmt::Debug {
    /// Creates a new order.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] on duplicate id or
    /// [`RepositoryError::Validation`] on invariant violations.
    async fn create(&self, order: &Order) -> RepositoryResult<()>;

    /// Gets an order by id. Returns `None` if it does not exist.
    async fn get_by_id(&self, id: &OrderId) -> RepositoryResult<Option<Order>>;

    /// Gets an order by its exchange-assigned id.
    async fn get_by_exchange_order_id(
        &self,
        exchange_order_id: &str,
    ) -> RepositoryResult<Option<Order>>;

    /// Lists all orders placed by a strategy.
    async fn list_by_strategy(&self, strategy_id: &StrategyId) -> RepositoryResult<Vec<Order>>;

    /// Lists orders in the given status.
    async fn list_by_status(&self, status: OrderStatus) -> RepositoryResult<Vec<Order>>;

    /// Lists all open orders (`New` or `PartiallyFilled`).
    async fn list_open(&self) -> RepositoryResult<Vec<Order>>;

    /// Applies a fill, recomputing filled quantity, average fill price, and
    /// status.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Validation`] when the fill would push the
    /// filled quantity above the ordered quantity (the order is left
    /// unchanged) and [`RepositoryError::NotFound`] when the order is
    /// missing.
    async fn update_fill(
        &self,
        id: &OrderId,
        fill_quantity: Decimal,
        fill_price: Decimal,
    ) -> RepositoryResult<Order>;

    /// Cancels an order, recording the cancellation timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Validation`] when the order is already
    /// terminal and [`RepositoryError::NotFound`] when it is missing.
    async fn cancel(&self, id: &OrderId, cancelled_at: DateTime<Utc>) -> RepositoryResult<Order>;

    /// Deletes an order. Idempotent: returns `Ok(false)` when absent.
    async fn delete(&self, id: &OrderId) -> RepositoryResult<bool>;

    /// Counts all orders.
    async fn count(&self) -> RepositoryResult<u64>;
}

/// Repository for executed trades.
#[async_trait]
pub trait TradesRepository: Send + Sync + fmt::Debug {
    /// Creates a new trade record.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Conflict`] on duplicate id or
    /// [`RepositoryError::Validation`] on value-invariant violations.
    async fn create(&self, trade: &Trade) -> RepositoryResult<()>;

    /// Gets a trade by id. Returns `None` if it does not exist.
    async fn get_by_id(&self, id: &TradeId) -> RepositoryResult<Option<Trade>>;

    /// Gets a trade by its exchange-assigned id.
    async fn get_by_exchange_trade_id(
        &self,
        exchange_trade_id: &str,
    ) -> RepositoryResult<Option<Trade>>;

    /// Lists all trades generated by an order.
    async fn list_by_order(&self, order_id: &OrderId) -> RepositoryResult<Vec<Trade>>;

    /// Lists all trades originated by a strategy.
    async fn list_by_strategy(&self, strategy_id: &StrategyId) -> RepositoryResult<Vec<Trade>>;

    /// Lists all trades in an instrument.
    async fn list_by_instrument(
        &self,
        instrument_id: &InstrumentId,
    ) -> RepositoryResult<Vec<Trade>>;

    /// Lists trades executed within `[from, to]`.
    async fn list_by_date_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Trade>>;

    /// Sums realized P&L over a strategy's trades, optionally bounded by
    /// execution date.
    async fn aggregate_pnl(
        &self,
        strategy_id: &StrategyId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Decimal>;

    /// Sums gross traded value over a strategy's trades, optionally bounded
    /// by execution date.
    async fn sum_volume(
        &self,
        strategy_id: &StrategyId,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> RepositoryResult<Decimal>;

    /// Counts all trades.
    async fn count(&self) -> RepositoryResult<u64>;
}

/// Repository for aggregated positions.
///
/// Positions are keyed logically by strategy + instrument; `upsert` creates
/// or replaces accordingly.
#[async_trait]
pub trait PositionsRepository: Send + Sync + fmt::Debug {
    /// Gets the position for a strategy/instrument pair.
    async fn get(
        &self,
        strategy_id: &StrategyId,
        instrument_id: &InstrumentId,
    ) -> RepositoryResult<Option<Position>>;

    /// Creates or replaces the position, returning the stored value.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Validation`] on derived-field invariant
    /// violations.
    async fn upsert(&self, position: &Position) -> RepositoryResult<Position>;

    /// Updates the market price and recomputes market value, unrealized
    /// P&L, and exposure.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when the position is missing.
    async fn update_market_price(
        &self,
        id: &PositionId,
        current_price: Decimal,
    ) -> RepositoryResult<Position>;

    /// Lists all positions held by a strategy.
    async fn list_by_strategy(&self, strategy_id: &StrategyId) -> RepositoryResult<Vec<Position>>;

    /// Lists all open positions (quantity != 0) across strategies.
    async fn list_open(&self) -> RepositoryResult<Vec<Position>>;

    /// Sums exposure over open positions, optionally for one strategy.
    async fn total_exposure(&self, strategy_id: Option<&StrategyId>) -> RepositoryResult<Decimal>;

    /// Sums unrealized P&L over open positions, optionally for one
    /// strategy.
    async fn total_unrealized_pnl(
        &self,
        strategy_id: Option<&StrategyId>,
    ) -> RepositoryResult<Decimal>;

    /// Deletes a position. Idempotent: returns `Ok(false)` when absent.
    async fn delete(&self, id: &PositionId) -> RepositoryResult<bool>;
}

/// Repository for service discovery.
///
/// Staleness is TTL-based and computed lazily from the last heartbeat; no
/// background sweeper is involved.
#[async_trait]
pub trait ServiceDiscoveryRepository: Send + Sync + fmt::Debug {
    /// Registers a service. Re-registering an existing id replaces the
    /// record and resets the heartbeat clock.
    async fn register(&self, service: &ServiceInfo) -> RepositoryResult<()>;

    /// Refreshes the heartbeat clock for a registration.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when the registration is
    /// missing.
    async fn heartbeat(&self, id: &ServiceId) -> RepositoryResult<ServiceInfo>;

    /// Removes a registration. Idempotent: returns `Ok(false)` when absent.
    async fn deregister(&self, id: &ServiceId) -> RepositoryResult<bool>;

    /// Looks up a service by its logical name. When several registrations
    /// share the name, the one with the most recent heartbeat wins.
    async fn lookup_by_name(&self, service_name: &str) -> RepositoryResult<Option<ServiceInfo>>;

    /// Gets a registration by id. Returns `None` if it does not exist.
    async fn get_by_id(&self, id: &ServiceId) -> RepositoryResult<Option<ServiceInfo>>;

    /// Lists all registrations, stale ones included.
    async fn list_all(&self) -> RepositoryResult<Vec<ServiceInfo>>;

    /// Lists registrations reporting `Healthy` that are not stale.
    async fn list_healthy(&self) -> RepositoryResult<Vec<ServiceInfo>>;

    /// Lists registrations whose TTL has elapsed since the last heartbeat.
    async fn list_stale(&self) -> RepositoryResult<Vec<ServiceInfo>>;

    /// Removes stale registrations, returning the number removed.
    async fn purge_stale(&self) -> RepositoryResult<u64>;

    /// Updates the reported status of a registration.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::NotFound`] when the registration is
    /// missing.
    async fn update_status(
        &self,
        id: &ServiceId,
        status: ServiceStatus,
    ) -> RepositoryResult<ServiceInfo>;
}

/// Repository for key-value caching with TTL support.
///
/// Patterns use `*` (any run of characters) and `?` (any single character).
#[async_trait]
pub trait CacheRepository: Send + Sync + fmt::Debug {
    /// Gets a value. Returns `None` for missing or expired keys.
    async fn get(&self, key: &str) -> RepositoryResult<Option<String>>;

    /// Sets a value with an optional TTL. `None` means the key never
    /// expires.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> RepositoryResult<()>;

    /// Deletes a key. Idempotent: returns `Ok(false)` when absent.
    async fn delete(&self, key: &str) -> RepositoryResult<bool>;

    /// Returns true if the key exists and has not expired.
    async fn exists(&self, key: &str) -> RepositoryResult<bool>;

    /// Atomically adds `amount` to a numeric value, returning the new
    /// value. A missing key counts from zero.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Validation`] when the current value is
    /// not an integer.
    async fn increment(&self, key: &str, amount: i64) -> RepositoryResult<i64>;

    /// Atomically subtracts `amount` from a numeric value, returning the
    /// new value.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Validation`] when the current value is
    /// not an integer.
    async fn decrement(&self, key: &str, amount: i64) -> RepositoryResult<i64>;

    /// Gets several values at once, position-aligned with `keys`.
    async fn get_many(&self, keys: &[String]) -> RepositoryResult<Vec<Option<String>>>;

    /// Sets several values at once with one shared TTL.
    async fn set_many(
        &self,
        items: &HashMap<String, String>,
        ttl: Option<Duration>,
    ) -> RepositoryResult<()>;

    /// Deletes all keys matching the pattern, returning the count removed.
    async fn delete_pattern(&self, pattern: &str) -> RepositoryResult<u64>;

    /// Lists all live keys matching the pattern.
    async fn list_keys(&self, pattern: &str) -> RepositoryResult<Vec<String>>;

    /// Gets and deserializes a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`RepositoryError::Serialization`] when the stored value is
    /// not valid JSON.
    async fn get_json(&self, key: &str) -> RepositoryResult<Option<Value>>;

    /// Serializes and sets a JSON value with an optional TTL.
    async fn set_json(&self, key: &str, value: &Value, ttl: Option<Duration>)
        -> RepositoryResult<()>;

    /// Returns the remaining TTL of a key.
    async fn ttl(&self, key: &str) -> RepositoryResult<KeyTtl>;

    /// Sets the expiration of an existing key. Returns `Ok(false)` when the
    /// key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> RepositoryResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    mod repository_error {
        use super::*;

        #[test]
        fn not_found_error() {
            let err = RepositoryError::not_found("Strategy", "strat-123");
            assert!(err.is_not_found());
            assert!(!err.is_conflict());
            assert!(err.to_string().contains("not found"));
            assert!(err.to_string().contains("strat-123"));
        }

        #[test]
        fn conflict_error() {
            let err = RepositoryError::conflict("Order", "ord-456");
            assert!(err.is_conflict());
            assert!(!err.is_not_found());
            assert!(err.to_string().contains("already exists"));
        }

        #[test]
        fn validation_error() {
            let err = RepositoryError::validation("fill exceeds quantity");
            assert!(err.is_validation());
            assert!(err.to_string().contains("fill exceeds quantity"));
        }

        #[test]
        fn connection_error() {
            let err = RepositoryError::connection("connection refused");
            assert!(err.is_connection());
            assert!(err.to_string().contains("refused"));
        }
    }

    mod strategy_filter {
        use super::*;
        use crate::domain::entities::Strategy;

        fn strategy() -> Strategy {
            Strategy::new(
                StrategyId::new("strat-001"),
                "mm",
                StrategyType::MarketMaking,
            )
            .with_instruments(vec![InstrumentId::new("BTC-USD")])
        }

        #[test]
        fn default_filter_matches_everything() {
            assert!(StrategyFilter::default().matches(&strategy()));
        }

        #[test]
        fn status_filter() {
            let filter = StrategyFilter {
                status: Some(StrategyStatus::Active),
                ..Default::default()
            };
            assert!(!filter.matches(&strategy()));
        }

        #[test]
        fn instrument_filter() {
            let filter = StrategyFilter {
                instrument: Some(InstrumentId::new("BTC-USD")),
                ..Default::default()
            };
            assert!(filter.matches(&strategy()));

            let filter = StrategyFilter {
                instrument: Some(InstrumentId::new("SOL-USD")),
                ..Default::default()
            };
            assert!(!filter.matches(&strategy()));
        }
    }
}
