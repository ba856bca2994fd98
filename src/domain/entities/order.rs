//! # Order Entity
//!
//! Order lifecycle tracking from submission through fill or cancellation.
//!
//! The fill invariants live here so that every repository variant enforces
//! the same rules: `filled_quantity` never exceeds `quantity`, and the
//! status is `Filled` exactly when the order is fully executed.

use crate::domain::value_objects::{
    InstrumentId, OrderId, OrderSide, OrderStatus, OrderType, StrategyId, TimeInForce,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An order placed by a strategy.
///
/// # Invariants
///
/// - `quantity > 0`
/// - `filled_quantity <= quantity`
/// - `status == Filled` iff `filled_quantity == quantity`
/// - `price` is required for limit and stop-limit orders
/// - `exchange_order_id` is set only after submission acknowledgement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Unique order identifier.
    pub order_id: OrderId,
    /// Strategy that created this order.
    pub strategy_id: StrategyId,
    /// Instrument being traded.
    pub instrument_id: InstrumentId,
    /// Buy or sell.
    pub side: OrderSide,
    /// Order type.
    pub order_type: OrderType,
    /// Time-in-force policy.
    pub time_in_force: TimeInForce,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Ordered quantity.
    pub quantity: Decimal,
    /// Quantity executed so far.
    pub filled_quantity: Decimal,
    /// Limit price. `None` for market orders.
    pub price: Option<Decimal>,
    /// Stop trigger price, for stop orders.
    pub stop_price: Option<Decimal>,
    /// Volume-weighted average fill price.
    pub average_fill_price: Option<Decimal>,
    /// Identifier assigned by the exchange after acknowledgement.
    pub exchange_order_id: Option<String>,
    /// Commission accumulated across fills.
    pub commission: Decimal,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When the order was submitted to the exchange.
    pub submitted_at: Option<DateTime<Utc>>,
    /// When the order was fully filled.
    pub filled_at: Option<DateTime<Utc>>,
    /// When the order was cancelled.
    pub cancelled_at: Option<DateTime<Utc>>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new order in the `New` status.
    #[must_use]
    pub fn new(
        order_id: OrderId,
        strategy_id: StrategyId,
        instrument_id: InstrumentId,
        side: OrderSide,
        order_type: OrderType,
        quantity: Decimal,
        price: Option<Decimal>,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            strategy_id,
            instrument_id,
            side,
            order_type,
            time_in_force: TimeInForce::default(),
            status: OrderStatus::New,
            quantity,
            filled_quantity: Decimal::ZERO,
            price,
            stop_price: None,
            average_fill_price: None,
            exchange_order_id: None,
            commission: Decimal::ZERO,
            created_at: now,
            submitted_at: None,
            filled_at: None,
            cancelled_at: None,
            updated_at: now,
        }
    }

    /// Quantity still outstanding.
    #[must_use]
    pub fn remaining_quantity(&self) -> Decimal {
        self.quantity - self.filled_quantity
    }

    /// Returns true if the order can still receive fills.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Applies a fill of `fill_quantity` at `fill_price`.
    ///
    /// Recomputes the filled quantity, the volume-weighted average fill
    /// price, and the status (`PartiallyFilled` or `Filled`). The order is
    /// left untouched when the fill is rejected.
    ///
    /// # Errors
    ///
    /// Returns a description when the fill quantity is non-positive, the
    /// order is no longer open, or the fill would exceed the ordered
    /// quantity.
    pub fn apply_fill(&mut self, fill_quantity: Decimal, fill_price: Decimal) -> Result<(), String> {
        if fill_quantity <= Decimal::ZERO {
            return Err(format!("fill quantity must be positive, got {fill_quantity}"));
        }
        if fill_price <= Decimal::ZERO {
            return Err(format!("fill price must be positive, got {fill_price}"));
        }
        if !self.is_open() {
            return Err(format!("order {} is {} and cannot be filled", self.order_id, self.status));
        }
        let new_filled = self.filled_quantity + fill_quantity;
        if new_filled > self.quantity {
            return Err(format!(
                "fill of {fill_quantity} would exceed order quantity ({} of {} already filled)",
                self.filled_quantity, self.quantity
            ));
        }

        let previous_notional =
            self.average_fill_price.unwrap_or(Decimal::ZERO) * self.filled_quantity;
        self.average_fill_price = Some((previous_notional + fill_quantity * fill_price) / new_filled);
        self.filled_quantity = new_filled;
        let now = Utc::now();
        if new_filled == self.quantity {
            self.status = OrderStatus::Filled;
            self.filled_at = Some(now);
        } else {
            self.status = OrderStatus::PartiallyFilled;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Marks the order cancelled at `cancelled_at`.
    ///
    /// # Errors
    ///
    /// Returns a description when the order is already terminal.
    pub fn cancel(&mut self, cancelled_at: DateTime<Utc>) -> Result<(), String> {
        if self.status.is_terminal() {
            return Err(format!("order {} is already {}", self.order_id, self.status));
        }
        self.status = OrderStatus::Cancelled;
        self.cancelled_at = Some(cancelled_at);
        self.updated_at = cancelled_at;
        Ok(())
    }

    /// Records the exchange acknowledgement.
    pub fn acknowledge(&mut self, exchange_order_id: impl Into<String>, submitted_at: DateTime<Utc>) {
        self.exchange_order_id = Some(exchange_order_id.into());
        self.submitted_at = Some(submitted_at);
        self.updated_at = submitted_at;
    }

    /// Checks structural invariants.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.quantity <= Decimal::ZERO {
            return Err(format!("order quantity must be positive, got {}", self.quantity));
        }
        if self.filled_quantity < Decimal::ZERO || self.filled_quantity > self.quantity {
            return Err(format!(
                "filled quantity {} outside [0, {}]",
                self.filled_quantity, self.quantity
            ));
        }
        if self.order_type.requires_price() && self.price.is_none() {
            return Err(format!("{} orders require a price", self.order_type));
        }
        let fully_filled = self.filled_quantity == self.quantity;
        if (self.status == OrderStatus::Filled) != fully_filled {
            return Err(format!(
                "status {} inconsistent with filled quantity {}/{}",
                self.status, self.filled_quantity, self.quantity
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn limit_order(quantity: &str, price: &str) -> Order {
        Order::new(
            OrderId::new("ord-001"),
            StrategyId::new("strat-001"),
            InstrumentId::new("BTC-USD"),
            OrderSide::Buy,
            OrderType::Limit,
            quantity.parse().unwrap(),
            Some(price.parse().unwrap()),
        )
    }

    #[test]
    fn new_order_is_open() {
        let order = limit_order("1.5", "50000");
        assert!(order.is_open());
        assert_eq!(order.remaining_quantity(), "1.5".parse::<Decimal>().unwrap());
        assert!(order.validate().is_ok());
    }

    #[test]
    fn partial_fill_updates_status_and_average() {
        let mut order = limit_order("2", "50000");
        order.apply_fill("1".parse().unwrap(), "49990".parse().unwrap()).unwrap();
        assert_eq!(order.status, OrderStatus::PartiallyFilled);
        assert_eq!(order.filled_quantity, Decimal::ONE);
        assert_eq!(order.average_fill_price, Some("49990".parse().unwrap()));

        order.apply_fill("1".parse().unwrap(), "50010".parse().unwrap()).unwrap();
        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.average_fill_price, Some("50000".parse().unwrap()));
        assert!(order.filled_at.is_some());
        assert!(order.validate().is_ok());
    }

    #[test]
    fn overfill_is_rejected_and_leaves_order_unchanged() {
        let mut order = limit_order("1", "50000");
        order.apply_fill("0.6".parse().unwrap(), "50000".parse().unwrap()).unwrap();
        let before = order.clone();

        let err = order.apply_fill("0.5".parse().unwrap(), "50000".parse().unwrap());
        assert!(err.is_err());
        assert_eq!(order, before);
    }

    #[test]
    fn filled_order_rejects_further_fills() {
        let mut order = limit_order("1", "50000");
        order.apply_fill("1".parse().unwrap(), "50000".parse().unwrap()).unwrap();
        assert!(order.apply_fill("0.1".parse().unwrap(), "50000".parse().unwrap()).is_err());
    }

    #[test]
    fn cancel_sets_status_and_timestamp() {
        let mut order = limit_order("1", "50000");
        let at = Utc::now();
        order.cancel(at).unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.cancelled_at, Some(at));
        assert!(order.cancel(at).is_err());
    }

    #[test]
    fn limit_order_without_price_is_invalid() {
        let mut order = limit_order("1", "50000");
        order.price = None;
        assert!(order.validate().is_err());
    }

    #[test]
    fn acknowledge_records_exchange_id() {
        let mut order = limit_order("1", "50000");
        assert!(order.exchange_order_id.is_none());
        order.acknowledge("EX-12345", Utc::now());
        assert_eq!(order.exchange_order_id.as_deref(), Some("EX-12345"));
        assert!(order.submitted_at.is_some());
    }
}
