//! # Position Entity
//!
//! Aggregated position for a strategy/instrument pair.
//!
//! Market value, unrealized P&L, and exposure are derived fields and are
//! recomputed together whenever the quantity or the market price changes.

use crate::domain::value_objects::{InstrumentId, PositionId, StrategyId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregated position for an instrument.
///
/// # Invariants
///
/// - `market_value == quantity * current_price`
/// - `unrealized_pnl == (current_price - average_entry_price) * quantity`
/// - `exposure == |market_value|`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Unique position identifier.
    pub position_id: PositionId,
    /// Strategy owning this position.
    pub strategy_id: StrategyId,
    /// Instrument identifier.
    pub instrument_id: InstrumentId,
    /// Signed quantity: positive is long, negative is short.
    pub quantity: Decimal,
    /// Volume-weighted average entry price.
    pub average_entry_price: Decimal,
    /// Last observed market price.
    pub current_price: Decimal,
    /// Current market value (`quantity * current_price`).
    pub market_value: Decimal,
    /// Unrealized profit/loss at the current price.
    pub unrealized_pnl: Decimal,
    /// Realized P&L from closed portions.
    pub realized_pnl: Decimal,
    /// Total cost basis of the open quantity.
    pub cost_basis: Decimal,
    /// Absolute exposure (`|market_value|`).
    pub exposure: Decimal,
    /// When the position was opened.
    pub opened_at: DateTime<Utc>,
    /// When the position was closed, if flat.
    pub closed_at: Option<DateTime<Utc>>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Creates a position and derives its dependent fields.
    #[must_use]
    pub fn new(
        position_id: PositionId,
        strategy_id: StrategyId,
        instrument_id: InstrumentId,
        quantity: Decimal,
        average_entry_price: Decimal,
        current_price: Decimal,
    ) -> Self {
        let now = Utc::now();
        let mut position = Self {
            position_id,
            strategy_id,
            instrument_id,
            quantity,
            average_entry_price,
            current_price,
            market_value: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            cost_basis: quantity * average_entry_price,
            exposure: Decimal::ZERO,
            opened_at: now,
            closed_at: None,
            updated_at: now,
        };
        position.recompute(current_price, now);
        position
    }

    /// Returns true while the position holds any quantity.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.quantity != Decimal::ZERO
    }

    /// Total P&L: realized plus unrealized.
    #[must_use]
    pub fn total_pnl(&self) -> Decimal {
        self.realized_pnl + self.unrealized_pnl
    }

    /// Updates the market price and recomputes the derived fields.
    pub fn recompute(&mut self, current_price: Decimal, at: DateTime<Utc>) {
        self.current_price = current_price;
        self.market_value = self.quantity * current_price;
        self.unrealized_pnl = (current_price - self.average_entry_price) * self.quantity;
        self.exposure = self.market_value.abs();
        self.updated_at = at;
    }

    /// Checks the derived-field invariants.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.market_value != self.quantity * self.current_price {
            return Err(format!(
                "market value {} != quantity {} * price {}",
                self.market_value, self.quantity, self.current_price
            ));
        }
        let expected_unrealized = (self.current_price - self.average_entry_price) * self.quantity;
        if self.unrealized_pnl != expected_unrealized {
            return Err(format!(
                "unrealized pnl {} != expected {expected_unrealized}",
                self.unrealized_pnl
            ));
        }
        if self.exposure != self.market_value.abs() {
            return Err(format!("exposure {} != |market value|", self.exposure));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn position(quantity: &str, entry: &str, current: &str) -> Position {
        Position::new(
            PositionId::new("pos-001"),
            StrategyId::new("strat-001"),
            InstrumentId::new("BTC-USD"),
            quantity.parse().unwrap(),
            entry.parse().unwrap(),
            current.parse().unwrap(),
        )
    }

    #[test]
    fn derived_fields_computed_on_creation() {
        let p = position("2.5", "48000", "50000");
        assert_eq!(p.market_value, "125000".parse::<Decimal>().unwrap());
        assert_eq!(p.unrealized_pnl, "5000".parse::<Decimal>().unwrap());
        assert_eq!(p.exposure, "125000".parse::<Decimal>().unwrap());
        assert_eq!(p.cost_basis, "120000".parse::<Decimal>().unwrap());
        assert!(p.validate().is_ok());
        assert!(p.is_open());
    }

    #[test]
    fn short_position_has_positive_exposure() {
        let p = position("-1", "50000", "49000");
        assert_eq!(p.market_value, "-49000".parse::<Decimal>().unwrap());
        assert_eq!(p.exposure, "49000".parse::<Decimal>().unwrap());
        // Short gains when the price falls.
        assert_eq!(p.unrealized_pnl, "1000".parse::<Decimal>().unwrap());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn recompute_tracks_new_price() {
        let mut p = position("2", "48000", "48000");
        assert_eq!(p.unrealized_pnl, Decimal::ZERO);

        p.recompute("51000".parse().unwrap(), Utc::now());
        assert_eq!(p.unrealized_pnl, "6000".parse::<Decimal>().unwrap());
        assert_eq!(p.market_value, "102000".parse::<Decimal>().unwrap());
        assert!(p.validate().is_ok());
    }

    #[test]
    fn flat_position_is_closed() {
        let p = position("0", "48000", "50000");
        assert!(!p.is_open());
        assert_eq!(p.exposure, Decimal::ZERO);
    }
}
