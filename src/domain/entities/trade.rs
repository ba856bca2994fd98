//! # Trade Entity
//!
//! An executed fill with its financial breakdown.
//!
//! Gross value is always `quantity * price`. Net value accounts for
//! commission with the sign of the side: buys pay `gross + commission`,
//! sells receive `gross - commission`.

use crate::domain::value_objects::{
    InstrumentId, LiquidityFlag, OrderId, OrderSide, StrategyId, TradeId,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An executed trade with fill information.
///
/// # Invariants
///
/// - `gross_value == quantity * price`
/// - `net_value == gross_value + commission` for buys,
///   `gross_value - commission` for sells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Unique trade identifier.
    pub trade_id: TradeId,
    /// Order that generated this trade.
    pub order_id: OrderId,
    /// Strategy that originated the trade.
    pub strategy_id: StrategyId,
    /// Instrument traded.
    pub instrument_id: InstrumentId,
    /// Buy or sell.
    pub side: OrderSide,
    /// Quantity executed.
    pub quantity: Decimal,
    /// Execution price.
    pub price: Decimal,
    /// Gross trade value (`quantity * price`).
    pub gross_value: Decimal,
    /// Commission paid.
    pub commission: Decimal,
    /// Net trade value after commission.
    pub net_value: Decimal,
    /// Realized P&L, when this trade closes part of a position.
    pub realized_pnl: Option<Decimal>,
    /// Identifier assigned by the exchange.
    pub exchange_trade_id: Option<String>,
    /// Venue where the trade executed.
    pub execution_venue: String,
    /// Maker/taker flag, when reported by the venue.
    pub liquidity_flag: Option<LiquidityFlag>,
    /// Execution timestamp.
    pub executed_at: DateTime<Utc>,
    /// Record creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Trade {
    /// Creates a trade, computing gross and net value from its inputs.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        trade_id: TradeId,
        order_id: OrderId,
        strategy_id: StrategyId,
        instrument_id: InstrumentId,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
        commission: Decimal,
        execution_venue: impl Into<String>,
        executed_at: DateTime<Utc>,
    ) -> Self {
        let gross_value = quantity * price;
        let net_value = Self::net_of(side, gross_value, commission);
        Self {
            trade_id,
            order_id,
            strategy_id,
            instrument_id,
            side,
            quantity,
            price,
            gross_value,
            commission,
            net_value,
            realized_pnl: None,
            exchange_trade_id: None,
            execution_venue: execution_venue.into(),
            liquidity_flag: None,
            executed_at,
            created_at: Utc::now(),
        }
    }

    /// Net value for a gross amount and commission on the given side.
    ///
    /// Buys pay the commission on top of the gross cost; sells have it
    /// deducted from the proceeds.
    #[must_use]
    pub fn net_of(side: OrderSide, gross_value: Decimal, commission: Decimal) -> Decimal {
        match side {
            OrderSide::Buy => gross_value + commission,
            OrderSide::Sell => gross_value - commission,
        }
    }

    /// Sets the realized P&L contribution of this trade.
    #[must_use]
    pub fn with_realized_pnl(mut self, pnl: Decimal) -> Self {
        self.realized_pnl = Some(pnl);
        self
    }

    /// Sets the maker/taker flag.
    #[must_use]
    pub fn with_liquidity_flag(mut self, flag: LiquidityFlag) -> Self {
        self.liquidity_flag = Some(flag);
        self
    }

    /// Checks the value invariants.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.quantity <= Decimal::ZERO {
            return Err(format!("trade quantity must be positive, got {}", self.quantity));
        }
        if self.gross_value != self.quantity * self.price {
            return Err(format!(
                "gross value {} != quantity {} * price {}",
                self.gross_value, self.quantity, self.price
            ));
        }
        let expected_net = Self::net_of(self.side, self.gross_value, self.commission);
        if self.net_value != expected_net {
            return Err(format!("net value {} != expected {expected_net}", self.net_value));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn trade(side: OrderSide) -> Trade {
        Trade::new(
            TradeId::new("trade-001"),
            OrderId::new("ord-001"),
            StrategyId::new("strat-001"),
            InstrumentId::new("BTC-USD"),
            side,
            "0.5".parse().unwrap(),
            "50000".parse().unwrap(),
            "7.50".parse().unwrap(),
            "exchange-simulator",
            Utc::now(),
        )
    }

    #[test]
    fn buy_net_value_adds_commission() {
        let t = trade(OrderSide::Buy);
        assert_eq!(t.gross_value, "25000".parse::<Decimal>().unwrap());
        assert_eq!(t.net_value, "25007.50".parse::<Decimal>().unwrap());
        assert!(t.validate().is_ok());
    }

    #[test]
    fn sell_net_value_subtracts_commission() {
        let t = trade(OrderSide::Sell);
        assert_eq!(t.net_value, "24992.50".parse::<Decimal>().unwrap());
        assert!(t.validate().is_ok());
    }

    #[test]
    fn tampered_gross_value_fails_validation() {
        let mut t = trade(OrderSide::Buy);
        t.gross_value = Decimal::ONE;
        assert!(t.validate().is_err());
    }
}
