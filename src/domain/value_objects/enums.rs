//! # Domain Enums
//!
//! Enumeration types for trading domain concepts.
//!
//! - [`StrategyStatus`] / [`StrategyType`] - strategy lifecycle and classification
//! - [`OrderSide`], [`OrderType`], [`OrderStatus`], [`TimeInForce`] - order attributes
//! - [`LiquidityFlag`] - maker/taker classification for fills
//! - [`ServiceStatus`] - service discovery health states
//!
//! All enums implement `Display` and `FromStr` using the lowercase
//! `snake_case` spelling that the relational backend stores as text.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when parsing an enum from a string fails.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseEnumError {
    /// The value does not name a variant of the enum.
    #[error("invalid {0} value: {1}")]
    InvalidValue(&'static str, String),
}

/// Lifecycle status of a trading strategy.
///
/// Transitions are constrained: see [`StrategyStatus::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum StrategyStatus {
    /// Strategy is configured but not running.
    #[default]
    Inactive = 0,
    /// Strategy is running and may place orders.
    Active = 1,
    /// Strategy is temporarily suspended.
    Paused = 2,
    /// Strategy has been permanently stopped.
    Stopped = 3,
    /// Strategy halted due to an error.
    Error = 4,
}

impl StrategyStatus {
    /// Returns true if the transition from `self` to `next` is allowed.
    ///
    /// `Stopped` is terminal. Every status may transition to itself.
    ///
    /// # Examples
    ///
    /// ```
    /// use trading_data_adapter::domain::value_objects::enums::StrategyStatus;
    ///
    /// assert!(StrategyStatus::Inactive.can_transition_to(StrategyStatus::Active));
    /// assert!(!StrategyStatus::Stopped.can_transition_to(StrategyStatus::Active));
    /// ```
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        if self as u8 == next as u8 {
            return true;
        }
        match self {
            Self::Inactive => matches!(next, Self::Active),
            Self::Active => matches!(next, Self::Paused | Self::Stopped | Self::Error),
            Self::Paused => matches!(next, Self::Active | Self::Stopped),
            Self::Error => matches!(next, Self::Active | Self::Stopped),
            Self::Stopped => false,
        }
    }

    /// Returns true if the strategy is currently running.
    #[inline]
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inactive => write!(f, "inactive"),
            Self::Active => write!(f, "active"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl FromStr for StrategyStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(Self::Inactive),
            "active" => Ok(Self::Active),
            "paused" => Ok(Self::Paused),
            "stopped" => Ok(Self::Stopped),
            "error" => Ok(Self::Error),
            _ => Err(ParseEnumError::InvalidValue(
                "StrategyStatus",
                s.to_string(),
            )),
        }
    }
}

/// Classification of a trading strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum StrategyType {
    /// Two-sided quoting strategies.
    MarketMaking = 0,
    /// Strategies betting on reversion to a mean.
    MeanReversion = 1,
    /// Momentum/trend continuation strategies.
    TrendFollowing = 2,
    /// Cross-venue or cross-instrument arbitrage.
    Arbitrage = 3,
    /// Momentum breakout strategies.
    Momentum = 4,
    /// User-defined strategies outside the standard taxonomy.
    Custom = 5,
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MarketMaking => write!(f, "market_making"),
            Self::MeanReversion => write!(f, "mean_reversion"),
            Self::TrendFollowing => write!(f, "trend_following"),
            Self::Arbitrage => write!(f, "arbitrage"),
            Self::Momentum => write!(f, "momentum"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

impl FromStr for StrategyType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "market_making" => Ok(Self::MarketMaking),
            "mean_reversion" => Ok(Self::MeanReversion),
            "trend_following" => Ok(Self::TrendFollowing),
            "arbitrage" => Ok(Self::Arbitrage),
            "momentum" => Ok(Self::Momentum),
            "custom" => Ok(Self::Custom),
            _ => Err(ParseEnumError::InvalidValue("StrategyType", s.to_string())),
        }
    }
}

/// Order side indicating buy or sell direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum OrderSide {
    /// Buy order - acquiring the asset.
    Buy = 0,
    /// Sell order - disposing of the asset.
    Sell = 1,
}

impl OrderSide {
    /// Returns the opposite side.
    #[inline]
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Returns true if this is a buy.
    #[inline]
    #[must_use]
    pub const fn is_buy(self) -> bool {
        matches!(self, Self::Buy)
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for OrderSide {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(ParseEnumError::InvalidValue("OrderSide", s.to_string())),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum OrderType {
    /// Execute immediately at the best available price.
    Market = 0,
    /// Execute at the limit price or better.
    Limit = 1,
    /// Becomes a market order once the stop price trades.
    Stop = 2,
    /// Becomes a limit order once the stop price trades.
    StopLimit = 3,
}

impl OrderType {
    /// Returns true if the order type requires a limit price.
    #[inline]
    #[must_use]
    pub const fn requires_price(self) -> bool {
        matches!(self, Self::Limit | Self::StopLimit)
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Market => write!(f, "market"),
            Self::Limit => write!(f, "limit"),
            Self::Stop => write!(f, "stop"),
            Self::StopLimit => write!(f, "stop_limit"),
        }
    }
}

impl FromStr for OrderType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "market" => Ok(Self::Market),
            "limit" => Ok(Self::Limit),
            "stop" => Ok(Self::Stop),
            "stop_limit" => Ok(Self::StopLimit),
            _ => Err(ParseEnumError::InvalidValue("OrderType", s.to_string())),
        }
    }
}

/// Order lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum OrderStatus {
    /// Order accepted by this layer, not yet filled.
    #[default]
    New = 0,
    /// Order partially executed.
    PartiallyFilled = 1,
    /// Order fully executed.
    Filled = 2,
    /// Order cancelled before complete execution.
    Cancelled = 3,
    /// Order rejected by the venue.
    Rejected = 4,
}

impl OrderStatus {
    /// Returns true if the order can still receive fills.
    #[inline]
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::New | Self::PartiallyFilled)
    }

    /// Returns true if the order has reached a terminal state.
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !self.is_open()
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::PartiallyFilled => write!(f, "partially_filled"),
            Self::Filled => write!(f, "filled"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "partially_filled" => Ok(Self::PartiallyFilled),
            "filled" => Ok(Self::Filled),
            "cancelled" => Ok(Self::Cancelled),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseEnumError::InvalidValue("OrderStatus", s.to_string())),
        }
    }
}

/// Time-in-force policy for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TimeInForce {
    /// Good till cancelled.
    #[default]
    Gtc = 0,
    /// Immediate or cancel.
    Ioc = 1,
    /// Fill or kill.
    Fok = 2,
    /// Valid for the trading day.
    Day = 3,
}

impl fmt::Display for TimeInForce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gtc => write!(f, "gtc"),
            Self::Ioc => write!(f, "ioc"),
            Self::Fok => write!(f, "fok"),
            Self::Day => write!(f, "day"),
        }
    }
}

impl FromStr for TimeInForce {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gtc" => Ok(Self::Gtc),
            "ioc" => Ok(Self::Ioc),
            "fok" => Ok(Self::Fok),
            "day" => Ok(Self::Day),
            _ => Err(ParseEnumError::InvalidValue("TimeInForce", s.to_string())),
        }
    }
}

/// Maker/taker classification of a fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum LiquidityFlag {
    /// The fill provided liquidity.
    Maker = 0,
    /// The fill removed liquidity.
    Taker = 1,
}

impl fmt::Display for LiquidityFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Maker => write!(f, "maker"),
            Self::Taker => write!(f, "taker"),
        }
    }
}

impl FromStr for LiquidityFlag {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "maker" => Ok(Self::Maker),
            "taker" => Ok(Self::Taker),
            _ => Err(ParseEnumError::InvalidValue("LiquidityFlag", s.to_string())),
        }
    }
}

/// Reported health of a registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ServiceStatus {
    /// Service is fully operational.
    #[default]
    Healthy = 0,
    /// Service is operational with reduced capability.
    Degraded = 1,
    /// Service is not operational.
    Unhealthy = 2,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

impl FromStr for ServiceStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(Self::Healthy),
            "degraded" => Ok(Self::Degraded),
            "unhealthy" => Ok(Self::Unhealthy),
            _ => Err(ParseEnumError::InvalidValue("ServiceStatus", s.to_string())),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn strategy_status_transitions() {
        use StrategyStatus::*;
        assert!(Inactive.can_transition_to(Active));
        assert!(Active.can_transition_to(Paused));
        assert!(Active.can_transition_to(Stopped));
        assert!(Paused.can_transition_to(Active));
        assert!(Error.can_transition_to(Active));
        assert!(!Inactive.can_transition_to(Paused));
        assert!(!Stopped.can_transition_to(Active));
        assert!(Active.can_transition_to(Active));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for status in [
            OrderStatus::New,
            OrderStatus::PartiallyFilled,
            OrderStatus::Filled,
            OrderStatus::Cancelled,
            OrderStatus::Rejected,
        ] {
            let parsed: OrderStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        let parsed: StrategyType = StrategyType::MarketMaking.to_string().parse().unwrap();
        assert_eq!(parsed, StrategyType::MarketMaking);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&OrderStatus::PartiallyFilled).unwrap();
        assert_eq!(json, "\"partially_filled\"");
        let json = serde_json::to_string(&StrategyType::MeanReversion).unwrap();
        assert_eq!(json, "\"mean_reversion\"");
    }

    #[test]
    fn parse_rejects_unknown_values() {
        let err = "shorted".parse::<OrderSide>().unwrap_err();
        assert_eq!(
            err,
            ParseEnumError::InvalidValue("OrderSide", "shorted".to_string())
        );
    }

    #[test]
    fn open_statuses() {
        assert!(OrderStatus::New.is_open());
        assert!(OrderStatus::PartiallyFilled.is_open());
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }
}
