//! # Value Objects
//!
//! Immutable types with validation and domain semantics.
//!
//! ## Identity Types
//!
//! - [`StrategyId`], [`OrderId`], [`TradeId`], [`PositionId`]: entity identifiers
//! - [`InstrumentId`]: tradable instrument identifier
//! - [`ServiceId`]: service discovery identifier
//!
//! ## Domain Enums
//!
//! - [`StrategyStatus`], [`StrategyType`]: strategy lifecycle and classification
//! - [`OrderSide`], [`OrderType`], [`OrderStatus`], [`TimeInForce`]: order attributes
//! - [`LiquidityFlag`]: maker/taker classification
//! - [`ServiceStatus`]: service health states

pub mod enums;
pub mod ids;

pub use enums::{
    LiquidityFlag, OrderSide, OrderStatus, OrderType, ParseEnumError, ServiceStatus,
    StrategyStatus, StrategyType, TimeInForce,
};
pub use ids::{InstrumentId, OrderId, PositionId, ServiceId, StrategyId, TradeId};
