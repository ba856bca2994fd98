//! # Strategy Entity
//!
//! Trading strategy configuration and performance state.
//!
//! # Examples
//!
//! ```
//! use trading_data_adapter::domain::entities::strategy::Strategy;
//! use trading_data_adapter::domain::value_objects::{StrategyId, StrategyType};
//!
//! let strategy = Strategy::new(
//!     StrategyId::new("strat-001"),
//!     "BTC Market Making",
//!     StrategyType::MarketMaking,
//! );
//!
//! assert!(strategy.validate().is_ok());
//! ```

use crate::domain::value_objects::{InstrumentId, StrategyId, StrategyStatus, StrategyType};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Trading strategy configuration and state.
///
/// # Invariants
///
/// - `max_position_size`, when set, is non-negative
/// - status transitions follow [`StrategyStatus::can_transition_to`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    /// Unique strategy identifier.
    pub strategy_id: StrategyId,
    /// Human-readable strategy name.
    pub name: String,
    /// Strategy classification.
    pub strategy_type: StrategyType,
    /// Current lifecycle status.
    pub status: StrategyStatus,
    /// Strategy parameters as a JSON mapping.
    pub parameters: Map<String, Value>,
    /// Instruments traded by this strategy.
    pub instruments: Vec<InstrumentId>,
    /// Maximum position size, if limited.
    pub max_position_size: Option<Decimal>,
    /// Maximum daily loss limit, if limited.
    pub max_daily_loss: Option<Decimal>,
    /// Cumulative P&L since inception.
    pub total_pnl: Decimal,
    /// P&L for the current trading day.
    pub daily_pnl: Decimal,
    /// Total number of trades executed.
    pub total_trades: u64,
    /// When the strategy was last started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the strategy was last stopped.
    pub stopped_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Strategy {
    /// Creates a new inactive strategy with empty parameters.
    #[must_use]
    pub fn new(strategy_id: StrategyId, name: impl Into<String>, strategy_type: StrategyType) -> Self {
        let now = Utc::now();
        Self {
            strategy_id,
            name: name.into(),
            strategy_type,
            status: StrategyStatus::Inactive,
            parameters: Map::new(),
            instruments: Vec::new(),
            max_position_size: None,
            max_daily_loss: None,
            total_pnl: Decimal::ZERO,
            daily_pnl: Decimal::ZERO,
            total_trades: 0,
            started_at: None,
            stopped_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the instruments traded by this strategy.
    #[must_use]
    pub fn with_instruments(mut self, instruments: Vec<InstrumentId>) -> Self {
        self.instruments = instruments;
        self
    }

    /// Sets the maximum position size limit.
    #[must_use]
    pub fn with_max_position_size(mut self, size: Decimal) -> Self {
        self.max_position_size = Some(size);
        self
    }

    /// Sets the strategy parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Returns true if the strategy trades the given instrument.
    #[must_use]
    pub fn trades_instrument(&self, instrument: &InstrumentId) -> bool {
        self.instruments.contains(instrument)
    }

    /// Checks structural invariants.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("strategy name must not be empty".to_string());
        }
        if let Some(size) = self.max_position_size
            && size < Decimal::ZERO
        {
            return Err(format!("max_position_size must be non-negative, got {size}"));
        }
        Ok(())
    }
}
