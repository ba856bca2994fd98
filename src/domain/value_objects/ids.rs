//! # Identifier Types
//!
//! String-based identifier newtypes for domain entities.
//!
//! All relations between entities are expressed through these identifiers,
//! never through embedded references. Generated identifiers use UUID v4.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$doc:meta])* $name:ident, $prefix:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an identifier from an existing string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generates a new random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(format!("{}-{}", $prefix, Uuid::new_v4()))
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Unique identifier for a trading strategy.
    StrategyId,
    "strat"
);

string_id!(
    /// Unique identifier for an order.
    OrderId,
    "ord"
);

string_id!(
    /// Unique identifier for an executed trade.
    TradeId,
    "trade"
);

string_id!(
    /// Unique identifier for a position.
    PositionId,
    "pos"
);

string_id!(
    /// Identifier for a tradable instrument (e.g. `BTC-USD`).
    InstrumentId,
    "inst"
);

string_id!(
    /// Unique identifier for a registered service instance.
    ServiceId,
    "svc"
);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn new_preserves_value() {
        let id = StrategyId::new("strat-001");
        assert_eq!(id.as_str(), "strat-001");
        assert_eq!(id.to_string(), "strat-001");
    }

    #[test]
    fn generate_is_unique() {
        let a = OrderId::generate();
        let b = OrderId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("ord-"));
    }

    #[test]
    fn serde_is_transparent() {
        let id = InstrumentId::new("BTC-USD");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"BTC-USD\"");
        let back: InstrumentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ids_order_deterministically() {
        let a = TradeId::new("trade-001");
        let b = TradeId::new("trade-002");
        assert!(a < b);
    }
}
