//! # Domain Entities
//!
//! Value records persisted by the repository layer.
//!
//! Entities reference one another by identifier only (order → strategy,
//! trade → order, position → strategy + instrument); relations are resolved
//! through repository lookups, never embedded pointers.

pub mod order;
pub mod position;
pub mod service_info;
pub mod strategy;
pub mod trade;

pub use order::Order;
pub use position::Position;
pub use service_info::ServiceInfo;
pub use strategy::Strategy;
pub use trade::Trade;
