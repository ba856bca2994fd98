//! # Persistence Layer
//!
//! Repository contracts and their implementation variants.
//!
//! [`traits`] defines the six ports the trading engine consumes.
//! [`postgres`] and [`redis`] back them with real stores; [`in_memory`]
//! backs them with process-local stubs used for testing and for graceful
//! degradation when a store is unreachable.

pub mod in_memory;
pub mod postgres;
pub mod redis;
pub mod traits;
