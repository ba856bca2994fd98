//! # Infrastructure Layer
//!
//! Technical concerns behind the domain: persistence backends and the
//! repository contracts they implement.

pub mod persistence;
