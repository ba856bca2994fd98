//! # Domain Layer
//!
//! Entities and value objects for the trading persistence domain.

pub mod entities;
pub mod value_objects;
