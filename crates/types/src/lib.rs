//! Flux Types
//!
//! Core data structures shared by the flux indicator crates.
//! This crate provides the record traits every cache entry implements,
//! the standard OHLCV quote, hub configuration and the shared error type.

#![deny(clippy::all)]

pub mod candle_part;
pub mod config;
pub mod error;
pub mod quote;
pub mod series;

// Re-export main types for convenience
pub use candle_part::{CandlePart, ParseCandlePartError};
pub use config::{HubConfig, MAX_CACHE_SIZE_LIMIT, RollbackStrategy};
pub use error::CoreError;
pub use quote::Quote;
pub use series::{Reusable, Series, Value};
