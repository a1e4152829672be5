//! Flux Indicators
//!
//! Indicator formulas plugged into the flux hub graph.
//!
//! # Features
//! - Batch computation over a complete series ([`SeriesIndicator`])
//! - Hub formulas for live, chainable graphs ([`flux_hub::Compute`])
//! - Buffered accumulators for append-only streams ([`flux_hub::Accumulator`])
//! - Parameter validation shared by all three renditions
//!
//! # Available Indicators
//! - QuotePart: price or volume selector over quotes
//! - SMA: Simple Moving Average
//! - EMA: Exponential Moving Average (SMA seeded)
//! - RSI: Relative Strength Index (Wilder smoothing)
//! - ATR: Average True Range (Wilder smoothing)
//! - Bollinger Bands: SMA bands, %B, z-score and width

#![deny(clippy::all)]

pub mod impl_;
pub mod traits;

// Re-export main types
pub use traits::{SeriesIndicator, check_period, check_positive};

// Re-export indicator implementations
pub use impl_::{
    atr::{Atr, AtrBuffer, AtrResult, AtrState},
    bollinger::{BollingerBands, BollingerBuffer, BollingerResult},
    ema::{Ema, EmaBuffer, EmaState},
    quote_part::QuotePart,
    rsi::{Rsi, RsiBuffer, RsiState},
    sma::{Sma, SmaBuffer},
};
