//! Indicator implementations
//!
//! Each indicator ships a batch, a hub and a buffered rendition.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod quote_part;
pub mod rsi;
pub mod sma;
