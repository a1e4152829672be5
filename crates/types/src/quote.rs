use crate::candle_part::CandlePart;
use crate::error::CoreError;
use crate::series::{Reusable, Series};

/// OHLCV quote, the standard input record of a source hub.
/// `timestamp_ns` is the **open time** of the bar.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Quote {
    /// Unix epoch nanoseconds UTC (open time)
    pub timestamp_ns: i64,
    /// Open price
    pub open: f64,
    /// High price
    pub high: f64,
    /// Low price
    pub low: f64,
    /// Close price
    pub close: f64,
    /// Volume
    pub volume: f64,
}

impl Quote {
    /// Creates a quote.
    #[must_use]
    pub fn new(timestamp_ns: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp_ns,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns the requested candle part.
    #[must_use]
    pub fn part(&self, part: CandlePart) -> f64 {
        match part {
            CandlePart::Open => self.open,
            CandlePart::High => self.high,
            CandlePart::Low => self.low,
            CandlePart::Close => self.close,
            CandlePart::Volume => self.volume,
            CandlePart::Hl2 => (self.high + self.low) / 2.0,
            CandlePart::Hlc3 => (self.high + self.low + self.close) / 3.0,
            CandlePart::Oc2 => (self.open + self.close) / 2.0,
            CandlePart::Ohl3 => (self.open + self.high + self.low) / 3.0,
            CandlePart::Ohlc4 => (self.open + self.high + self.low + self.close) / 4.0,
        }
    }

    /// Checks the quote before it is accepted by a source.
    ///
    /// # Errors
    /// [`CoreError::InvalidInput`] for non-finite fields, negative volume
    /// or an inverted high/low range.
    pub fn validate(&self) -> Result<(), CoreError> {
        if !self.open.is_finite()
            || !self.high.is_finite()
            || !self.low.is_finite()
            || !self.close.is_finite()
            || !self.volume.is_finite()
        {
            return Err(CoreError::InvalidInput(format!(
                "NaN/Inf in quote at {}: {self:?}",
                self.timestamp_ns
            )));
        }

        if self.volume < 0.0 {
            return Err(CoreError::InvalidInput(format!(
                "negative volume at {}: {}",
                self.timestamp_ns, self.volume
            )));
        }

        if self.low > self.high {
            return Err(CoreError::InvalidInput(format!(
                "low above high at {}: low={}, high={}",
                self.timestamp_ns, self.low, self.high
            )));
        }

        Ok(())
    }
}

impl Series for Quote {
    fn timestamp(&self) -> i64 {
        self.timestamp_ns
    }
}

impl Reusable for Quote {
    fn value(&self) -> Option<f64> {
        Some(self.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Quote {
        Quote::new(1_704_067_200_000_000_000, 1.10, 1.20, 1.00, 1.15, 1000.0)
    }

    #[test]
    fn test_quote_serde_roundtrip() {
        let quote = sample();
        let json = serde_json::to_string(&quote).unwrap();
        let deserialized: Quote = serde_json::from_str(&json).unwrap();
        assert_eq!(quote, deserialized);
    }

    #[test]
    fn test_quote_parts() {
        let q = sample();
        assert!((q.part(CandlePart::Close) - 1.15).abs() < 1e-12);
        assert!((q.part(CandlePart::Hl2) - 1.10).abs() < 1e-12);
        assert!((q.part(CandlePart::Ohlc4) - 1.1125).abs() < 1e-12);
        assert_eq!(Reusable::value(&q), Some(1.15));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let mut q = sample();
        q.close = f64::NAN;
        assert!(matches!(q.validate(), Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let mut q = sample();
        q.low = 2.0;
        assert!(q.validate().is_err());
        assert!(sample().validate().is_ok());
    }
}
