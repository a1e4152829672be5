//! Bollinger Bands indicator

use flux_hub::{Accumulator, Compute, HubError, RingBuffer, Window};
use flux_types::{Reusable, Series, Value};
use serde::{Deserialize, Serialize};

use crate::traits::{SeriesIndicator, check_period, check_positive};

/// One Bollinger Bands result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerResult {
    /// Unix epoch nanoseconds UTC
    pub timestamp_ns: i64,
    /// Middle band = SMA
    pub sma: Option<f64>,
    /// Upper band = SMA + std_devs * std
    pub upper_band: Option<f64>,
    /// Lower band = SMA - std_devs * std
    pub lower_band: Option<f64>,
    /// Position of the value between the bands (0 = lower, 1 = upper)
    pub percent_b: Option<f64>,
    /// Distance from the SMA in standard deviations
    pub z_score: Option<f64>,
    /// Band width relative to the SMA
    pub width: Option<f64>,
}

impl BollingerResult {
    fn empty(timestamp_ns: i64) -> Self {
        Self {
            timestamp_ns,
            sma: None,
            upper_band: None,
            lower_band: None,
            percent_b: None,
            z_score: None,
            width: None,
        }
    }
}

impl Series for BollingerResult {
    fn timestamp(&self) -> i64 {
        self.timestamp_ns
    }
}

impl Reusable for BollingerResult {
    fn value(&self) -> Option<f64> {
        self.percent_b
    }
}

/// Bollinger Bands
///
/// Bands at `std_devs` standard deviations around a simple moving average.
/// Uses population standard deviation (n), not sample (n-1).
#[derive(Debug, Clone, Copy)]
pub struct BollingerBands {
    period: usize,
    std_devs: f64,
}

impl BollingerBands {
    /// Creates new Bollinger Bands.
    ///
    /// # Errors
    /// [`HubError::InvalidParameter`] when `period` is 0 or `std_devs` is
    /// not a positive finite number.
    pub fn new(period: usize, std_devs: f64) -> Result<Self, HubError> {
        Ok(Self {
            period: check_period(period)?,
            std_devs: check_positive("std_devs", std_devs)?,
        })
    }

    /// Number of periods in the window.
    #[must_use]
    pub fn period(&self) -> usize {
        self.period
    }

    /// Band distance in standard deviations.
    #[must_use]
    pub fn std_devs(&self) -> f64 {
        self.std_devs
    }

    /// Bands for `value` over a full window of `period` values.
    fn bands<I>(&self, timestamp_ns: i64, value: f64, window: I) -> BollingerResult
    where
        I: Iterator<Item = f64> + Clone,
    {
        let n = self.period as f64;
        let sma = window.clone().sum::<f64>() / n;
        let variance = window.map(|x| (x - sma).powi(2)).sum::<f64>() / n;
        let sd = variance.sqrt();

        let upper = sma + self.std_devs * sd;
        let lower = sma - self.std_devs * sd;

        BollingerResult {
            timestamp_ns,
            sma: Some(sma),
            upper_band: Some(upper),
            lower_band: Some(lower),
            percent_b: (upper != lower).then(|| (value - lower) / (upper - lower)),
            z_score: (sd != 0.0).then(|| (value - sma) / sd),
            width: (sma != 0.0).then(|| (upper - lower) / sma),
        }
    }

    fn at(&self, window: &[Value]) -> Option<BollingerResult> {
        let item = window.last()?;
        let value = item.value?;
        if window.iter().any(|v| v.value.is_none()) {
            return None;
        }
        let values = window.iter().filter_map(|v| v.value);
        Some(self.bands(item.timestamp_ns, value, values))
    }

    /// Append-only rendition of these bands.
    ///
    /// # Errors
    /// Never fails for validated bands; the ring buffer rejects capacity 0.
    pub fn buffer(&self) -> Result<BollingerBuffer, HubError> {
        Ok(BollingerBuffer {
            bands: *self,
            ring: RingBuffer::new(self.period)?,
        })
    }
}

impl SeriesIndicator for BollingerBands {
    type Input = Value;
    type Output = BollingerResult;

    fn compute(&self, inputs: &[Value]) -> Vec<BollingerResult> {
        inputs
            .iter()
            .enumerate()
            .map(|(i, v)| {
                (i + 1 >= self.period)
                    .then(|| self.at(&inputs[i + 1 - self.period..=i]))
                    .flatten()
                    .unwrap_or_else(|| BollingerResult::empty(v.timestamp_ns))
            })
            .collect()
    }

    fn warmup_periods(&self) -> usize {
        self.period - 1
    }
}

impl Compute for BollingerBands {
    type Input = Value;
    type Output = BollingerResult;
    type State = ();

    fn name(&self) -> String {
        format!("BB({},{})", self.period, self.std_devs)
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute_one(&self, _prev: &(), window: Window<'_, Value, BollingerResult>) -> (BollingerResult, ()) {
        let result = window
            .trailing(self.period)
            .and_then(|w| self.at(w))
            .unwrap_or_else(|| BollingerResult::empty(window.item().timestamp_ns));
        (result, ())
    }
}

/// Buffered Bollinger Bands fed one value at a time.
#[derive(Debug, Clone)]
pub struct BollingerBuffer {
    bands: BollingerBands,
    ring: RingBuffer,
}

impl Accumulator for BollingerBuffer {
    type Input = Value;
    type Output = BollingerResult;

    fn push(&mut self, input: &Value) -> BollingerResult {
        let Some(x) = input.value else {
            self.ring.clear();
            return BollingerResult::empty(input.timestamp_ns);
        };
        self.ring.push(x);
        if !self.ring.full() {
            return BollingerResult::empty(input.timestamp_ns);
        }
        self.bands.bands(input.timestamp_ns, x, self.ring.iter())
    }

    fn reset(&mut self) {
        self.ring.clear();
    }
}
