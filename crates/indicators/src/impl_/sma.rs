//! Simple Moving Average (SMA) indicator

use flux_hub::{Accumulator, Compute, HubError, RingBuffer, Window};
use flux_types::Value;

use crate::traits::{SeriesIndicator, check_period, window_mean};

/// Simple Moving Average
///
/// Arithmetic mean of the last N values. A missing value anywhere in the
/// window yields a missing average.
#[derive(Debug, Clone, Copy)]
pub struct Sma {
    period: usize,
}

impl Sma {
    /// Creates a new SMA with the given period.
    ///
    /// # Errors
    /// [`HubError::InvalidParameter`] when `period` is 0.
    pub fn new(period: usize) -> Result<Self, HubError> {
        Ok(Self {
            period: check_period(period)?,
        })
    }

    /// Number of periods averaged.
    #[must_use]
    pub fn period(&self) -> usize {
        self.period
    }

    /// Append-only rendition of this SMA.
    ///
    /// # Errors
    /// Never fails for a validated SMA; the ring buffer rejects capacity 0.
    pub fn buffer(&self) -> Result<SmaBuffer, HubError> {
        Ok(SmaBuffer {
            ring: RingBuffer::new(self.period)?,
        })
    }
}

impl SeriesIndicator for Sma {
    type Input = Value;
    type Output = Value;

    fn compute(&self, inputs: &[Value]) -> Vec<Value> {
        inputs
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let value = (i + 1 >= self.period)
                    .then(|| window_mean(&inputs[i + 1 - self.period..=i]))
                    .flatten();
                Value::new(v.timestamp_ns, value)
            })
            .collect()
    }

    fn warmup_periods(&self) -> usize {
        self.period - 1
    }
}

impl Compute for Sma {
    type Input = Value;
    type Output = Value;
    type State = ();

    fn name(&self) -> String {
        format!("SMA({})", self.period)
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute_one(&self, _prev: &(), window: Window<'_, Value, Value>) -> (Value, ()) {
        let value = window.trailing(self.period).and_then(window_mean);
        (Value::new(window.item().timestamp_ns, value), ())
    }
}

/// Buffered SMA fed one value at a time.
#[derive(Debug, Clone)]
pub struct SmaBuffer {
    ring: RingBuffer,
}

impl Accumulator for SmaBuffer {
    type Input = Value;
    type Output = Value;

    fn push(&mut self, input: &Value) -> Value {
        let Some(x) = input.value else {
            self.ring.clear();
            return Value::new(input.timestamp_ns, None);
        };
        self.ring.push(x);
        let value = self.ring.full().then(|| self.ring.sum() / self.ring.len() as f64);
        Value::new(input.timestamp_ns, value)
    }

    fn reset(&mut self) {
        self.ring.clear();
    }
}
