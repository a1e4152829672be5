//! Exponential Moving Average (EMA) indicator

use flux_hub::{Accumulator, Compute, HubError, RingBuffer, Window};
use flux_types::Value;

use crate::traits::{SeriesIndicator, check_period, window_mean};

/// Exponential Moving Average
///
/// Seeded with the SMA of the first `period` values, then
/// `ema = prev + k * (value - prev)` with `k = 2 / (period + 1)`.
/// A missing value breaks the recurrence and restarts the warm-up.
#[derive(Debug, Clone, Copy)]
pub struct Ema {
    period: usize,
}

/// Recurrence state carried between positions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EmaState {
    /// Consecutive values seen, saturating at the period.
    run: usize,
    ema: Option<f64>,
}

impl Ema {
    /// Creates a new EMA with the given period.
    ///
    /// # Errors
    /// [`HubError::InvalidParameter`] when `period` is 0.
    pub fn new(period: usize) -> Result<Self, HubError> {
        Ok(Self {
            period: check_period(period)?,
        })
    }

    /// Number of periods.
    #[must_use]
    pub fn period(&self) -> usize {
        self.period
    }

    /// Smoothing factor.
    fn multiplier(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }

    /// Advances the recurrence by one value. `seed` yields the SMA of the
    /// last `period` values and is only called when the warm-up completes.
    fn step(&self, prev: &EmaState, value: Option<f64>, seed: impl FnOnce() -> Option<f64>) -> EmaState {
        let Some(x) = value else {
            return EmaState::default();
        };
        let run = (prev.run + 1).min(self.period);
        let ema = match prev.ema {
            Some(p) => Some(p + self.multiplier() * (x - p)),
            None if run == self.period => seed(),
            None => None,
        };
        EmaState { run, ema }
    }

    /// Append-only rendition of this EMA.
    ///
    /// # Errors
    /// Never fails for a validated EMA; the ring buffer rejects capacity 0.
    pub fn buffer(&self) -> Result<EmaBuffer, HubError> {
        Ok(EmaBuffer {
            ema: *self,
            ring: RingBuffer::new(self.period)?,
            state: EmaState::default(),
        })
    }
}

impl SeriesIndicator for Ema {
    type Input = Value;
    type Output = Value;

    fn compute(&self, inputs: &[Value]) -> Vec<Value> {
        let mut state = EmaState::default();
        inputs
            .iter()
            .enumerate()
            .map(|(i, v)| {
                state = self.step(&state, v.value, || window_mean(&inputs[i + 1 - self.period..=i]));
                Value::new(v.timestamp_ns, state.ema)
            })
            .collect()
    }

    fn warmup_periods(&self) -> usize {
        self.period - 1
    }
}

impl Compute for Ema {
    type Input = Value;
    type Output = Value;
    type State = EmaState;

    fn name(&self) -> String {
        format!("EMA({})", self.period)
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute_one(&self, prev: &EmaState, window: Window<'_, Value, Value>) -> (Value, EmaState) {
        let item = window.item();
        let state = self.step(prev, item.value, || window.trailing(self.period).and_then(window_mean));
        (Value::new(item.timestamp_ns, state.ema), state)
    }
}

/// Buffered EMA fed one value at a time.
#[derive(Debug, Clone)]
pub struct EmaBuffer {
    ema: Ema,
    ring: RingBuffer,
    state: EmaState,
}

impl Accumulator for EmaBuffer {
    type Input = Value;
    type Output = Value;

    fn push(&mut self, input: &Value) -> Value {
        match input.value {
            Some(x) => {
                self.ring.push(x);
            }
            None => self.ring.clear(),
        }
        let ring = &self.ring;
        // the seed is averaged once per warm-up
        self.state = self.ema.step(&self.state, input.value, || Some(ring.mean()));
        Value::new(input.timestamp_ns, self.state.ema)
    }

    fn reset(&mut self) {
        self.ring.clear();
        self.state = EmaState::default();
    }
}
