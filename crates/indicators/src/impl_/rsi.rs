//! Relative Strength Index (RSI) indicator with Wilder smoothing

use flux_hub::{Accumulator, Compute, HubError, Window};
use flux_types::Value;

use crate::traits::{SeriesIndicator, check_period};

/// Relative Strength Index (Wilder)
///
/// The first value appears once `period` changes are available and averages
/// their gains and losses. Later values smooth with
/// `avg = (prev_avg * (n - 1) + current) / n`. RSI is 100 while the
/// average loss is zero.
#[derive(Debug, Clone, Copy)]
pub struct Rsi {
    period: usize,
}

/// Recurrence state carried between positions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RsiState {
    /// Consecutive values seen, saturating at `period + 1`.
    run: usize,
    last: f64,
    /// Sums of gains and losses during warm-up.
    gain_sum: f64,
    loss_sum: f64,
    /// Average gain and loss once warmed up.
    avg: Option<(f64, f64)>,
}

impl RsiState {
    fn rsi(&self) -> Option<f64> {
        self.avg.map(|(gain, loss)| {
            if loss == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + gain / loss)
            }
        })
    }
}

impl Rsi {
    /// Creates a new RSI with the given period.
    ///
    /// # Errors
    /// [`HubError::InvalidParameter`] when `period` is 0.
    pub fn new(period: usize) -> Result<Self, HubError> {
        Ok(Self {
            period: check_period(period)?,
        })
    }

    /// Number of changes averaged.
    #[must_use]
    pub fn period(&self) -> usize {
        self.period
    }

    /// Advances the recurrence by one value.
    fn step(&self, prev: &RsiState, value: Option<f64>) -> RsiState {
        let Some(x) = value else {
            return RsiState::default();
        };
        if prev.run == 0 {
            return RsiState {
                run: 1,
                last: x,
                ..RsiState::default()
            };
        }

        let change = x - prev.last;
        let gain = change.max(0.0);
        let loss = (-change).max(0.0);
        let n = self.period as f64;
        let run = (prev.run + 1).min(self.period + 1);

        match prev.avg {
            Some((avg_gain, avg_loss)) => RsiState {
                run,
                last: x,
                gain_sum: 0.0,
                loss_sum: 0.0,
                avg: Some((
                    (avg_gain * (n - 1.0) + gain) / n,
                    (avg_loss * (n - 1.0) + loss) / n,
                )),
            },
            None => {
                let gain_sum = prev.gain_sum + gain;
                let loss_sum = prev.loss_sum + loss;
                let warm = run == self.period + 1;
                RsiState {
                    run,
                    last: x,
                    gain_sum: if warm { 0.0 } else { gain_sum },
                    loss_sum: if warm { 0.0 } else { loss_sum },
                    avg: warm.then(|| (gain_sum / n, loss_sum / n)),
                }
            }
        }
    }

    /// Append-only rendition of this RSI.
    #[must_use]
    pub fn buffer(&self) -> RsiBuffer {
        RsiBuffer {
            rsi: *self,
            state: RsiState::default(),
        }
    }
}

impl SeriesIndicator for Rsi {
    type Input = Value;
    type Output = Value;

    fn compute(&self, inputs: &[Value]) -> Vec<Value> {
        let mut state = RsiState::default();
        inputs
            .iter()
            .map(|v| {
                state = self.step(&state, v.value);
                Value::new(v.timestamp_ns, state.rsi())
            })
            .collect()
    }

    fn warmup_periods(&self) -> usize {
        self.period
    }
}

impl Compute for Rsi {
    type Input = Value;
    type Output = Value;
    type State = RsiState;

    fn name(&self) -> String {
        format!("RSI({})", self.period)
    }

    fn lookback(&self) -> usize {
        self.period + 1
    }

    fn compute_one(&self, prev: &RsiState, window: Window<'_, Value, Value>) -> (Value, RsiState) {
        let item = window.item();
        let state = self.step(prev, item.value);
        (Value::new(item.timestamp_ns, state.rsi()), state)
    }
}

/// Buffered RSI fed one value at a time.
#[derive(Debug, Clone)]
pub struct RsiBuffer {
    rsi: Rsi,
    state: RsiState,
}

impl Accumulator for RsiBuffer {
    type Input = Value;
    type Output = Value;

    fn push(&mut self, input: &Value) -> Value {
        self.state = self.rsi.step(&self.state, input.value);
        Value::new(input.timestamp_ns, self.state.rsi())
    }

    fn reset(&mut self) {
        self.state = RsiState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(xs: &[f64]) -> Vec<Value> {
        xs.iter()
            .enumerate()
            .map(|(i, &x)| Value::new(i as i64, Some(x)))
            .collect()
    }

    #[test]
    fn test_rsi_basic() {
        // changes: +2, -1, +2, -1
        let inputs = values(&[10.0, 12.0, 11.0, 13.0, 12.0]);
        let result = Rsi::new(2).unwrap().compute(&inputs);

        assert_eq!(result[0].value, None);
        assert_eq!(result[1].value, None);
        // avg gain = 1.0, avg loss = 0.5 -> RS = 2
        assert!((result[2].value.unwrap() - 200.0 / 3.0).abs() < 1e-10);
        // avg gain = (1.0 + 2.0) / 2 = 1.5, avg loss = 0.25 -> RS = 6
        assert!((result[3].value.unwrap() - (100.0 - 100.0 / 7.0)).abs() < 1e-10);
        assert!(result[4].value.is_some());
    }

    #[test]
    fn test_rsi_only_gains_is_100() {
        let inputs = values(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let result = Rsi::new(3).unwrap().compute(&inputs);
        assert_eq!(result[3].value, Some(100.0));
        assert_eq!(result[4].value, Some(100.0));
    }

    #[test]
    fn test_rsi_only_losses_is_0() {
        let inputs = values(&[5.0, 4.0, 3.0, 2.0]);
        let result = Rsi::new(2).unwrap().compute(&inputs);
        assert!(result[2].value.unwrap().abs() < 1e-10);
    }

    #[test]
    fn test_rsi_buffer_matches_batch() {
        let mut inputs = values(&[44.3, 44.1, 44.2, 43.6, 44.3, 44.8, 45.1, 45.4, 45.8, 46.1, 45.9]);
        inputs[3].value = None;
        let rsi = Rsi::new(3).unwrap();
        let batch = rsi.compute(&inputs);

        let mut buffer = rsi.buffer();
        for (input, expected) in inputs.iter().zip(&batch) {
            assert_eq!(buffer.push(input), *expected);
        }
        assert_eq!(batch[6].value, None);
        assert!(batch[7].value.is_some());
    }

    #[test]
    fn test_rsi_warmup() {
        let rsi = Rsi::new(14).unwrap();
        assert_eq!(rsi.warmup_periods(), 14);
        assert_eq!(rsi.lookback(), 15);
    }
}
