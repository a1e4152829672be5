#![allow(dead_code)]

use flux_hub::{Compute, Window};
use flux_types::Value;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const STEP_NS: i64 = 60_000_000_000;
pub const START_NS: i64 = 1_704_067_200_000_000_000; // 2024-01-01 00:00:00 UTC

/// Timestamp of the `i`-th bar.
pub fn ts(i: usize) -> i64 {
    START_NS + i as i64 * STEP_NS
}

/// Deterministic random walk of `len` values, one per bar.
pub fn random_walk(seed: u64, len: usize) -> Vec<Value> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut level = 100.0;
    (0..len)
        .map(|i| {
            level += rng.gen_range(-1.0..1.0);
            Value::new(ts(i), Some(level))
        })
        .collect()
}

/// Mean of the last `period` values; `None` until the window is full.
#[derive(Debug, Clone)]
pub struct Mean {
    pub period: usize,
}

impl Compute for Mean {
    type Input = Value;
    type Output = Value;
    type State = ();

    fn name(&self) -> String {
        format!("MEAN({})", self.period)
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute_one(&self, _prev: &(), window: Window<'_, Value, Value>) -> (Value, ()) {
        let value = window
            .trailing(self.period)
            .and_then(|w| w.iter().map(|v| v.value).sum::<Option<f64>>())
            .map(|sum| sum / self.period as f64);
        (Value::new(window.item().timestamp_ns, value), ())
    }
}

/// Exponential smoothing seeded with the first available value.
#[derive(Debug, Clone)]
pub struct Smooth {
    pub alpha: f64,
}

impl Compute for Smooth {
    type Input = Value;
    type Output = Value;
    type State = Option<f64>;

    fn name(&self) -> String {
        format!("SMOOTH({})", self.alpha)
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute_one(&self, prev: &Option<f64>, window: Window<'_, Value, Value>) -> (Value, Option<f64>) {
        let value = match (*prev, window.item().value) {
            (Some(p), Some(x)) => Some(p + self.alpha * (x - p)),
            (None, x) => x,
            (p, None) => p,
        };
        (Value::new(window.item().timestamp_ns, value), value)
    }
}

/// Identity hub.
#[derive(Debug, Clone, Copy)]
pub struct Echo;

impl Compute for Echo {
    type Input = Value;
    type Output = Value;
    type State = ();

    fn name(&self) -> String {
        "ECHO".to_string()
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute_one(&self, _prev: &(), window: Window<'_, Value, Value>) -> (Value, ()) {
        (*window.item(), ())
    }
}

/// Reference result: one pass over the whole series from a default state.
pub fn batch<C: Compute>(compute: &C, inputs: &[C::Input]) -> Vec<C::Output> {
    let mut outputs: Vec<C::Output> = Vec::with_capacity(inputs.len());
    let mut state = C::State::default();
    for i in 0..inputs.len() {
        let (out, next) = compute.compute_one(&state, Window::new(&inputs[..=i], &outputs[..i]));
        outputs.push(out);
        state = next;
    }
    outputs
}
