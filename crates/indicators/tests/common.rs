#![allow(dead_code)]

use flux_indicators::{AtrResult, BollingerResult};
use flux_types::{Quote, Value};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub const STEP_NS: i64 = 60_000_000_000;
pub const START_NS: i64 = 1_704_067_200_000_000_000; // 2024-01-01 00:00:00 UTC

/// Timestamp of the `i`-th bar.
pub fn ts(i: usize) -> i64 {
    START_NS + i as i64 * STEP_NS
}

/// Valid quote around `close` with a fixed range.
pub fn quote_at(timestamp_ns: i64, close: f64) -> Quote {
    Quote::new(timestamp_ns, close - 0.1, close + 0.5, close - 0.5, close, 1_000.0)
}

/// Deterministic random-walk quotes, one per bar.
pub fn random_quotes(seed: u64, len: usize) -> Vec<Quote> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut close: f64 = 100.0;
    (0..len)
        .map(|i| {
            let open = close;
            close += rng.gen_range(-1.0..1.0);
            let high = open.max(close) + rng.gen_range(0.0..0.5);
            let low = open.min(close) - rng.gen_range(0.0..0.5);
            let volume = rng.gen_range(100.0..10_000.0);
            Quote::new(ts(i), open, high, low, close, volume)
        })
        .collect()
}

/// Numeric fields of a result record, for tolerance comparisons.
pub trait Fields {
    fn timestamp_ns(&self) -> i64;
    fn fields(&self) -> Vec<Option<f64>>;
}

impl Fields for Value {
    fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    fn fields(&self) -> Vec<Option<f64>> {
        vec![self.value]
    }
}

impl Fields for AtrResult {
    fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    fn fields(&self) -> Vec<Option<f64>> {
        vec![self.tr, self.atr, self.atrp]
    }
}

impl Fields for BollingerResult {
    fn timestamp_ns(&self) -> i64 {
        self.timestamp_ns
    }

    fn fields(&self) -> Vec<Option<f64>> {
        vec![
            self.sma,
            self.upper_band,
            self.lower_band,
            self.percent_b,
            self.z_score,
            self.width,
        ]
    }
}

pub fn assert_scalar_close(label: &str, expected: Option<f64>, actual: Option<f64>, atol: f64) {
    match (expected, actual) {
        (None, None) => {}
        (Some(exp), Some(act)) => {
            let diff = (exp - act).abs();
            assert!(diff <= atol, "{label} diff {diff} exceeds {atol}: {exp} vs {act}");
        }
        (Some(exp), None) => panic!("{label} expected {exp}, got None"),
        (None, Some(act)) => panic!("{label} expected None, got {act}"),
    }
}

pub fn assert_series_close<T: Fields>(label: &str, expected: &[T], actual: &[T], atol: f64) {
    assert_eq!(
        expected.len(),
        actual.len(),
        "{label}: length mismatch {} != {}",
        expected.len(),
        actual.len()
    );

    for (idx, (exp, act)) in expected.iter().zip(actual).enumerate() {
        assert_eq!(exp.timestamp_ns(), act.timestamp_ns(), "{label}[{idx}] timestamp");
        for (field, (e, a)) in exp.fields().into_iter().zip(act.fields()).enumerate() {
            assert_scalar_close(&format!("{label}[{idx}].{field}"), e, a, atol);
        }
    }
}
