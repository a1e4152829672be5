//! Record traits shared by every cache in the graph.

use serde::{Deserialize, Serialize};

/// A time-keyed record.
///
/// Every cache in the graph is ordered by `timestamp()`, so implementors
/// must return the same key for the lifetime of the record.
pub trait Series {
    /// Unix epoch nanoseconds UTC.
    fn timestamp(&self) -> i64;
}

/// A record that can feed a chained indicator.
///
/// `value()` is the single number a downstream hub consumes. `None` marks a
/// warm-up position where the producing formula had no value yet.
pub trait Reusable: Series {
    /// Chainable value of the record.
    fn value(&self) -> Option<f64>;
}

/// Generic timestamp/value record.
///
/// Produced by hubs that reduce a richer input to one number
/// (e.g. selecting the close price out of a quote).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Value {
    /// Unix epoch nanoseconds UTC
    pub timestamp_ns: i64,
    /// Value, `None` during warm-up
    pub value: Option<f64>,
}

impl Value {
    /// Creates a new value record.
    #[must_use]
    pub fn new(timestamp_ns: i64, value: Option<f64>) -> Self {
        Self {
            timestamp_ns,
            value,
        }
    }
}

impl Series for Value {
    fn timestamp(&self) -> i64 {
        self.timestamp_ns
    }
}

impl Reusable for Value {
    fn value(&self) -> Option<f64> {
        self.value
    }
}
