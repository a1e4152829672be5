//! Quote part selector

use flux_hub::{Accumulator, Compute, Window};
use flux_types::{CandlePart, Quote, Value};

use crate::traits::SeriesIndicator;

/// Reduces each quote to one chainable value.
///
/// The usual first hub under a quote source: every value-based indicator
/// subscribes to a `QuotePart` rather than to the quotes directly.
#[derive(Debug, Clone, Copy)]
pub struct QuotePart {
    /// Selected price or volume
    pub part: CandlePart,
}

impl QuotePart {
    /// Creates a selector for `part`.
    #[must_use]
    pub fn new(part: CandlePart) -> Self {
        Self { part }
    }

    fn select(&self, quote: &Quote) -> Value {
        Value::new(quote.timestamp_ns, Some(quote.part(self.part)))
    }
}

impl SeriesIndicator for QuotePart {
    type Input = Quote;
    type Output = Value;

    fn compute(&self, inputs: &[Quote]) -> Vec<Value> {
        inputs.iter().map(|q| self.select(q)).collect()
    }

    fn warmup_periods(&self) -> usize {
        0
    }
}

impl Compute for QuotePart {
    type Input = Quote;
    type Output = Value;
    type State = ();

    fn name(&self) -> String {
        format!("QUOTE_PART({})", self.part.as_str().to_uppercase())
    }

    fn lookback(&self) -> usize {
        1
    }

    fn compute_one(&self, _prev: &(), window: Window<'_, Quote, Value>) -> (Value, ()) {
        (self.select(window.item()), ())
    }
}

impl Accumulator for QuotePart {
    type Input = Quote;
    type Output = Value;

    fn push(&mut self, input: &Quote) -> Value {
        self.select(input)
    }

    fn reset(&mut self) {}
}
