//! Average True Range (ATR) indicator with Wilder smoothing

use flux_hub::{Accumulator, Compute, HubError, Window};
use flux_types::{Quote, Reusable, Series};
use serde::{Deserialize, Serialize};

use crate::traits::{SeriesIndicator, check_period};

/// Average True Range (Wilder)
///
/// The first bar has no true range. The first ATR, at index `period`, is
/// the mean of the `period` true ranges before it; later values smooth with
/// `ATR = (prev_ATR * (n - 1) + TR) / n`.
#[derive(Debug, Clone, Copy)]
pub struct Atr {
    period: usize,
}

/// One ATR result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtrResult {
    /// Unix epoch nanoseconds UTC
    pub timestamp_ns: i64,
    /// True range, `None` on the first bar
    pub tr: Option<f64>,
    /// Average true range
    pub atr: Option<f64>,
    /// ATR as a percentage of the close
    pub atrp: Option<f64>,
}

impl Series for AtrResult {
    fn timestamp(&self) -> i64 {
        self.timestamp_ns
    }
}

impl Reusable for AtrResult {
    fn value(&self) -> Option<f64> {
        self.atr
    }
}

/// Recurrence state carried between positions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AtrState {
    /// Bars seen, saturating at `period + 1`.
    count: usize,
    prev_close: f64,
    tr_sum: f64,
    atr: Option<f64>,
}

/// TR = max(High - Low, |High - Prev_Close|, |Low - Prev_Close|)
#[inline]
fn true_range(quote: &Quote, prev_close: f64) -> f64 {
    let hl = quote.high - quote.low;
    let hc = (quote.high - prev_close).abs();
    let lc = (quote.low - prev_close).abs();
    hl.max(hc).max(lc)
}

impl Atr {
    /// Creates a new ATR with the given period.
    ///
    /// # Errors
    /// [`HubError::InvalidParameter`] when `period` is 0.
    pub fn new(period: usize) -> Result<Self, HubError> {
        Ok(Self {
            period: check_period(period)?,
        })
    }

    /// Number of true ranges averaged.
    #[must_use]
    pub fn period(&self) -> usize {
        self.period
    }

    fn step(&self, prev: &AtrState, quote: &Quote) -> (AtrResult, AtrState) {
        let n = self.period as f64;
        let tr = (prev.count > 0).then(|| true_range(quote, prev.prev_close));
        let count = (prev.count + 1).min(self.period + 1);

        let (tr_sum, atr) = match (prev.atr, tr) {
            (Some(prev_atr), Some(tr)) => (0.0, Some((prev_atr * (n - 1.0) + tr) / n)),
            (None, Some(tr)) if count == self.period + 1 => (0.0, Some((prev.tr_sum + tr) / n)),
            (None, Some(tr)) => (prev.tr_sum + tr, None),
            (_, None) => (0.0, None),
        };

        let atrp = atr.and_then(|a| (quote.close != 0.0).then(|| a / quote.close * 100.0));
        let result = AtrResult {
            timestamp_ns: quote.timestamp_ns,
            tr,
            atr,
            atrp,
        };
        let state = AtrState {
            count,
            prev_close: quote.close,
            tr_sum,
            atr,
        };
        (result, state)
    }

    /// Append-only rendition of this ATR.
    #[must_use]
    pub fn buffer(&self) -> AtrBuffer {
        AtrBuffer {
            atr: *self,
            state: AtrState::default(),
        }
    }
}

impl SeriesIndicator for Atr {
    type Input = Quote;
    type Output = AtrResult;

    fn compute(&self, inputs: &[Quote]) -> Vec<AtrResult> {
        let mut state = AtrState::default();
        inputs
            .iter()
            .map(|q| {
                let (result, next) = self.step(&state, q);
                state = next;
                result
            })
            .collect()
    }

    fn warmup_periods(&self) -> usize {
        self.period
    }
}

impl Compute for Atr {
    type Input = Quote;
    type Output = AtrResult;
    type State = AtrState;

    fn name(&self) -> String {
        format!("ATR({})", self.period)
    }

    fn lookback(&self) -> usize {
        self.period + 1
    }

    fn compute_one(&self, prev: &AtrState, window: Window<'_, Quote, AtrResult>) -> (AtrResult, AtrState) {
        self.step(prev, window.item())
    }
}

/// Buffered ATR fed one quote at a time.
#[derive(Debug, Clone)]
pub struct AtrBuffer {
    atr: Atr,
    state: AtrState,
}

impl Accumulator for AtrBuffer {
    type Input = Quote;
    type Output = AtrResult;

    fn push(&mut self, input: &Quote) -> AtrResult {
        let (result, state) = self.atr.step(&self.state, input);
        self.state = state;
        result
    }

    fn reset(&mut self) {
        self.state = AtrState::default();
    }
}
