//! Batch indicator trait and shared parameter checks.

use flux_hub::HubError;
use flux_types::{Series, Value};

/// One-shot computation over a complete series.
///
/// Returns one result per input, in input order. Results before the
/// warm-up completes carry `None` fields.
pub trait SeriesIndicator {
    /// Input record type.
    type Input: Series;
    /// Result record type.
    type Output: Series;

    /// Computes the indicator for every input.
    fn compute(&self, inputs: &[Self::Input]) -> Vec<Self::Output>;

    /// Number of leading results without a value on an unbroken input.
    fn warmup_periods(&self) -> usize;
}

/// Rejects a zero period.
///
/// # Errors
/// [`HubError::InvalidParameter`] when `period` is 0.
pub fn check_period(period: usize) -> Result<usize, HubError> {
    if period == 0 {
        return Err(HubError::invalid_parameter(
            "period",
            period,
            "must be greater than 0",
        ));
    }
    Ok(period)
}

/// Rejects non-finite and non-positive values.
///
/// # Errors
/// [`HubError::InvalidParameter`] naming `param`.
pub fn check_positive(param: &str, value: f64) -> Result<f64, HubError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(HubError::invalid_parameter(
            param,
            value,
            "must be finite and greater than 0",
        ));
    }
    Ok(value)
}

/// Mean of a full window, `None` if any value is missing.
pub(crate) fn window_mean(window: &[Value]) -> Option<f64> {
    let sum = window.iter().map(|v| v.value).sum::<Option<f64>>()?;
    Some(sum / window.len() as f64)
}
