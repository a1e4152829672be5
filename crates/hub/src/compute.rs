//! Plug-in formula contract for derived hubs.

use flux_types::Series;

/// Read-only view handed to [`Compute::compute_one`].
///
/// The hub has already resolved the position of the driving record, so the
/// formula only sees history up to and including that position.
#[derive(Debug)]
pub struct Window<'a, I, O> {
    inputs: &'a [I],
    outputs: &'a [O],
}

impl<'a, I, O> Window<'a, I, O> {
    /// `inputs` must end with the driving record; `outputs` holds the hub's
    /// own results for every earlier position.
    ///
    /// # Panics
    /// Panics if `inputs` is empty or the two slices are misaligned.
    #[must_use]
    pub fn new(inputs: &'a [I], outputs: &'a [O]) -> Self {
        assert!(
            !inputs.is_empty() && outputs.len() + 1 == inputs.len(),
            "window needs one more input than outputs"
        );
        Self { inputs, outputs }
    }

    /// Position of the driving record.
    #[must_use]
    pub fn index(&self) -> usize {
        self.inputs.len() - 1
    }

    /// The driving record.
    #[must_use]
    pub fn item(&self) -> &'a I {
        &self.inputs[self.inputs.len() - 1]
    }

    /// Provider records `..=index`.
    #[must_use]
    pub fn inputs(&self) -> &'a [I] {
        self.inputs
    }

    /// Own results `..index`.
    #[must_use]
    pub fn outputs(&self) -> &'a [O] {
        self.outputs
    }

    /// The last `n` provider records ending at the driving one, or `None`
    /// while fewer than `n` are available.
    #[must_use]
    pub fn trailing(&self, n: usize) -> Option<&'a [I]> {
        (n > 0 && n <= self.inputs.len()).then(|| &self.inputs[self.inputs.len() - n..])
    }
}

/// Formula computing one result per provider record.
///
/// `compute_one` must be pure over the window and `prev`: the hub calls it
/// again for the same position whenever history changes and relies on it
/// producing the same `(result, state)` for the same arguments.
pub trait Compute: Send + 'static {
    /// Provider record type.
    type Input: Series + Clone + Send + 'static;
    /// Result record type; its timestamp must equal the driving input's.
    type Output: Series + Clone + PartialEq + Send + 'static;
    /// Recurrence state carried from one position to the next.
    /// Stateless formulas use `()`.
    type State: Clone + PartialEq + Default + Send + 'static;

    /// Display name, e.g. `SMA(20)`.
    fn name(&self) -> String;

    /// Number of trailing positions (inputs and own outputs) the formula
    /// reads, the driving one included. At least 1.
    fn lookback(&self) -> usize;

    /// Computes the result at `window.index()` given the state after the
    /// previous position.
    fn compute_one(
        &self,
        prev: &Self::State,
        window: Window<'_, Self::Input, Self::Output>,
    ) -> (Self::Output, Self::State);
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_types::Value;

    #[test]
    fn test_window_accessors() {
        let inputs = [Value::new(1, Some(1.0)), Value::new(2, Some(2.0)), Value::new(3, Some(3.0))];
        let outputs = [Value::new(1, None), Value::new(2, None)];
        let window = Window::new(&inputs, &outputs);

        assert_eq!(window.index(), 2);
        assert_eq!(window.item().timestamp_ns, 3);
        assert_eq!(window.outputs().len(), 2);
        assert_eq!(window.trailing(2).map(<[Value]>::len), Some(2));
        assert!(window.trailing(4).is_none());
        assert!(window.trailing(0).is_none());
    }

    #[test]
    #[should_panic(expected = "window needs one more input")]
    fn test_window_rejects_misaligned() {
        let inputs = [Value::new(1, Some(1.0))];
        let outputs = [Value::new(1, None)];
        let _ = Window::new(&inputs, &outputs);
    }
}
