//! Append-only buffered accumulators.
//!
//! For the single-node case: no chaining, no late arrivals, no rollback.
//! Each accumulator keeps fixed-size rolling windows and produces one result
//! per appended input in O(1) amortized time.

use flux_types::Series;
use tracing::debug;

use crate::error::HubError;

/// Fixed-capacity ring buffer for rolling-window computations.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buf: Vec<f64>,
    pos: usize,
    len: usize,
    sum: f64,
}

impl RingBuffer {
    /// Creates an empty buffer.
    ///
    /// # Errors
    /// [`HubError::InvalidParameter`] when `capacity` is zero.
    pub fn new(capacity: usize) -> Result<Self, HubError> {
        if capacity == 0 {
            return Err(HubError::invalid_parameter(
                "capacity",
                capacity,
                "must be greater than 0",
            ));
        }
        Ok(Self {
            buf: vec![0.0; capacity],
            pos: 0,
            len: 0,
            sum: 0.0,
        })
    }

    /// Appends a value and returns the one it evicted, if the buffer was full.
    pub fn push(&mut self, val: f64) -> Option<f64> {
        let cap = self.buf.len();
        let evicted = self.full().then(|| self.buf[self.pos]);
        self.buf[self.pos] = val;
        self.pos = (self.pos + 1) % cap;
        if self.len < cap {
            self.len += 1;
        }
        self.sum += val - evicted.unwrap_or(0.0);
        evicted
    }

    /// Returns true once the buffer holds `capacity` values.
    pub fn full(&self) -> bool {
        self.len == self.buf.len()
    }

    /// Number of values held.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true when no value is held.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops every value and resets the running sum.
    pub fn clear(&mut self) {
        self.pos = 0;
        self.len = 0;
        self.sum = 0.0;
    }

    /// Iterate over values in insertion order (oldest first).
    pub fn iter(&self) -> RingBufferIter<'_> {
        RingBufferIter {
            buf: &self.buf,
            start: if self.full() { self.pos } else { 0 },
            count: 0,
            total: self.len,
        }
    }

    /// Running sum, kept incrementally.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Mean of the held values, recomputed exactly from the window in
    /// O(len). [`RingBuffer::sum`] is the O(1) alternative.
    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        self.iter().sum::<f64>() / self.len as f64
    }

    /// Population standard deviation (ddof=0).
    pub fn std_pop(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        let mean = self.mean();
        let var = self.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / self.len as f64;
        var.sqrt()
    }
}

/// Iterator over a [`RingBuffer`], oldest first.
#[derive(Debug, Clone)]
pub struct RingBufferIter<'a> {
    buf: &'a [f64],
    start: usize,
    count: usize,
    total: usize,
}

impl Iterator for RingBufferIter<'_> {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.count >= self.total {
            return None;
        }
        let idx = (self.start + self.count) % self.buf.len();
        self.count += 1;
        Some(self.buf[idx])
    }
}

/// Incremental formula fed one input at a time.
pub trait Accumulator {
    /// Input record type.
    type Input: Series;
    /// Result record type.
    type Output: Series;

    /// Consumes the next input and returns its result.
    fn push(&mut self, input: &Self::Input) -> Self::Output;

    /// Forgets every input seen so far.
    fn reset(&mut self);
}

/// Results of an [`Accumulator`] kept as a growing, optionally bounded list.
pub struct BufferList<A: Accumulator> {
    accumulator: A,
    results: Vec<A::Output>,
    max_list_size: Option<usize>,
    last_timestamp: Option<i64>,
}

impl<A: Accumulator> std::fmt::Debug for BufferList<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferList")
            .field("len", &self.results.len())
            .field("max_list_size", &self.max_list_size)
            .field("last_timestamp", &self.last_timestamp)
            .finish_non_exhaustive()
    }
}

impl<A: Accumulator> BufferList<A> {
    /// Unbounded list.
    pub fn new(accumulator: A) -> Self {
        Self {
            accumulator,
            results: Vec::new(),
            max_list_size: None,
            last_timestamp: None,
        }
    }

    /// List keeping at most `max_list_size` of the newest results.
    ///
    /// # Errors
    /// [`HubError::InvalidParameter`] when `max_list_size` is zero.
    pub fn with_max_list_size(accumulator: A, max_list_size: usize) -> Result<Self, HubError> {
        if max_list_size == 0 {
            return Err(HubError::invalid_parameter(
                "max_list_size",
                max_list_size,
                "must be greater than 0",
            ));
        }
        Ok(Self {
            max_list_size: Some(max_list_size),
            ..Self::new(accumulator)
        })
    }

    /// Appends one input and returns its result.
    ///
    /// # Errors
    /// [`HubError::OutOfOrder`] when the timestamp does not advance.
    pub fn add(&mut self, input: &A::Input) -> Result<&A::Output, HubError> {
        let timestamp = input.timestamp();
        if let Some(last) = self.last_timestamp
            && timestamp <= last
        {
            return Err(HubError::OutOfOrder { timestamp, last });
        }
        self.last_timestamp = Some(timestamp);

        let result = self.accumulator.push(input);
        self.results.push(result);

        if let Some(max) = self.max_list_size
            && self.results.len() > max
        {
            let excess = self.results.len() - max;
            self.results.drain(..excess);
            debug!(count = excess, "pruned buffer list");
        }

        self.results
            .last()
            .ok_or(HubError::HistoryNotFound { timestamp })
    }

    /// Appends inputs in order.
    ///
    /// # Errors
    /// Stops at the first out-of-order input.
    pub fn add_batch<'a>(&mut self, inputs: impl IntoIterator<Item = &'a A::Input>) -> Result<(), HubError>
    where
        A::Input: 'a,
    {
        for input in inputs {
            self.add(input)?;
        }
        Ok(())
    }

    /// Results, oldest first.
    pub fn results(&self) -> &[A::Output] {
        &self.results
    }

    /// Number of results kept.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true when no result is kept.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Drops every result and resets the accumulator.
    pub fn clear(&mut self) {
        self.results.clear();
        self.last_timestamp = None;
        self.accumulator.reset();
    }
}
