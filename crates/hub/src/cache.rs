//! Timestamp-ordered record cache.
//!
//! Every node of the graph stores its records in an [`OrderedCache`]. The
//! cache keeps timestamps strictly increasing, so lookups are binary searches
//! and positions in a derived hub line up with positions in its provider.

use crate::error::HubError;
use flux_types::Series;

/// Insertion-ordered container with strictly increasing timestamps.
#[derive(Debug, Clone)]
pub struct OrderedCache<T> {
    items: Vec<T>,
}

impl<T> Default for OrderedCache<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T: Series> OrderedCache<T> {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Cached records, oldest first.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Record at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Newest record.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    /// Appends a record newer than every cached one and returns its index.
    ///
    /// # Errors
    /// [`HubError::OutOfOrder`] when the timestamp does not advance.
    pub fn append(&mut self, item: T) -> Result<usize, HubError> {
        if let Some(last) = self.items.last()
            && item.timestamp() <= last.timestamp()
        {
            return Err(HubError::OutOfOrder {
                timestamp: item.timestamp(),
                last: last.timestamp(),
            });
        }
        self.items.push(item);
        Ok(self.items.len() - 1)
    }

    /// Binary search by timestamp.
    ///
    /// With `exact_required` the index of the matching record is returned.
    /// Otherwise the lowest index whose timestamp is `>= timestamp`, or
    /// `None` when every record is older.
    ///
    /// # Errors
    /// [`HubError::HistoryNotFound`] when `exact_required` and no record
    /// carries the timestamp.
    pub fn find_index(&self, timestamp: i64, exact_required: bool) -> Result<Option<usize>, HubError> {
        let index = self.items.partition_point(|item| item.timestamp() < timestamp);
        let exact = self
            .items
            .get(index)
            .is_some_and(|item| item.timestamp() == timestamp);

        match (exact, exact_required) {
            (true, _) => Ok(Some(index)),
            (false, true) => Err(HubError::HistoryNotFound { timestamp }),
            (false, false) if index < self.items.len() => Ok(Some(index)),
            (false, false) => Ok(None),
        }
    }

    /// Index of the record with exactly this timestamp.
    ///
    /// # Errors
    /// [`HubError::HistoryNotFound`] when absent.
    pub fn index_of(&self, timestamp: i64) -> Result<usize, HubError> {
        self.find_index(timestamp, true)?
            .ok_or(HubError::HistoryNotFound { timestamp })
    }

    /// Lowest index whose timestamp is `>= timestamp`.
    #[must_use]
    pub fn index_gte(&self, timestamp: i64) -> Option<usize> {
        let index = self.items.partition_point(|item| item.timestamp() < timestamp);
        (index < self.items.len()).then_some(index)
    }

    /// Resolves the index of `timestamp`, trying the producer's hint first.
    ///
    /// # Errors
    /// [`HubError::HistoryNotFound`] when neither the hint nor the binary
    /// search finds the record.
    pub fn resolve(&self, timestamp: i64, hint: Option<usize>) -> Result<usize, HubError> {
        if let Some(i) = hint
            && self.items.get(i).is_some_and(|item| item.timestamp() == timestamp)
        {
            return Ok(i);
        }
        self.index_of(timestamp)
    }

    /// Position of a record by identity: same timestamp and equal payload.
    ///
    /// Timestamps are unique, so at most one record can match.
    #[must_use]
    pub fn position_of(&self, item: &T) -> Option<usize>
    where
        T: PartialEq,
    {
        match self.find_index(item.timestamp(), true) {
            Ok(Some(i)) if self.items[i] == *item => Some(i),
            _ => None,
        }
    }

    /// Inserts a record at `index`, keeping timestamps strictly increasing.
    ///
    /// # Errors
    /// [`HubError::OutOfOrder`] when the record does not fit between its
    /// neighbours.
    pub fn insert_at(&mut self, index: usize, item: T) -> Result<(), HubError> {
        let timestamp = item.timestamp();
        if index > self.items.len() {
            return Err(HubError::HistoryNotFound { timestamp });
        }
        if index > 0 && self.items[index - 1].timestamp() >= timestamp {
            return Err(HubError::OutOfOrder {
                timestamp,
                last: self.items[index - 1].timestamp(),
            });
        }
        if let Some(next) = self.items.get(index)
            && next.timestamp() <= timestamp
        {
            return Err(HubError::OutOfOrder {
                timestamp,
                last: next.timestamp(),
            });
        }
        self.items.insert(index, item);
        Ok(())
    }

    /// Replaces the record at `index` with one carrying the same timestamp
    /// and returns the previous record.
    ///
    /// # Errors
    /// [`HubError::HistoryNotFound`] when `index` is out of range or holds a
    /// different timestamp.
    pub fn replace_at(&mut self, index: usize, item: T) -> Result<T, HubError> {
        let timestamp = item.timestamp();
        match self.items.get_mut(index) {
            Some(slot) if slot.timestamp() == timestamp => Ok(std::mem::replace(slot, item)),
            _ => Err(HubError::HistoryNotFound { timestamp }),
        }
    }

    /// Removes and returns the record at `index`.
    pub fn remove_at(&mut self, index: usize) -> Option<T> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    /// Evicts the oldest records until at most `max_size` remain.
    ///
    /// Returns the timestamp of the newest evicted record, if any.
    pub fn prune(&mut self, max_size: usize) -> Option<i64> {
        let through = self.prune_point(max_size)?;
        self.prune_through(through);
        Some(through)
    }

    /// Timestamp of the newest record [`OrderedCache::prune`] would evict,
    /// without evicting anything.
    #[must_use]
    pub fn prune_point(&self, max_size: usize) -> Option<i64> {
        let excess = self.items.len().checked_sub(max_size).filter(|&n| n > 0)?;
        Some(self.items[excess - 1].timestamp())
    }

    /// Evicts every record with a timestamp `<= through`; returns the count.
    pub fn prune_through(&mut self, through: i64) -> usize {
        let count = self.items.partition_point(|item| item.timestamp() <= through);
        self.items.drain(..count);
        count
    }

    /// Drops every record from `index` onward.
    pub fn truncate_from(&mut self, index: usize) {
        self.items.truncate(index);
    }

    /// Removes every record.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterates oldest first.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }
}

impl<'a, T> IntoIterator for &'a OrderedCache<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
