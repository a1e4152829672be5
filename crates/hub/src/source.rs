//! Root node of a hub graph.

use std::any::Any;

use flux_types::{HubConfig, Quote, RollbackStrategy, Series, Value};
use tracing::{debug, warn};

use crate::cache::OrderedCache;
use crate::error::HubError;
use crate::graph::Node;
use crate::observer::{Act, Signal};

/// Consecutive identical arrivals tolerated before a source faults.
pub const OVERFLOW_THRESHOLD: u32 = 100;

/// A record a source accepts as raw input.
pub trait SourceRecord: Series + Clone + PartialEq + Send + 'static {
    /// Rejects malformed input before the cache is touched.
    ///
    /// # Errors
    /// [`HubError::InvalidInput`] describing the rejected field.
    fn validate(&self) -> Result<(), HubError> {
        Ok(())
    }
}

impl SourceRecord for Quote {
    fn validate(&self) -> Result<(), HubError> {
        Quote::validate(self).map_err(HubError::from)
    }
}

impl SourceRecord for Value {
    fn validate(&self) -> Result<(), HubError> {
        match self.value {
            Some(v) if v.is_finite() => Ok(()),
            Some(v) => Err(HubError::InvalidInput(format!(
                "non-finite value at {}: {v}",
                self.timestamp_ns
            ))),
            None => Err(HubError::InvalidInput(format!(
                "missing value at {}",
                self.timestamp_ns
            ))),
        }
    }
}

/// Accepts raw records, stores them in timestamp order and reports each
/// change to subscribers.
#[derive(Debug)]
pub struct SourceNode<T> {
    name: String,
    cache: OrderedCache<T>,
    max_cache_size: usize,
    rollback: RollbackStrategy,
    last_arrival: Option<T>,
    overflow_count: u32,
    faulted: bool,
    /// Timestamp of the newest evicted record.
    evicted_through: Option<i64>,
}

impl<T: SourceRecord> SourceNode<T> {
    pub(crate) fn new(name: impl Into<String>, config: &HubConfig) -> Self {
        Self {
            name: name.into(),
            cache: OrderedCache::new(),
            max_cache_size: config.max_cache_size,
            rollback: config.rollback,
            last_arrival: None,
            overflow_count: 0,
            faulted: false,
            evicted_through: None,
        }
    }

    /// Cached input records.
    #[must_use]
    pub fn cache(&self) -> &OrderedCache<T> {
        &self.cache
    }

    fn ensure_healthy(&self) -> Result<(), HubError> {
        if self.faulted {
            return Err(HubError::Faulted {
                node: self.name.clone(),
            });
        }
        Ok(())
    }

    fn track_arrival(&mut self, item: &T) -> Result<(), HubError> {
        if self.last_arrival.as_ref() == Some(item) {
            self.overflow_count += 1;
        } else {
            self.overflow_count = 1;
            self.last_arrival = Some(item.clone());
        }

        if self.overflow_count > OVERFLOW_THRESHOLD {
            self.faulted = true;
            warn!(
                node = %self.name,
                timestamp = item.timestamp(),
                count = self.overflow_count,
                "source faulted on repeated arrivals"
            );
            return Err(HubError::Overflow {
                node: self.name.clone(),
                attempts: self.overflow_count,
            });
        }

        if self.overflow_count == OVERFLOW_THRESHOLD / 2 {
            warn!(
                node = %self.name,
                timestamp = item.timestamp(),
                count = self.overflow_count,
                "repeated arrivals approaching overflow threshold"
            );
        }
        Ok(())
    }

    /// Accepts one record.
    ///
    /// | arrival | effect |
    /// |---------|--------|
    /// | newer than every cached record | append, `AddNew` |
    /// | cached timestamp, identical record | suppressed |
    /// | cached timestamp, different values | replace, `Update` |
    /// | older, timestamp not cached | insert in order, `Update` |
    /// | at or before an evicted record | rejected |
    ///
    /// The cache may exceed its bound until [`SourceNode::evict`] runs.
    pub(crate) fn add(&mut self, item: T, out: &mut Vec<Signal>) -> Result<(), HubError> {
        self.ensure_healthy()?;
        item.validate()?;

        let timestamp = item.timestamp();
        if self.evicted_through.is_some_and(|through| timestamp <= through) {
            debug!(node = %self.name, timestamp, "arrival predates evicted history");
            return Err(HubError::HistoryNotFound { timestamp });
        }
        self.track_arrival(&item)?;

        match self.cache.find_index(timestamp, false)? {
            None => {
                self.cache.append(item)?;
                out.push(Signal::next(Act::AddNew, timestamp, self.cache.len() - 1));
            }
            Some(index) if self.cache.as_slice()[index].timestamp() == timestamp => {
                if self.cache.as_slice()[index] == item {
                    return Ok(());
                }
                self.cache.replace_at(index, item)?;
                out.push(Signal::next(Act::Update, timestamp, index));
            }
            Some(index) => {
                self.cache.insert_at(index, item)?;
                debug!(node = %self.name, timestamp, index, "late arrival inserted");
                out.push(Signal::next(Act::Update, timestamp, index));
            }
        }
        Ok(())
    }

    /// Newest record that [`SourceNode::evict`] would drop.
    pub(crate) fn prune_point(&self) -> Option<i64> {
        self.cache.prune_point(self.max_cache_size)
    }

    /// Evicts the oldest records beyond the cache bound and returns the
    /// timestamp of the newest one evicted.
    pub(crate) fn evict(&mut self) -> Option<i64> {
        let through = self.cache.prune(self.max_cache_size)?;
        self.evicted_through = Some(through);
        debug!(node = %self.name, through, "pruned source cache");
        Some(through)
    }

    /// Removes the record with this timestamp.
    pub(crate) fn remove(&mut self, timestamp: i64, out: &mut Vec<Signal>) -> Result<(), HubError> {
        self.ensure_healthy()?;
        let index = self.cache.index_of(timestamp)?;
        self.cache.remove_at(index);
        out.push(Signal::next(Act::Delete, timestamp, index));
        Ok(())
    }

    /// Removes every record with timestamp `>= from`, newest first, so no
    /// subscriber has to recompute anything.
    pub(crate) fn remove_range(&mut self, from: i64, out: &mut Vec<Signal>) -> Result<(), HubError> {
        self.ensure_healthy()?;
        let Some(start) = self.cache.index_gte(from) else {
            return Ok(());
        };
        for index in (start..self.cache.len()).rev() {
            if let Some(removed) = self.cache.remove_at(index) {
                out.push(Signal::next(Act::Delete, removed.timestamp(), index));
            }
        }
        Ok(())
    }

    /// Drops every cached record; subscribers rebuild to empty.
    pub(crate) fn clear(&mut self, out: &mut Vec<Signal>) -> Result<(), HubError> {
        self.ensure_healthy()?;
        self.cache.clear();
        self.evicted_through = None;
        self.last_arrival = None;
        self.overflow_count = 0;
        out.push(Signal::Rebuild { from: i64::MIN });
        Ok(())
    }
}

impl<T: SourceRecord> Node for SourceNode<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_cache_size(&self) -> usize {
        self.max_cache_size
    }

    fn rollback(&self) -> RollbackStrategy {
        self.rollback
    }

    fn cache_any(&self) -> &dyn Any {
        &self.cache
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn on_signal(&mut self, _upstream: &dyn Any, _signal: Signal, _out: &mut Vec<Signal>) -> Result<(), HubError> {
        Err(HubError::NotSubscribed {
            node: self.name.clone(),
        })
    }

    fn rebuild_from(&mut self, _upstream: Option<&dyn Any>, from: i64) -> Result<(), HubError> {
        debug!(node = %self.name, from, "source keeps its cache on rebuild");
        Ok(())
    }

    fn is_faulted(&self) -> bool {
        self.faulted
    }

    fn overflow_count(&self) -> u32 {
        self.overflow_count
    }

    fn reset_fault(&mut self) {
        self.overflow_count = 0;
        self.faulted = false;
        self.last_arrival = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(ts: i64, close: f64) -> Quote {
        Quote::new(ts, close, close + 1.0, close - 1.0, close, 100.0)
    }

    fn acts(out: &[Signal]) -> Vec<(Act, i64)> {
        out.iter()
            .filter_map(|s| match s {
                Signal::Next(n) => Some((n.act, n.timestamp)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_add_append_update_and_late_insert() {
        let mut source = SourceNode::new("QUOTES", &HubConfig::with_max_cache_size(1000));
        let mut out = Vec::new();

        source.add(quote(10, 1.0), &mut out).unwrap();
        source.add(quote(30, 3.0), &mut out).unwrap();
        source.add(quote(30, 3.5), &mut out).unwrap();
        source.add(quote(20, 2.0), &mut out).unwrap();

        assert_eq!(
            acts(&out),
            vec![(Act::AddNew, 10), (Act::AddNew, 30), (Act::Update, 30), (Act::Update, 20)]
        );
        let closes: Vec<f64> = source.cache().iter().map(|q| q.close).collect();
        assert_eq!(closes, vec![1.0, 2.0, 3.5]);
    }

    #[test]
    fn test_identical_arrival_is_suppressed() {
        let mut source = SourceNode::new("QUOTES", &HubConfig::with_max_cache_size(1000));
        let mut out = Vec::new();
        source.add(quote(10, 1.0), &mut out).unwrap();
        source.add(quote(10, 1.0), &mut out).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(source.overflow_count(), 2);
    }

    #[test]
    fn test_overflow_threshold_and_reset() {
        let mut source = SourceNode::new("QUOTES", &HubConfig::with_max_cache_size(1000));
        let mut out = Vec::new();
        for _ in 0..OVERFLOW_THRESHOLD {
            source.add(quote(10, 1.0), &mut out).unwrap();
        }
        assert!(!source.is_faulted());

        let err = source.add(quote(10, 1.0), &mut out).unwrap_err();
        assert!(matches!(err, HubError::Overflow { attempts: 101, .. }));
        assert!(source.is_faulted());

        let err = source.add(quote(20, 2.0), &mut out).unwrap_err();
        assert!(matches!(err, HubError::Faulted { .. }));

        source.reset_fault();
        assert!(!source.is_faulted());
        assert_eq!(source.overflow_count(), 0);
        source.add(quote(20, 2.0), &mut out).unwrap();
        assert_eq!(source.cache().len(), 2);
    }

    #[test]
    fn test_invalid_input_leaves_cache_untouched() {
        let mut source = SourceNode::new("QUOTES", &HubConfig::with_max_cache_size(1000));
        let mut out = Vec::new();
        let err = source.add(quote(10, f64::NAN), &mut out).unwrap_err();
        assert!(matches!(err, HubError::InvalidInput(_)));
        assert!(source.cache().is_empty());
        assert!(out.is_empty());

        let mut values = SourceNode::<Value>::new("VALUES", &HubConfig::default());
        assert!(values.add(Value::new(1, None), &mut out).is_err());
    }

    #[test]
    fn test_evict_enforces_bound() {
        let mut source = SourceNode::new("QUOTES", &HubConfig::with_max_cache_size(2));
        let mut out = Vec::new();
        for ts in [1, 3, 5] {
            source.add(quote(ts, ts as f64), &mut out).unwrap();
        }
        assert_eq!(source.cache().len(), 3);
        assert_eq!(source.prune_point(), Some(1));
        assert_eq!(source.evict(), Some(1));
        assert_eq!(source.cache().len(), 2);
        assert_eq!(source.evict(), None);

        // a late insert grows the cache past the bound again
        source.add(quote(4, 4.0), &mut out).unwrap();
        assert_eq!(source.evict(), Some(3));
        let kept: Vec<i64> = source.cache().iter().map(|q| q.timestamp_ns).collect();
        assert_eq!(kept, vec![4, 5]);
    }

    #[test]
    fn test_arrival_before_evicted_history_is_rejected() {
        let mut source = SourceNode::new("QUOTES", &HubConfig::with_max_cache_size(2));
        let mut out = Vec::new();
        for ts in [1, 3, 5] {
            source.add(quote(ts, ts as f64), &mut out).unwrap();
        }
        source.evict();
        out.clear();

        for ts in [0, 1] {
            let err = source.add(quote(ts, 9.0), &mut out).unwrap_err();
            assert!(matches!(err, HubError::HistoryNotFound { timestamp } if timestamp == ts));
        }
        assert!(out.is_empty());
        assert_eq!(source.overflow_count(), 1);

        // newer than the evicted record: still a late insert
        source.add(quote(2, 2.0), &mut out).unwrap();
        assert_eq!(acts(&out), vec![(Act::Update, 2)]);

        source.clear(&mut out).unwrap();
        source.add(quote(0, 1.0), &mut out).unwrap();
        assert_eq!(source.cache().len(), 1);
    }

    #[test]
    fn test_remove_range_is_newest_first() {
        let mut source = SourceNode::new("QUOTES", &HubConfig::with_max_cache_size(100));
        let mut out = Vec::new();
        for ts in 1..=5 {
            source.add(quote(ts, ts as f64), &mut out).unwrap();
        }
        out.clear();
        source.remove_range(3, &mut out).unwrap();
        assert_eq!(acts(&out), vec![(Act::Delete, 5), (Act::Delete, 4), (Act::Delete, 3)]);
        assert_eq!(source.cache().len(), 2);

        assert!(matches!(
            source.remove(9, &mut out),
            Err(HubError::HistoryNotFound { timestamp: 9 })
        ));
    }
}
