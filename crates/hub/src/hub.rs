//! Derived hub and its rollback engine.
//!
//! A derived hub keeps one result per provider record, aligned position for
//! position with the provider's cache. Appends are computed once; every other
//! change rolls the recurrence state back to the affected position and
//! recomputes forward until results stop changing.

use std::any::Any;

use flux_types::{RollbackStrategy, Series};
use tracing::{debug, info};

use crate::cache::OrderedCache;
use crate::compute::{Compute, Window};
use crate::error::HubError;
use crate::graph::Node;
use crate::observer::{Act, Notification, Signal};

/// Hub computing `C` over the records of exactly one provider.
pub struct DerivedHub<C: Compute> {
    name: String,
    compute: C,
    cache: OrderedCache<C::Output>,
    strategy: RollbackStrategy,
    max_cache_size: usize,
    /// `CachedState`: state after each cached position.
    states: Vec<C::State>,
    /// State after the newest evicted position.
    anchor: C::State,
    /// `FullReplay`: state after the newest cached position.
    latest: C::State,
}

impl<C: Compute> std::fmt::Debug for DerivedHub<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedHub")
            .field("name", &self.name)
            .field("len", &self.cache.len())
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl<C: Compute> DerivedHub<C> {
    pub(crate) fn new(compute: C, strategy: RollbackStrategy, max_cache_size: usize) -> Self {
        Self {
            name: compute.name(),
            compute,
            cache: OrderedCache::new(),
            strategy,
            max_cache_size,
            states: Vec::new(),
            anchor: C::State::default(),
            latest: C::State::default(),
        }
    }

    /// Cached results.
    #[must_use]
    pub fn cache(&self) -> &OrderedCache<C::Output> {
        &self.cache
    }

    /// Rollback strategy in use.
    #[must_use]
    pub fn strategy(&self) -> RollbackStrategy {
        self.strategy
    }

    fn cached_state(&self) -> bool {
        self.strategy == RollbackStrategy::CachedState
    }

    fn downcast<'a>(&self, upstream: &'a dyn Any) -> Result<&'a OrderedCache<C::Input>, HubError> {
        upstream
            .downcast_ref::<OrderedCache<C::Input>>()
            .ok_or_else(|| HubError::TypeMismatch {
                node: self.name.clone(),
            })
    }

    fn compute_at(&self, inputs: &[C::Input], index: usize, prev: &C::State) -> (C::Output, C::State) {
        let window = Window::new(&inputs[..=index], &self.cache.as_slice()[..index]);
        self.compute.compute_one(prev, window)
    }

    /// State after position `index - 1`, i.e. the state `index` starts from.
    fn state_before(&self, inputs: &[C::Input], index: usize) -> C::State {
        if self.cached_state() {
            return match index {
                0 => self.anchor.clone(),
                i => self.states[i - 1].clone(),
            };
        }

        let mut state = self.anchor.clone();
        for j in 0..index {
            state = self.compute_at(inputs, j, &state).1;
        }
        state
    }

    fn check_aligned(&self, inputs: &[C::Input]) -> Result<(), HubError> {
        if let Some(extra) = self.cache.get(inputs.len()) {
            return Err(HubError::HistoryNotFound {
                timestamp: extra.timestamp(),
            });
        }
        Ok(())
    }

    fn on_add(
        &mut self,
        upstream: &OrderedCache<C::Input>,
        note: Notification,
        out: &mut Vec<Signal>,
    ) -> Result<(), HubError> {
        let index = upstream.resolve(note.timestamp, note.index)?;
        if index != self.cache.len() {
            return self.on_update(upstream, note, out);
        }

        let prev = if self.cached_state() {
            self.states.last().unwrap_or(&self.anchor).clone()
        } else {
            self.latest.clone()
        };
        let (result, state) = self.compute_at(upstream.as_slice(), index, &prev);
        self.cache.append(result)?;
        if self.cached_state() {
            self.states.push(state);
        } else {
            self.latest = state;
        }
        out.push(Signal::next(Act::AddNew, note.timestamp, index));
        Ok(())
    }

    fn on_update(
        &mut self,
        upstream: &OrderedCache<C::Input>,
        note: Notification,
        out: &mut Vec<Signal>,
    ) -> Result<(), HubError> {
        let timestamp = note.timestamp;
        let index = upstream.resolve(timestamp, note.index)?;
        let inputs = upstream.as_slice();

        let own = self.cache.find_index(timestamp, false)?;
        let exists = own.is_some_and(|k| self.cache.as_slice()[k].timestamp() == timestamp);
        let position = own.unwrap_or(self.cache.len());
        if position != index {
            return Err(HubError::HistoryNotFound { timestamp });
        }

        if exists {
            let state = self.state_before(inputs, index);
            return self.recompute(inputs, index, index, state, out);
        }

        // late arrival: the provider inserted a record this hub has never seen
        let prev = self.state_before(inputs, index);
        let (result, state) = self.compute_at(inputs, index, &prev);
        self.cache.insert_at(index, result)?;
        if self.cached_state() {
            self.states.insert(index, state.clone());
        }
        out.push(Signal::next(Act::Update, timestamp, index));
        self.recompute(inputs, index + 1, index, state, out)
    }

    fn on_delete(
        &mut self,
        upstream: &OrderedCache<C::Input>,
        note: Notification,
        out: &mut Vec<Signal>,
    ) -> Result<(), HubError> {
        let index = self.cache.index_of(note.timestamp)?;
        self.cache.remove_at(index);
        if self.cached_state() && index < self.states.len() {
            self.states.remove(index);
        }
        out.push(Signal::next(Act::Delete, note.timestamp, index));

        let inputs = upstream.as_slice();
        if index == self.cache.len() {
            // newest record removed: nothing follows it. While a range removal
            // is still in flight the provider is already shorter than this hub.
            if !self.cached_state() && index <= inputs.len() {
                self.latest = self.state_before(inputs, index);
            }
            return Ok(());
        }
        self.check_aligned(inputs)?;
        let state = self.state_before(inputs, index);
        self.recompute(inputs, index, index, state, out)
    }

    /// Recomputes positions `from..` starting from `state`, after a change at
    /// `origin`. Emits `Update` for every position whose result changed.
    ///
    /// `CachedState` stops once it is past every window containing `origin`
    /// and `lookback` consecutive positions reproduced both their stored
    /// result and state. `FullReplay` has no stored states and always runs to
    /// the end of the cache.
    fn recompute(
        &mut self,
        inputs: &[C::Input],
        from: usize,
        origin: usize,
        mut state: C::State,
        out: &mut Vec<Signal>,
    ) -> Result<(), HubError> {
        self.check_aligned(inputs)?;
        let cached = self.cached_state();
        let lookback = self.compute.lookback().max(1);
        let end = self.cache.len();

        let mut unchanged = 0usize;
        let mut visited = 0usize;
        let mut changed = 0usize;
        for j in from..end {
            let (result, next) = self.compute_at(inputs, j, &state);
            visited += 1;

            let same_result = self.cache.as_slice()[j] == result;
            let same_state = !cached || self.states[j] == next;

            if !same_result {
                let timestamp = result.timestamp();
                self.cache.replace_at(j, result)?;
                out.push(Signal::next(Act::Update, timestamp, j));
                changed += 1;
            }
            if !same_state {
                self.states[j] = next.clone();
            }
            state = next;

            unchanged = if same_result && same_state { unchanged + 1 } else { 0 };
            if cached && j + 1 >= origin + lookback && unchanged >= lookback {
                break;
            }
        }

        if !cached {
            self.latest = state;
        }
        debug!(node = %self.name, origin, visited, changed, "rollback recomputed");
        Ok(())
    }

    fn prune_through(&mut self, through: i64) {
        let removed = self.cache.prune_through(through);
        if removed == 0 {
            return;
        }
        if self.cached_state() {
            let removed = removed.min(self.states.len());
            if let Some(anchor) = self.states.drain(..removed).last() {
                self.anchor = anchor;
            }
        }
        debug!(node = %self.name, through, count = removed, "pruned hub cache");
    }
}

impl<C: Compute> Node for DerivedHub<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_cache_size(&self) -> usize {
        self.max_cache_size
    }

    fn rollback(&self) -> RollbackStrategy {
        self.strategy
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

    fn on_signal(&mut self, upstream: &dyn Any, signal: Signal, out: &mut Vec<Signal>) -> Result<(), HubError> {
        match signal {
            Signal::Next(note) => {
                let upstream = self.downcast(upstream)?;
                match note.act {
                    Act::AddNew => self.on_add(upstream, note, out),
                    Act::Update => self.on_update(upstream, note, out),
                    Act::Delete => self.on_delete(upstream, note, out),
                }
            }
            Signal::Prune { through } => {
                self.prune_through(through);
                out.push(Signal::Prune { through });
                Ok(())
            }
            Signal::Rebuild { from } => {
                self.rebuild_from(Some(upstream), from)?;
                out.push(Signal::Rebuild { from });
                Ok(())
            }
        }
    }

    fn advance_anchor(&mut self, upstream: &dyn Any, through: i64) -> Result<(), HubError> {
        if self.cached_state() {
            // the stored states already hold it
            return Ok(());
        }
        let inputs = self.downcast(upstream)?.as_slice();
        let count = self.cache.as_slice().partition_point(|r| r.timestamp() <= through);
        if count > inputs.len() {
            return Err(HubError::HistoryNotFound { timestamp: through });
        }

        let mut state = self.anchor.clone();
        for j in 0..count {
            state = self.compute_at(inputs, j, &state).1;
        }
        self.anchor = state;
        Ok(())
    }

    fn rebuild_from(&mut self, upstream: Option<&dyn Any>, from: i64) -> Result<(), HubError> {
        let upstream = upstream.ok_or_else(|| HubError::NotSubscribed {
            node: self.name.clone(),
        })?;
        let upstream = self.downcast(upstream)?;
        let inputs = upstream.as_slice();

        let mut own_start = self.cache.index_gte(from).unwrap_or(self.cache.len());
        let mut start = upstream.index_gte(from).unwrap_or(inputs.len());
        if own_start != start || own_start > inputs.len() {
            // history diverged while detached; start over
            own_start = 0;
            start = 0;
        }

        // the anchor stays valid only while both caches start at the same record
        let same_head = self.cache.get(0).map(Series::timestamp) == upstream.get(0).map(Series::timestamp);
        self.cache.truncate_from(own_start);
        self.states.truncate(own_start);
        if own_start == 0 && !same_head {
            self.anchor = C::State::default();
        }

        let mut state = self.state_before(inputs, start);
        for j in start..inputs.len() {
            let (result, next) = self.compute_at(inputs, j, &state);
            self.cache.append(result)?;
            if self.cached_state() {
                self.states.push(next.clone());
            }
            state = next;
        }
        if !self.cached_state() {
            self.latest = state;
        }

        info!(node = %self.name, from, count = inputs.len() - start, "hub rebuilt");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flux_types::Value;

    /// Running sum of the last two inputs plus a cumulative count in state.
    struct PairSum;

    impl Compute for PairSum {
        type Input = Value;
        type Output = Value;
        type State = u64;

        fn name(&self) -> String {
            "PAIRSUM".to_string()
        }

        fn lookback(&self) -> usize {
            2
        }

        fn compute_one(&self, prev: &u64, window: Window<'_, Value, Value>) -> (Value, u64) {
            let value = window
                .trailing(2)
                .map(|pair| pair.iter().filter_map(|v| v.value).sum::<f64>());
            (Value::new(window.item().timestamp_ns, value), prev + 1)
        }
    }

    fn provider(values: &[(i64, f64)]) -> OrderedCache<Value> {
        let mut cache = OrderedCache::new();
        for &(ts, v) in values {
            cache.append(Value::new(ts, Some(v))).unwrap();
        }
        cache
    }

    fn feed(hub: &mut DerivedHub<PairSum>, upstream: &OrderedCache<Value>) -> Vec<Signal> {
        let mut out = Vec::new();
        for (i, item) in upstream.iter().enumerate() {
            let signal = Signal::next(Act::AddNew, item.timestamp_ns, i);
            hub.on_signal(upstream, signal, &mut out).unwrap();
        }
        out
    }

    fn values(hub: &DerivedHub<PairSum>) -> Vec<Option<f64>> {
        hub.cache().iter().map(|v| v.value).collect()
    }

    #[test]
    fn test_append_computes_each_position() {
        for strategy in [RollbackStrategy::CachedState, RollbackStrategy::FullReplay] {
            let upstream = provider(&[(1, 1.0), (2, 2.0), (3, 3.0)]);
            let mut hub = DerivedHub::new(PairSum, strategy, 100);
            let out = feed(&mut hub, &upstream);

            assert_eq!(out.len(), 3);
            assert_eq!(values(&hub), vec![None, Some(3.0), Some(5.0)]);
        }
    }

    #[test]
    fn test_update_stops_after_lookback() {
        let mut upstream = provider(&[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0), (5, 5.0)]);
        let mut hub = DerivedHub::new(PairSum, RollbackStrategy::CachedState, 100);
        feed(&mut hub, &upstream);

        upstream.replace_at(1, Value::new(2, Some(10.0))).unwrap();
        let mut out = Vec::new();
        hub.on_signal(&upstream, Signal::next(Act::Update, 2, 1), &mut out)
            .unwrap();

        assert_eq!(
            out,
            vec![Signal::next(Act::Update, 2, 1), Signal::next(Act::Update, 3, 2)]
        );
        assert_eq!(values(&hub), vec![None, Some(11.0), Some(13.0), Some(7.0), Some(9.0)]);
    }

    #[test]
    fn test_late_arrival_inserts_and_cascades() {
        for strategy in [RollbackStrategy::CachedState, RollbackStrategy::FullReplay] {
            let mut upstream = provider(&[(1, 1.0), (3, 3.0), (4, 4.0)]);
            let mut hub = DerivedHub::new(PairSum, strategy, 100);
            feed(&mut hub, &upstream);

            upstream.insert_at(1, Value::new(2, Some(2.0))).unwrap();
            let mut out = Vec::new();
            hub.on_signal(&upstream, Signal::next(Act::Update, 2, 1), &mut out)
                .unwrap();

            assert_eq!(out[0], Signal::next(Act::Update, 2, 1));
            assert_eq!(values(&hub), vec![None, Some(3.0), Some(5.0), Some(7.0)]);
        }
    }

    #[test]
    fn test_delete_recomputes_following_positions() {
        for strategy in [RollbackStrategy::CachedState, RollbackStrategy::FullReplay] {
            let mut upstream = provider(&[(1, 1.0), (2, 2.0), (3, 3.0), (4, 4.0)]);
            let mut hub = DerivedHub::new(PairSum, strategy, 100);
            feed(&mut hub, &upstream);

            upstream.remove_at(1);
            let mut out = Vec::new();
            hub.on_signal(&upstream, Signal::next(Act::Delete, 2, 1), &mut out)
                .unwrap();

            assert_eq!(out[0], Signal::next(Act::Delete, 2, 1));
            assert_eq!(values(&hub), vec![None, Some(4.0), Some(7.0)]);
        }
    }

    #[test]
    fn test_missing_history_is_an_error() {
        let upstream = provider(&[(1, 1.0)]);
        let mut hub = DerivedHub::new(PairSum, RollbackStrategy::CachedState, 100);
        let mut out = Vec::new();
        let err = hub
            .on_signal(&upstream, Signal::next(Act::Delete, 1, 0), &mut out)
            .unwrap_err();
        assert!(matches!(err, HubError::HistoryNotFound { timestamp: 1 }));
    }

    #[test]
    fn test_wrong_upstream_type_is_rejected() {
        let upstream: OrderedCache<flux_types::Quote> = OrderedCache::new();
        let mut hub = DerivedHub::new(PairSum, RollbackStrategy::CachedState, 100);
        let mut out = Vec::new();
        let err = hub
            .on_signal(&upstream, Signal::next(Act::AddNew, 1, 0), &mut out)
            .unwrap_err();
        assert!(matches!(err, HubError::TypeMismatch { .. }));
    }

    #[test]
    fn test_prune_keeps_anchor_state() {
        let upstream = provider(&[(1, 1.0), (2, 2.0), (3, 3.0)]);
        let mut hub = DerivedHub::new(PairSum, RollbackStrategy::CachedState, 100);
        feed(&mut hub, &upstream);

        let mut out = Vec::new();
        hub.on_signal(&upstream, Signal::Prune { through: 1 }, &mut out)
            .unwrap();
        assert_eq!(out, vec![Signal::Prune { through: 1 }]);
        assert_eq!(hub.cache().len(), 2);
        assert_eq!(hub.anchor, 1);
        assert_eq!(hub.states, vec![2, 3]);
    }

    #[test]
    fn test_full_replay_anchor_survives_prune() {
        let upstream = provider(&[(1, 1.0), (2, 2.0), (3, 3.0)]);
        let mut hub = DerivedHub::new(PairSum, RollbackStrategy::FullReplay, 100);
        feed(&mut hub, &upstream);
        hub.advance_anchor(&upstream, 1).unwrap();
        assert_eq!(hub.anchor, 1);

        let mut pruned = provider(&[(2, 2.0), (3, 3.0)]);
        let mut out = Vec::new();
        hub.on_signal(&pruned, Signal::Prune { through: 1 }, &mut out)
            .unwrap();
        assert_eq!(hub.state_before(pruned.as_slice(), 1), 2);

        pruned.replace_at(1, Value::new(3, Some(5.0))).unwrap();
        hub.on_signal(&pruned, Signal::next(Act::Update, 3, 1), &mut out)
            .unwrap();
        assert_eq!(values(&hub), vec![Some(3.0), Some(7.0)]);
        assert_eq!(hub.latest, 3);
    }

    #[test]
    fn test_rebuild_from_middle() {
        let upstream = provider(&[(1, 1.0), (2, 2.0), (3, 3.0)]);
        let mut hub = DerivedHub::new(PairSum, RollbackStrategy::FullReplay, 100);
        hub.rebuild_from(Some(&upstream), i64::MIN).unwrap();
        assert_eq!(values(&hub), vec![None, Some(3.0), Some(5.0)]);

        hub.rebuild_from(Some(&upstream), 2).unwrap();
        assert_eq!(values(&hub), vec![None, Some(3.0), Some(5.0)]);
        assert_eq!(hub.latest, 3);

        assert!(matches!(
            hub.rebuild_from(None, i64::MIN),
            Err(HubError::NotSubscribed { .. })
        ));
    }
}
