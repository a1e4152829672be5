//! Hub graph arena and cascade.
//!
//! Nodes live in an arena and refer to each other by index. A node can only
//! subscribe to a node that already exists, so every provider index is lower
//! than its subscribers' and the graph is acyclic by construction.
//!
//! A write to a source is delivered through an explicit LIFO worklist rather
//! than recursion. Signals are pushed in reverse so they pop in subscriber
//! registration order, and whatever a subscriber emits is pushed on top, which
//! reproduces depth-first delivery without growing the call stack.
//!
//! A source over its size bound is trimmed only after the write has cascaded.
//! Every subscribed hub first moves its rollback anchor past the records about
//! to go, while all caches still hold them, then the eviction cascades as
//! `Prune`.

use std::any::Any;
use std::marker::PhantomData;

use flux_types::{HubConfig, RollbackStrategy, Series};
use tracing::{debug, info};

use crate::cache::OrderedCache;
use crate::compute::Compute;
use crate::error::HubError;
use crate::hub::DerivedHub;
use crate::observer::Signal;
use crate::source::{SourceNode, SourceRecord};

type NodeId = usize;

/// Behaviour shared by sources and derived hubs, erased to live in one arena.
pub(crate) trait Node: Send {
    fn name(&self) -> &str;

    fn max_cache_size(&self) -> usize;

    /// Strategy inherited by new subscribers.
    fn rollback(&self) -> RollbackStrategy;

    /// The node's `OrderedCache<Output>`.
    fn cache_any(&self) -> &dyn Any;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Applies one signal from the provider whose cache is `upstream`.
    fn on_signal(&mut self, upstream: &dyn Any, signal: Signal, out: &mut Vec<Signal>) -> Result<(), HubError>;

    /// Moves the rollback anchor past every cached record with timestamp
    /// `<= through`, ahead of their eviction.
    fn advance_anchor(&mut self, _upstream: &dyn Any, _through: i64) -> Result<(), HubError> {
        Ok(())
    }

    /// Recomputes cached records from `from` onward without notifying.
    fn rebuild_from(&mut self, upstream: Option<&dyn Any>, from: i64) -> Result<(), HubError>;

    fn is_faulted(&self) -> bool {
        false
    }

    fn overflow_count(&self) -> u32 {
        0
    }

    fn reset_fault(&mut self) {}
}

struct Slot {
    node: Box<dyn Node>,
    provider: Option<NodeId>,
    subscribed: bool,
    subscribers: Vec<NodeId>,
}

/// Typed reference to a node whose cache holds `T` records.
pub struct HubHandle<T> {
    id: NodeId,
    _marker: PhantomData<fn() -> T>,
}

impl<T> HubHandle<T> {
    fn new(id: NodeId) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Arena index of the node.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }
}

impl<T> Clone for HubHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for HubHandle<T> {}

impl<T> PartialEq for HubHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for HubHandle<T> {}

impl<T> std::fmt::Debug for HubHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("HubHandle").field(&self.id).finish()
    }
}

/// Owns every node of one graph and drives change propagation.
///
/// Not internally synchronized. Concurrent producers share it behind one
/// `Mutex` held for the whole call, so each cascade completes atomically.
pub struct HubGraph {
    slots: Vec<Slot>,
    config: HubConfig,
}

impl Default for HubGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HubGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.slots.iter().map(|s| s.node.name()).collect();
        f.debug_struct("HubGraph")
            .field("nodes", &names)
            .field("config", &self.config)
            .finish()
    }
}

impl HubGraph {
    /// Empty graph with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            config: HubConfig::default(),
        }
    }

    /// Empty graph whose sources default to `config`.
    ///
    /// # Errors
    /// [`HubError::InvalidConfig`] when the config fails validation.
    pub fn with_config(config: HubConfig) -> Result<Self, HubError> {
        config.validate()?;
        Ok(Self {
            slots: Vec::new(),
            config,
        })
    }

    /// Default configuration for new sources.
    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true when the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    // ==================== construction ====================

    /// Adds a source using the graph configuration.
    pub fn add_source<T: SourceRecord>(&mut self, name: impl Into<String>) -> HubHandle<T> {
        let source = SourceNode::<T>::new(name, &self.config);
        self.push(Box::new(source), None)
    }

    /// Adds a source with its own configuration.
    ///
    /// # Errors
    /// [`HubError::InvalidConfig`] when the config fails validation.
    pub fn add_source_with<T: SourceRecord>(
        &mut self,
        name: impl Into<String>,
        config: HubConfig,
    ) -> Result<HubHandle<T>, HubError> {
        config.validate()?;
        let source = SourceNode::<T>::new(name, &config);
        Ok(self.push(Box::new(source), None))
    }

    /// Subscribes a new hub to `upstream`, inheriting its rollback strategy.
    ///
    /// The hub immediately catches up on everything `upstream` has cached.
    ///
    /// # Errors
    /// [`HubError::UnknownNode`] for a foreign handle, or any error raised
    /// while catching up.
    pub fn subscribe<C: Compute>(
        &mut self,
        upstream: &HubHandle<C::Input>,
        compute: C,
    ) -> Result<HubHandle<C::Output>, HubError> {
        let strategy = self.slot(upstream.id)?.node.rollback();
        self.subscribe_with(upstream, compute, strategy)
    }

    /// Subscribes a new hub to `upstream` with an explicit rollback strategy.
    ///
    /// # Errors
    /// See [`HubGraph::subscribe`].
    pub fn subscribe_with<C: Compute>(
        &mut self,
        upstream: &HubHandle<C::Input>,
        compute: C,
        strategy: RollbackStrategy,
    ) -> Result<HubHandle<C::Output>, HubError> {
        let provider = self.slot(upstream.id)?;
        let mut hub = DerivedHub::new(compute, strategy, provider.node.max_cache_size());
        hub.rebuild_from(Some(provider.node.cache_any()), i64::MIN)?;

        let handle = self.push(Box::new(hub), Some(upstream.id));
        self.slots[upstream.id].subscribers.push(handle.id);
        debug!(
            node = %self.slots[handle.id].node.name(),
            provider = %self.slots[upstream.id].node.name(),
            "subscribed"
        );
        Ok(handle)
    }

    fn push<T>(&mut self, node: Box<dyn Node>, provider: Option<NodeId>) -> HubHandle<T> {
        let id = self.slots.len();
        self.slots.push(Slot {
            node,
            provider,
            subscribed: provider.is_some(),
            subscribers: Vec::new(),
        });
        HubHandle::new(id)
    }

    // ==================== source input ====================

    /// Adds one record to a source and propagates it, then evicts the oldest
    /// records if the source grew past its bound.
    ///
    /// # Errors
    /// [`HubError::HistoryNotFound`] for a record at or before evicted
    /// history. Input, overflow and fault errors from the source leave the graph
    /// unchanged. Errors raised downstream stop the cascade and leave every
    /// change committed so far in place.
    pub fn add<T: SourceRecord>(&mut self, source: &HubHandle<T>, item: T) -> Result<(), HubError> {
        let mut out = Vec::new();
        self.source_mut(source)?.add(item, &mut out)?;
        self.cascade(source.id, out)?;
        self.enforce_bound(source)
    }

    /// Adds records in timestamp order, one at a time.
    ///
    /// # Errors
    /// Stops at the first failing record; see [`HubGraph::add`].
    pub fn add_batch<T: SourceRecord>(
        &mut self,
        source: &HubHandle<T>,
        items: impl IntoIterator<Item = T>,
    ) -> Result<(), HubError> {
        let mut items: Vec<T> = items.into_iter().collect();
        items.sort_by_key(Series::timestamp);
        for item in items {
            self.add(source, item)?;
        }
        Ok(())
    }

    /// Removes the source record with this timestamp.
    ///
    /// # Errors
    /// [`HubError::HistoryNotFound`] when the source has no such record.
    pub fn remove<T: SourceRecord>(&mut self, source: &HubHandle<T>, timestamp: i64) -> Result<(), HubError> {
        let mut out = Vec::new();
        self.source_mut(source)?.remove(timestamp, &mut out)?;
        self.cascade(source.id, out)
    }

    /// Removes every source record with timestamp `>= from`.
    ///
    /// # Errors
    /// Fault errors and any error raised downstream.
    pub fn remove_range<T: SourceRecord>(&mut self, source: &HubHandle<T>, from: i64) -> Result<(), HubError> {
        let mut out = Vec::new();
        self.source_mut(source)?.remove_range(from, &mut out)?;
        self.cascade(source.id, out)
    }

    /// Drops every source record; subscribers are rebuilt empty.
    ///
    /// # Errors
    /// Fault errors and any error raised downstream.
    pub fn clear<T: SourceRecord>(&mut self, source: &HubHandle<T>) -> Result<(), HubError> {
        let mut out = Vec::new();
        self.source_mut(source)?.clear(&mut out)?;
        self.cascade(source.id, out)
    }

    // ==================== results ====================

    /// Cached records of a node, oldest first.
    ///
    /// # Errors
    /// [`HubError::UnknownNode`] or [`HubError::TypeMismatch`].
    pub fn results<T: Series + 'static>(&self, handle: &HubHandle<T>) -> Result<&[T], HubError> {
        self.cache(handle).map(OrderedCache::as_slice)
    }

    /// Cache of a node.
    ///
    /// # Errors
    /// [`HubError::UnknownNode`] or [`HubError::TypeMismatch`].
    pub fn cache<T: Series + 'static>(&self, handle: &HubHandle<T>) -> Result<&OrderedCache<T>, HubError> {
        let node = &self.slot(handle.id)?.node;
        node.cache_any()
            .downcast_ref::<OrderedCache<T>>()
            .ok_or_else(|| HubError::TypeMismatch {
                node: node.name().to_string(),
            })
    }

    /// Display name of a node.
    ///
    /// # Errors
    /// [`HubError::UnknownNode`].
    pub fn name<T>(&self, handle: &HubHandle<T>) -> Result<&str, HubError> {
        Ok(self.slot(handle.id)?.node.name())
    }

    /// Cache size bound of a node.
    ///
    /// # Errors
    /// [`HubError::UnknownNode`].
    pub fn max_cache_size<T>(&self, handle: &HubHandle<T>) -> Result<usize, HubError> {
        Ok(self.slot(handle.id)?.node.max_cache_size())
    }

    // ==================== subscriptions ====================

    /// Detaches a hub from its provider. The hub keeps its cache but no
    /// longer receives changes. Detaching twice is a no-op.
    ///
    /// # Errors
    /// [`HubError::NotSubscribed`] for a source.
    pub fn unsubscribe<T>(&mut self, handle: &HubHandle<T>) -> Result<(), HubError> {
        let slot = self.slot(handle.id)?;
        let provider = slot.provider.ok_or_else(|| HubError::NotSubscribed {
            node: slot.node.name().to_string(),
        })?;
        if !slot.subscribed {
            return Ok(());
        }

        self.slots[provider].subscribers.retain(|&id| id != handle.id);
        self.slots[handle.id].subscribed = false;
        debug!(node = %self.slots[handle.id].node.name(), "unsubscribed");
        Ok(())
    }

    /// Detaches every direct subscriber of a node.
    ///
    /// # Errors
    /// [`HubError::UnknownNode`].
    pub fn end_transmission<T>(&mut self, handle: &HubHandle<T>) -> Result<(), HubError> {
        let subscribers = std::mem::take(&mut self.slot_mut(handle.id)?.subscribers);
        for &id in &subscribers {
            self.slots[id].subscribed = false;
        }
        info!(
            node = %self.slots[handle.id].node.name(),
            count = subscribers.len(),
            "transmission ended"
        );
        Ok(())
    }

    /// Returns true while a hub receives changes from its provider.
    ///
    /// # Errors
    /// [`HubError::UnknownNode`].
    pub fn is_subscribed<T>(&self, handle: &HubHandle<T>) -> Result<bool, HubError> {
        Ok(self.slot(handle.id)?.subscribed)
    }

    /// Returns true when at least one hub is subscribed to this node.
    ///
    /// # Errors
    /// [`HubError::UnknownNode`].
    pub fn has_subscribers<T>(&self, handle: &HubHandle<T>) -> Result<bool, HubError> {
        Ok(!self.slot(handle.id)?.subscribers.is_empty())
    }

    /// Number of hubs subscribed to this node.
    ///
    /// # Errors
    /// [`HubError::UnknownNode`].
    pub fn observer_count<T>(&self, handle: &HubHandle<T>) -> Result<usize, HubError> {
        Ok(self.slot(handle.id)?.subscribers.len())
    }

    // ==================== faults ====================

    /// Returns true after a source overflowed and until its fault is reset.
    ///
    /// # Errors
    /// [`HubError::UnknownNode`].
    pub fn is_faulted<T>(&self, handle: &HubHandle<T>) -> Result<bool, HubError> {
        Ok(self.slot(handle.id)?.node.is_faulted())
    }

    /// Consecutive identical arrivals counted by a source.
    ///
    /// # Errors
    /// [`HubError::UnknownNode`].
    pub fn overflow_count<T>(&self, handle: &HubHandle<T>) -> Result<u32, HubError> {
        Ok(self.slot(handle.id)?.node.overflow_count())
    }

    /// Clears the overflow counter and fault flag.
    ///
    /// # Errors
    /// [`HubError::UnknownNode`].
    pub fn reset_fault<T>(&mut self, handle: &HubHandle<T>) -> Result<(), HubError> {
        self.slot_mut(handle.id)?.node.reset_fault();
        Ok(())
    }

    // ==================== rebuild ====================

    /// Recomputes a node from its provider's cache and rebuilds everything
    /// downstream of it. A source keeps its records and rebuilds its
    /// subscribers.
    ///
    /// # Errors
    /// Any error raised while recomputing.
    pub fn rebuild<T>(&mut self, handle: &HubHandle<T>) -> Result<(), HubError> {
        self.rebuild_node(handle.id, i64::MIN)?;
        info!(node = %self.slots[handle.id].node.name(), "rebuild cascading");
        self.cascade(handle.id, vec![Signal::Rebuild { from: i64::MIN }])
    }

    /// Re-attaches a detached hub, clears any fault and rebuilds.
    ///
    /// # Errors
    /// Any error raised while rebuilding.
    pub fn reinitialize<T>(&mut self, handle: &HubHandle<T>) -> Result<(), HubError> {
        let slot = self.slot_mut(handle.id)?;
        slot.node.reset_fault();
        if let Some(provider) = slot.provider
            && !slot.subscribed
        {
            slot.subscribed = true;
            self.slots[provider].subscribers.push(handle.id);
        }
        info!(node = %self.slots[handle.id].node.name(), "reinitialized");
        self.rebuild(handle)
    }

    fn rebuild_node(&mut self, id: NodeId, from: i64) -> Result<(), HubError> {
        match self.slot(id)?.provider {
            Some(provider) => {
                let (head, tail) = self.slots.split_at_mut(id);
                tail[0]
                    .node
                    .rebuild_from(Some(head[provider].node.cache_any()), from)
            }
            None => self.slots[id].node.rebuild_from(None, from),
        }
    }

    // ==================== pruning ====================

    fn enforce_bound<T: SourceRecord>(&mut self, source: &HubHandle<T>) -> Result<(), HubError> {
        let Some(through) = self.source_mut(source)?.prune_point() else {
            return Ok(());
        };
        self.advance_anchors(source.id, through)?;
        self.source_mut(source)?.evict();
        self.cascade(source.id, vec![Signal::Prune { through }])
    }

    fn advance_anchors(&mut self, origin: NodeId, through: i64) -> Result<(), HubError> {
        let mut pending = self.slots[origin].subscribers.clone();
        while let Some(id) = pending.pop() {
            let Some(provider) = self.slots[id].provider else {
                continue;
            };
            let (head, tail) = self.slots.split_at_mut(id);
            tail[0]
                .node
                .advance_anchor(head[provider].node.cache_any(), through)?;
            pending.extend_from_slice(&self.slots[id].subscribers);
        }
        Ok(())
    }

    // ==================== cascade ====================

    fn cascade(&mut self, origin: NodeId, emitted: Vec<Signal>) -> Result<(), HubError> {
        let mut stack: Vec<(NodeId, Signal)> = Vec::new();
        self.schedule(&mut stack, origin, emitted);

        let mut delivered = 0usize;
        while let Some((id, signal)) = stack.pop() {
            let Some(provider) = self.slots[id].provider else {
                continue;
            };
            let mut out = Vec::new();
            let (head, tail) = self.slots.split_at_mut(id);
            tail[0]
                .node
                .on_signal(head[provider].node.cache_any(), signal, &mut out)?;
            delivered += 1;
            self.schedule(&mut stack, id, out);
        }

        if delivered > 0 {
            debug!(node = %self.slots[origin].node.name(), delivered, "cascade complete");
        }
        Ok(())
    }

    fn schedule(&self, stack: &mut Vec<(NodeId, Signal)>, from: NodeId, emitted: Vec<Signal>) {
        let subscribers = &self.slots[from].subscribers;
        if subscribers.is_empty() {
            return;
        }
        for signal in emitted.into_iter().rev() {
            for &id in subscribers.iter().rev() {
                stack.push((id, signal));
            }
        }
    }

    // ==================== lookup ====================

    fn slot(&self, id: NodeId) -> Result<&Slot, HubError> {
        self.slots.get(id).ok_or(HubError::UnknownNode(id))
    }

    fn slot_mut(&mut self, id: NodeId) -> Result<&mut Slot, HubError> {
        self.slots.get_mut(id).ok_or(HubError::UnknownNode(id))
    }

    fn source_mut<T: SourceRecord>(&mut self, handle: &HubHandle<T>) -> Result<&mut SourceNode<T>, HubError> {
        let slot = self.slot_mut(handle.id)?;
        if !slot.node.as_any().is::<SourceNode<T>>() {
            return Err(HubError::TypeMismatch {
                node: slot.node.name().to_string(),
            });
        }
        slot.node
            .as_any_mut()
            .downcast_mut::<SourceNode<T>>()
            .ok_or(HubError::UnknownNode(handle.id))
    }
}
