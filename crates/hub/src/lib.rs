//! Flux Hub
//!
//! Incremental indicator engine built around an observer graph.
//!
//! # Features
//! - Timestamp-ordered caches with binary-search lookups
//! - Sources that accept new, late, updated and deleted records
//! - Derived hubs chained to any depth, kept equal to a full recomputation
//! - Rollback by full replay or by cached per-position state
//! - Bounded caches with eviction cascaded to every subscriber
//! - Overflow detection for repeated arrivals
//! - Buffered accumulators for the append-only single-node case
//!
//! # Example
//! ```ignore
//! let mut graph = HubGraph::new();
//! let quotes = graph.add_source::<Quote>("QUOTES");
//! let closes = graph.subscribe(&quotes, QuotePart::new(CandlePart::Close))?;
//! let sma = graph.subscribe(&closes, Sma::new(20)?)?;
//! graph.add(&quotes, quote)?;
//! let latest = graph.results(&sma)?.last();
//! ```

#![deny(clippy::all)]

pub mod buffer;
pub mod cache;
pub mod compute;
pub mod error;
pub mod graph;
pub mod hub;
pub mod observer;
pub mod source;

// Re-export main types
pub use buffer::{Accumulator, BufferList, RingBuffer};
pub use cache::OrderedCache;
pub use compute::{Compute, Window};
pub use error::HubError;
pub use graph::{HubGraph, HubHandle};
pub use hub::DerivedHub;
pub use observer::{Act, Notification};
pub use source::{OVERFLOW_THRESHOLD, SourceNode, SourceRecord};
