//! Notification protocol between producers and subscribers.

/// What happened to one record of a producer's cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Act {
    /// A record was appended after every cached one.
    AddNew,
    /// A record was inserted out of order or replaced in place.
    Update,
    /// A record was removed.
    Delete,
}

/// A single change notification, never a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notification {
    /// Kind of change.
    pub act: Act,
    /// Timestamp of the affected record.
    pub timestamp: i64,
    /// Index of the record in the producer's cache when the notification
    /// was sent. Subscribers treat it as a hint and fall back to a search.
    pub index: Option<usize>,
}

impl Notification {
    /// Creates a notification.
    #[must_use]
    pub fn new(act: Act, timestamp: i64, index: Option<usize>) -> Self {
        Self {
            act,
            timestamp,
            index,
        }
    }
}

/// Message carried by the cascade from a producer to each subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    /// Record-level change.
    Next(Notification),
    /// Producer evicted every record with timestamp `<= through`.
    Prune { through: i64 },
    /// Producer reset its cache from `from` onward; rebuild from there.
    Rebuild { from: i64 },
}

impl Signal {
    pub(crate) fn next(act: Act, timestamp: i64, index: usize) -> Self {
        Signal::Next(Notification::new(act, timestamp, Some(index)))
    }
}
