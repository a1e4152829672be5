//! Hub graph error types.

use flux_types::CoreError;
use thiserror::Error;

/// Errors raised by caches, hubs and the graph.
///
/// A hub never masks an error: the first failure stops the cascade and is
/// returned to the caller of the mutating graph operation.
#[derive(Debug, Error)]
pub enum HubError {
    /// Parameter rejected at construction
    #[error("invalid parameter: {param} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        param: String,
        /// Offending value, rendered.
        value: String,
        /// Constraint that was violated.
        reason: String,
    },

    /// Configuration rejected before any data flowed
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A record expected to be cached was not found
    #[error("history not found for timestamp {timestamp}")]
    HistoryNotFound {
        /// Timestamp that was looked up.
        timestamp: i64,
    },

    /// Append would break the strictly increasing timestamp order
    #[error("out of order: timestamp {timestamp} is not after last cached {last}")]
    OutOfOrder {
        /// Rejected timestamp.
        timestamp: i64,
        /// Timestamp of the last cached record.
        last: i64,
    },

    /// Too many repeated arrivals at the same timestamp
    #[error(
        "{node}: a repeated stream update exceeded the threshold after {attempts} attempts; \
         check for circular chains or a misbehaving provider"
    )]
    Overflow {
        /// Node name.
        node: String,
        /// Consecutive arrivals counted at the failing call.
        attempts: u32,
    },

    /// Node rejected input because it is faulted
    #[error("{node}: node is faulted after an overflow; reset the fault first")]
    Faulted {
        /// Node name.
        node: String,
    },

    /// Input record rejected without mutation
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Handle does not reference a node of this graph
    #[error("unknown node id {0}")]
    UnknownNode(usize),

    /// Handle type does not match the node
    #[error("node {node} does not hold the requested record type")]
    TypeMismatch {
        /// Node name.
        node: String,
    },

    /// Operation needs an upstream subscription the node does not have
    #[error("node {node} is not subscribed to a provider")]
    NotSubscribed {
        /// Node name.
        node: String,
    },
}

impl HubError {
    /// Creates an `InvalidParameter` error.
    #[must_use]
    pub fn invalid_parameter(
        param: impl Into<String>,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        HubError::InvalidParameter {
            param: param.into(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true for overflow and faulted-node errors.
    #[must_use]
    pub fn is_overflow(&self) -> bool {
        matches!(self, HubError::Overflow { .. } | HubError::Faulted { .. })
    }

    /// Returns the error category.
    /// Categories: `config`, `history`, `overflow`, `input`, `graph`
    #[must_use]
    pub fn error_category(&self) -> &'static str {
        match self {
            HubError::InvalidParameter { .. } | HubError::InvalidConfig(_) => "config",

            HubError::HistoryNotFound { .. } | HubError::OutOfOrder { .. } => "history",

            HubError::Overflow { .. } | HubError::Faulted { .. } => "overflow",

            HubError::InvalidInput(_) => "input",

            HubError::UnknownNode(_)
            | HubError::TypeMismatch { .. }
            | HubError::NotSubscribed { .. } => "graph",
        }
    }
}

impl From<CoreError> for HubError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(msg) => HubError::InvalidInput(msg),
            CoreError::Config(msg) => HubError::InvalidConfig(msg),
            CoreError::Json(err) => HubError::InvalidConfig(err.to_string()),
        }
    }
}
