//! Error types for nodepool operations.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for collaborator calls.
pub type ApiResult<T> = Result<T, ApiError>;

/// Result type alias for nodepool operations.
pub type FleetResult<T> = Result<T, FleetError>;

/// Failure reported by a collaborator (cloud binding) call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("throttled: {0}")]
    Throttled(String),

    #[error("service unavailable: {0}")]
    Unavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rejected: {0}")]
    Rejected(String),
}

impl ApiError {
    /// Transient failures are worth another attempt after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled(_) | Self::Unavailable(_))
    }
}

/// Errors that abort a nodepool operation.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("cluster {0} has no registered nodes")]
    EmptyCluster(String),

    #[error("instance {instance_id} has no {tag} tag")]
    MissingTag { instance_id: String, tag: String },

    #[error("unknown instance type: {0}")]
    UnknownInstanceType(String),

    #[error("{operation} failed: {source}")]
    Api {
        operation: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("timed out after {elapsed:?} waiting for {phase}")]
    Timeout { phase: &'static str, elapsed: Duration },

    #[error("cancelled while waiting for {phase}")]
    Cancelled { phase: &'static str },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification of a `FleetError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A cluster, group, instance or tag could not be resolved.
    Resolution,
    /// A collaborator call failed.
    Api,
    /// Live state contradicts an assumption.
    Invariant,
    /// A bounded wait ran out of time.
    Timeout,
    /// The shutdown signal fired.
    Cancelled,
    /// Configuration could not be used.
    Config,
}

impl FleetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. }
            | Self::EmptyCluster(_)
            | Self::MissingTag { .. }
            | Self::UnknownInstanceType(_) => ErrorKind::Resolution,
            Self::Api {
                source: ApiError::NotFound(_),
                ..
            } => ErrorKind::Resolution,
            Self::Api { .. } => ErrorKind::Api,
            Self::Invariant(_) => ErrorKind::Invariant,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}
