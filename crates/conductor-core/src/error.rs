//! Core error type for the Conductor scheduler.
//!
//! `SchedulerError` is used throughout the core domain (validator, stores,
//! engine). Transports map `ErrorKind` to their own status codes at the
//! boundary (see `rpc::error`); the core never does.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// Malformed or cyclic workflow, bad request shape. The task is never created.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation not allowed in the current task/step state. Nothing was mutated.
    #[error("Invalid state: {0}")]
    State(String),

    /// A step could not be handed to a worker.
    #[error("Dispatch failure: {0}")]
    Dispatch(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Discriminant of a [`SchedulerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    NotFound,
    State,
    Dispatch,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::NotFound => "NOT_FOUND",
            Self::State => "STATE",
            Self::Dispatch => "DISPATCH",
            Self::Internal => "INTERNAL",
        }
    }
}

impl SchedulerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::State(_) => ErrorKind::State,
            Self::Dispatch(_) => ErrorKind::Dispatch,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// The bare message, without the kind prefix added by `Display`.
    pub fn message(&self) -> &str {
        match self {
            Self::Validation(msg)
            | Self::NotFound(msg)
            | Self::State(msg)
            | Self::Dispatch(msg)
            | Self::Internal(msg) => msg,
        }
    }
}
