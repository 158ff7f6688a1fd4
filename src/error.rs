//! Error types for hound.
//!
//! Every fallible operation in the crate returns [`HoundError`]. Callers that
//! need to map failures onto another protocol (exit codes, status codes) use
//! [`HoundError::kind`] instead of matching on individual variants.

use thiserror::Error;

/// Broad classification of a [`HoundError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller supplied a malformed or out-of-range value.
    Validation,
    /// The request clashes with the current state (duplicate id, step already running).
    Conflict,
    /// The addressed session or running step does not exist.
    NotFound,
    /// Something went wrong inside hound or its storage.
    Internal,
}

/// Errors produced by hound.
#[derive(Debug, Error)]
pub enum HoundError {
    /// Target duration was zero or negative.
    #[error("invalid duration: {0} (must be a positive number of seconds)")]
    InvalidDuration(i64),

    /// Step index outside `0..len`.
    #[error("invalid step index {index} (session has {len} steps)")]
    InvalidStep { index: i64, len: usize },

    /// A hand-built step plan violates the session invariants.
    #[error("invalid step plan: {0}")]
    InvalidPlan(String),

    /// A command-line or config value could not be interpreted.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("session already exists: {0}")]
    SessionExists(String),

    #[error("step {0} is already running")]
    StepAlreadyRunning(usize),

    #[error("step {0} has already completed")]
    StepCompleted(usize),

    #[error("session {0} has been stopped")]
    SessionStopped(String),

    #[error("session {0} has already been completed")]
    SessionCompleted(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("step {0} is not running")]
    StepNotRunning(usize),

    /// Unreachable runtime state.
    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl HoundError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDuration(_)
            | Self::InvalidStep { .. }
            | Self::InvalidPlan(_)
            | Self::InvalidArgument(_) => ErrorKind::Validation,
            Self::SessionExists(_)
            | Self::StepAlreadyRunning(_)
            | Self::StepCompleted(_)
            | Self::SessionStopped(_)
            | Self::SessionCompleted(_) => ErrorKind::Conflict,
            Self::SessionNotFound(_) | Self::StepNotRunning(_) => ErrorKind::NotFound,
            Self::Internal(_)
            | Self::Database(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Parse(_)
            | Self::Yaml(_) => ErrorKind::Internal,
        }
    }
}

impl From<rusqlite::Error> for HoundError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}
