//! Crate-wide error taxonomy.
//!
//! Every surfaced error is one of a small number of kinds; the retry harness
//! in [`crate::dispatcher::retry`] dispatches on [`Error::is_permanent`]
//! rather than matching individual variants, so new variants can be added
//! without touching the harness.

use thiserror::Error;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The caller sent malformed input (e.g. an empty agent id).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No matching workflow, task, action, or rule-set was found.
    #[error("not found: {0}")]
    NotFound(String),

    /// An out-of-order state transition, a workflow stuck in PREPARING, or
    /// an enrollment race against an already-existing workflow.
    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    /// Transient read failure against the object store.
    #[error("backend read error: {0}")]
    BackendRead(#[source] anyhow::Error),

    /// Transient write failure against the object store.
    #[error("backend write error: {0}")]
    BackendWrite(#[source] anyhow::Error),

    /// The context deadline for an operation elapsed.
    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The operation was cancelled by its caller.
    #[error("canceled")]
    Canceled,

    /// Serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Anything else; always wraps a cause.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Permanent errors stop the retry harness immediately.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument(_)
                | Error::NotFound(_)
                | Error::FailedPrecondition(_)
                | Error::Canceled
        )
    }

    /// Transient errors are worth retrying within the harness budget.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::BackendRead(_) | Error::BackendWrite(_))
    }

    pub fn backend_read(cause: impl Into<anyhow::Error>) -> Self {
        Error::BackendRead(cause.into())
    }

    pub fn backend_write(cause: impl Into<anyhow::Error>) -> Self {
        Error::BackendWrite(cause.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Internal(err.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
