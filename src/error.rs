//! Error types for the rating engine.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RatingError>;

#[derive(Error, Debug)]
pub enum RatingError {
    /// Session or band state is inconsistent. Fatal to the current session.
    #[error("Invalid rating state: {0}")]
    Validation(String),

    /// A referenced book, rating or session could not be resolved.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Tie reconciliation found a link it cannot honor.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The session has a write in flight.
    #[error("Session {0} is busy")]
    Busy(uuid::Uuid),

    /// The persistence collaborator failed. The caller may retry the operation.
    #[error("Storage error: {0}")]
    Io(#[from] anyhow::Error),
}

impl RatingError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Whether retrying the same operation can succeed without restarting the flow.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Busy(_))
    }
}
