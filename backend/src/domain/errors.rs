//! Error taxonomy shared by the dashboard's domain services.

use thiserror::Error;

/// Domain failures, split by who can fix them: validation, conflict and
/// not-found are the caller's problem; upstream and storage are ours.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Missing or malformed input; the message is safe to show to the caller.
    #[error("{0}")]
    Validation(String),

    /// The operation would violate a uniqueness rule or a locked resource.
    #[error("{0}")]
    Conflict(String),

    /// Unknown id or day.
    #[error("{0}")]
    NotFound(String),

    /// The external booking API answered with a non-success status or an
    /// unreadable payload. `detail` carries a truncated body excerpt.
    #[error("upstream error ({status}): {detail}")]
    Upstream { status: u16, detail: String },

    /// A store write failed. Reads degrade to defaults before reaching here.
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }
}

pub type DomainResult<T> = Result<T, DomainError>;
