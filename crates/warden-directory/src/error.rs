//! Error types for the directory and identity boundaries.

use std::time::Duration;

use thiserror::Error;

/// Failure calling the external directory.
///
/// "Not found" is deliberately absent: lookups return `Ok(None)` for members
/// and capabilities that no longer exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The call did not complete before its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The bot lacks permission for this mutation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The directory is throttling us.
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// The directory refused the request (unknown member, role hierarchy, ...).
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Network or protocol failure.
    #[error("transport error: {0}")]
    Transport(String),
}

impl DirectoryError {
    /// Whether retrying the same call later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::RateLimited { .. } | Self::Transport(_)
        )
    }
}

/// Failure calling the external identity lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The lookup service could not be reached.
    #[error("identity service unavailable: {0}")]
    Unavailable(String),

    /// The lookup did not complete in time.
    #[error("identity lookup timed out after {0:?}")]
    Timeout(Duration),

    /// The lookup answered with something unparseable.
    #[error("invalid identity response: {0}")]
    InvalidResponse(String),
}

/// Result type for directory operations.
pub type Result<T> = std::result::Result<T, DirectoryError>;
