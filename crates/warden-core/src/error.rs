//! Error types for core primitives.

use thiserror::Error;

/// Errors raised while constructing or validating core values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// An identifier was empty.
    #[error("empty {0} identifier")]
    EmptyIdentifier(&'static str),

    /// A capability selector cannot match anything useful.
    #[error("invalid capability selector: {0}")]
    InvalidSelector(String),

    /// Timestamp arithmetic left the representable range.
    #[error("timestamp overflow: {base} + {delta_ms}ms")]
    TimestampOverflow { base: i64, delta_ms: u128 },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
