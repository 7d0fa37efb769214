//! Error types for Warden operations.

use std::time::Duration;

use thiserror::Error;
use warden_core::{CoreError, ScopeId, SubjectId};
use warden_directory::{DirectoryError, IdentityError};
use warden_store::StoreError;

use crate::catalog::WellKnown;
use crate::config::ConfigError;

/// Message shown to users for any internal failure. Details go to the log.
pub const GENERIC_FAILURE: &str = "Something went wrong while processing this command.";

/// Errors that can occur during Warden operations.
#[derive(Debug, Error)]
pub enum WardenError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Directory call failed.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Identity lookup failed.
    #[error("identity lookup error: {0}")]
    Identity(#[from] IdentityError),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid core value.
    #[error("{0}")]
    Core(#[from] CoreError),

    /// The subject is not a member of the scope.
    #[error("member {subject} not found in scope {scope}")]
    MemberNotFound { subject: SubjectId, scope: ScopeId },

    /// A capability the operation needs does not exist in the scope.
    #[error("capability {capability} not found in scope {scope}")]
    CapabilityMissing { capability: String, scope: ScopeId },

    /// The actor may not perform this operation.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Grant durations must be positive.
    #[error("invalid grant duration {0:?}")]
    InvalidDuration(Duration),

    /// Username failed validation.
    #[error("invalid username: {0}")]
    InvalidUsername(&'static str),

    /// The external name is already linked to a member.
    #[error("external name {name} is already linked")]
    AlreadyLinked { name: String },

    /// The member has no linked external account.
    #[error("member {0} is not verified")]
    NotVerified(SubjectId),

    /// The external service has no such profile.
    #[error("external profile {0} not found")]
    ProfileNotFound(String),
}

impl WardenError {
    pub(crate) fn missing(kind: WellKnown, scope: &ScopeId) -> Self {
        Self::CapabilityMissing {
            capability: kind.to_string(),
            scope: scope.clone(),
        }
    }

    /// Whether this is an internal failure (as opposed to a rejected request).
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Directory(_) | Self::Identity(_) | Self::Config(_) | Self::Core(_)
        )
    }

    /// Text safe to show the user who issued the command.
    ///
    /// Internal failures all collapse to [`GENERIC_FAILURE`].
    pub fn user_message(&self) -> String {
        match self {
            e if e.is_internal() => GENERIC_FAILURE.to_string(),
            Self::MemberNotFound { .. } => "User not found.".to_string(),
            Self::CapabilityMissing { capability, .. } => {
                format!("The {} role does not exist on this server.", capability)
            }
            Self::NotAuthorized(_) => "You are not allowed to use this command.".to_string(),
            Self::InvalidDuration(_) => "The duration must be at least one minute.".to_string(),
            Self::InvalidUsername(reason) => format!("Invalid username: {}.", reason),
            Self::AlreadyLinked { name } => {
                format!("The account \"{}\" is already registered on this server.", name)
            }
            Self::NotVerified(_) => "This user has not verified an external account.".to_string(),
            Self::ProfileNotFound(name) => format!("The account \"{}\" does not exist.", name),
            _ => GENERIC_FAILURE.to_string(),
        }
    }
}

/// Result type for Warden operations.
pub type Result<T> = std::result::Result<T, WardenError>;
