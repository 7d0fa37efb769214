//! External identity lookup.
//!
//! Verification links a directory member to a profile on an external
//! service. Warden only consumes the resolved profile; how the lookup talks
//! to that service is up to the implementation.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use warden_core::Timestamp;

use crate::error::IdentityError;

/// A resolved external profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    /// The external service's numeric id.
    pub id: u64,
    /// Canonical spelling of the username.
    pub name: String,
    /// Account creation time, when the service reports it.
    pub created_at: Option<Timestamp>,
}

/// Resolves usernames to external profiles.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// `Ok(None)` if no such user exists.
    async fn resolve(&self, username: &str) -> Result<Option<ExternalProfile>, IdentityError>;
}

/// In-memory resolver for tests. Lookups are case-insensitive.
#[derive(Default)]
pub struct MemoryIdentityResolver {
    profiles: Mutex<HashMap<String, ExternalProfile>>,
    failure: Mutex<Option<IdentityError>>,
}

impl MemoryIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a profile.
    pub fn insert(&self, profile: ExternalProfile) {
        self.profiles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(profile.name.to_lowercase(), profile);
    }

    /// Make every lookup fail with `error` (or succeed again with `None`).
    pub fn set_failure(&self, error: Option<IdentityError>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }
}

#[async_trait]
impl IdentityResolver for MemoryIdentityResolver {
    async fn resolve(&self, username: &str) -> Result<Option<ExternalProfile>, IdentityError> {
        if let Some(error) = self
            .failure
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
        {
            return Err(error);
        }
        Ok(self
            .profiles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&username.to_lowercase())
            .cloned())
    }
}
