//! Store traits: the abstract interfaces for Warden persistence.
//!
//! Every method is async so the SQLite backend can move work onto the
//! blocking pool. None of these calls hold an in-process lock across an
//! await point in the caller.

use async_trait::async_trait;
use warden_core::{CapabilityId, GrantId, SanctionRecord, SubjectId, TemporaryGrant, Timestamp};

use crate::error::Result;

/// Persistence for time-bounded capability grants.
#[async_trait]
pub trait GrantStore: Send + Sync {
    /// Record that `subject` holds `capability` until `expires_at`.
    ///
    /// Any existing row for the same `(subject, capability)` is removed first,
    /// so re-issuing replaces the expiry instead of duplicating the grant.
    /// Returns the id of the new row.
    async fn upsert_grant(
        &self,
        subject: &SubjectId,
        capability: &CapabilityId,
        expires_at: Timestamp,
    ) -> Result<GrantId>;

    /// All grants with `expires_at <= now`, in no particular order.
    async fn list_expired(&self, now: Timestamp) -> Result<Vec<TemporaryGrant>>;

    /// Remove a row by id. Deleting an absent id is not an error.
    async fn delete_grant(&self, id: GrantId) -> Result<()>;

    /// The live grant for an identity key, if any.
    async fn get_grant(
        &self,
        subject: &SubjectId,
        capability: &CapabilityId,
    ) -> Result<Option<TemporaryGrant>>;

    /// All grants held by a subject, soonest expiry first.
    async fn list_grants(&self, subject: &SubjectId) -> Result<Vec<TemporaryGrant>>;
}

/// Persistence for warn counters.
#[async_trait]
pub trait SanctionStore: Send + Sync {
    /// Increment the subject's warn count (creating it at 1) and stamp
    /// `last_warn_at`. Returns the new count.
    ///
    /// Concurrent calls for the same subject never lose an increment.
    async fn increment_warn(&self, subject: &SubjectId, at: Timestamp) -> Result<u64>;

    /// The subject's record, if it has ever been warned.
    async fn get_sanction(&self, subject: &SubjectId) -> Result<Option<SanctionRecord>>;
}

/// A subject linked to an external profile name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityLink {
    pub subject_id: SubjectId,
    /// Stored lower-cased.
    pub external_name: String,
    pub linked_at: Timestamp,
}

/// Result of linking an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    /// The link was stored.
    Linked,
    /// The external name is already linked.
    NameTaken {
        /// Who holds it.
        by: SubjectId,
    },
}

/// Persistence for subject to external-profile links.
#[async_trait]
pub trait IdentityLinkStore: Send + Sync {
    /// Link `subject` to `external_name` (case-insensitive, unique).
    ///
    /// A subject has at most one link; linking again replaces it.
    async fn link_identity(
        &self,
        subject: &SubjectId,
        external_name: &str,
        at: Timestamp,
    ) -> Result<LinkOutcome>;

    /// The subject's link, if any.
    async fn find_link(&self, subject: &SubjectId) -> Result<Option<IdentityLink>>;

    /// The link holding an external name, if any.
    async fn find_link_by_name(&self, external_name: &str) -> Result<Option<IdentityLink>>;
}

/// Normalize an external name for storage and lookup.
pub(crate) fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
