//! Temporary capability grants.

use serde::{Deserialize, Serialize};

use crate::types::{CapabilityId, GrantId, SubjectId, Timestamp};

/// "Subject X holds capability Y until time T."
///
/// Identity key is `(subject_id, capability_id)`; the store keeps at most one
/// row per key. `id` is the storage surrogate and changes every time the grant
/// is re-issued, which is what lets the reconciler delete exactly the row it
/// swept without touching a newer re-issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporaryGrant {
    pub id: GrantId,
    pub subject_id: SubjectId,
    pub capability_id: CapabilityId,
    pub expires_at: Timestamp,
}

impl TemporaryGrant {
    /// Expired grants are those with `expires_at <= now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}
