//! Member snapshots returned by the directory.

use serde::{Deserialize, Serialize};

use crate::types::{CapabilityId, ScopeId, SubjectId};

/// A member of a scope, as observed at lookup time.
///
/// Snapshots are never cached: every decision re-resolves the member so a
/// departed member simply stops resolving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub subject_id: SubjectId,
    pub scope: ScopeId,
    /// Human-readable handle, for logs.
    pub tag: String,
    /// Capabilities held when the snapshot was taken.
    pub capabilities: Vec<CapabilityId>,
    pub is_bot: bool,
}

impl Member {
    pub fn new(subject_id: impl Into<SubjectId>, scope: impl Into<ScopeId>) -> Self {
        let subject_id = subject_id.into();
        Self {
            tag: subject_id.to_string(),
            subject_id,
            scope: scope.into(),
            capabilities: Vec::new(),
            is_bot: false,
        }
    }

    /// Replace the display tag, which defaults to the subject id.
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    /// Add a held capability.
    pub fn with_capability(mut self, capability: impl Into<CapabilityId>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Mark the member as an automated account.
    pub fn bot(mut self) -> Self {
        self.is_bot = true;
        self
    }

    /// Whether the snapshot lists `capability`.
    pub fn holds(&self, capability: &CapabilityId) -> bool {
        self.capabilities.contains(capability)
    }
}
