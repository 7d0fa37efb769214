//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use warden_core::{Capability, CapabilityId, Member, ScopeId, SubjectId};
use warden_directory::MemoryDirectory;

/// Capabilities every seeded scope has, as `(id, name)`.
///
/// The names match the default selectors.
pub const DEFAULT_CAPABILITIES: &[(&str, &str)] = &[
    ("tier1", "⚠️ Warn 1"),
    ("tier2", "⚠️ Warn 2"),
    ("tier3", "⚠️ Warn 3"),
    ("detained", "🔒 DETENIDO"),
    ("unverified", "❌ No Verificado"),
    ("verified", "✅ Verificado"),
    ("security", "👮 SEGURIDAD PÚBLICA"),
];

/// A memory directory with one scope seeded with [`DEFAULT_CAPABILITIES`].
pub struct ScopeFixture {
    pub directory: Arc<MemoryDirectory>,
    pub scope: ScopeId,
}

impl ScopeFixture {
    pub fn new(scope: &str) -> Self {
        let directory = Arc::new(MemoryDirectory::new());
        let scope = ScopeId::from(scope);
        for (id, name) in DEFAULT_CAPABILITIES {
            directory.add_capability(scope.clone(), Capability::new(*id, *name));
        }
        Self { directory, scope }
    }

    /// Add a member holding nothing.
    pub fn add_member(&self, subject: &str) -> Member {
        let member = Member::new(subject, self.scope.clone());
        self.directory.add_member(member.clone());
        member
    }

    /// Add a member holding the security capability.
    pub fn add_officer(&self, subject: &str) -> Member {
        let member = Member::new(subject, self.scope.clone()).with_capability("security");
        self.directory.add_member(member.clone());
        member
    }

    /// Whether `subject` holds the capability with `id`.
    pub fn holds(&self, subject: &str, id: &str) -> bool {
        self.directory
            .holds(&self.scope, &SubjectId::from(subject), &CapabilityId::from(id))
    }

    /// Which of the three tier capabilities `subject` holds.
    pub fn tiers_held(&self, subject: &str) -> Vec<CapabilityId> {
        self.directory
            .capabilities_of(&self.scope, &SubjectId::from(subject))
            .into_iter()
            .filter(|c| c.as_str().starts_with("tier"))
            .collect()
    }
}

/// Several scopes sharing one directory, each seeded like [`ScopeFixture`].
pub fn multi_scope_directory(scopes: &[&str]) -> Arc<MemoryDirectory> {
    let directory = Arc::new(MemoryDirectory::new());
    for scope in scopes {
        for (id, name) in DEFAULT_CAPABILITIES {
            directory.add_capability(*scope, Capability::new(*id, *name));
        }
    }
    directory
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_seeds_capabilities() {
        let fixture = ScopeFixture::new("guild");
        fixture.add_officer("cop");
        fixture.add_member("civ");

        assert!(fixture.holds("cop", "security"));
        assert!(!fixture.holds("civ", "security"));
        assert!(fixture.tiers_held("civ").is_empty());
    }
}
