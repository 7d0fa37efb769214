//! Well-known capabilities and how they are found in each scope.

use std::fmt;

use warden_core::{Capability, CapabilitySelector, ScopeId, Tier};
use warden_directory::{DirectoryClient, Result};

use crate::config::CapabilityConfig;

/// Capabilities Warden itself depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnown {
    Tier1,
    Tier2,
    Tier3,
    Detained,
    Unverified,
    Verified,
    /// Members allowed to detain.
    Security,
}

impl WellKnown {
    /// The capability carried by a tier. `None` for [`Tier::None`].
    pub fn for_tier(tier: Tier) -> Option<Self> {
        match tier {
            Tier::None => None,
            Tier::Tier1 => Some(Self::Tier1),
            Tier::Tier2 => Some(Self::Tier2),
            Tier::Tier3 => Some(Self::Tier3),
        }
    }
}

impl fmt::Display for WellKnown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tier1 => "warn tier 1",
            Self::Tier2 => "warn tier 2",
            Self::Tier3 => "warn tier 3",
            Self::Detained => "detained",
            Self::Unverified => "unverified",
            Self::Verified => "verified",
            Self::Security => "security",
        })
    }
}

/// Selectors for every [`WellKnown`] capability.
///
/// Nothing is cached: each call asks the directory, so renamed or deleted
/// roles are picked up on the next command.
#[derive(Debug, Clone)]
pub struct CapabilityCatalog {
    config: CapabilityConfig,
}

impl CapabilityCatalog {
    pub fn new(config: CapabilityConfig) -> Self {
        Self { config }
    }

    pub fn selector(&self, kind: WellKnown) -> &CapabilitySelector {
        match kind {
            WellKnown::Tier1 => &self.config.tier1,
            WellKnown::Tier2 => &self.config.tier2,
            WellKnown::Tier3 => &self.config.tier3,
            WellKnown::Detained => &self.config.detained,
            WellKnown::Unverified => &self.config.unverified,
            WellKnown::Verified => &self.config.verified,
            WellKnown::Security => &self.config.security,
        }
    }

    /// Look up `kind` in `scope`. `Ok(None)` if the scope has no such role.
    pub async fn resolve<D>(
        &self,
        directory: &D,
        scope: &ScopeId,
        kind: WellKnown,
    ) -> Result<Option<Capability>>
    where
        D: DirectoryClient + ?Sized,
    {
        let found = directory
            .resolve_capability(scope, self.selector(kind))
            .await?;
        if found.is_none() {
            tracing::debug!(%scope, capability = %kind, "well-known capability not present");
        }
        Ok(found)
    }
}

impl Default for CapabilityCatalog {
    fn default() -> Self {
        Self::new(CapabilityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::CapabilityId;
    use warden_directory::MemoryDirectory;

    fn directory() -> MemoryDirectory {
        let directory = MemoryDirectory::new();
        for (id, name) in [
            ("w1", "⚠️ WARN 1"),
            ("w2", "⚠️ WARN 2"),
            ("w3", "⚠️ WARN 3"),
            ("det", "🔒 DETENIDO"),
            ("nv", "❌ NO VERIFICADO"),
            ("v", "✅ VERIFICADO"),
            ("sec", "👮 SEGURIDAD PÚBLICA"),
        ] {
            directory.add_capability("g", Capability::new(id, name));
        }
        directory
    }

    #[tokio::test]
    async fn test_default_names_resolve() {
        let directory = directory();
        let catalog = CapabilityCatalog::default();
        let scope = ScopeId::from("g");

        let expect = [
            (WellKnown::Tier1, "w1"),
            (WellKnown::Tier2, "w2"),
            (WellKnown::Tier3, "w3"),
            (WellKnown::Detained, "det"),
            (WellKnown::Unverified, "nv"),
            (WellKnown::Verified, "v"),
            (WellKnown::Security, "sec"),
        ];
        for (kind, id) in expect {
            let found = catalog.resolve(&directory, &scope, kind).await.unwrap();
            assert_eq!(found.map(|c| c.id), Some(CapabilityId::from(id)), "{}", kind);
        }
    }

    #[tokio::test]
    async fn test_id_selector_survives_rename() {
        let directory = directory();
        directory.add_capability("g", Capability::new("det", "Jail"));

        let mut config = CapabilityConfig::default();
        config.detained = CapabilitySelector::id("det");
        let catalog = CapabilityCatalog::new(config);

        let found = catalog
            .resolve(&directory, &"g".into(), WellKnown::Detained)
            .await
            .unwrap();
        assert_eq!(found.unwrap().name, "Jail");
    }

    #[tokio::test]
    async fn test_missing_capability_is_none() {
        let directory = MemoryDirectory::new();
        directory.add_scope("empty");
        let found = CapabilityCatalog::default()
            .resolve(&directory, &"empty".into(), WellKnown::Tier2)
            .await
            .unwrap();
        assert!(found.is_none());
    }
}
