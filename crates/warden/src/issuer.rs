//! Issuing temporary grants.

use std::sync::Arc;
use std::time::Duration;

use warden_core::{Capability, CapabilitySelector, Clock, GrantId, Member, ScopeId, SubjectId, Timestamp};
use warden_directory::DirectoryClient;
use warden_store::GrantStore;

use crate::catalog::{CapabilityCatalog, WellKnown};
use crate::error::{Result, WardenError};

/// A grant that is live in the directory and recorded for expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedGrant {
    pub grant_id: GrantId,
    pub member: Member,
    pub capability: Capability,
    pub expires_at: Timestamp,
}

/// Grants capabilities that the reconciler later takes back.
pub struct GrantIssuer<S: ?Sized, D: ?Sized> {
    store: Arc<S>,
    directory: Arc<D>,
    catalog: Arc<CapabilityCatalog>,
    clock: Arc<dyn Clock>,
}

impl<S, D> GrantIssuer<S, D>
where
    S: GrantStore + ?Sized,
    D: DirectoryClient + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        directory: Arc<D>,
        catalog: Arc<CapabilityCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            directory,
            catalog,
            clock,
        }
    }

    /// Grant the capability matching `selector` to `subject` for `duration`.
    ///
    /// The capability is granted live first and then recorded. Re-issuing
    /// replaces the previous expiry. If recording fails after the live grant
    /// the error is returned: the capability stays on the member until someone
    /// removes it or issues it again.
    pub async fn issue(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        selector: &CapabilitySelector,
        duration: Duration,
    ) -> Result<IssuedGrant> {
        if duration.is_zero() {
            return Err(WardenError::InvalidDuration(duration));
        }
        let capability = self
            .directory
            .resolve_capability(scope, selector)
            .await?
            .ok_or_else(|| WardenError::CapabilityMissing {
                capability: describe(selector),
                scope: scope.clone(),
            })?;
        self.issue_resolved(scope, subject, capability, duration).await
    }

    /// Detain `subject` on behalf of `actor`, who must hold the security
    /// capability.
    pub async fn detain(
        &self,
        scope: &ScopeId,
        actor: &SubjectId,
        subject: &SubjectId,
        duration: Duration,
    ) -> Result<IssuedGrant> {
        if duration.is_zero() {
            return Err(WardenError::InvalidDuration(duration));
        }
        let security = self
            .catalog
            .resolve(&*self.directory, scope, WellKnown::Security)
            .await?;
        let authorized = match security {
            Some(security) => self
                .directory
                .resolve_member(actor, scope)
                .await?
                .map(|m| m.holds(&security.id))
                .unwrap_or(false),
            None => false,
        };
        if !authorized {
            tracing::info!(%actor, %scope, "detain refused: actor lacks security capability");
            return Err(WardenError::NotAuthorized(format!(
                "{} may not detain members",
                actor
            )));
        }

        let detained = self
            .catalog
            .resolve(&*self.directory, scope, WellKnown::Detained)
            .await?
            .ok_or_else(|| WardenError::missing(WellKnown::Detained, scope))?;
        self.issue_resolved(scope, subject, detained, duration).await
    }

    async fn issue_resolved(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        capability: Capability,
        duration: Duration,
    ) -> Result<IssuedGrant> {
        let member = self
            .directory
            .resolve_member(subject, scope)
            .await?
            .ok_or_else(|| WardenError::MemberNotFound {
                subject: subject.clone(),
                scope: scope.clone(),
            })?;
        let expires_at = self.clock.now().checked_add(duration)?;

        self.directory.grant_capability(&member, &capability).await?;
        let grant_id = match self
            .store
            .upsert_grant(subject, &capability.id, expires_at)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(
                    %subject,
                    capability = %capability.id,
                    error = %e,
                    "capability granted but expiry not recorded"
                );
                return Err(e.into());
            }
        };

        tracing::info!(
            %grant_id,
            subject = %member.tag,
            capability = %capability.name,
            %expires_at,
            "temporary capability granted"
        );
        Ok(IssuedGrant {
            grant_id,
            member,
            capability,
            expires_at,
        })
    }
}

fn describe(selector: &CapabilitySelector) -> String {
    match selector {
        CapabilitySelector::Id { id } => id.to_string(),
        CapabilitySelector::NameContains { needle, .. } => needle.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::CapabilityId;
    use warden_directory::{DirectoryError, MemoryDirectory, Operation};
    use warden_store::{MemoryStore, StoreError};
    use warden_testkit::{BrokenStore, ManualClock};

    const MINUTE: Duration = Duration::from_secs(60);

    fn directory() -> Arc<MemoryDirectory> {
        let directory = Arc::new(MemoryDirectory::new());
        directory.add_capability("g", Capability::new("det", "🔒 DETENIDO"));
        directory.add_capability("g", Capability::new("sec", "👮 SEGURIDAD PÚBLICA"));
        directory.add_capability("g", Capability::new("vip", "VIP"));
        directory.add_member(Member::new("officer", "g").with_capability("sec"));
        directory.add_member(Member::new("civilian", "g"));
        directory.add_member(Member::new("target", "g"));
        directory
    }

    fn issuer<S: GrantStore>(
        store: Arc<S>,
        directory: Arc<MemoryDirectory>,
    ) -> GrantIssuer<S, MemoryDirectory> {
        let clock = Arc::new(ManualClock::new(Timestamp::from_millis(1_000)));
        GrantIssuer::new(store, directory, Arc::new(CapabilityCatalog::default()), clock)
    }

    #[tokio::test]
    async fn test_issue_grants_and_records() {
        let store = Arc::new(MemoryStore::new());
        let directory = directory();
        let issuer = issuer(store.clone(), directory.clone());

        let issued = issuer
            .issue(&"g".into(), &"target".into(), &CapabilitySelector::id("vip"), 5 * MINUTE)
            .await
            .unwrap();

        assert_eq!(issued.expires_at, Timestamp::from_millis(301_000));
        assert!(directory.holds(&"g".into(), &"target".into(), &"vip".into()));
        let stored = store
            .get_grant(&"target".into(), &"vip".into())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.id, issued.grant_id);
        assert_eq!(stored.expires_at, issued.expires_at);
    }

    #[tokio::test]
    async fn test_reissue_replaces_expiry() {
        let store = Arc::new(MemoryStore::new());
        let issuer = issuer(store.clone(), directory());
        let selector = CapabilitySelector::id("vip");

        issuer.issue(&"g".into(), &"target".into(), &selector, 60 * MINUTE).await.unwrap();
        let second = issuer.issue(&"g".into(), &"target".into(), &selector, MINUTE).await.unwrap();

        let grants = store.list_grants(&"target".into()).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].expires_at, second.expires_at);
    }

    #[tokio::test]
    async fn test_issue_rejects_bad_requests() {
        let store = Arc::new(MemoryStore::new());
        let issuer = issuer(store.clone(), directory());
        let vip = CapabilitySelector::id("vip");

        let err = issuer
            .issue(&"g".into(), &"target".into(), &vip, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::InvalidDuration(_)));

        let err = issuer.issue(&"g".into(), &"nobody".into(), &vip, MINUTE).await.unwrap_err();
        assert!(matches!(err, WardenError::MemberNotFound { .. }));

        let err = issuer
            .issue(&"g".into(), &"target".into(), &CapabilitySelector::id("gone"), MINUTE)
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::CapabilityMissing { .. }));

        assert_eq!(store.grant_count(), 0);
    }

    #[tokio::test]
    async fn test_directory_failure_records_nothing() {
        let store = Arc::new(MemoryStore::new());
        let directory = directory();
        directory.fail(Operation::Grant, DirectoryError::PermissionDenied("hierarchy".into()));
        let issuer = issuer(store.clone(), directory);

        let err = issuer
            .issue(&"g".into(), &"target".into(), &CapabilitySelector::id("vip"), MINUTE)
            .await
            .unwrap_err();

        assert!(matches!(err, WardenError::Directory(DirectoryError::PermissionDenied(_))));
        assert_eq!(store.grant_count(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_after_grant_is_surfaced() {
        let directory = directory();
        let issuer = issuer(Arc::new(BrokenStore::new()), directory.clone());

        let err = issuer
            .issue(&"g".into(), &"target".into(), &CapabilitySelector::id("vip"), MINUTE)
            .await
            .unwrap_err();

        assert!(matches!(err, WardenError::Store(StoreError::Unavailable(_))));
        assert!(err.is_internal());
        assert!(directory.holds(&"g".into(), &"target".into(), &"vip".into()));
    }

    #[tokio::test]
    async fn test_detain_requires_security() {
        let store = Arc::new(MemoryStore::new());
        let directory = directory();
        let issuer = issuer(store.clone(), directory.clone());

        let err = issuer
            .detain(&"g".into(), &"civilian".into(), &"target".into(), MINUTE)
            .await
            .unwrap_err();
        assert!(matches!(err, WardenError::NotAuthorized(_)));
        assert!(!directory.holds(&"g".into(), &"target".into(), &"det".into()));

        let issued = issuer
            .detain(&"g".into(), &"officer".into(), &"target".into(), MINUTE)
            .await
            .unwrap();
        assert_eq!(issued.capability.id, CapabilityId::from("det"));
        assert!(directory.holds(&"g".into(), &"target".into(), &"det".into()));
        assert_eq!(store.grant_count(), 1);
    }

    #[tokio::test]
    async fn test_detain_without_detained_role() {
        let directory = directory();
        directory.remove_capability(&"g".into(), &"det".into());
        let issuer = issuer(Arc::new(MemoryStore::new()), directory);

        let err = issuer
            .detain(&"g".into(), &"officer".into(), &"target".into(), MINUTE)
            .await
            .unwrap_err();

        match err {
            WardenError::CapabilityMissing { capability, .. } => assert_eq!(capability, "detained"),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
