//! Linking members to external profiles.
//!
//! New members get the unverified capability. Verifying looks the username up
//! on the external service, stores the link, and swaps unverified for
//! verified. Each external name may be linked to one member.

use std::sync::Arc;
use std::time::Duration;

use warden_core::{Capability, Clock, Member, ScopeId, SubjectId, Timestamp};
use warden_directory::{DirectoryClient, DirectoryError, ExternalProfile, IdentityResolver};
use warden_store::{IdentityLink, IdentityLinkStore, LinkOutcome};

use crate::catalog::{CapabilityCatalog, WellKnown};
use crate::error::{Result, WardenError};

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 20;

/// Check a username before it is sent anywhere.
pub fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) {
        return Err(WardenError::InvalidUsername("must be 3 to 20 characters"));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(WardenError::InvalidUsername(
            "only letters, digits and underscores are allowed",
        ));
    }
    Ok(())
}

/// A successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub profile: ExternalProfile,
    /// The verified capability, if the scope has one.
    pub verified_capability: Option<Capability>,
    /// Capability swaps that failed. The link is stored regardless.
    pub directory_failures: Vec<DirectoryError>,
}

/// A member's stored link with the profile looked up again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedProfile {
    pub link: IdentityLink,
    pub profile: ExternalProfile,
}

impl LinkedProfile {
    /// How long the external account has existed, if the service says.
    pub fn account_age(&self, now: Timestamp) -> Option<Duration> {
        self.profile.created_at.map(|created| now.duration_since(created))
    }
}

/// Links members to external accounts and keeps their verification
/// capabilities in step.
pub struct VerificationService<S: ?Sized, D: ?Sized, R: ?Sized> {
    store: Arc<S>,
    directory: Arc<D>,
    resolver: Arc<R>,
    catalog: Arc<CapabilityCatalog>,
    clock: Arc<dyn Clock>,
}

impl<S, D, R> VerificationService<S, D, R>
where
    S: IdentityLinkStore + ?Sized,
    D: DirectoryClient + ?Sized,
    R: IdentityResolver + ?Sized,
{
    pub fn new(
        store: Arc<S>,
        directory: Arc<D>,
        resolver: Arc<R>,
        catalog: Arc<CapabilityCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            directory,
            resolver,
            catalog,
            clock,
        }
    }

    /// Give a newly joined member the unverified capability.
    ///
    /// Bots and scopes without the capability are skipped. Returns whether
    /// the capability was granted.
    pub async fn on_member_join(&self, member: &Member) -> Result<bool> {
        if member.is_bot {
            return Ok(false);
        }
        let Some(unverified) = self
            .catalog
            .resolve(&*self.directory, &member.scope, WellKnown::Unverified)
            .await?
        else {
            tracing::debug!(scope = %member.scope, "no unverified capability in scope");
            return Ok(false);
        };
        self.directory.grant_capability(member, &unverified).await?;
        tracing::info!(subject = %member.tag, scope = %member.scope, "new member marked unverified");
        Ok(true)
    }

    /// Link `subject` to the external account `username`.
    pub async fn verify(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        username: &str,
    ) -> Result<Verified> {
        validate_username(username)?;

        let member = self
            .directory
            .resolve_member(subject, scope)
            .await?
            .ok_or_else(|| WardenError::MemberNotFound {
                subject: subject.clone(),
                scope: scope.clone(),
            })?;

        if self.store.find_link_by_name(username).await?.is_some() {
            return Err(WardenError::AlreadyLinked {
                name: username.to_string(),
            });
        }

        let profile = self
            .resolver
            .resolve(username)
            .await?
            .ok_or_else(|| WardenError::ProfileNotFound(username.to_string()))?;

        // The canonical name may differ from what was typed only in case, so
        // this is also where a concurrent verification of the same name loses.
        match self
            .store
            .link_identity(subject, &profile.name, self.clock.now())
            .await?
        {
            LinkOutcome::Linked => {}
            LinkOutcome::NameTaken { .. } => {
                return Err(WardenError::AlreadyLinked { name: profile.name });
            }
        }

        let mut directory_failures = Vec::new();
        let unverified = self.resolve_or_record(scope, WellKnown::Unverified, &mut directory_failures).await;
        let verified = self.resolve_or_record(scope, WellKnown::Verified, &mut directory_failures).await;

        if let Some(unverified) = &unverified {
            if let Err(e) = self.directory.revoke_capability(&member, unverified).await {
                tracing::warn!(%subject, %scope, error = %e, "failed to remove unverified capability");
                directory_failures.push(e);
            }
        }
        if let Some(verified) = &verified {
            if let Err(e) = self.directory.grant_capability(&member, verified).await {
                tracing::warn!(%subject, %scope, error = %e, "failed to grant verified capability");
                directory_failures.push(e);
            }
        }

        // Display names are cosmetic; the directory may refuse for its owner.
        if let Err(e) = self.directory.set_display_name(&member, &profile.name).await {
            tracing::debug!(%subject, error = %e, "could not set display name");
        }

        tracing::info!(
            subject = %member.tag,
            profile = %profile.name,
            profile_id = profile.id,
            "member verified"
        );
        Ok(Verified {
            profile,
            verified_capability: verified,
            directory_failures,
        })
    }

    /// The external account `subject` is linked to, freshly resolved.
    ///
    /// # Errors
    ///
    /// [`WardenError::MemberNotFound`] if `subject` is not in `scope`,
    /// [`WardenError::NotVerified`] if they never linked an account, and
    /// [`WardenError::ProfileNotFound`] if the linked account no longer exists.
    pub async fn info(&self, scope: &ScopeId, subject: &SubjectId) -> Result<LinkedProfile> {
        if self.directory.resolve_member(subject, scope).await?.is_none() {
            return Err(WardenError::MemberNotFound {
                subject: subject.clone(),
                scope: scope.clone(),
            });
        }

        let link = self
            .store
            .find_link(subject)
            .await?
            .ok_or_else(|| WardenError::NotVerified(subject.clone()))?;

        let profile = self
            .resolver
            .resolve(&link.external_name)
            .await?
            .ok_or_else(|| WardenError::ProfileNotFound(link.external_name.clone()))?;

        tracing::debug!(%subject, profile = %profile.name, "linked profile looked up");
        Ok(LinkedProfile { link, profile })
    }

    async fn resolve_or_record(
        &self,
        scope: &ScopeId,
        kind: WellKnown,
        failures: &mut Vec<DirectoryError>,
    ) -> Option<Capability> {
        match self.catalog.resolve(&*self.directory, scope, kind).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(%scope, capability = %kind, error = %e, "capability lookup failed");
                failures.push(e);
                None
            }
        }
    }
}
