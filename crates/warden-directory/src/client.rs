//! The directory client trait.

use std::sync::Arc;

use async_trait::async_trait;
use warden_core::{Capability, CapabilityId, CapabilitySelector, Member, ScopeId, SubjectId};

use crate::error::{DirectoryError, Result};

/// Per-capability outcome of a best-effort batch revoke.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchRevoke {
    /// Capabilities the directory confirmed removing.
    pub revoked: Vec<CapabilityId>,
    /// Capabilities whose removal failed, with the reason.
    pub failed: Vec<(CapabilityId, DirectoryError)>,
}

impl BatchRevoke {
    /// Whether every capability in the batch was revoked.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Async interface to the live membership directory.
///
/// Implementations must be thread-safe (Send + Sync). Every method reports
/// failure through its return value; none of them may panic on a remote error.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Scopes this client can see.
    async fn scopes(&self) -> Result<Vec<ScopeId>>;

    /// Look up a member of `scope`. `Ok(None)` if they are not a member.
    async fn resolve_member(&self, subject: &SubjectId, scope: &ScopeId) -> Result<Option<Member>>;

    /// Find the first capability in `scope` matched by `selector`.
    async fn resolve_capability(
        &self,
        scope: &ScopeId,
        selector: &CapabilitySelector,
    ) -> Result<Option<Capability>>;

    /// Add a capability to a member.
    async fn grant_capability(&self, member: &Member, capability: &Capability) -> Result<()>;

    /// Remove a capability from a member. Removing one they do not hold
    /// succeeds.
    async fn revoke_capability(&self, member: &Member, capability: &Capability) -> Result<()>;

    /// Remove several capabilities, continuing past individual failures.
    async fn revoke_capabilities(&self, member: &Member, capabilities: &[Capability]) -> BatchRevoke {
        let mut report = BatchRevoke::default();
        for capability in capabilities {
            match self.revoke_capability(member, capability).await {
                Ok(()) => report.revoked.push(capability.id.clone()),
                Err(e) => report.failed.push((capability.id.clone(), e)),
            }
        }
        report
    }

    /// Change the member's display name in `member.scope`.
    async fn set_display_name(&self, member: &Member, name: &str) -> Result<()>;
}

#[async_trait]
impl<D: DirectoryClient + ?Sized> DirectoryClient for Arc<D> {
    async fn scopes(&self) -> Result<Vec<ScopeId>> {
        (**self).scopes().await
    }

    async fn resolve_member(&self, subject: &SubjectId, scope: &ScopeId) -> Result<Option<Member>> {
        (**self).resolve_member(subject, scope).await
    }

    async fn resolve_capability(
        &self,
        scope: &ScopeId,
        selector: &CapabilitySelector,
    ) -> Result<Option<Capability>> {
        (**self).resolve_capability(scope, selector).await
    }

    async fn grant_capability(&self, member: &Member, capability: &Capability) -> Result<()> {
        (**self).grant_capability(member, capability).await
    }

    async fn revoke_capability(&self, member: &Member, capability: &Capability) -> Result<()> {
        (**self).revoke_capability(member, capability).await
    }

    async fn revoke_capabilities(&self, member: &Member, capabilities: &[Capability]) -> BatchRevoke {
        (**self).revoke_capabilities(member, capabilities).await
    }

    async fn set_display_name(&self, member: &Member, name: &str) -> Result<()> {
        (**self).set_display_name(member, name).await
    }
}
