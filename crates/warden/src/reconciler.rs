//! Expired-grant reconciliation.
//!
//! One pass reads every expired grant, asks the directory to remove the
//! capability in every visible scope, and then deletes the row whether or not
//! the removal worked. A failed removal is not retried: the row is gone after
//! the pass, which keeps each tick's work bounded by the number of expired
//! grants.

use std::sync::Arc;

use warden_core::{CapabilitySelector, Clock, ScopeId, TemporaryGrant, Timestamp};
use warden_directory::DirectoryClient;
use warden_store::GrantStore;

use crate::error::Result;

/// Tally of one reconciliation pass.
///
/// `revoked`, `already_satisfied`, `revoke_failures` and `lookup_failures` are
/// counted per grant and scope; the rest per grant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Expired rows found.
    pub expired: usize,
    /// Directory removals that succeeded.
    pub revoked: usize,
    /// Member or capability absent, nothing to remove.
    pub already_satisfied: usize,
    /// Directory removals that failed.
    pub revoke_failures: usize,
    /// Member or capability lookups that failed.
    pub lookup_failures: usize,
    /// Rows deleted.
    pub deleted: usize,
    /// Rows that could not be deleted (picked up again next pass).
    pub delete_failures: usize,
}

enum ScopeResult {
    Revoked,
    Absent,
    LookupFailed,
    RevokeFailed,
}

/// Sweeps expired grants out of the store and the directory.
pub struct GrantReconciler<S: ?Sized, D: ?Sized> {
    store: Arc<S>,
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
}

impl<S, D> GrantReconciler<S, D>
where
    S: GrantStore + ?Sized,
    D: DirectoryClient + ?Sized,
{
    pub fn new(store: Arc<S>, directory: Arc<D>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            directory,
            clock,
        }
    }

    /// Run one pass at the clock's current time.
    pub async fn run_once(&self) -> Result<ReconcileReport> {
        self.run_at(self.clock.now()).await
    }

    /// Run one pass treating `now` as the current time.
    ///
    /// # Errors
    ///
    /// Fails without deleting anything if the expired grants or the visible
    /// scopes cannot be listed. Failures on individual grants are counted in
    /// the report instead.
    pub async fn run_at(&self, now: Timestamp) -> Result<ReconcileReport> {
        let grants = self.store.list_expired(now).await?;
        let mut report = ReconcileReport {
            expired: grants.len(),
            ..Default::default()
        };
        if grants.is_empty() {
            return Ok(report);
        }

        let scopes = self.directory.scopes().await?;

        for grant in &grants {
            for scope in &scopes {
                match self.revoke_in_scope(grant, scope).await {
                    ScopeResult::Revoked => report.revoked += 1,
                    ScopeResult::Absent => report.already_satisfied += 1,
                    ScopeResult::LookupFailed => report.lookup_failures += 1,
                    ScopeResult::RevokeFailed => report.revoke_failures += 1,
                }
            }

            match self.store.delete_grant(grant.id).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    tracing::warn!(grant_id = %grant.id, error = %e, "failed to delete expired grant");
                    report.delete_failures += 1;
                }
            }
        }

        tracing::debug!(?report, "reconciliation pass finished");
        Ok(report)
    }

    async fn revoke_in_scope(&self, grant: &TemporaryGrant, scope: &ScopeId) -> ScopeResult {
        let subject = &grant.subject_id;
        let capability_id = &grant.capability_id;

        let member = match self.directory.resolve_member(subject, scope).await {
            Ok(Some(member)) => member,
            Ok(None) => return ScopeResult::Absent,
            Err(e) => {
                tracing::warn!(%subject, %scope, error = %e, "member lookup failed during reconcile");
                return ScopeResult::LookupFailed;
            }
        };

        let selector = CapabilitySelector::id(capability_id.clone());
        let capability = match self.directory.resolve_capability(scope, &selector).await {
            Ok(Some(capability)) => capability,
            Ok(None) => return ScopeResult::Absent,
            Err(e) => {
                tracing::warn!(capability = %capability_id, %scope, error = %e, "capability lookup failed during reconcile");
                return ScopeResult::LookupFailed;
            }
        };

        match self.directory.revoke_capability(&member, &capability).await {
            Ok(()) => {
                tracing::info!(
                    subject = %member.tag,
                    capability = %capability.name,
                    %scope,
                    "temporary capability expired and was removed"
                );
                ScopeResult::Revoked
            }
            Err(e) => {
                tracing::warn!(
                    %subject,
                    capability = %capability_id,
                    %scope,
                    error = %e,
                    "failed to remove expired capability; not retried"
                );
                ScopeResult::RevokeFailed
            }
        }
    }
}
