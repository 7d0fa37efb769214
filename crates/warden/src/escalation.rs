//! Warn-tier escalation.
//!
//! Each warn increments the subject's counter and swaps their tier
//! capability: every tier capability is removed, then the one for the new
//! tier is granted. The counter is the record of sanction history; directory
//! failures after the increment are reported but never roll it back.

use std::sync::Arc;

use warden_core::{Capability, Clock, Member, ScopeId, SubjectId, Tier};
use warden_directory::{DirectoryClient, DirectoryError};
use warden_store::SanctionStore;

use crate::catalog::{CapabilityCatalog, WellKnown};
use crate::error::Result;

/// What a warn did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarnOutcome {
    pub subject: SubjectId,
    /// The stored count after this warn.
    pub count: u64,
    pub tier: Tier,
    /// The tier capability now held, if it was applied.
    pub applied: Option<Capability>,
    /// Whether the subject was found in the scope.
    pub member_present: bool,
    /// Directory calls that failed while swapping capabilities.
    pub directory_failures: Vec<DirectoryError>,
}

impl WarnOutcome {
    /// The live directory reflects the new tier.
    pub fn fully_applied(&self) -> bool {
        self.member_present && self.applied.is_some() && self.directory_failures.is_empty()
    }
}

/// Drives the `None → Tier1 → Tier2 → Tier3` ladder.
pub struct EscalationEngine<S: ?Sized, D: ?Sized> {
    store: Arc<S>,
    directory: Arc<D>,
    catalog: Arc<CapabilityCatalog>,
    clock: Arc<dyn Clock>,
}

impl<S, D> EscalationEngine<S, D>
where
    S: SanctionStore + ?Sized,
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

    /// Record one warn against `subject` in `scope`.
    ///
    /// # Errors
    ///
    /// Only a storage failure is an error, and it happens before any
    /// directory call. Directory trouble is returned in the outcome.
    pub async fn record_warn(&self, scope: &ScopeId, subject: &SubjectId) -> Result<WarnOutcome> {
        let count = self
            .store
            .increment_warn(subject, self.clock.now())
            .await?;
        let tier = Tier::for_count(count);

        tracing::info!(%subject, %scope, count, %tier, "warn recorded");

        let mut outcome = WarnOutcome {
            subject: subject.clone(),
            count,
            tier,
            applied: None,
            member_present: false,
            directory_failures: Vec::new(),
        };

        let member = match self.directory.resolve_member(subject, scope).await {
            Ok(Some(member)) => member,
            Ok(None) => {
                tracing::info!(%subject, %scope, "warned subject is not a member; counter only");
                return Ok(outcome);
            }
            Err(e) => {
                tracing::warn!(%subject, %scope, error = %e, "member lookup failed; counter only");
                outcome.directory_failures.push(e);
                return Ok(outcome);
            }
        };
        outcome.member_present = true;

        self.swap_tier(&member, tier, &mut outcome).await;
        Ok(outcome)
    }

    async fn swap_tier(&self, member: &Member, tier: Tier, outcome: &mut WarnOutcome) {
        let scope = &member.scope;

        let mut ladder: Vec<(Tier, Capability)> = Vec::with_capacity(3);
        let mut lookup_failed = false;
        for rung in Tier::ladder() {
            let Some(kind) = WellKnown::for_tier(rung) else {
                continue;
            };
            match self.catalog.resolve(&*self.directory, scope, kind).await {
                Ok(Some(capability)) => ladder.push((rung, capability)),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(%scope, capability = %kind, error = %e, "tier capability lookup failed");
                    outcome.directory_failures.push(e);
                    lookup_failed = true;
                }
            }
        }

        let held: Vec<Capability> = ladder.iter().map(|(_, c)| c.clone()).collect();
        let batch = self.directory.revoke_capabilities(member, &held).await;
        let revoke_failed = !batch.is_complete();
        for (capability, e) in batch.failed {
            tracing::warn!(
                subject = %member.subject_id,
                %capability,
                error = %e,
                "failed to remove tier capability"
            );
            outcome.directory_failures.push(e);
        }

        let Some((_, target)) = ladder.into_iter().find(|(rung, _)| *rung == tier) else {
            tracing::debug!(subject = %member.subject_id, %tier, "no capability for tier in scope");
            return;
        };

        // Granting on top of a tier we failed to remove (or could not even
        // look up) would leave two tiers held at once.
        if revoke_failed || lookup_failed {
            tracing::warn!(
                subject = %member.subject_id,
                %tier,
                "skipping tier grant because an old tier could not be removed"
            );
            return;
        }

        match self.directory.grant_capability(member, &target).await {
            Ok(()) => outcome.applied = Some(target),
            Err(e) => {
                tracing::warn!(
                    subject = %member.subject_id,
                    capability = %target.id,
                    error = %e,
                    "failed to grant tier capability"
                );
                outcome.directory_failures.push(e);
            }
        }
    }
}
