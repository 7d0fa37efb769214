//! The Warden: one handle over grants, escalation, verification, and expiry.

use std::sync::Arc;
use std::time::Duration;

use warden_core::{CapabilitySelector, Clock, Member, ScopeId, SubjectId, SystemClock};
use warden_directory::{DirectoryClient, IdentityResolver, TimeoutDirectory};
use warden_store::{GrantStore, IdentityLinkStore, SanctionStore};

use crate::catalog::CapabilityCatalog;
use crate::config::WardenConfig;
use crate::error::Result;
use crate::escalation::{EscalationEngine, WarnOutcome};
use crate::issuer::{GrantIssuer, IssuedGrant};
use crate::reconciler::{GrantReconciler, ReconcileReport};
use crate::scheduler::{Scheduler, SchedulerHandle};
use crate::verification::{LinkedProfile, VerificationService, Verified};

/// Every directory call made through a [`Warden`] is bounded by the
/// configured timeout.
pub type BoundedDirectory<D> = TimeoutDirectory<D>;

/// The main Warden struct.
///
/// Owns one store (used for grants, sanctions, and identity links), one
/// directory client, and one identity resolver, and shares them between the
/// services it exposes.
pub struct Warden<S, D, R> {
    config: WardenConfig,
    store: Arc<S>,
    directory: Arc<BoundedDirectory<D>>,
    escalation: EscalationEngine<S, BoundedDirectory<D>>,
    issuer: GrantIssuer<S, BoundedDirectory<D>>,
    verification: VerificationService<S, BoundedDirectory<D>, R>,
    reconciler: Arc<GrantReconciler<S, BoundedDirectory<D>>>,
}

impl<S, D, R> Warden<S, D, R>
where
    S: GrantStore + SanctionStore + IdentityLinkStore + 'static,
    D: DirectoryClient + 'static,
    R: IdentityResolver + 'static,
{
    /// Create a Warden running on the system clock.
    pub fn new(config: WardenConfig, store: S, directory: D, resolver: R) -> Result<Self> {
        Self::with_clock(config, store, directory, resolver, Arc::new(SystemClock))
    }

    /// Create a Warden with an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn with_clock(
        config: WardenConfig,
        store: S,
        directory: D,
        resolver: R,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(store);
        let directory = Arc::new(TimeoutDirectory::new(directory, config.directory_timeout()));
        let resolver = Arc::new(resolver);
        let catalog = Arc::new(CapabilityCatalog::new(config.capabilities.clone()));

        let escalation = EscalationEngine::new(
            store.clone(),
            directory.clone(),
            catalog.clone(),
            clock.clone(),
        );
        let issuer = GrantIssuer::new(store.clone(), directory.clone(), catalog.clone(), clock.clone());
        let verification = VerificationService::new(
            store.clone(),
            directory.clone(),
            resolver,
            catalog,
            clock.clone(),
        );
        let reconciler = Arc::new(GrantReconciler::new(store.clone(), directory.clone(), clock));

        Ok(Self {
            config,
            store,
            directory,
            escalation,
            issuer,
            verification,
            reconciler,
        })
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The wrapped directory client.
    pub fn directory(&self) -> &D {
        self.directory.inner()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Commands
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a warn against `subject` and move them up the tier ladder.
    pub async fn record_warn(&self, scope: &ScopeId, subject: &SubjectId) -> Result<WarnOutcome> {
        self.escalation.record_warn(scope, subject).await
    }

    /// Grant a capability that expires after `duration`.
    pub async fn issue_grant(
        &self,
        scope: &ScopeId,
        subject: &SubjectId,
        capability: &CapabilitySelector,
        duration: Duration,
    ) -> Result<IssuedGrant> {
        self.issuer.issue(scope, subject, capability, duration).await
    }

    /// Detain `subject` for `duration`. `actor` must hold the security
    /// capability.
    pub async fn detain(
        &self,
        scope: &ScopeId,
        actor: &SubjectId,
        subject: &SubjectId,
        duration: Duration,
    ) -> Result<IssuedGrant> {
        self.issuer.detain(scope, actor, subject, duration).await
    }

    /// Link `subject` to an external account.
    pub async fn verify(&self, scope: &ScopeId, subject: &SubjectId, username: &str) -> Result<Verified> {
        self.verification.verify(scope, subject, username).await
    }

    /// The external account `subject` is linked to.
    pub async fn info(&self, scope: &ScopeId, subject: &SubjectId) -> Result<LinkedProfile> {
        self.verification.info(scope, subject).await
    }

    /// Mark a newly joined member unverified.
    pub async fn on_member_join(&self, member: &Member) -> Result<bool> {
        self.verification.on_member_join(member).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expiry
    // ─────────────────────────────────────────────────────────────────────────

    /// Run one reconciliation pass now.
    pub async fn reconcile_now(&self) -> Result<ReconcileReport> {
        self.reconciler.run_once().await
    }

    /// Start reconciling every `reconcile_interval_secs` on the current
    /// runtime.
    pub fn spawn_scheduler(&self) -> SchedulerHandle {
        tracing::info!(
            period_secs = self.config.reconcile_interval_secs,
            "starting grant reconciler"
        );
        Scheduler::new(self.reconciler.clone(), self.config.reconcile_interval()).spawn()
    }
}
