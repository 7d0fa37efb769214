//! Per-call deadlines for a directory client.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use warden_core::{Capability, CapabilitySelector, Member, ScopeId, SubjectId};

use crate::client::DirectoryClient;
use crate::error::{DirectoryError, Result};

/// Wraps a [`DirectoryClient`] so that every call fails with
/// [`DirectoryError::Timeout`] instead of hanging past `timeout`.
///
/// Batch revokes inherit the default per-capability loop, so each removal in a
/// batch gets its own deadline.
pub struct TimeoutDirectory<D> {
    inner: D,
    timeout: Duration,
}

impl<D: DirectoryClient> TimeoutDirectory<D> {
    pub fn new(inner: D, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// The wrapped client.
    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(operation, timeout = ?self.timeout, "directory call timed out");
                Err(DirectoryError::Timeout {
                    operation,
                    after: self.timeout,
                })
            }
        }
    }
}

#[async_trait]
impl<D: DirectoryClient> DirectoryClient for TimeoutDirectory<D> {
    async fn scopes(&self) -> Result<Vec<ScopeId>> {
        self.bounded("scopes", self.inner.scopes()).await
    }

    async fn resolve_member(&self, subject: &SubjectId, scope: &ScopeId) -> Result<Option<Member>> {
        self.bounded("resolve_member", self.inner.resolve_member(subject, scope))
            .await
    }

    async fn resolve_capability(
        &self,
        scope: &ScopeId,
        selector: &CapabilitySelector,
    ) -> Result<Option<Capability>> {
        self.bounded(
            "resolve_capability",
            self.inner.resolve_capability(scope, selector),
        )
        .await
    }

    async fn grant_capability(&self, member: &Member, capability: &Capability) -> Result<()> {
        self.bounded(
            "grant_capability",
            self.inner.grant_capability(member, capability),
        )
        .await
    }

    async fn revoke_capability(&self, member: &Member, capability: &Capability) -> Result<()> {
        self.bounded(
            "revoke_capability",
            self.inner.revoke_capability(member, capability),
        )
        .await
    }

    async fn set_display_name(&self, member: &Member, name: &str) -> Result<()> {
        self.bounded("set_display_name", self.inner.set_display_name(member, name))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDirectory, Operation};

    fn seeded() -> MemoryDirectory {
        let directory = MemoryDirectory::new();
        directory.add_capability("g", Capability::new("r1", "Detained"));
        directory.add_member(Member::new("u1", "g"));
        directory
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let directory = seeded();
        directory.set_latency(Duration::from_secs(30));
        let directory = TimeoutDirectory::new(directory, Duration::from_secs(5));

        let err = directory
            .resolve_member(&"u1".into(), &"g".into())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DirectoryError::Timeout {
                operation: "resolve_member",
                after: Duration::from_secs(5),
            }
        );
        assert!(err.is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_call_passes_through() {
        let directory = seeded();
        directory.set_latency(Duration::from_millis(100));
        let directory = TimeoutDirectory::new(directory, Duration::from_secs(5));

        let member = directory
            .resolve_member(&"u1".into(), &"g".into())
            .await
            .unwrap();
        assert!(member.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_revoke_times_each_call() {
        let directory = seeded();
        directory.add_capability("g", Capability::new("r2", "Other"));
        directory.set_latency(Duration::from_secs(30));
        let directory = TimeoutDirectory::new(directory, Duration::from_secs(1));

        let member = Member::new("u1", "g");
        let report = directory
            .revoke_capabilities(
                &member,
                &[Capability::new("r1", "Detained"), Capability::new("r2", "Other")],
            )
            .await;

        assert!(report.revoked.is_empty());
        assert_eq!(report.failed.len(), 2);
        assert_eq!(directory.inner().count(Operation::Revoke), 0);
    }
}
