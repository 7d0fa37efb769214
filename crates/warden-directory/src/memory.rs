//! A simple in-memory directory for testing.
//!
//! Holds scopes, members, and capabilities, journals every mutation it is
//! asked to perform, and can be told to fail specific operations or to answer
//! slowly.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use warden_core::{Capability, CapabilityId, CapabilitySelector, Member, ScopeId, SubjectId};

use crate::client::DirectoryClient;
use crate::error::{DirectoryError, Result};

/// Directory operations, for fault injection and journal queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Scopes,
    ResolveMember,
    ResolveCapability,
    Grant,
    Revoke,
    SetDisplayName,
}

/// A mutation that reached the directory (whether or not it then failed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    Grant {
        scope: ScopeId,
        subject: SubjectId,
        capability: CapabilityId,
    },
    Revoke {
        scope: ScopeId,
        subject: SubjectId,
        capability: CapabilityId,
    },
    SetDisplayName {
        scope: ScopeId,
        subject: SubjectId,
        name: String,
    },
}

impl DirectoryCall {
    fn operation(&self) -> Operation {
        match self {
            Self::Grant { .. } => Operation::Grant,
            Self::Revoke { .. } => Operation::Revoke,
            Self::SetDisplayName { .. } => Operation::SetDisplayName,
        }
    }
}

struct Fault {
    operation: Operation,
    /// Only fail calls touching this capability.
    capability: Option<CapabilityId>,
    error: DirectoryError,
}

#[derive(Default)]
struct ScopeState {
    /// In creation order; name lookups return the first match.
    capabilities: Vec<Capability>,
    members: BTreeMap<SubjectId, Member>,
}

#[derive(Default)]
struct Inner {
    scopes: BTreeMap<ScopeId, ScopeState>,
    journal: Vec<DirectoryCall>,
    faults: Vec<Fault>,
    latency: Option<Duration>,
    /// Overrides `latency` for one operation.
    operation_latency: HashMap<Operation, Duration>,
}

impl Inner {
    fn check_fault(&self, operation: Operation, capability: Option<&CapabilityId>) -> Result<()> {
        let fault = self.faults.iter().find(|f| {
            f.operation == operation
                && match (&f.capability, capability) {
                    (None, _) => true,
                    (Some(wanted), Some(actual)) => wanted == actual,
                    (Some(_), None) => false,
                }
        });
        match fault {
            Some(fault) => Err(fault.error.clone()),
            None => Ok(()),
        }
    }

    fn member_mut(&mut self, scope: &ScopeId, subject: &SubjectId) -> Result<&mut Member> {
        self.scopes
            .get_mut(scope)
            .and_then(|s| s.members.get_mut(subject))
            .ok_or_else(|| DirectoryError::Rejected(format!("unknown member {}", subject)))
    }

    fn has_capability(&self, scope: &ScopeId, capability: &CapabilityId) -> bool {
        self.scopes
            .get(scope)
            .map(|s| s.capabilities.iter().any(|c| &c.id == capability))
            .unwrap_or(false)
    }
}

/// In-memory [`DirectoryClient`].
#[derive(Default)]
pub struct MemoryDirectory {
    inner: Mutex<Inner>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock can only come from a test assertion;
        // the state is still consistent, so keep going.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register an empty scope.
    pub fn add_scope(&self, scope: impl Into<ScopeId>) {
        self.lock().scopes.entry(scope.into()).or_default();
    }

    /// Create a capability in a scope (creating the scope if needed).
    pub fn add_capability(&self, scope: impl Into<ScopeId>, capability: Capability) {
        let mut inner = self.lock();
        let state = inner.scopes.entry(scope.into()).or_default();
        state.capabilities.retain(|c| c.id != capability.id);
        state.capabilities.push(capability);
    }

    /// Delete a capability from a scope and from every member holding it.
    pub fn remove_capability(&self, scope: &ScopeId, capability: &CapabilityId) {
        let mut inner = self.lock();
        if let Some(state) = inner.scopes.get_mut(scope) {
            state.capabilities.retain(|c| &c.id != capability);
            for member in state.members.values_mut() {
                member.capabilities.retain(|c| c != capability);
            }
        }
    }

    /// Add a member to its scope (creating the scope if needed).
    pub fn add_member(&self, member: Member) {
        let mut inner = self.lock();
        let state = inner.scopes.entry(member.scope.clone()).or_default();
        state.members.insert(member.subject_id.clone(), member);
    }

    /// The member leaves the scope.
    pub fn remove_member(&self, scope: &ScopeId, subject: &SubjectId) {
        if let Some(state) = self.lock().scopes.get_mut(scope) {
            state.members.remove(subject);
        }
    }

    /// Current snapshot of a member.
    pub fn member(&self, scope: &ScopeId, subject: &SubjectId) -> Option<Member> {
        self.lock()
            .scopes
            .get(scope)
            .and_then(|s| s.members.get(subject))
            .cloned()
    }

    /// Capabilities a member currently holds (empty if not a member).
    pub fn capabilities_of(&self, scope: &ScopeId, subject: &SubjectId) -> Vec<CapabilityId> {
        self.member(scope, subject)
            .map(|m| m.capabilities)
            .unwrap_or_default()
    }

    /// Whether a member currently holds a capability.
    pub fn holds(&self, scope: &ScopeId, subject: &SubjectId, capability: &CapabilityId) -> bool {
        self.capabilities_of(scope, subject).contains(capability)
    }

    /// Every mutation attempted so far, in order.
    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.lock().journal.clone()
    }

    /// Number of attempted mutations of one kind.
    pub fn count(&self, operation: Operation) -> usize {
        self.lock()
            .journal
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    /// Forget the journal.
    pub fn clear_calls(&self) {
        self.lock().journal.clear();
    }

    /// Fail every call of `operation` with `error`.
    pub fn fail(&self, operation: Operation, error: DirectoryError) {
        self.lock().faults.push(Fault {
            operation,
            capability: None,
            error,
        });
    }

    /// Fail calls of `operation` that touch `capability`.
    pub fn fail_for(&self, operation: Operation, capability: impl Into<CapabilityId>, error: DirectoryError) {
        self.lock().faults.push(Fault {
            operation,
            capability: Some(capability.into()),
            error,
        });
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Delay calls of `operation` only.
    pub fn set_operation_latency(&self, operation: Operation, latency: Duration) {
        self.lock().operation_latency.insert(operation, latency);
    }

    async fn delay(&self, operation: Operation) {
        let latency = {
            let inner = self.lock();
            inner.operation_latency.get(&operation).copied().or(inner.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DirectoryClient for MemoryDirectory {
    async fn scopes(&self) -> Result<Vec<ScopeId>> {
        self.delay(Operation::Scopes).await;
        let inner = self.lock();
        inner.check_fault(Operation::Scopes, None)?;
        Ok(inner.scopes.keys().cloned().collect())
    }

    async fn resolve_member(&self, subject: &SubjectId, scope: &ScopeId) -> Result<Option<Member>> {
        self.delay(Operation::ResolveMember).await;
        let inner = self.lock();
        inner.check_fault(Operation::ResolveMember, None)?;
        Ok(inner
            .scopes
            .get(scope)
            .and_then(|s| s.members.get(subject))
            .cloned())
    }

    async fn resolve_capability(
        &self,
        scope: &ScopeId,
        selector: &CapabilitySelector,
    ) -> Result<Option<Capability>> {
        self.delay(Operation::ResolveCapability).await;
        let inner = self.lock();
        let found = inner.scopes.get(scope).and_then(|s| {
            s.capabilities
                .iter()
                .find(|c| selector.matches_capability(c))
                .cloned()
        });
        inner.check_fault(Operation::ResolveCapability, found.as_ref().map(|c| &c.id))?;
        Ok(found)
    }

    async fn grant_capability(&self, member: &Member, capability: &Capability) -> Result<()> {
        self.delay(Operation::Grant).await;
        let mut inner = self.lock();
        inner.journal.push(DirectoryCall::Grant {
            scope: member.scope.clone(),
            subject: member.subject_id.clone(),
            capability: capability.id.clone(),
        });
        inner.check_fault(Operation::Grant, Some(&capability.id))?;

        if !inner.has_capability(&member.scope, &capability.id) {
            return Err(DirectoryError::Rejected(format!(
                "unknown capability {}",
                capability.id
            )));
        }
        let live = inner.member_mut(&member.scope, &member.subject_id)?;
        if !live.holds(&capability.id) {
            live.capabilities.push(capability.id.clone());
        }
        Ok(())
    }

    async fn revoke_capability(&self, member: &Member, capability: &Capability) -> Result<()> {
        self.delay(Operation::Revoke).await;
        let mut inner = self.lock();
        inner.journal.push(DirectoryCall::Revoke {
            scope: member.scope.clone(),
            subject: member.subject_id.clone(),
            capability: capability.id.clone(),
        });
        inner.check_fault(Operation::Revoke, Some(&capability.id))?;

        let live = inner.member_mut(&member.scope, &member.subject_id)?;
        live.capabilities.retain(|c| c != &capability.id);
        Ok(())
    }

    async fn set_display_name(&self, member: &Member, name: &str) -> Result<()> {
        self.delay(Operation::SetDisplayName).await;
        let mut inner = self.lock();
        inner.journal.push(DirectoryCall::SetDisplayName {
            scope: member.scope.clone(),
            subject: member.subject_id.clone(),
            name: name.to_owned(),
        });
        inner.check_fault(Operation::SetDisplayName, None)?;

        let live = inner.member_mut(&member.scope, &member.subject_id)?;
        live.tag = name.to_owned();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ScopeId {
        ScopeId::from("g")
    }

    fn seeded() -> MemoryDirectory {
        let directory = MemoryDirectory::new();
        directory.add_capability("g", Capability::new("w1", "⚠️ WARN 1"));
        directory.add_capability("g", Capability::new("w2", "⚠️ WARN 2"));
        directory.add_member(Member::new("u1", "g").with_tag("user#0001"));
        directory
    }

    #[tokio::test]
    async fn test_resolve_member_and_capability() {
        let directory = seeded();

        let member = directory.resolve_member(&"u1".into(), &scope()).await.unwrap();
        assert_eq!(member.unwrap().tag, "user#0001");
        assert!(directory
            .resolve_member(&"ghost".into(), &scope())
            .await
            .unwrap()
            .is_none());

        let role = directory
            .resolve_capability(&scope(), &CapabilitySelector::name_contains("warn 2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(role.id, CapabilityId::from("w2"));
        assert!(directory
            .resolve_capability(&"other".into(), &CapabilitySelector::id("w2"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_grant_and_revoke() {
        let directory = seeded();
        let member = Member::new("u1", "g");
        let w1 = Capability::new("w1", "⚠️ WARN 1");

        directory.grant_capability(&member, &w1).await.unwrap();
        directory.grant_capability(&member, &w1).await.unwrap();
        assert_eq!(directory.capabilities_of(&scope(), &"u1".into()), vec![w1.id.clone()]);

        directory.revoke_capability(&member, &w1).await.unwrap();
        directory.revoke_capability(&member, &w1).await.unwrap();
        assert!(!directory.holds(&scope(), &"u1".into(), &w1.id));
        assert_eq!(directory.count(Operation::Grant), 2);
        assert_eq!(directory.count(Operation::Revoke), 2);
    }

    #[tokio::test]
    async fn test_grant_unknown_capability_rejected() {
        let directory = seeded();
        let err = directory
            .grant_capability(&Member::new("u1", "g"), &Capability::new("nope", "Nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_departed_member_rejected() {
        let directory = seeded();
        directory.remove_member(&scope(), &"u1".into());

        let err = directory
            .revoke_capability(&Member::new("u1", "g"), &Capability::new("w1", "w"))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectoryError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_fault_injection_per_capability() {
        let directory = seeded();
        directory.fail_for(
            Operation::Revoke,
            "w1",
            DirectoryError::PermissionDenied("hierarchy".into()),
        );
        let member = Member::new("u1", "g");

        let report = directory
            .revoke_capabilities(
                &member,
                &[Capability::new("w1", "a"), Capability::new("w2", "b")],
            )
            .await;

        assert_eq!(report.revoked, vec![CapabilityId::from("w2")]);
        assert_eq!(report.failed.len(), 1);
        assert!(!report.is_complete());
        // Both attempts reached the directory
        assert_eq!(directory.count(Operation::Revoke), 2);

        directory.clear_faults();
        assert!(directory
            .revoke_capabilities(&member, &[Capability::new("w1", "a")])
            .await
            .is_complete());
    }

    #[tokio::test]
    async fn test_removed_capability_disappears_from_members() {
        let directory = seeded();
        let member = Member::new("u1", "g");
        directory
            .grant_capability(&member, &Capability::new("w1", "a"))
            .await
            .unwrap();

        directory.remove_capability(&scope(), &"w1".into());

        assert!(directory.capabilities_of(&scope(), &"u1".into()).is_empty());
        assert!(directory
            .resolve_capability(&scope(), &CapabilitySelector::id("w1"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_lookup_fault_per_capability() {
        let directory = seeded();
        directory.fail_for(
            Operation::ResolveCapability,
            "w1",
            DirectoryError::Transport("reset".into()),
        );

        assert!(directory
            .resolve_capability(&scope(), &CapabilitySelector::name_contains("warn 1"))
            .await
            .is_err());
        assert!(directory
            .resolve_capability(&scope(), &CapabilitySelector::name_contains("warn 2"))
            .await
            .unwrap()
            .is_some());
    }
}
