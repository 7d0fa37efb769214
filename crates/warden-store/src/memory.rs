//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use warden_core::{CapabilityId, GrantId, SanctionRecord, SubjectId, TemporaryGrant, Timestamp};

use crate::error::{Result, StoreError};
use crate::traits::{
    normalize_name, GrantStore, IdentityLink, IdentityLinkStore, LinkOutcome, SanctionStore,
};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; every
/// operation completes under a single lock acquisition, so upserts and
/// increments are atomic.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Grants indexed by id.
    grants: BTreeMap<GrantId, TemporaryGrant>,

    /// Identity key index: (subject, capability) -> grant id.
    by_key: HashMap<(SubjectId, CapabilityId), GrantId>,

    /// Last id handed out. Never decreases.
    last_id: i64,

    /// Warn counters.
    sanctions: HashMap<SubjectId, SanctionRecord>,

    /// Identity links by subject.
    links: HashMap<SubjectId, IdentityLink>,

    /// Name index: normalized external name -> subject.
    names: HashMap<String, SubjectId>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Number of grant rows currently stored.
    pub fn grant_count(&self) -> usize {
        self.inner.read().map(|inner| inner.grants.len()).unwrap_or(0)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn upsert_grant(
        &self,
        subject: &SubjectId,
        capability: &CapabilityId,
        expires_at: Timestamp,
    ) -> Result<GrantId> {
        let mut inner = self.write()?;
        let key = (subject.clone(), capability.clone());

        if let Some(old) = inner.by_key.remove(&key) {
            inner.grants.remove(&old);
        }

        inner.last_id += 1;
        let id = GrantId(inner.last_id);
        inner.grants.insert(
            id,
            TemporaryGrant {
                id,
                subject_id: subject.clone(),
                capability_id: capability.clone(),
                expires_at,
            },
        );
        inner.by_key.insert(key, id);

        Ok(id)
    }

    async fn list_expired(&self, now: Timestamp) -> Result<Vec<TemporaryGrant>> {
        let inner = self.read()?;
        Ok(inner
            .grants
            .values()
            .filter(|g| g.is_expired(now))
            .cloned()
            .collect())
    }

    async fn delete_grant(&self, id: GrantId) -> Result<()> {
        let mut inner = self.write()?;
        if let Some(grant) = inner.grants.remove(&id) {
            let key = (grant.subject_id, grant.capability_id);
            if inner.by_key.get(&key) == Some(&id) {
                inner.by_key.remove(&key);
            }
        }
        Ok(())
    }

    async fn get_grant(
        &self,
        subject: &SubjectId,
        capability: &CapabilityId,
    ) -> Result<Option<TemporaryGrant>> {
        let inner = self.read()?;
        Ok(inner
            .by_key
            .get(&(subject.clone(), capability.clone()))
            .and_then(|id| inner.grants.get(id))
            .cloned())
    }

    async fn list_grants(&self, subject: &SubjectId) -> Result<Vec<TemporaryGrant>> {
        let inner = self.read()?;
        let mut grants: Vec<TemporaryGrant> = inner
            .grants
            .values()
            .filter(|g| &g.subject_id == subject)
            .cloned()
            .collect();
        grants.sort_by_key(|g| (g.expires_at, g.id));
        Ok(grants)
    }
}

#[async_trait]
impl SanctionStore for MemoryStore {
    async fn increment_warn(&self, subject: &SubjectId, at: Timestamp) -> Result<u64> {
        let mut inner = self.write()?;
        let record = inner
            .sanctions
            .entry(subject.clone())
            .or_insert_with(|| SanctionRecord {
                subject_id: subject.clone(),
                warn_count: 0,
                last_warn_at: at,
            });
        record.warn_count += 1;
        record.last_warn_at = at;
        Ok(record.warn_count)
    }

    async fn get_sanction(&self, subject: &SubjectId) -> Result<Option<SanctionRecord>> {
        Ok(self.read()?.sanctions.get(subject).cloned())
    }
}

#[async_trait]
impl IdentityLinkStore for MemoryStore {
    async fn link_identity(
        &self,
        subject: &SubjectId,
        external_name: &str,
        at: Timestamp,
    ) -> Result<LinkOutcome> {
        let mut inner = self.write()?;
        let name = normalize_name(external_name);

        if let Some(holder) = inner.names.get(&name) {
            return Ok(LinkOutcome::NameTaken { by: holder.clone() });
        }

        let link = IdentityLink {
            subject_id: subject.clone(),
            external_name: name.clone(),
            linked_at: at,
        };
        if let Some(previous) = inner.links.insert(subject.clone(), link) {
            inner.names.remove(&previous.external_name);
        }
        inner.names.insert(name, subject.clone());

        Ok(LinkOutcome::Linked)
    }

    async fn find_link(&self, subject: &SubjectId) -> Result<Option<IdentityLink>> {
        Ok(self.read()?.links.get(subject).cloned())
    }

    async fn find_link_by_name(&self, external_name: &str) -> Result<Option<IdentityLink>> {
        let inner = self.read()?;
        Ok(inner
            .names
            .get(&normalize_name(external_name))
            .and_then(|subject| inner.links.get(subject))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn ts(ms: i64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[tokio::test]
    async fn test_memory_upsert_replaces() {
        let store = MemoryStore::new();
        let subject = SubjectId::from("u1");
        let role = CapabilityId::from("r1");

        store.upsert_grant(&subject, &role, ts(1_000)).await.unwrap();
        let second = store.upsert_grant(&subject, &role, ts(2_000)).await.unwrap();

        assert_eq!(store.grant_count(), 1);
        let grant = store.get_grant(&subject, &role).await.unwrap().unwrap();
        assert_eq!(grant.id, second);
        assert_eq!(grant.expires_at, ts(2_000));
    }

    #[tokio::test]
    async fn test_memory_stale_delete_keeps_reissued_grant() {
        let store = MemoryStore::new();
        let subject = SubjectId::from("u1");
        let role = CapabilityId::from("r1");

        let swept = store.upsert_grant(&subject, &role, ts(1)).await.unwrap();
        store.upsert_grant(&subject, &role, ts(50)).await.unwrap();
        store.delete_grant(swept).await.unwrap();

        assert!(store.get_grant(&subject, &role).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_concurrent_increments() {
        let store = Arc::new(MemoryStore::new());
        let subject = SubjectId::from("busy");

        let tasks: Vec<_> = (0..64)
            .map(|i| {
                let store = Arc::clone(&store);
                let subject = subject.clone();
                tokio::spawn(async move { store.increment_warn(&subject, ts(i)).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let record = store.get_sanction(&subject).await.unwrap().unwrap();
        assert_eq!(record.warn_count, 64);
    }

    #[tokio::test]
    async fn test_memory_identity_links() {
        let store = MemoryStore::new();
        let alice = SubjectId::from("alice");

        store.link_identity(&alice, "old", ts(1)).await.unwrap();
        store.link_identity(&alice, "New", ts(2)).await.unwrap();

        assert!(store.find_link_by_name("old").await.unwrap().is_none());
        assert_eq!(
            store.link_identity(&"bob".into(), "new", ts(3)).await.unwrap(),
            LinkOutcome::NameTaken { by: alice }
        );
    }

    proptest! {
        #[test]
        fn list_expired_matches_filter(
            expiries in prop::collection::vec(0i64..1_000, 0..40),
            now in 0i64..1_000,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryStore::new();
                for (i, expiry) in expiries.iter().enumerate() {
                    let subject = SubjectId::from(format!("s{}", i));
                    store.upsert_grant(&subject, &"r".into(), ts(*expiry)).await.unwrap();
                }

                let expired: HashSet<SubjectId> = store
                    .list_expired(ts(now))
                    .await
                    .unwrap()
                    .into_iter()
                    .map(|g| g.subject_id)
                    .collect();
                let wanted: HashSet<SubjectId> = expiries
                    .iter()
                    .enumerate()
                    .filter(|(_, e)| **e <= now)
                    .map(|(i, _)| SubjectId::from(format!("s{}", i)))
                    .collect();

                assert_eq!(expired, wanted);
            });
        }
    }
}
