//! A store that is always down.

use async_trait::async_trait;
use warden_core::{CapabilityId, GrantId, SanctionRecord, SubjectId, TemporaryGrant, Timestamp};
use warden_store::{
    GrantStore, IdentityLink, IdentityLinkStore, LinkOutcome, Result, SanctionStore, StoreError,
};

/// Every call fails with [`StoreError::Unavailable`].
#[derive(Debug, Default, Clone, Copy)]
pub struct BrokenStore;

impl BrokenStore {
    pub fn new() -> Self {
        Self
    }
}

fn down<T>() -> Result<T> {
    Err(StoreError::Unavailable("store is down".into()))
}

#[async_trait]
impl GrantStore for BrokenStore {
    async fn upsert_grant(
        &self,
        _subject: &SubjectId,
        _capability: &CapabilityId,
        _expires_at: Timestamp,
    ) -> Result<GrantId> {
        down()
    }

    async fn list_expired(&self, _now: Timestamp) -> Result<Vec<TemporaryGrant>> {
        down()
    }

    async fn delete_grant(&self, _id: GrantId) -> Result<()> {
        down()
    }

    async fn get_grant(
        &self,
        _subject: &SubjectId,
        _capability: &CapabilityId,
    ) -> Result<Option<TemporaryGrant>> {
        down()
    }

    async fn list_grants(&self, _subject: &SubjectId) -> Result<Vec<TemporaryGrant>> {
        down()
    }
}

#[async_trait]
impl SanctionStore for BrokenStore {
    async fn increment_warn(&self, _subject: &SubjectId, _at: Timestamp) -> Result<u64> {
        down()
    }

    async fn get_sanction(&self, _subject: &SubjectId) -> Result<Option<SanctionRecord>> {
        down()
    }
}

#[async_trait]
impl IdentityLinkStore for BrokenStore {
    async fn link_identity(
        &self,
        _subject: &SubjectId,
        _external_name: &str,
        _at: Timestamp,
    ) -> Result<LinkOutcome> {
        down()
    }

    async fn find_link(&self, _subject: &SubjectId) -> Result<Option<IdentityLink>> {
        down()
    }

    async fn find_link_by_name(&self, _external_name: &str) -> Result<Option<IdentityLink>> {
        down()
    }
}
