//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend. It uses rusqlite with bundled SQLite,
//! wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use warden_core::{CapabilityId, GrantId, SanctionRecord, SubjectId, TemporaryGrant, Timestamp};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{
    normalize_name, GrantStore, IdentityLink, IdentityLinkStore, LinkOutcome, SanctionStore,
};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime. Cloning shares the connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::TaskJoin(e.to_string()))?
    }
}

/// Read an identifier column, rejecting empty values.
fn id_column<T>(
    row: &rusqlite::Row<'_>,
    column: &str,
    make: fn(String) -> warden_core::Result<T>,
) -> rusqlite::Result<T> {
    let idx = row.as_ref().column_index(column)?;
    make(row.get(idx)?).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_grant(row: &rusqlite::Row<'_>) -> rusqlite::Result<TemporaryGrant> {
    Ok(TemporaryGrant {
        id: GrantId(row.get("id")?),
        subject_id: id_column(row, "subject_id", |s| SubjectId::new(s))?,
        capability_id: id_column(row, "capability_id", |s| CapabilityId::new(s))?,
        expires_at: Timestamp::from_millis(row.get("expires_at")?),
    })
}

fn row_to_link(row: &rusqlite::Row<'_>) -> rusqlite::Result<IdentityLink> {
    Ok(IdentityLink {
        subject_id: id_column(row, "subject_id", |s| SubjectId::new(s))?,
        external_name: row.get("external_name")?,
        linked_at: Timestamp::from_millis(row.get("linked_at")?),
    })
}

fn count_from_sql(raw: i64) -> Result<u64> {
    u64::try_from(raw).map_err(|_| StoreError::InvalidData(format!("negative warn count {}", raw)))
}

#[async_trait]
impl GrantStore for SqliteStore {
    async fn upsert_grant(
        &self,
        subject: &SubjectId,
        capability: &CapabilityId,
        expires_at: Timestamp,
    ) -> Result<GrantId> {
        let subject = subject.clone();
        let capability = capability.clone();

        self.blocking(move |conn| {
            // Delete and insert commit together, so readers never observe the
            // key with no row.
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM temporary_grants WHERE subject_id = ?1 AND capability_id = ?2",
                params![subject.as_str(), capability.as_str()],
            )?;
            tx.execute(
                "INSERT INTO temporary_grants (subject_id, capability_id, expires_at)
                 VALUES (?1, ?2, ?3)",
                params![subject.as_str(), capability.as_str(), expires_at.as_millis()],
            )?;
            let id = GrantId(tx.last_insert_rowid());
            tx.commit()?;
            Ok(id)
        })
        .await
    }

    async fn list_expired(&self, now: Timestamp) -> Result<Vec<TemporaryGrant>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, subject_id, capability_id, expires_at
                 FROM temporary_grants WHERE expires_at <= ?1",
            )?;
            let grants = stmt
                .query_map(params![now.as_millis()], row_to_grant)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(grants)
        })
        .await
    }

    async fn delete_grant(&self, id: GrantId) -> Result<()> {
        self.blocking(move |conn| {
            conn.execute("DELETE FROM temporary_grants WHERE id = ?1", params![id.0])?;
            Ok(())
        })
        .await
    }

    async fn get_grant(
        &self,
        subject: &SubjectId,
        capability: &CapabilityId,
    ) -> Result<Option<TemporaryGrant>> {
        let subject = subject.clone();
        let capability = capability.clone();

        self.blocking(move |conn| {
            conn.query_row(
                "SELECT id, subject_id, capability_id, expires_at
                 FROM temporary_grants WHERE subject_id = ?1 AND capability_id = ?2
                 ORDER BY id DESC LIMIT 1",
                params![subject.as_str(), capability.as_str()],
                row_to_grant,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_grants(&self, subject: &SubjectId) -> Result<Vec<TemporaryGrant>> {
        let subject = subject.clone();

        self.blocking(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, subject_id, capability_id, expires_at
                 FROM temporary_grants WHERE subject_id = ?1
                 ORDER BY expires_at, id",
            )?;
            let grants = stmt
                .query_map(params![subject.as_str()], row_to_grant)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(grants)
        })
        .await
    }
}

#[async_trait]
impl SanctionStore for SqliteStore {
    async fn increment_warn(&self, subject: &SubjectId, at: Timestamp) -> Result<u64> {
        let subject = subject.clone();

        self.blocking(move |conn| {
            let count: i64 = conn.query_row(
                "INSERT INTO sanction_records (subject_id, warn_count, last_warn_at)
                 VALUES (?1, 1, ?2)
                 ON CONFLICT(subject_id) DO UPDATE SET
                     warn_count = warn_count + 1,
                     last_warn_at = excluded.last_warn_at
                 RETURNING warn_count",
                params![subject.as_str(), at.as_millis()],
                |row| row.get(0),
            )?;
            count_from_sql(count)
        })
        .await
    }

    async fn get_sanction(&self, subject: &SubjectId) -> Result<Option<SanctionRecord>> {
        let subject = subject.clone();

        self.blocking(move |conn| {
            let row: Option<(i64, i64)> = conn
                .query_row(
                    "SELECT warn_count, last_warn_at FROM sanction_records WHERE subject_id = ?1",
                    params![subject.as_str()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            row.map(|(count, last)| {
                Ok(SanctionRecord {
                    subject_id: subject.clone(),
                    warn_count: count_from_sql(count)?,
                    last_warn_at: Timestamp::from_millis(last),
                })
            })
            .transpose()
        })
        .await
    }
}

#[async_trait]
impl IdentityLinkStore for SqliteStore {
    async fn link_identity(
        &self,
        subject: &SubjectId,
        external_name: &str,
        at: Timestamp,
    ) -> Result<LinkOutcome> {
        let subject = subject.clone();
        let name = normalize_name(external_name);

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let holder: Option<String> = tx
                .query_row(
                    "SELECT subject_id FROM identity_links WHERE external_name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;

            if let Some(holder) = holder {
                let by = SubjectId::new(holder).map_err(|e| StoreError::InvalidData(e.to_string()))?;
                return Ok(LinkOutcome::NameTaken { by });
            }

            tx.execute(
                "INSERT INTO identity_links (subject_id, external_name, linked_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(subject_id) DO UPDATE SET
                     external_name = excluded.external_name,
                     linked_at = excluded.linked_at",
                params![subject.as_str(), name, at.as_millis()],
            )?;
            tx.commit()?;

            Ok(LinkOutcome::Linked)
        })
        .await
    }

    async fn find_link(&self, subject: &SubjectId) -> Result<Option<IdentityLink>> {
        let subject = subject.clone();

        self.blocking(move |conn| {
            conn.query_row(
                "SELECT subject_id, external_name, linked_at
                 FROM identity_links WHERE subject_id = ?1",
                params![subject.as_str()],
                row_to_link,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn find_link_by_name(&self, external_name: &str) -> Result<Option<IdentityLink>> {
        let name = normalize_name(external_name);

        self.blocking(move |conn| {
            conn.query_row(
                "SELECT subject_id, external_name, linked_at
                 FROM identity_links WHERE external_name = ?1",
                params![name],
                row_to_link,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn ts(ms: i64) -> Timestamp {
        Timestamp::from_millis(ms)
    }

    #[tokio::test]
    async fn test_upsert_and_get_grant() {
        let store = SqliteStore::open_memory().unwrap();
        let subject = SubjectId::from("u1");
        let role = CapabilityId::from("r1");

        let id = store.upsert_grant(&subject, &role, ts(5_000)).await.unwrap();

        let grant = store.get_grant(&subject, &role).await.unwrap().unwrap();
        assert_eq!(grant.id, id);
        assert_eq!(grant.expires_at, ts(5_000));
    }

    #[tokio::test]
    async fn test_upsert_replaces_expiry() {
        let store = SqliteStore::open_memory().unwrap();
        let subject = SubjectId::from("u1");
        let role = CapabilityId::from("r1");

        let first = store.upsert_grant(&subject, &role, ts(5_000)).await.unwrap();
        let second = store.upsert_grant(&subject, &role, ts(9_000)).await.unwrap();
        assert_ne!(first, second);

        let grants = store.list_grants(&subject).await.unwrap();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].id, second);
        assert_eq!(grants[0].expires_at, ts(9_000));
    }

    #[tokio::test]
    async fn test_upsert_keeps_other_keys() {
        let store = SqliteStore::open_memory().unwrap();
        let subject = SubjectId::from("u1");

        store.upsert_grant(&subject, &"r1".into(), ts(1)).await.unwrap();
        store.upsert_grant(&subject, &"r2".into(), ts(2)).await.unwrap();
        store.upsert_grant(&"u2".into(), &"r1".into(), ts(3)).await.unwrap();

        assert_eq!(store.list_grants(&subject).await.unwrap().len(), 2);
        assert_eq!(store.list_grants(&"u2".into()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_expired_boundary() {
        let store = SqliteStore::open_memory().unwrap();
        store.upsert_grant(&"a".into(), &"r".into(), ts(999)).await.unwrap();
        store.upsert_grant(&"b".into(), &"r".into(), ts(1_000)).await.unwrap();
        store.upsert_grant(&"c".into(), &"r".into(), ts(1_001)).await.unwrap();

        let expired: HashSet<String> = store
            .list_expired(ts(1_000))
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.subject_id.to_string())
            .collect();

        let wanted: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(expired, wanted);
    }

    #[tokio::test]
    async fn test_delete_grant_is_idempotent() {
        let store = SqliteStore::open_memory().unwrap();
        let id = store.upsert_grant(&"u".into(), &"r".into(), ts(1)).await.unwrap();

        store.delete_grant(id).await.unwrap();
        store.delete_grant(id).await.unwrap();
        store.delete_grant(GrantId(12_345)).await.unwrap();

        assert!(store.list_expired(ts(10)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ids_not_reused_after_delete() {
        let store = SqliteStore::open_memory().unwrap();
        let first = store.upsert_grant(&"u".into(), &"r".into(), ts(1)).await.unwrap();
        store.delete_grant(first).await.unwrap();

        let second = store.upsert_grant(&"u".into(), &"r".into(), ts(1)).await.unwrap();
        assert!(second > first);

        // A stale delete of the swept id leaves the re-issued grant alone
        store.delete_grant(first).await.unwrap();
        assert!(store.get_grant(&"u".into(), &"r".into()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_increment_warn() {
        let store = SqliteStore::open_memory().unwrap();
        let subject = SubjectId::from("u2");

        assert!(store.get_sanction(&subject).await.unwrap().is_none());
        assert_eq!(store.increment_warn(&subject, ts(10)).await.unwrap(), 1);
        assert_eq!(store.increment_warn(&subject, ts(20)).await.unwrap(), 2);
        assert_eq!(store.increment_warn(&subject, ts(30)).await.unwrap(), 3);
        assert_eq!(store.increment_warn(&subject, ts(40)).await.unwrap(), 4);

        let record = store.get_sanction(&subject).await.unwrap().unwrap();
        assert_eq!(record.warn_count, 4);
        assert_eq!(record.last_warn_at, ts(40));
    }

    #[tokio::test]
    async fn test_concurrent_increments_are_not_lost() {
        let store = SqliteStore::open_memory().unwrap();
        let subject = SubjectId::from("busy");

        let tasks: Vec<_> = (0..32)
            .map(|i| {
                let store = store.clone();
                let subject = subject.clone();
                tokio::spawn(async move { store.increment_warn(&subject, ts(i)).await })
            })
            .collect();

        let mut seen = HashSet::new();
        for task in tasks {
            seen.insert(task.await.unwrap().unwrap());
        }

        // Every caller observed a distinct count
        assert_eq!(seen.len(), 32);
        let record = store.get_sanction(&subject).await.unwrap().unwrap();
        assert_eq!(record.warn_count, 32);
    }

    #[tokio::test]
    async fn test_identity_links() {
        let store = SqliteStore::open_memory().unwrap();
        let alice = SubjectId::from("alice");
        let bob = SubjectId::from("bob");

        let outcome = store.link_identity(&alice, "Builder_99", ts(1)).await.unwrap();
        assert_eq!(outcome, LinkOutcome::Linked);

        let outcome = store.link_identity(&bob, "builder_99", ts(2)).await.unwrap();
        assert_eq!(outcome, LinkOutcome::NameTaken { by: alice.clone() });

        let link = store.find_link(&alice).await.unwrap().unwrap();
        assert_eq!(link.external_name, "builder_99");
        assert_eq!(
            store.find_link_by_name("BUILDER_99").await.unwrap().unwrap().subject_id,
            alice
        );
        assert!(store.find_link(&bob).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_relink_replaces_previous_name() {
        let store = SqliteStore::open_memory().unwrap();
        let alice = SubjectId::from("alice");

        store.link_identity(&alice, "first", ts(1)).await.unwrap();
        store.link_identity(&alice, "second", ts(2)).await.unwrap();

        assert_eq!(store.find_link(&alice).await.unwrap().unwrap().external_name, "second");
        assert!(store.find_link_by_name("first").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("warden.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.upsert_grant(&"u".into(), &"r".into(), ts(7)).await.unwrap();
            store.increment_warn(&"u".into(), ts(7)).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.list_expired(ts(7)).await.unwrap().len(), 1);
        assert_eq!(
            store.get_sanction(&"u".into()).await.unwrap().unwrap().warn_count,
            1
        );
    }

    #[tokio::test]
    async fn test_empty_identifier_row_is_invalid() {
        let store = SqliteStore::open_memory().unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute(
                "INSERT INTO temporary_grants (subject_id, capability_id, expires_at)
                 VALUES ('', 'r', 1)",
                [],
            )
            .unwrap();

        assert!(matches!(
            store.list_expired(ts(1)).await,
            Err(StoreError::Database(_))
        ));
    }
}
