//! SQLite schema versions.
//!
//! `schema_migrations` records every applied version. Opening a database
//! applies the versions it is missing inside one transaction and refuses a
//! database written by a newer build.

use rusqlite::Connection;
use warden_core::Timestamp;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to run on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current = schema_version(conn)?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database is at version {}, newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current == CURRENT_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for version in (current + 1)..=CURRENT_VERSION {
        match version {
            1 => create_v1(&tx)?,
            other => {
                return Err(StoreError::Migration(format!("no migration to version {}", other)))
            }
        }
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, Timestamp::now().as_millis()],
        )?;
        tracing::debug!(version, "schema migrated");
    }
    tx.commit()?;
    Ok(())
}

/// Highest applied version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> Result<u32> {
    let version = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;
    Ok(version)
}

/// Grants, warn counters, and identity links.
fn create_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- AUTOINCREMENT: ids of deleted rows are never handed out again
        CREATE TABLE temporary_grants (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subject_id TEXT NOT NULL,
            capability_id TEXT NOT NULL,
            expires_at INTEGER NOT NULL       -- Unix ms
        );

        CREATE TABLE sanction_records (
            subject_id TEXT PRIMARY KEY,
            warn_count INTEGER NOT NULL,
            last_warn_at INTEGER NOT NULL     -- Unix ms
        );

        CREATE TABLE identity_links (
            subject_id TEXT PRIMARY KEY,
            external_name TEXT NOT NULL UNIQUE,  -- lower-cased
            linked_at INTEGER NOT NULL
        );

        CREATE INDEX idx_temporary_grants_expires ON temporary_grants(expires_at);
        CREATE INDEX idx_temporary_grants_key ON temporary_grants(subject_id, capability_id);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table'")
            .unwrap();
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        names
    }

    #[test]
    fn test_fresh_database_gets_every_table() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert!(table_names(&conn).is_empty());

        migrate(&mut conn).unwrap();

        let names = table_names(&conn);
        for table in ["schema_migrations", "temporary_grants", "sanction_records", "identity_links"] {
            assert!(names.iter().any(|n| n == table), "missing {table}");
        }
        assert_eq!(schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_reopen_applies_nothing() {
        let mut conn = Connection::open_in_memory().unwrap();
        for _ in 0..3 {
            migrate(&mut conn).unwrap();
        }

        let applied: u32 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
