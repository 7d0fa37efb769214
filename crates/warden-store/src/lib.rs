//! # Warden Store
//!
//! Persistence for Warden. Provides trait-based interfaces for temporary
//! grants, warn counters, and identity links, with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`GrantStore`] - Time-bounded capability grants
//! - [`SanctionStore`] - Per-subject warn counters
//! - [`IdentityLinkStore`] - Subject to external profile links
//! - [`SqliteStore`] - SQLite-based persistent storage (implements all three)
//! - [`MemoryStore`] - In-memory storage for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use warden_core::{SubjectId, CapabilityId, Timestamp};
//! use warden_store::{GrantStore, SanctionStore, SqliteStore};
//!
//! async fn example() -> warden_store::Result<()> {
//!     let store = SqliteStore::open("warden.db")?;
//!
//!     let subject = SubjectId::from("1234");
//!     let role = CapabilityId::from("5678");
//!     let expires = Timestamp::now().saturating_add(Duration::from_secs(600));
//!     store.upsert_grant(&subject, &role, expires).await?;
//!
//!     let count = store.increment_warn(&subject, Timestamp::now()).await?;
//!     assert!(count >= 1);
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Replace on re-issue**: `upsert_grant` keeps one row per
//!   `(subject, capability)`; the new row gets a fresh id.
//! - **Ids are never reused**: the reconciler deletes by id, so a row swept in
//!   one tick can never alias a grant issued afterwards.
//! - **Atomic increments**: `increment_warn` is a single increment-or-insert.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{GrantStore, IdentityLink, IdentityLinkStore, LinkOutcome, SanctionStore};
