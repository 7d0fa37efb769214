//! # Warden
//!
//! Temporary capability grants and warn-tier escalation for community
//! directories.
//!
//! ## Overview
//!
//! Warden sits between a chat-style directory (scopes, members, and the
//! capabilities members hold) and a small persistent store. It provides:
//!
//! - **Temporary grants**: a capability is granted live and recorded with an
//!   expiry; a background reconciler takes it back once it expires
//! - **Escalation**: each warn bumps a persistent counter and moves the member
//!   up the `Tier1 → Tier2 → Tier3` ladder, holding at most one tier at a time
//! - **Verification**: members link an external account, which swaps their
//!   unverified capability for the verified one
//!
//! ## Key Concepts
//!
//! - **Store is the record**: the counter and the grant rows are authoritative.
//!   Directory failures are logged and reported, never rolled back into the
//!   store.
//! - **At-most-once revoke**: an expired row is deleted after one removal
//!   attempt, whether or not the removal worked.
//! - **Late lookup**: capabilities are found by selector on every command, so
//!   renamed or deleted roles are handled without restarts.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use warden::{Warden, WardenConfig};
//! use warden::directory::{MemoryDirectory, MemoryIdentityResolver};
//! use warden::core::{ScopeId, SubjectId};
//!
//! async fn example() -> warden::Result<()> {
//!     let config = WardenConfig::from_toml("reconcile_interval_secs = 30")?;
//!     let store = config.open_store()?;
//!     let warden = Warden::new(config, store, MemoryDirectory::new(), MemoryIdentityResolver::new())?;
//!
//!     let scheduler = warden.spawn_scheduler();
//!
//!     let scope = ScopeId::from("guild");
//!     let outcome = warden.record_warn(&scope, &SubjectId::from("1234")).await?;
//!     println!("now at {}", outcome.tier);
//!
//!     warden
//!         .detain(&scope, &SubjectId::from("officer"), &SubjectId::from("1234"), Duration::from_secs(300))
//!         .await?;
//!
//!     scheduler.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod escalation;
pub mod issuer;
pub mod reconciler;
pub mod scheduler;
pub mod verification;
mod warden;

// Re-export component crates
pub use warden_core as core;
pub use warden_directory as directory;
pub use warden_store as store;

pub use catalog::{CapabilityCatalog, WellKnown};
pub use config::{CapabilityConfig, ConfigError, WardenConfig};
pub use error::{Result, WardenError, GENERIC_FAILURE};
pub use escalation::{EscalationEngine, WarnOutcome};
pub use issuer::{GrantIssuer, IssuedGrant};
pub use reconciler::{GrantReconciler, ReconcileReport};
pub use scheduler::{Scheduler, SchedulerHandle, Tick};
pub use verification::{validate_username, LinkedProfile, VerificationService, Verified};
pub use warden::{BoundedDirectory, Warden};
