//! # Warden Directory
//!
//! Boundary to the external membership directory and to the external
//! identity lookup.
//!
//! ## Overview
//!
//! The directory owns members and capabilities; Warden only observes and
//! mutates them through [`DirectoryClient`]. Every call may fail (permissions,
//! rate limits, network), and a missing member or capability is reported as
//! `Ok(None)` rather than an error, since members leave and roles get deleted
//! all the time.
//!
//! ## Key Types
//!
//! - [`DirectoryClient`] - Async trait over the live directory
//! - [`TimeoutDirectory`] - Bounds every call with a deadline
//! - [`MemoryDirectory`] - In-memory directory with fault injection, for tests
//! - [`IdentityResolver`] - External profile lookup by username
//!
//! ## Usage
//!
//! ```rust
//! use std::time::Duration;
//! use warden_core::{Capability, CapabilitySelector, Member, ScopeId};
//! use warden_directory::{DirectoryClient, MemoryDirectory, TimeoutDirectory};
//!
//! # async fn example() -> warden_directory::Result<()> {
//! let live = MemoryDirectory::new();
//! live.add_capability("guild", Capability::new("r1", "⚠️ WARN 1"));
//! live.add_member(Member::new("u1", "guild"));
//!
//! let directory = TimeoutDirectory::new(live, Duration::from_secs(10));
//! let scope = ScopeId::from("guild");
//! let role = directory
//!     .resolve_capability(&scope, &CapabilitySelector::name_contains("warn 1"))
//!     .await?;
//! assert!(role.is_some());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod identity;
pub mod memory;
pub mod timeout;

pub use client::{BatchRevoke, DirectoryClient};
pub use error::{DirectoryError, IdentityError, Result};
pub use identity::{ExternalProfile, IdentityResolver, MemoryIdentityResolver};
pub use memory::{DirectoryCall, MemoryDirectory, Operation};
pub use timeout::TimeoutDirectory;
