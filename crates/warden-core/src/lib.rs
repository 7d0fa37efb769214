//! # Warden Core
//!
//! Pure types for Warden: subjects, capabilities, temporary grants, and the
//! warn-tier ladder.
//!
//! This crate contains no I/O, no storage, no networking. Everything that
//! talks to the database or the external directory lives in the crates
//! layered on top of it.
//!
//! ## Key Types
//!
//! - [`SubjectId`], [`CapabilityId`], [`ScopeId`] - External directory identifiers
//! - [`TemporaryGrant`] - "subject X holds capability Y until time T"
//! - [`SanctionRecord`] - Per-subject warn counter
//! - [`Tier`] - Warn tier derived from a warn count
//! - [`CapabilitySelector`] - How a capability is located in a scope
//! - [`Clock`] - Source of the current time, swappable in tests

pub mod capability;
pub mod error;
pub mod grant;
pub mod member;
pub mod sanction;
pub mod types;

pub use capability::{Capability, CapabilitySelector};
pub use error::{CoreError, Result};
pub use grant::TemporaryGrant;
pub use member::Member;
pub use sanction::{SanctionRecord, Tier};
pub use types::{CapabilityId, Clock, GrantId, ScopeId, SubjectId, SystemClock, Timestamp};
