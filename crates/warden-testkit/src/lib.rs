//! # Warden Testkit
//!
//! Testing utilities for Warden.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Clocks**: [`ManualClock`], a clock tests move by hand
//! - **Failing backends**: [`BrokenStore`], a store whose every call fails
//! - **Fixtures**: a directory seeded with the usual role names
//! - **Generators**: Proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! ```rust
//! use warden_testkit::fixtures::ScopeFixture;
//!
//! let fixture = ScopeFixture::new("guild");
//! let member = fixture.add_member("1234");
//! assert!(fixture.directory.member(&fixture.scope, &member.subject_id).is_some());
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use warden_testkit::generators::subject_id;
//!
//! proptest! {
//!     #[test]
//!     fn subject_ids_display_as_given(id in subject_id()) {
//!         prop_assert_eq!(id.to_string(), id.as_str());
//!     }
//! }
//! ```

pub mod broken;
pub mod clock;
pub mod fixtures;
pub mod generators;

pub use broken::BrokenStore;
pub use clock::ManualClock;
pub use fixtures::ScopeFixture;
