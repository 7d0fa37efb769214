//! Strong type definitions for Warden.
//!
//! External identifiers are opaque strings (the directory hands out
//! snowflakes, but nothing here interprets them). Each kind gets its own
//! newtype so a role id can never be passed where a member id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{CoreError, Result};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        ///
        /// `From<&str>` and `From<String>` are unchecked and meant for ids
        /// already known to be valid. Outside input goes through
        /// [`new`](Self::new), as deserialization does.
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier, rejecting empty strings.
            pub fn new(value: impl Into<String>) -> Result<Self> {
                let value = value.into();
                if value.is_empty() {
                    return Err(CoreError::EmptyIdentifier($label));
                }
                Ok(Self(value))
            }

            /// Get the raw identifier.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let raw = String::deserialize(deserializer)?;
                Self::new(raw).map_err(serde::de::Error::custom)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// A member of the external directory.
    SubjectId,
    "subject"
);

string_id!(
    /// A role in the external directory.
    CapabilityId,
    "capability"
);

string_id!(
    /// A community (guild) inside the external directory.
    ScopeId,
    "scope"
);

/// Storage surrogate key for a temporary grant row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GrantId(pub i64);

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Absolute point in time, in Unix milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// The Unix epoch.
    pub const EPOCH: Self = Self(0);

    /// Wrap a Unix millisecond value.
    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    /// Unix milliseconds.
    pub const fn as_millis(&self) -> i64 {
        self.0
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self(ms)
    }

    /// Add a duration, failing instead of wrapping.
    pub fn checked_add(self, delta: Duration) -> Result<Self> {
        let overflow = CoreError::TimestampOverflow {
            base: self.0,
            delta_ms: delta.as_millis(),
        };
        let delta_ms = i64::try_from(delta.as_millis()).map_err(|_| overflow.clone())?;
        self.0.checked_add(delta_ms).map(Self).ok_or(overflow)
    }

    /// Add a duration, clamping at the maximum timestamp.
    pub fn saturating_add(self, delta: Duration) -> Self {
        let delta_ms = i64::try_from(delta.as_millis()).unwrap_or(i64::MAX);
        Self(self.0.saturating_add(delta_ms))
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is in the future.
    pub fn duration_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0).max(0) as u64)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Source of the current time.
///
/// The reconciler and the command paths read time through this trait so tests
/// can move time forward without sleeping.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_identifier_rejected() {
        assert_eq!(
            SubjectId::new(""),
            Err(CoreError::EmptyIdentifier("subject"))
        );
        assert_eq!(CapabilityId::new("123").unwrap().as_str(), "123");
    }

    #[test]
    fn test_identifier_debug_and_display() {
        let id = ScopeId::from("guild-1");
        assert_eq!(format!("{}", id), "guild-1");
        assert_eq!(format!("{:?}", id), "ScopeId(guild-1)");
    }

    #[test]
    fn test_timestamp_add() {
        let t0 = Timestamp::from_millis(1_000);
        let t1 = t0.checked_add(Duration::from_secs(60)).unwrap();
        assert_eq!(t1.as_millis(), 61_000);
        assert_eq!(t1.duration_since(t0), Duration::from_secs(60));
        assert_eq!(t0.duration_since(t1), Duration::ZERO);
    }

    #[test]
    fn test_timestamp_overflow() {
        let t = Timestamp::from_millis(i64::MAX - 10);
        assert!(matches!(
            t.checked_add(Duration::from_secs(1)),
            Err(CoreError::TimestampOverflow { .. })
        ));
        assert_eq!(
            t.saturating_add(Duration::from_secs(1)).as_millis(),
            i64::MAX
        );
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
        assert!(a > Timestamp::EPOCH);
    }
}
