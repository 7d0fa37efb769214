//! Proptest generators for property-based testing.

use std::time::Duration;

use proptest::prelude::*;

use warden_core::SubjectId;

/// Generate a snowflake-style subject id.
pub fn subject_id() -> impl Strategy<Value = SubjectId> {
    "[1-9][0-9]{16,18}".prop_map(SubjectId::from)
}

/// Generate a grant duration of one minute to one week, in whole minutes.
pub fn grant_duration() -> impl Strategy<Value = Duration> {
    (1u64..=7 * 24 * 60).prop_map(|minutes| Duration::from_secs(minutes * 60))
}

/// Generate a valid external username.
pub fn username() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_]{3,20}".prop_map(String::from)
}

/// Generate a number of warns to issue.
pub fn warn_count() -> impl Strategy<Value = u64> {
    1u64..=8
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn usernames_stay_in_bounds(name in username()) {
            prop_assert!((3..=20).contains(&name.len()));
        }

        #[test]
        fn durations_are_whole_minutes(d in grant_duration()) {
            prop_assert!(d >= Duration::from_secs(60));
            prop_assert_eq!(d.as_secs() % 60, 0);
        }
    }
}
