//! Warn counters and the tier ladder.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{SubjectId, Timestamp};

/// Per-subject warn counter.
///
/// `warn_count` only ever grows. The tier saturates at [`Tier::Tier3`] but the
/// counter keeps the full history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanctionRecord {
    pub subject_id: SubjectId,
    pub warn_count: u64,
    pub last_warn_at: Timestamp,
}

impl SanctionRecord {
    pub fn tier(&self) -> Tier {
        Tier::for_count(self.warn_count)
    }
}

/// Warn tier derived from a warn count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    None,
    Tier1,
    Tier2,
    Tier3,
}

impl Tier {
    /// `0 → None`, `1 → Tier1`, `2 → Tier2`, `>= 3 → Tier3`.
    pub const fn for_count(count: u64) -> Self {
        match count {
            0 => Tier::None,
            1 => Tier::Tier1,
            2 => Tier::Tier2,
            _ => Tier::Tier3,
        }
    }

    /// The tiers that carry a capability, lowest first.
    pub const fn ladder() -> [Tier; 3] {
        [Tier::Tier1, Tier::Tier2, Tier::Tier3]
    }

    /// Numeric level, `0..=3`.
    pub const fn level(self) -> u8 {
        match self {
            Tier::None => 0,
            Tier::Tier1 => 1,
            Tier::Tier2 => 2,
            Tier::Tier3 => 3,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::None => f.write_str("none"),
            tier => write!(f, "tier {}", tier.level()),
        }
    }
}
