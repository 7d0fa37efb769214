//! Capabilities (directory roles) and how to find them.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::types::CapabilityId;

/// A capability as observed in the live directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Capability {
    /// Stable identifier.
    pub id: CapabilityId,
    /// Display name at the time it was observed. Not authoritative.
    pub name: String,
}

impl Capability {
    /// Build a capability from an id and its current display name.
    pub fn new(id: impl Into<CapabilityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// How a capability is located inside a scope.
///
/// `Id` is the stable form. `NameContains` reproduces the legacy display-name
/// lookup (case-insensitive substring, with an optional excluded substring so
/// that "verified" does not also match "not verified").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CapabilitySelector {
    /// Match exactly one capability identifier.
    Id {
        id: CapabilityId,
    },
    /// Match by display name.
    NameContains {
        #[serde(rename = "name_contains")]
        needle: String,
        #[serde(rename = "name_excludes", default)]
        exclude: Option<String>,
    },
}

impl CapabilitySelector {
    /// Select by identifier.
    pub fn id(id: impl Into<CapabilityId>) -> Self {
        Self::Id { id: id.into() }
    }

    /// Select by case-insensitive name substring.
    pub fn name_contains(needle: impl Into<String>) -> Self {
        Self::NameContains {
            needle: needle.into(),
            exclude: None,
        }
    }

    /// Add an excluded substring to a name selector. No-op for `Id`.
    pub fn excluding(self, exclude: impl Into<String>) -> Self {
        match self {
            Self::NameContains { needle, .. } => Self::NameContains {
                needle,
                exclude: Some(exclude.into()),
            },
            other => other,
        }
    }

    /// Whether the capability `(id, name)` is selected.
    pub fn matches(&self, id: &CapabilityId, name: &str) -> bool {
        match self {
            Self::Id { id: wanted } => wanted == id,
            Self::NameContains { needle, exclude } => {
                let name = name.to_lowercase();
                if !name.contains(&needle.to_lowercase()) {
                    return false;
                }
                match exclude {
                    Some(exclude) => !name.contains(&exclude.to_lowercase()),
                    None => true,
                }
            }
        }
    }

    /// Convenience for matching an observed capability.
    pub fn matches_capability(&self, capability: &Capability) -> bool {
        self.matches(&capability.id, &capability.name)
    }

    /// Reject selectors that would match every capability.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Id { id } if id.as_str().is_empty() => {
                Err(CoreError::InvalidSelector("empty capability id".into()))
            }
            Self::NameContains { needle, .. } if needle.trim().is_empty() => {
                Err(CoreError::InvalidSelector("empty name needle".into()))
            }
            Self::NameContains {
                exclude: Some(exclude),
                ..
            } if exclude.trim().is_empty() => {
                Err(CoreError::InvalidSelector("empty name exclusion".into()))
            }
            _ => Ok(()),
        }
    }
}

impl From<CapabilityId> for CapabilitySelector {
    fn from(id: CapabilityId) -> Self {
        Self::Id { id }
    }
}
