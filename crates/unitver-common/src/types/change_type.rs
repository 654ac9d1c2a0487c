use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::UnitverError;

/// Classification of a deploy, driving which version component is incremented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    Major,
    Minor,
    Patch,
}

impl ChangeType {
    /// Wire form (`major`, `minor`, `patch`)
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Major => "major",
            ChangeType::Minor => "minor",
            ChangeType::Patch => "patch",
        }
    }
}

impl std::str::FromStr for ChangeType {
    type Err = UnitverError;

    /// Exact, case-sensitive match on the wire form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "major" => Ok(ChangeType::Major),
            "minor" => Ok(ChangeType::Minor),
            "patch" => Ok(ChangeType::Patch),
            other => Err(UnitverError::InvalidChangeType(other.to_string())),
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ChangeType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ChangeType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
