use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::ChangeType;
use crate::error::{Result, UnitverError};

/// A `MAJOR.MINOR.PATCH` version number
///
/// Ordering is lexicographic over `(major, minor, patch)`, which the derived
/// `Ord` provides through field declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SemanticVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SemanticVersion {
    /// Baseline a function unit starts from before its first deploy
    pub const ZERO: SemanticVersion = SemanticVersion::new(0, 0, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Parse a strict `MAJOR.MINOR.PATCH` string
    ///
    /// Exactly three dot-separated, non-empty runs of ASCII digits are
    /// accepted. Surrounding whitespace, signs, prefixes such as `v`,
    /// pre-release or build suffixes, and components that overflow `u32`
    /// are all rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use unitver_common::SemanticVersion;
    ///
    /// assert_eq!(
    ///     SemanticVersion::parse("2.10.0").unwrap(),
    ///     SemanticVersion::new(2, 10, 0)
    /// );
    /// assert!(SemanticVersion::parse("v1.0.0").is_err());
    /// assert!(SemanticVersion::parse("1.0.0-SNAPSHOT").is_err());
    /// ```
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || UnitverError::InvalidVersion(input.to_string());

        let mut parts = input.split('.');
        let mut next_component = || -> Result<u32> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };

        let major = next_component()?;
        let minor = next_component()?;
        let patch = next_component()?;

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self::new(major, minor, patch))
    }

    /// Validity predicate, consistent with [`SemanticVersion::parse`]
    pub fn is_valid(input: &str) -> bool {
        Self::parse(input).is_ok()
    }

    pub fn increment_major(self) -> Self {
        Self::new(self.major.saturating_add(1), 0, 0)
    }

    pub fn increment_minor(self) -> Self {
        Self::new(self.major, self.minor.saturating_add(1), 0)
    }

    pub fn increment_patch(self) -> Self {
        Self::new(self.major, self.minor, self.patch.saturating_add(1))
    }

    /// Next version for a deploy of the given change type
    pub fn bump(self, change: ChangeType) -> Self {
        match change {
            ChangeType::Major => self.increment_major(),
            ChangeType::Minor => self.increment_minor(),
            ChangeType::Patch => self.increment_patch(),
        }
    }
}

impl std::str::FromStr for SemanticVersion {
    type Err = UnitverError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
