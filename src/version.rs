//! Protocol versioning utilities

use semver::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MigrationError;

/// A protocol version.
///
/// Only the major component selects a migration slot; two versions with the
/// same major are interchangeable as far as the registries are concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProtocolVersion {
    version: Version,
}

/// First protocol version with the pre-`$ref` type system
pub const V0: ProtocolVersion = ProtocolVersion::new(0, 3, 0);

/// First protocol version with `WellKnownTypes.json` references
pub const V1: ProtocolVersion = ProtocolVersion::new(1, 0, 0);

/// Version assumed for connectors that never declare one
pub const DEFAULT_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::new(0, 2, 0);

impl ProtocolVersion {
    /// Create a version from its components
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            version: Version::new(major, minor, patch),
        }
    }

    /// Parse a version string.
    ///
    /// Accepts an optional leading `v` and the short forms `"1"` and `"1.2"`.
    pub fn parse(version_str: &str) -> Result<Self, semver::Error> {
        let trimmed = version_str.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let padded = match trimmed.matches('.').count() {
            0 => format!("{trimmed}.0.0"),
            1 => format!("{trimmed}.0"),
            _ => trimmed.to_string(),
        };
        let version = Version::parse(&padded)?;
        Ok(Self { version })
    }

    pub fn major(&self) -> u64 {
        self.version.major
    }

    pub fn minor(&self) -> u64 {
        self.version.minor
    }

    pub fn patch(&self) -> u64 {
        self.version.patch
    }

    /// Registry key for this version's migration slot
    pub fn major_key(&self) -> String {
        self.version.major.to_string()
    }

    /// Whether both versions occupy the same migration slot
    pub fn same_slot(&self, other: &ProtocolVersion) -> bool {
        self.version.major == other.version.major
    }

    /// Canonical `major.minor.patch` form
    pub fn version_string(&self) -> String {
        format!(
            "{}.{}.{}",
            self.version.major, self.version.minor, self.version.patch
        )
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version_string())
    }
}

impl FromStr for ProtocolVersion {
    type Err = MigrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s)?)
    }
}

impl TryFrom<String> for ProtocolVersion {
    type Error = semver::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProtocolVersion> for String {
    fn from(value: ProtocolVersion) -> Self {
        value.version_string()
    }
}

/// Inclusive range of protocol majors a platform accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolVersionRange {
    pub min: ProtocolVersion,
    pub max: ProtocolVersion,
}

impl ProtocolVersionRange {
    pub fn new(min: ProtocolVersion, max: ProtocolVersion) -> Self {
        Self { min, max }
    }

    /// Check whether a version falls inside the range (major only)
    pub fn is_supported(&self, version: &ProtocolVersion) -> bool {
        self.min.major() <= version.major() && version.major() <= self.max.major()
    }
}

impl fmt::Display for ProtocolVersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        let v = ProtocolVersion::parse("1.2.3").unwrap();
        assert_eq!(v.version_string(), "1.2.3");
        assert_eq!(v.major_key(), "1");
    }

    #[test]
    fn test_version_with_v_prefix() {
        let v = ProtocolVersion::parse("v0.3.0").unwrap();
        assert_eq!(v, V0);
    }

    #[test]
    fn test_short_forms() {
        assert_eq!(ProtocolVersion::parse("1").unwrap(), V1);
        assert_eq!(ProtocolVersion::parse("0.2").unwrap(), DEFAULT_PROTOCOL_VERSION);
        assert!(ProtocolVersion::parse("one").is_err());
    }

    #[test]
    fn test_same_slot_ignores_minor_and_patch() {
        let a = ProtocolVersion::parse("0.2.0").unwrap();
        assert!(a.same_slot(&V0));
        assert!(!a.same_slot(&V1));
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&V1).unwrap();
        assert_eq!(json, "\"1.0.0\"");
        let back: ProtocolVersion = serde_json::from_str("\"v0.3\"").unwrap();
        assert_eq!(back, V0);
    }

    #[test]
    fn test_range() {
        let range = ProtocolVersionRange::new(V0, V1);
        assert!(range.is_supported(&ProtocolVersion::new(0, 9, 9)));
        assert!(range.is_supported(&ProtocolVersion::new(1, 4, 0)));
        assert!(!range.is_supported(&ProtocolVersion::new(2, 0, 0)));
    }
}
