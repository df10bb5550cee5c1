//! Version parsing and bump arithmetic.
//!
//! The version-of-record spells versions as `vMAJOR.MINOR.PATCH`, derived
//! config files as `MAJOR.MINOR.PATCH`. [`Version`] wraps `semver::Version`;
//! both spellings (and short forms like `1.2`) parse into it.

pub mod store;

pub use store::{VersionHistoryEntry, VersionStore};

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A `semver` version as spelled by the release tooling.
///
/// Config files only ever carry `MAJOR.MINOR.PATCH`, but pre-release and
/// build suffixes parse and order the way `semver` defines.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(transparent)]
pub struct Version(semver::Version);

/// Which component a release bumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum BumpKind {
    /// 1.2.3 -> 2.0.0
    Major,
    /// 1.2.3 -> 1.3.0
    Minor,
    /// 1.2.3 -> 1.2.4
    #[default]
    Patch,
}

/// Why a version string was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionParseError {
    /// Empty input
    #[error("empty version string")]
    Empty,
    /// A component was not a non-negative integer
    #[error("invalid version component '{0}'")]
    InvalidComponent(String),
    /// More than three dot-separated components
    #[error("too many version components in '{0}'")]
    TooManyComponents(String),
    /// Strict form required but not found
    #[error("'{0}' does not match vMAJOR.MINOR.PATCH")]
    NotTagged(String),
    /// Rejected by the semver grammar
    #[error("invalid version '{input}': {reason}")]
    Semver {
        /// Normalized input handed to `semver`
        input: String,
        /// `semver` error text
        reason: String,
    },
}

impl Version {
    /// Creates a release version from its components.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Parses `1`, `1.2`, `1.2.3`, optionally prefixed with `v`/`V`.
    ///
    /// Missing trailing components are zero, so `v1.2` equals `1.2.0`.
    pub fn parse_lenient(input: &str) -> Result<Self, VersionParseError> {
        let trimmed = input.trim();
        let bare = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        if bare.is_empty() {
            return Err(VersionParseError::Empty);
        }

        let split = bare.find(['-', '+']).unwrap_or(bare.len());
        let (core, suffix) = bare.split_at(split);

        let components: Vec<&str> = core.split('.').collect();
        if components.len() > 3 {
            return Err(VersionParseError::TooManyComponents(input.to_string()));
        }
        if let Some(bad) = components
            .iter()
            .find(|c| c.is_empty() || !c.bytes().all(|b| b.is_ascii_digit()))
        {
            return Err(VersionParseError::InvalidComponent(bad.to_string()));
        }

        let mut normalized = components.join(".");
        for _ in components.len()..3 {
            normalized.push_str(".0");
        }
        normalized.push_str(suffix);

        semver::Version::parse(&normalized)
            .map(Self)
            .map_err(|e| VersionParseError::Semver {
                input: normalized,
                reason: e.to_string(),
            })
    }

    /// Parses the strict version-of-record spelling `vMAJOR.MINOR.PATCH`.
    pub fn parse_tagged(input: &str) -> Result<Self, VersionParseError> {
        let bare = input
            .strip_prefix('v')
            .ok_or_else(|| VersionParseError::NotTagged(input.to_string()))?;
        if bare.split('.').count() != 3 {
            return Err(VersionParseError::NotTagged(input.to_string()));
        }
        Self::parse_lenient(bare)
    }

    /// Three-way comparison with `semver` precedence.
    pub fn compare(a: &Version, b: &Version) -> Ordering {
        a.cmp(b)
    }

    /// Compares two version strings, treating unparsable input as `0.0.0`.
    pub fn compare_str(a: &str, b: &str) -> Ordering {
        let a = Self::parse_lenient(a).unwrap_or_default();
        let b = Self::parse_lenient(b).unwrap_or_default();
        Self::compare(&a, &b)
    }

    /// Returns the next release version for `kind`. Pure; nothing is persisted.
    ///
    /// Pre-release and build metadata are dropped.
    pub fn bump(&self, kind: BumpKind) -> Version {
        let v = &self.0;
        match kind {
            BumpKind::Major => Self::new(v.major + 1, 0, 0),
            BumpKind::Minor => Self::new(v.major, v.minor + 1, 0),
            BumpKind::Patch => Self::new(v.major, v.minor, v.patch + 1),
        }
    }

    /// `vMAJOR.MINOR.PATCH`, the version-of-record spelling.
    pub fn tagged(&self) -> String {
        format!("v{}", self)
    }

    /// `MAJOR.MINOR.PATCH`, the derived config spelling.
    pub fn normalized(&self) -> String {
        self.to_string()
    }

    /// Underlying `semver` value.
    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(0, 0, 0)
    }
}

impl From<semver::Version> for Version {
    fn from(version: semver::Version) -> Self {
        Self(version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_lenient(s)
    }
}

impl<'de> serde::Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse_lenient(&raw).map_err(serde::de::Error::custom)
    }
}
