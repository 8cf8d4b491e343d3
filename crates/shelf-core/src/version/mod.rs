//! Library version numbers and their text codec.
//!
//! A version is a `major.minor.revision` triple. The canonical text form pads
//! the revision to three digits (`1.2.004`); this is the representation that
//! travels over the wire, so [`Version`] serializes as that string.
//!
//! Parsing is lenient about missing components: an empty string is
//! `0.0.000`, `"3"` is `3.0.000`, and `"3.1"` is `3.1.000`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from version parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// A component was not a non-negative integer.
    #[error("invalid version component '{component}' in '{input}'")]
    InvalidComponent {
        /// The offending component.
        component: String,
        /// The full input text.
        input: String,
    },

    /// More than three dot-separated components.
    #[error("too many version components in '{0}' (expected major.minor.revision)")]
    TooManyComponents(String),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Which part of the version a release advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseKind {
    /// Major release (X.0.000).
    Major,
    /// Minor release (x.Y.000).
    Minor,
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
        }
    }
}

/// A three-part library version.
///
/// Ordering is lexicographic over `(major, minor, revision)`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "String", try_from = "String")]
pub struct Version {
    /// Major component.
    pub major: u32,
    /// Minor component.
    pub minor: u32,
    /// Revision component.
    pub revision: u32,
}

impl Version {
    /// The version every new library starts at.
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Create a version from its components.
    pub const fn new(major: u32, minor: u32, revision: u32) -> Self {
        Self {
            major,
            minor,
            revision,
        }
    }

    /// Advance this version by one release of the given kind.
    ///
    /// Returns `None` if the advanced component would overflow.
    pub fn bump(self, kind: ReleaseKind) -> Option<Self> {
        match kind {
            ReleaseKind::Major => Some(Self::new(self.major.checked_add(1)?, 0, 0)),
            ReleaseKind::Minor => Some(Self::new(self.major, self.minor.checked_add(1)?, 0)),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{:03}", self.major, self.minor, self.revision)
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_version(s)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_version(&value)
    }
}

/// Parse version text.
///
/// Surrounding whitespace and trailing dots are ignored. Missing trailing
/// components default to zero.
pub fn parse_version(s: &str) -> VersionResult<Version> {
    let trimmed = s.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Ok(Version::ZERO);
    }

    let mut parts = [0_u32; 3];
    for (index, component) in trimmed.split('.').enumerate() {
        let slot = parts
            .get_mut(index)
            .ok_or_else(|| VersionError::TooManyComponents(s.to_string()))?;
        *slot = parse_component(component, s)?;
    }

    Ok(Version::new(parts[0], parts[1], parts[2]))
}

/// Parse optional version text; `None` is the zero version.
pub fn parse_optional_version(s: Option<&str>) -> VersionResult<Version> {
    s.map_or(Ok(Version::ZERO), parse_version)
}

fn parse_component(component: &str, input: &str) -> VersionResult<u32> {
    // u32::from_str accepts a leading '+', which is not a valid component
    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionError::InvalidComponent {
            component: component.to_string(),
            input: input.to_string(),
        });
    }
    component
        .parse()
        .map_err(|_| VersionError::InvalidComponent {
            component: component.to_string(),
            input: input.to_string(),
        })
}
