//! Version constraints backed by PubGrub ranges.
//!
//! A [`VersionConstraint`] is "any", an exact version, or a range. Constraints
//! from several dependents are combined by intersection; an empty
//! intersection means no version can satisfy all of them.

use std::fmt;

use pubgrub::Range;
use semver::{Comparator, Op, Version, VersionReq};
use thiserror::Error;

/// Error parsing a version or version constraint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version `{0}`")]
    InvalidVersion(String),

    #[error("invalid version constraint `{text}`: {reason}")]
    InvalidConstraint { text: String, reason: String },
}

/// A set of acceptable versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    range: Range<Version>,
}

impl VersionConstraint {
    /// Accepts every version.
    pub fn any() -> Self {
        VersionConstraint {
            range: Range::full(),
        }
    }

    /// Accepts exactly one version.
    pub fn exact(version: Version) -> Self {
        VersionConstraint {
            range: Range::singleton(version),
        }
    }

    /// Accepts nothing.
    pub fn none() -> Self {
        VersionConstraint {
            range: Range::empty(),
        }
    }

    /// Parse a constraint.
    ///
    /// - `""`, `"*"` and `"any"` accept every version;
    /// - a bare version such as `4.4.1` or `4.4` pins that exact version;
    /// - anything else is a comma-separated semver requirement
    ///   (`>=2.0, <3.0`, `^1.2`, `~1.4`, `=1.2.3`).
    pub fn parse(text: &str) -> Result<Self, VersionError> {
        let text = text.trim();
        if text.is_empty() || text == "*" || text == "any" {
            return Ok(Self::any());
        }

        if text.starts_with(|c: char| c.is_ascii_digit()) && !text.contains([',', '*']) {
            return parse_version_lenient(text)
                .map(Self::exact)
                .ok_or_else(|| VersionError::InvalidConstraint {
                    text: text.to_string(),
                    reason: "bare versions must have at most three numeric components".to_string(),
                });
        }

        let req: VersionReq = text.parse().map_err(|e: semver::Error| {
            VersionError::InvalidConstraint {
                text: text.to_string(),
                reason: e.to_string(),
            }
        })?;
        Ok(VersionConstraint {
            range: version_req_to_range(&req),
        })
    }

    /// Intersect two constraints.
    pub fn intersect(&self, other: &VersionConstraint) -> VersionConstraint {
        VersionConstraint {
            range: self.range.intersection(&other.range),
        }
    }

    /// Whether `version` satisfies this constraint.
    pub fn satisfied_by(&self, version: &Version) -> bool {
        self.range.contains(version)
    }

    /// Whether no version can satisfy this constraint.
    pub fn is_empty(&self) -> bool {
        self.range == Range::empty()
    }

    /// Whether every version satisfies this constraint.
    pub fn is_any(&self) -> bool {
        self.range == Range::full()
    }

    /// The pinned version when the constraint admits exactly one.
    pub fn as_exact(&self) -> Option<&Version> {
        self.range.as_singleton()
    }

    /// Access the underlying PubGrub range.
    pub fn range(&self) -> &Range<Version> {
        &self.range
    }
}

impl Default for VersionConstraint {
    fn default() -> Self {
        Self::any()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            f.write_str("*")
        } else if let Some(v) = self.as_exact() {
            write!(f, "={}", v)
        } else {
            write!(f, "{}", self.range)
        }
    }
}

/// Convert a semver VersionReq to a PubGrub Range.
pub fn version_req_to_range(req: &VersionReq) -> Range<Version> {
    req.comparators
        .iter()
        .fold(Range::full(), |range, comp| {
            range.intersection(&comparator_to_range(comp))
        })
}

/// Convert a single semver Comparator to a PubGrub Range.
///
/// Partial versions follow semver: `<=1.2` is `<1.3.0` and `>1.2` is `>=1.3.0`.
fn comparator_to_range(comp: &Comparator) -> Range<Version> {
    let major = comp.major;
    let minor = comp.minor.unwrap_or(0);
    let patch = comp.patch.unwrap_or(0);
    let version = Version::new(major, minor, patch);

    // First version past everything the partial comparator names.
    let past = match (comp.minor, comp.patch) {
        (None, _) => Version::new(major + 1, 0, 0),
        (Some(_), None) => Version::new(major, minor + 1, 0),
        (Some(_), Some(_)) => Version::new(major, minor, patch + 1),
    };

    match comp.op {
        Op::Exact | Op::Wildcard => {
            if comp.patch.is_some() {
                Range::singleton(version)
            } else {
                Range::between(version, past)
            }
        }
        Op::Greater => {
            if comp.patch.is_some() {
                Range::strictly_higher_than(version)
            } else {
                Range::higher_than(past)
            }
        }
        Op::GreaterEq => Range::higher_than(version),
        Op::Less => Range::strictly_lower_than(version),
        Op::LessEq => Range::strictly_lower_than(past),
        Op::Tilde => {
            let upper = if comp.minor.is_some() {
                Version::new(major, minor + 1, 0)
            } else {
                Version::new(major + 1, 0, 0)
            };
            Range::between(version, upper)
        }
        Op::Caret => {
            let upper = if major > 0 || comp.minor.is_none() {
                Version::new(major + 1, 0, 0)
            } else if minor > 0 || comp.patch.is_none() {
                Version::new(0, minor + 1, 0)
            } else {
                Version::new(0, 0, patch + 1)
            };
            Range::between(version, upper)
        }
        _ => Range::full(),
    }
}

/// Parse a version string, allowing for incomplete versions.
pub fn parse_version_lenient(s: &str) -> Option<Version> {
    if let Ok(v) = s.parse() {
        return Some(v);
    }

    let parts: Vec<&str> = s.split('.').collect();
    match parts.as_slice() {
        [major] => Some(Version::new(major.parse().ok()?, 0, 0)),
        [major, minor] => Some(Version::new(major.parse().ok()?, minor.parse().ok()?, 0)),
        _ => None,
    }
}

/// Parse a version, failing with a typed error.
pub fn parse_version(s: &str) -> Result<Version, VersionError> {
    parse_version_lenient(s.trim()).ok_or_else(|| VersionError::InvalidVersion(s.to_string()))
}
