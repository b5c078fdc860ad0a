//! NuGet version parsing and version range evaluation.
//!
//! Versions are parsed leniently: any number of dot-separated release
//! components, an optional `-` pre-release qualifier and optional `+` build
//! metadata. Ranges use NuGet's interval notation (`[1.0,2.0)`, `(,3.0]`,
//! `[1.2.0,)`), with one deliberate normalization: text without a comma is
//! always a pinned version, so `1.0` means exactly `[1.0]` and never
//! "1.0 or higher".

use crate::error::{ResolverError, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone)]
enum Part {
    Numeric(u64),
    Text(String),
}

impl Part {
    fn parse(text: &str) -> Self {
        text.parse::<u64>()
            .map(Part::Numeric)
            .unwrap_or_else(|_| Part::Text(text.to_ascii_lowercase()))
    }

    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Part::Numeric(a), Part::Numeric(b)) => a.cmp(b),
            (Part::Numeric(_), Part::Text(_)) => Ordering::Less,
            (Part::Text(_), Part::Numeric(_)) => Ordering::Greater,
            (Part::Text(a), Part::Text(b)) => a.cmp(b),
        }
    }
}

static ZERO: Part = Part::Numeric(0);

/// A parsed package version.
///
/// Release components compare numerically when both sides are numeric and
/// lexicographically otherwise. Missing trailing components count as zero,
/// so `1.0` equals `1.0.0`. A version with a pre-release qualifier sorts
/// before the same release without one. Build metadata is ignored.
///
/// # Examples
///
/// ```
/// use nuget_resolver::version::Version;
///
/// let a: Version = "1.10.0".parse().unwrap();
/// let b: Version = "1.9".parse().unwrap();
/// assert!(a > b);
///
/// let pre: Version = "2.0.0-beta.1".parse().unwrap();
/// let rel: Version = "2.0.0".parse().unwrap();
/// assert!(pre < rel);
/// ```
#[derive(Debug, Clone)]
pub struct Version {
    raw: String,
    release: Vec<Part>,
    pre_release: Vec<Part>,
}

impl Version {
    /// Parses a version string.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::InvalidVersion` if the text has no release
    /// component.
    pub fn parse(text: &str) -> Result<Self> {
        let raw = text.trim();
        let without_metadata = raw.split('+').next().unwrap_or_default();
        let (release_text, pre_text) = match without_metadata.split_once('-') {
            Some((release, pre)) => (release, Some(pre)),
            None => (without_metadata, None),
        };

        if release_text.trim().is_empty() {
            return Err(ResolverError::InvalidVersion(text.to_string()));
        }

        let release = release_text
            .split('.')
            .map(|part| Part::parse(part.trim()))
            .collect();
        let pre_release = pre_text
            .map(|pre| pre.split('.').map(Part::parse).collect())
            .unwrap_or_default();

        Ok(Self {
            raw: raw.to_string(),
            release,
            pre_release,
        })
    }

    /// The version text as it was given.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The version text without build metadata (everything after `+`).
    pub fn normalized(&self) -> &str {
        self.raw.split('+').next().unwrap_or_default()
    }

    pub fn is_prerelease(&self) -> bool {
        !self.pre_release.is_empty()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.release.len().max(other.release.len());
        for i in 0..len {
            let a = self.release.get(i).unwrap_or(&ZERO);
            let b = other.release.get(i).unwrap_or(&ZERO);
            match a.cmp(b) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }

        match (self.pre_release.is_empty(), other.pre_release.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => {
                for (a, b) in self.pre_release.iter().zip(&other.pre_release) {
                    match a.cmp(b) {
                        Ordering::Equal => {}
                        unequal => return unequal,
                    }
                }
                self.pre_release.len().cmp(&other.pre_release.len())
            }
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Version {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// One end of an interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeBound {
    pub version: Version,
    pub inclusive: bool,
}

/// A version constraint.
///
/// # Examples
///
/// ```
/// use nuget_resolver::version::{Version, VersionRange};
///
/// let range = VersionRange::parse("[1.0.0,2.0.0)").unwrap();
/// assert!(range.contains(&Version::parse("1.5.0").unwrap()));
/// assert!(!range.contains(&Version::parse("2.0.0").unwrap()));
///
/// // No comma: always pinned.
/// let pinned = VersionRange::parse("1.0.0").unwrap();
/// assert!(!pinned.contains(&Version::parse("1.0.1").unwrap()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRange {
    /// Exactly one version, written `[v]` (or bare `v`).
    Pinned(Version),
    /// An interval with optional lower and upper bounds.
    Interval {
        lower: Option<RangeBound>,
        upper: Option<RangeBound>,
    },
}

impl VersionRange {
    /// Parses range text in bracket notation.
    ///
    /// # Errors
    ///
    /// Returns `ResolverError::MalformedRange` on unbalanced or missing
    /// brackets, more than one comma, or an unparseable bound.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ResolverError::malformed_range(text, "empty range"));
        }

        if trimmed.contains(',') {
            parse_interval(text, trimmed)
        } else {
            parse_pinned(text, trimmed)
        }
    }

    /// Returns `true` if `version` satisfies this range.
    pub fn contains(&self, version: &Version) -> bool {
        match self {
            VersionRange::Pinned(pinned) => version == pinned,
            VersionRange::Interval { lower, upper } => {
                let above_lower = lower.as_ref().is_none_or(|bound| {
                    if bound.inclusive {
                        version >= &bound.version
                    } else {
                        version > &bound.version
                    }
                });
                let below_upper = upper.as_ref().is_none_or(|bound| {
                    if bound.inclusive {
                        version <= &bound.version
                    } else {
                        version < &bound.version
                    }
                });
                above_lower && below_upper
            }
        }
    }
}

fn is_open(c: char) -> bool {
    c == '[' || c == '('
}

fn is_close(c: char) -> bool {
    c == ']' || c == ')'
}

fn has_bracket(text: &str) -> bool {
    text.chars().any(|c| is_open(c) || is_close(c))
}

fn parse_interval(original: &str, trimmed: &str) -> Result<VersionRange> {
    let first = trimmed.chars().next().unwrap_or_default();
    let last = trimmed.chars().last().unwrap_or_default();
    if !is_open(first) || !is_close(last) || trimmed.len() < 2 {
        return Err(ResolverError::malformed_range(
            original,
            "interval must be enclosed in brackets",
        ));
    }

    let inner = &trimmed[1..trimmed.len() - 1];
    let (lower_text, upper_text) = match inner.split_once(',') {
        Some((lower, upper)) if !upper.contains(',') => (lower.trim(), upper.trim()),
        _ => {
            return Err(ResolverError::malformed_range(
                original,
                "interval must have exactly two bounds",
            ));
        }
    };

    if has_bracket(lower_text) || has_bracket(upper_text) {
        return Err(ResolverError::malformed_range(original, "unbalanced brackets"));
    }

    if !lower_text.is_empty() && lower_text == upper_text {
        return parse_bound_version(original, lower_text).map(VersionRange::Pinned);
    }

    let lower = bound(original, lower_text, first == '[')?;
    let upper = bound(original, upper_text, last == ']')?;

    Ok(VersionRange::Interval { lower, upper })
}

fn parse_pinned(original: &str, trimmed: &str) -> Result<VersionRange> {
    let starts = trimmed.starts_with(is_open);
    let ends = trimmed.ends_with(is_close);

    let inner = match (starts, ends) {
        (true, true) if trimmed.len() >= 2 => &trimmed[1..trimmed.len() - 1],
        (false, false) => trimmed,
        _ => {
            return Err(ResolverError::malformed_range(original, "unbalanced brackets"));
        }
    };

    if has_bracket(inner) {
        return Err(ResolverError::malformed_range(original, "unbalanced brackets"));
    }

    parse_bound_version(original, inner.trim()).map(VersionRange::Pinned)
}

fn bound(original: &str, text: &str, inclusive: bool) -> Result<Option<RangeBound>> {
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(RangeBound {
        version: parse_bound_version(original, text)?,
        inclusive,
    }))
}

fn parse_bound_version(original: &str, text: &str) -> Result<Version> {
    Version::parse(text)
        .map_err(|_| ResolverError::malformed_range(original, format!("invalid version '{}'", text)))
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRange::Pinned(version) => write!(f, "[{}]", version),
            VersionRange::Interval { lower, upper } => {
                match lower {
                    Some(bound) if bound.inclusive => write!(f, "[{}", bound.version)?,
                    Some(bound) => write!(f, "({}", bound.version)?,
                    None => f.write_str("(")?,
                }
                f.write_str(",")?;
                match upper {
                    Some(bound) if bound.inclusive => write!(f, "{}]", bound.version),
                    Some(bound) => write!(f, "{})", bound.version),
                    None => f.write_str(")"),
                }
            }
        }
    }
}

impl FromStr for VersionRange {
    type Err = ResolverError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
