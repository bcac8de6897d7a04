//! Version model: an ordered tuple (epoch, upstream, pre-release, revision,
//! iteration) with a distinguished wildcard and a distinguished "earliest
//! pre-release" marker (spec.md §3 "Version").

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// One run of a version component: a number compares numerically, text
/// compares lexicographically. Numeric runs always sort before text runs —
/// a deliberate simplification of dpkg/rpm-style tie-breaking that keeps
/// the ordering total and cheap to compute.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Component {
    Numeric(u64),
    Alpha(String),
}

fn split_components(s: &str) -> Vec<Component> {
    let mut out = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c == '.' {
            chars.next();
            continue;
        }
        if c.is_ascii_digit() {
            let mut digits = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() {
                    digits.push(c);
                    chars.next();
                } else {
                    break;
                }
            }
            out.push(Component::Numeric(digits.parse().unwrap_or(0)));
        } else {
            let mut text = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_ascii_digit() || c == '.' {
                    break;
                }
                text.push(c);
                chars.next();
            }
            out.push(Component::Alpha(text));
        }
    }
    out
}

/// A pre-release identifier, or the distinguished "earliest" marker used to
/// build a lower bound like "earliest pre-release of 1.0.0" (spec.md §3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PreRelease {
    /// Sorts before every named pre-release of the same upstream version.
    Earliest,
    /// A concrete pre-release tag, e.g. `a.1`, `alpha`, `rc2`.
    Named(Arc<str>, Vec<Component>),
}

impl PreRelease {
    /// Parse a pre-release tag from its textual form.
    #[must_use]
    pub fn named(s: &str) -> Self {
        Self::Named(Arc::from(s), split_components(s))
    }

    fn rank(&self) -> (u8, &[Component]) {
        match self {
            Self::Earliest => (0, &[]),
            Self::Named(_, c) => (1, c),
        }
    }
}

impl PartialOrd for PreRelease {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PreRelease {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for PreRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Earliest => write!(f, "-"),
            Self::Named(s, _) => write!(f, "{s}"),
        }
    }
}

/// A package version: `[epoch~]upstream[-prerelease][+iteration]`, with an
/// independent, optional `revision`. Epoch and revision default to `0` when
/// absent, both for parsing and for ordering purposes.
#[derive(Clone, Debug)]
pub struct Version {
    epoch: u32,
    upstream_raw: Arc<str>,
    upstream: Vec<Component>,
    pre_release: Option<PreRelease>,
    revision: Option<u32>,
    iteration: Option<u32>,
    wildcard: bool,
}

impl Version {
    /// The distinguished wildcard version: satisfies any constraint
    /// regardless of its own fields, used for system-package stubs.
    #[must_use]
    pub fn wildcard() -> Self {
        Self {
            epoch: 0,
            upstream_raw: Arc::from("*"),
            upstream: Vec::new(),
            pre_release: None,
            revision: None,
            iteration: None,
            wildcard: true,
        }
    }

    /// Whether this is the wildcard sentinel.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Build a version directly from its parts (used by tests and by
    /// synthetic system-stub versions).
    #[must_use]
    pub fn new(epoch: u32, upstream: &str, pre_release: Option<PreRelease>, revision: Option<u32>, iteration: Option<u32>) -> Self {
        Self {
            epoch,
            upstream_raw: Arc::from(upstream),
            upstream: split_components(upstream),
            pre_release,
            revision,
            iteration,
            wildcard: false,
        }
    }

    /// The earliest possible version carrying this upstream string: used
    /// as a constraint's lower bound to mean "any pre-release of upstream
    /// onward".
    #[must_use]
    pub fn earliest_of(upstream: &str) -> Self {
        Self::new(0, upstream, Some(PreRelease::Earliest), None, None)
    }

    /// Parse `[epoch~]upstream[-prerelease][+iteration]`.
    pub fn parse(s: &str) -> Result<Self> {
        let orig = s;
        let (epoch, rest) = match s.split_once('~') {
            Some((e, rest)) => (
                e.parse::<u32>()
                    .map_err(|_| Error::InvalidVersion(orig.to_string(), "bad epoch".into()))?,
                rest,
            ),
            None => (0, s),
        };
        let (rest, iteration) = match rest.rsplit_once('+') {
            Some((r, it)) => (
                r,
                Some(
                    it.parse::<u32>()
                        .map_err(|_| Error::InvalidVersion(orig.to_string(), "bad iteration".into()))?,
                ),
            ),
            None => (rest, None),
        };
        let (rest, revision) = match rest.rsplit_once('-') {
            // Only treat the suffix as a revision if it's entirely numeric;
            // otherwise it's a pre-release tag handled below.
            Some((r, rev)) if !rev.is_empty() && rev.chars().all(|c| c.is_ascii_digit()) => (
                r,
                Some(rev.parse::<u32>().unwrap()),
            ),
            _ => (rest, None),
        };
        let (upstream, pre_release) = match rest.split_once('-') {
            Some((u, pre)) if !u.is_empty() => (u, Some(PreRelease::named(pre))),
            _ => (rest, None),
        };
        if upstream.is_empty() {
            return Err(Error::InvalidVersion(orig.to_string(), "empty upstream".into()));
        }
        Ok(Self::new(epoch, upstream, pre_release, revision, iteration))
    }

    #[must_use]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    #[must_use]
    pub fn upstream(&self) -> &str {
        &self.upstream_raw
    }

    #[must_use]
    pub fn pre_release(&self) -> Option<&PreRelease> {
        self.pre_release.as_ref()
    }

    #[must_use]
    pub fn revision(&self) -> u32 {
        self.revision.unwrap_or(0)
    }

    #[must_use]
    pub fn iteration(&self) -> u32 {
        self.iteration.unwrap_or(0)
    }

    fn pre_release_rank(&self) -> (u8, Option<&PreRelease>) {
        match &self.pre_release {
            None => (1, None),
            Some(p) => (0, Some(p)),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.wildcard {
            return write!(f, "*");
        }
        if self.epoch != 0 {
            write!(f, "{}~", self.epoch)?;
        }
        write!(f, "{}", self.upstream_raw)?;
        if let Some(pre) = &self.pre_release {
            write!(f, "-{pre}")?;
        }
        if let Some(rev) = self.revision {
            write!(f, "-{rev}")?;
        }
        if let Some(it) = self.iteration {
            write!(f, "+{it}")?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.wildcard || other.wildcard {
            // Wildcards only ever compare equal to themselves; callers
            // should special-case `is_wildcard()` before ordering.
            return if self.wildcard == other.wildcard {
                Ordering::Equal
            } else if self.wildcard {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.upstream.cmp(&other.upstream))
            .then_with(|| self.pre_release_rank().cmp(&other.pre_release_rank()))
            .then_with(|| self.revision().cmp(&other.revision()))
            .then_with(|| self.iteration().cmp(&other.iteration()))
    }
}

impl std::str::FromStr for Version {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_by_upstream_then_prerelease_then_revision() {
        let a = Version::parse("1.0.0").unwrap();
        let b = Version::parse("1.0.1").unwrap();
        assert!(a < b);

        let pre = Version::parse("1.0.0-alpha").unwrap();
        let fin = Version::parse("1.0.0").unwrap();
        assert!(pre < fin);

        let r0 = Version::parse("1.0.0").unwrap();
        let r1 = Version::parse("1.0.0-1").unwrap();
        assert!(r0 < r1);
    }

    #[test]
    fn earliest_prerelease_sorts_before_named() {
        let earliest = Version::earliest_of("1.0.0");
        let named = Version::parse("1.0.0-alpha").unwrap();
        assert!(earliest < named);
    }

    #[test]
    fn epoch_dominates_ordering() {
        let a = Version::parse("1~1.0.0").unwrap();
        let b = Version::parse("0~99.0.0").unwrap();
        assert!(b < a);
    }

    #[test]
    fn wildcard_is_distinguished() {
        let w = Version::wildcard();
        assert!(w.is_wildcard());
        assert_eq!(w.to_string(), "*");
    }

    #[test]
    fn round_trips_through_display() {
        let v = Version::parse("2~1.2.3-beta.1-4+5").unwrap();
        assert_eq!(v.epoch(), 2);
        assert_eq!(v.revision(), 4);
        assert_eq!(v.iteration(), 5);
    }
}
