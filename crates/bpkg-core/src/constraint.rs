//! Version constraints: either absent or a closed/half-open interval
//! (spec.md §3 "Version constraint").

use crate::error::{Error, Result};
use crate::version::Version;
use std::fmt;

/// One side of an interval: a version plus whether it is included.
#[derive(Clone, Debug)]
pub struct Bound {
    /// The bounding version.
    pub version: Version,
    /// Whether the bound itself is part of the interval.
    pub inclusive: bool,
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.version)
    }
}

/// A version constraint: absent (any version satisfies it) or a
/// closed/half-open interval over [`Version`].
#[derive(Clone, Debug, Default)]
pub struct VersionConstraint {
    min: Option<Bound>,
    max: Option<Bound>,
}

impl VersionConstraint {
    /// The constraint satisfied by every version.
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// An exact-version constraint `[v, v]`.
    #[must_use]
    pub fn exact(v: Version) -> Self {
        Self {
            min: Some(Bound { version: v.clone(), inclusive: true }),
            max: Some(Bound { version: v, inclusive: true }),
        }
    }

    /// Build an interval constraint, validating that `min <= max`.
    pub fn interval(min: Option<Bound>, max: Option<Bound>) -> Result<Self> {
        if let (Some(lo), Some(hi)) = (&min, &max) {
            if lo.version > hi.version || (lo.version == hi.version && !(lo.inclusive && hi.inclusive)) {
                return Err(Error::EmptyInterval {
                    min: lo.version.to_string(),
                    max: hi.version.to_string(),
                });
            }
        }
        Ok(Self { min, max })
    }

    #[must_use]
    pub fn min(&self) -> Option<&Bound> {
        self.min.as_ref()
    }

    #[must_use]
    pub fn max(&self) -> Option<&Bound> {
        self.max.as_ref()
    }

    /// Whether `version` satisfies this constraint. The wildcard version
    /// always satisfies any constraint (spec.md §3).
    #[must_use]
    pub fn satisfies(&self, version: &Version) -> bool {
        if version.is_wildcard() {
            return true;
        }
        if let Some(lo) = &self.min {
            match version.cmp(&lo.version) {
                std::cmp::Ordering::Less => return false,
                std::cmp::Ordering::Equal if !lo.inclusive => return false,
                _ => {}
            }
        }
        if let Some(hi) = &self.max {
            match version.cmp(&hi.version) {
                std::cmp::Ordering::Greater => return false,
                std::cmp::Ordering::Equal if !hi.inclusive => return false,
                _ => {}
            }
        }
        true
    }

    /// Subsumption: does `self` accept every version `other` accepts?
    /// Used by the collector to check whether a candidate version's own
    /// constraint already covers a dependent's narrower requirement.
    #[must_use]
    pub fn subsumes(&self, other: &Self) -> bool {
        let min_ok = match (&self.min, &other.min) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => match a.version.cmp(&b.version) {
                std::cmp::Ordering::Less => true,
                std::cmp::Ordering::Equal => a.inclusive || !b.inclusive,
                std::cmp::Ordering::Greater => false,
            },
        };
        let max_ok = match (&self.max, &other.max) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(a), Some(b)) => match a.version.cmp(&b.version) {
                std::cmp::Ordering::Greater => true,
                std::cmp::Ordering::Equal => a.inclusive || !b.inclusive,
                std::cmp::Ordering::Less => false,
            },
        };
        min_ok && max_ok
    }

    /// Whether this constraint is unconstrained (matches every version).
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.min, &self.max) {
            (None, None) => write!(f, "*"),
            (Some(lo), None) => write!(f, "{}{}", if lo.inclusive { ">=" } else { ">" }, lo.version),
            (None, Some(hi)) => write!(f, "{}{}", if hi.inclusive { "<=" } else { "<" }, hi.version),
            (Some(lo), Some(hi)) if lo.version == hi.version && lo.inclusive && hi.inclusive => {
                write!(f, "=={}", lo.version)
            }
            (Some(lo), Some(hi)) => write!(
                f,
                "{}{} {}{}",
                if lo.inclusive { ">=" } else { ">" },
                lo.version,
                if hi.inclusive { "<=" } else { "<" },
                hi.version
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn any_satisfies_everything() {
        let c = VersionConstraint::any();
        assert!(c.satisfies(&v("0.0.1")));
        assert!(c.satisfies(&v("99.0.0")));
    }

    #[test]
    fn exact_only_satisfies_equal() {
        let c = VersionConstraint::exact(v("1.0.0"));
        assert!(c.satisfies(&v("1.0.0")));
        assert!(!c.satisfies(&v("1.0.1")));
    }

    #[test]
    fn half_open_interval_excludes_max() {
        let c = VersionConstraint::interval(
            Some(Bound { version: v("1.0.0"), inclusive: true }),
            Some(Bound { version: v("2.0.0"), inclusive: false }),
        )
        .unwrap();
        assert!(c.satisfies(&v("1.5.0")));
        assert!(!c.satisfies(&v("2.0.0")));
    }

    #[test]
    fn rejects_empty_interval() {
        let err = VersionConstraint::interval(
            Some(Bound { version: v("2.0.0"), inclusive: true }),
            Some(Bound { version: v("1.0.0"), inclusive: true }),
        );
        assert!(err.is_err());
    }

    #[test]
    fn wildcard_version_satisfies_any_constraint() {
        let c = VersionConstraint::exact(v("1.0.0"));
        assert!(c.satisfies(&Version::wildcard()));
    }

    #[test]
    fn subsumption_detects_wider_interval() {
        let wide = VersionConstraint::interval(
            Some(Bound { version: v("1.0.0"), inclusive: true }),
            Some(Bound { version: v("3.0.0"), inclusive: true }),
        )
        .unwrap();
        let narrow = VersionConstraint::interval(
            Some(Bound { version: v("1.5.0"), inclusive: true }),
            Some(Bound { version: v("2.0.0"), inclusive: true }),
        )
        .unwrap();
        assert!(wide.subsumes(&narrow));
        assert!(!narrow.subsumes(&wide));
    }
}
