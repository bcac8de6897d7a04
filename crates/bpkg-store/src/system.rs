//! System-version authority and system package manager probing
//! (spec.md §6.3; supplemented from `original_source/bpkg/system-package-manager*.cxx`,
//! SPEC_FULL.md §4.11).
//!
//! A real implementation shells out to the platform package manager
//! (`rpm`/`dnf`, `dpkg`/`apt`, etc.) to discover an installed system
//! version for a package the user asked to satisfy with `?sys:`. That is
//! out of scope here; this module is the trait seam plus a map-backed
//! catalog for tests and for callers that already know the answer.

use crate::error::{Result, StoreError};
use ahash::AHashMap;
use bpkg_core::{PackageName, Version};
use parking_lot::RwLock;

/// External collaborator: the authority the planner consults when a
/// dependency alternative is constrained with `sys:` and no explicit
/// version was given (spec.md §6.3 "System-version authority").
pub trait SystemVersionAuthority: Send + Sync {
    /// Probe (or look up) the installed system version of `name`.
    /// Returns `Ok(None)` when the package manager has no record, which
    /// the collector treats as "not installed" rather than an error.
    fn system_version(&self, name: &PackageName) -> Result<Option<Version>>;
}

/// A fixed-distribution catalog, grounded on the `fedora`/`debian`
/// system-package-manager probes in `original_source/`: it never shells
/// out, but exposes the same query/record split so a real probing
/// backend can be dropped in without changing the planner.
#[derive(Default)]
pub struct SystemCatalog {
    known: RwLock<AHashMap<PackageName, Version>>,
}

impl SystemCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a probed or user-supplied system version, as the real
    /// backend would after running `rpm -q` / `dpkg-query` once per
    /// session and memoizing the result.
    pub fn record(&self, name: PackageName, version: Version) {
        self.known.write().insert(name, version);
    }

    /// Record that `name` is known to the distribution but with no
    /// queryable version (spec.md's wildcard system stub).
    pub fn record_unversioned(&self, name: PackageName) {
        self.known.write().insert(name, Version::wildcard());
    }
}

impl SystemVersionAuthority for SystemCatalog {
    fn system_version(&self, name: &PackageName) -> Result<Option<Version>> {
        Ok(self.known.read().get(name).cloned())
    }
}

/// A strict authority that treats every query as a hard error, for tests
/// exercising a store with no system-package integration configured.
pub struct NoSystemAuthority;

impl SystemVersionAuthority for NoSystemAuthority {
    fn system_version(&self, name: &PackageName) -> Result<Option<Version>> {
        Err(StoreError::NoSystemInfo(name.as_str().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_version_is_returned() {
        let catalog = SystemCatalog::new();
        let name = PackageName::parse("openssl").unwrap();
        catalog.record(name.clone(), Version::parse("3.0.0").unwrap());
        assert_eq!(catalog.system_version(&name).unwrap().unwrap().to_string(), "3.0.0");
    }

    #[test]
    fn unrecorded_package_is_none_not_error() {
        let catalog = SystemCatalog::new();
        let name = PackageName::parse("openssl").unwrap();
        assert!(catalog.system_version(&name).unwrap().is_none());
    }
}
