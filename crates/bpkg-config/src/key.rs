//! Package key: the primary identity used throughout the planner
//! (spec.md §3 "Package key" = (configuration, package name)).

use crate::config::ConfigId;
use bpkg_core::PackageName;
use std::fmt;

/// `(configuration, package name)`, the key every build-package-map entry,
/// postponement registry and ordered-list position is addressed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageKey {
    pub config: ConfigId,
    pub name: PackageName,
}

impl PackageKey {
    #[must_use]
    pub fn new(config: ConfigId, name: PackageName) -> Self {
        Self { config, name }
    }

    /// A user-selection key: config-scoped, with the `command_line`
    /// sentinel name (spec.md §3 `required_by`).
    #[must_use]
    pub fn command_line(config: ConfigId) -> Self {
        Self { config, name: PackageName::command_line() }
    }
}

impl fmt::Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.config.raw())
    }
}
