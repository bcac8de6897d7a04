//! Selected and available package records (spec.md §3).

use bpkg_config::PackageKey;
use bpkg_core::{PackageName, Version, VersionConstraint};
use std::path::PathBuf;

/// Lifecycle state of a persisted selected package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedState {
    Broken,
    Fetched,
    Unpacked,
    Configured,
    Transient,
}

/// Whether a selected package is a normal source package or a system stub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubState {
    System,
    Normal,
}

/// A persisted package record (spec.md §3 "Selected package").
#[derive(Debug, Clone)]
pub struct SelectedPackage {
    pub name: PackageName,
    pub version: Version,
    pub state: SelectedState,
    pub substate: SubState,
    pub hold_package: bool,
    pub hold_version: bool,
    /// Prerequisite keys with their per-edge version constraint, as
    /// persisted from the last successful configure.
    pub prerequisites: Vec<(PackageKey, VersionConstraint)>,
    pub src_root: Option<PathBuf>,
    pub out_root: Option<PathBuf>,
    pub system: bool,
}

impl SelectedPackage {
    #[must_use]
    pub fn new(name: PackageName, version: Version, state: SelectedState) -> Self {
        Self {
            name,
            version,
            state,
            substate: SubState::Normal,
            hold_package: false,
            hold_version: false,
            prerequisites: Vec::new(),
            src_root: None,
            out_root: None,
            system: false,
        }
    }

    #[must_use]
    pub fn is_configured_non_system(&self) -> bool {
        self.state == SelectedState::Configured && !self.system
    }
}

/// One alternative within a dependency group: a sequence of
/// `(name, optional constraint)` plus optional clauses (spec.md §3
/// "Dependency alternative group").
#[derive(Debug, Clone, Default)]
pub struct Alternative {
    pub deps: Vec<(PackageName, Option<VersionConstraint>)>,
    pub enable: Option<String>,
    pub config_clause: Option<bpkg_config::Clause>,
    pub reflect: Option<String>,
}

impl Alternative {
    #[must_use]
    pub fn simple(name: PackageName, constraint: Option<VersionConstraint>) -> Self {
        Self {
            deps: vec![(name, constraint)],
            ..Default::default()
        }
    }

    #[must_use]
    pub fn is_configuration_clause(&self) -> bool {
        self.config_clause.is_some()
    }
}

/// A `depends` clause: an ordered list of alternatives, a build-time flag,
/// and a comment (spec.md §3).
#[derive(Debug, Clone, Default)]
pub struct DependencyGroup {
    pub alternatives: Vec<Alternative>,
    pub buildtime: bool,
    pub comment: Option<String>,
}

impl DependencyGroup {
    #[must_use]
    pub fn toolchain() -> Self {
        Self { alternatives: Vec::new(), buildtime: true, comment: Some("toolchain".into()) }
    }
}

/// A package type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageType {
    Lib,
    Exe,
    Other,
}

/// An available package offered by some repository fragment (spec.md §3
/// "Available package").
#[derive(Debug, Clone)]
pub struct AvailablePackage {
    pub name: PackageName,
    pub version: Version,
    pub dependencies: Vec<DependencyGroup>,
    pub fragment: Option<RepositoryFragmentId>,
    pub system_version: Option<Version>,
    pub upstream_version: Option<String>,
    pub project: Option<PackageName>,
    pub package_type: PackageType,
    /// A stub is a version-less marker that satisfies any constraint.
    pub stub: bool,
}

impl AvailablePackage {
    #[must_use]
    pub fn new(name: PackageName, version: Version) -> Self {
        Self {
            name,
            version,
            dependencies: Vec::new(),
            fragment: None,
            system_version: None,
            upstream_version: None,
            project: None,
            package_type: PackageType::Lib,
            stub: false,
        }
    }

    #[must_use]
    pub fn stub(name: PackageName) -> Self {
        let mut p = Self::new(name, Version::wildcard());
        p.stub = true;
        p
    }
}

/// Opaque identity of a loaded repository fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepositoryFragmentId(pub u32);

/// A replaced-version entry (spec.md §3): what the collector decided a
/// key's available package and fragment should be, pending application.
#[derive(Debug, Clone)]
pub struct ReplacedVersion {
    pub available: AvailablePackage,
    pub fragment: Option<RepositoryFragmentId>,
    pub system: bool,
    pub replaced: bool,
}

/// A repointed-dependents entry: for a configured dependent whose
/// prerequisite is moving configurations, maps the prerequisite key to
/// whether it is the replacement (`true`) or the one being replaced
/// (`false`) (spec.md §3).
pub type RepointedMap = ahash::AHashMap<PackageKey, bool>;
