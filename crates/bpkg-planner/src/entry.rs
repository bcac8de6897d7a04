//! Build-package entry: the unit of planning (spec.md §3 "Build-package
//! entry", §4.1).

use ahash::AHashSet;
use bpkg_config::{ConfigId, PackageKey, Skeleton};
use bpkg_core::VersionConstraint;
use bpkg_store::{AvailablePackage, RepositoryFragmentId, SelectedPackage};
use std::path::PathBuf;

/// What the planner decided to do with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Build,
    Drop,
    Adjust,
}

bitflags::bitflags! {
    /// Entry flags (spec.md §3 "flags").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EntryFlags: u8 {
        const ADJUST_UNHOLD = 0b001;
        const ADJUST_RECONFIGURE = 0b010;
        const BUILD_REPOINT = 0b100;
    }
}

/// Origin of a constraint contributed to an entry (spec.md §3
/// `constraints`): either a named dependent or the command line.
#[derive(Debug, Clone)]
pub struct ConstraintOrigin {
    pub config: ConfigId,
    /// `None` denotes the command line.
    pub dependent: Option<PackageKey>,
    pub constraint: VersionConstraint,
}

/// One collected dependency alternative (spec.md §3 `dependencies`):
/// either empty (toolchain/disabled group) or the single alternative
/// chosen for this group, with the prebuild keys it resolved to.
#[derive(Debug, Clone, Default)]
pub struct CollectedGroup {
    pub picked: Vec<PackageKey>,
    pub has_config_clause: bool,
}

/// The planning unit keyed by `(configuration, name)` (spec.md §3).
#[derive(Debug, Clone)]
pub struct BuildPackageEntry {
    pub key: PackageKey,
    pub action: Option<Action>,
    pub selected: Option<SelectedPackage>,
    pub available: Option<AvailablePackage>,
    pub fragment: Option<RepositoryFragmentId>,
    /// `Some` once dependency collection has started; parallel to
    /// `available`'s dependency groups. `None` means not yet collected
    /// (and implies `skeleton.is_none()`, per the spec's paired
    /// invariant).
    pub dependencies: Option<Vec<CollectedGroup>>,
    pub skeleton: Option<Skeleton>,
    /// Enabled alternatives snapshotted at the point a postponement was
    /// recorded, to avoid re-evaluating `enable` on resume.
    pub postponed_dependency_alternatives: Option<Vec<usize>>,
    pub recursive_collection: bool,
    pub hold_package: bool,
    pub hold_version: bool,
    pub constraints: Vec<ConstraintOrigin>,
    pub system: bool,
    pub keep_out: bool,
    pub disfigure: bool,
    pub configure_only: bool,
    pub checkout_root: Option<PathBuf>,
    pub checkout_purge: bool,
    pub config_vars: Vec<String>,
    pub required_by: AHashSet<PackageKey>,
    pub required_by_dependents: bool,
    pub flags: EntryFlags,
}

impl BuildPackageEntry {
    /// A pre-entered placeholder: no action yet decided.
    #[must_use]
    pub fn pre_entered(key: PackageKey) -> Self {
        Self {
            key,
            action: None,
            selected: None,
            available: None,
            fragment: None,
            dependencies: None,
            skeleton: None,
            postponed_dependency_alternatives: None,
            recursive_collection: false,
            hold_package: false,
            hold_version: false,
            constraints: Vec::new(),
            system: false,
            keep_out: false,
            disfigure: false,
            configure_only: false,
            checkout_root: None,
            checkout_purge: false,
            config_vars: Vec::new(),
            required_by: AHashSet::default(),
            required_by_dependents: false,
            flags: EntryFlags::empty(),
        }
    }

    #[must_use]
    pub fn build(key: PackageKey, available: AvailablePackage) -> Self {
        let mut e = Self::pre_entered(key);
        e.action = Some(Action::Build);
        e.available = Some(available);
        e
    }

    #[must_use]
    pub fn drop(key: PackageKey, selected: SelectedPackage) -> Self {
        let mut e = Self::pre_entered(key);
        e.action = Some(Action::Drop);
        e.selected = Some(selected);
        e
    }

    #[must_use]
    pub fn adjust(key: PackageKey, selected: SelectedPackage, flags: EntryFlags) -> Self {
        let mut e = Self::pre_entered(key);
        e.action = Some(Action::Adjust);
        e.selected = Some(selected);
        e.flags = flags;
        e
    }

    /// Check the structural invariants of spec.md §3/§8. Used by tests
    /// and, in debug builds, by the collector after each mutation.
    ///
    /// # Errors
    /// Returns a description of the first violated invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        match self.action {
            Some(Action::Build) if self.available.is_none() => {
                return Err(format!("{}: build entry with no available package", self.key));
            }
            Some(Action::Drop) => {
                if self.selected.is_none() {
                    return Err(format!("{}: drop entry with no selected package", self.key));
                }
                if self.available.is_some() {
                    return Err(format!("{}: drop entry carries an available package", self.key));
                }
            }
            Some(Action::Adjust) => {
                if self.selected.is_none() {
                    return Err(format!("{}: adjust entry with no selected package", self.key));
                }
                if self.available.is_some() {
                    return Err(format!("{}: adjust entry carries an available package", self.key));
                }
                if !self.flags.intersects(EntryFlags::ADJUST_UNHOLD | EntryFlags::ADJUST_RECONFIGURE) {
                    return Err(format!("{}: adjust entry has neither unhold nor reconfigure flag", self.key));
                }
            }
            None => {}
            _ => {}
        }
        if self.dependencies.is_some() != self.skeleton.is_some() {
            return Err(format!("{}: dependencies/skeleton presence mismatch", self.key));
        }
        Ok(())
    }

    /// Whether this entry is already configured, not a system stub, and
    /// so a candidate for the recursion-pruning rule in
    /// `collect_build_prerequisites` (spec.md §4.3 first early exit).
    #[must_use]
    pub fn is_configured_non_system(&self) -> bool {
        self.selected
            .as_ref()
            .map(bpkg_store::SelectedPackage::is_configured_non_system)
            .unwrap_or(false)
    }

    /// Number of dependency groups already collected, i.e. the resume
    /// marker used to continue iterating `available`'s groups
    /// (spec.md §4.3 "starting from dependencies.size()").
    #[must_use]
    pub fn collected_group_count(&self) -> usize {
        self.dependencies.as_ref().map_or(0, Vec::len)
    }
}
