//! Plan error taxonomy (spec.md §7). These are the non-recoverable
//! outcomes: everything that isn't one of the five [`crate::postpone::Signal`]
//! restarts aborts planning with one of these diagnostics and no partial
//! plan is emitted.

use bpkg_config::PackageKey;
use bpkg_core::{PackageName, Version, VersionConstraint};
use thiserror::Error;

/// Result alias used throughout `bpkg-planner`.
pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Debug, Error)]
pub enum PlanError {
    /// Two dependents impose incompatible constraints on the same
    /// dependency and no version in the union of candidate repositories
    /// satisfies both (spec.md §7 "Constraint conflict").
    #[error(
        "[E3001] unable to satisfy constraints on {dependency}: {dependent_a} requires {constraint_a}, {dependent_b} requires {constraint_b}; pin {dependency} explicitly"
    )]
    ConstraintConflict {
        dependency: PackageName,
        dependent_a: PackageKey,
        constraint_a: VersionConstraint,
        dependent_b: PackageKey,
        constraint_b: VersionConstraint,
    },

    /// No available package, only a stub, or a broken selected package.
    #[error("[E3002] {name}: {reason}")]
    MissingPackage { name: PackageName, reason: MissingReason },

    /// Multiple candidate host/build2 configurations for a build-time
    /// dependency; the user must disambiguate (spec.md §7 "Ambiguous
    /// build-time configuration").
    #[error("[E3003] ambiguous {config_type} configuration for '{dependency}': pass --config-{config_type}")]
    AmbiguousConfig { config_type: String, dependency: PackageName },

    /// A build-time dependency reaches into a build-system-module
    /// configuration, or vice versa (spec.md §4.5, §7).
    #[error("[E3004] forbidden dependency: {0}")]
    ForbiddenCombination(String),

    /// A cycle was detected during ordering or via the configuration-
    /// cycle check (spec.md §4.4, §4.9, §7).
    #[error("[E3005] dependency cycle: {0}")]
    Cycle(String),

    /// Same runtime dependency or build-system module configured in
    /// multiple configurations of the same type/cluster (spec.md §4.10
    /// step 12, §7 "Cross-configuration duplication").
    #[error("[E3006] {0} is configured in more than one configuration of the same type")]
    CrossConfigurationDuplication(PackageName),

    /// A user-specified version is not present in the dependent's
    /// repositories (spec.md §7 "Cannot satisfy user pin").
    #[error("[E3007] {name} {version} is not available in any repository reachable from {dependent}")]
    CannotSatisfyPin {
        name: PackageName,
        version: Version,
        dependent: PackageKey,
    },

    /// A dependent's persisted constraint no longer admits the new
    /// version the plan is upgrading a dependency to (spec.md §4.9
    /// `collect_order_dependents`).
    #[error("[E3008] upgrading {dependency} to {new_version} would violate {dependent}'s constraint {constraint}")]
    DependentConstraintViolated {
        dependency: PackageName,
        new_version: Version,
        dependent: PackageKey,
        constraint: VersionConstraint,
    },

    /// An internal invariant was violated; indicates a collector bug
    /// rather than a user-facing condition.
    #[error("[E3099] internal invariant violated: {0}")]
    Invariant(String),
}

#[derive(Debug)]
pub enum MissingReason {
    NotPresent,
    StubOnly,
    Broken,
    NoSatisfactoryVersion,
}

impl std::fmt::Display for MissingReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPresent => write!(f, "not present in any reachable repository"),
            Self::StubOnly => write!(f, "only a system stub is available"),
            Self::Broken => write!(f, "selected package is broken"),
            Self::NoSatisfactoryVersion => write!(f, "available, but no version satisfies the constraint"),
        }
    }
}
