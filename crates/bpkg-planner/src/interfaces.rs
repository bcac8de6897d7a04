//! External collaborators the core consumes as injected interfaces, never
//! globals (spec.md §6, §9 "Collaborator injection instead of globals").
//!
//! Concrete implementations of these traits (a real repository index, a
//! CLI-driven resolver, a process-invoking plan executor) are explicitly
//! out of scope (spec.md §1); `bpkg-store` provides the store-backed
//! pieces ([`bpkg_store::PackageStore`], [`bpkg_store::SystemVersionAuthority`]).

use bpkg_config::ConfigId;
use bpkg_core::{PackageName, VersionConstraint};
use bpkg_store::AvailablePackage;

/// Repository query (spec.md §6.2): find candidates honouring "dependent's
/// repositories only, plus complements recursively, plus optional
/// prerequisites".
pub trait RepositoryQuery: Send + Sync {
    /// All available packages of `name` satisfying `constraint`, ordered
    /// newest-first, restricted to the dependent-visible fragment set.
    fn filter(&self, from: ConfigId, name: &PackageName, constraint: &VersionConstraint) -> Vec<AvailablePackage>;

    /// The single best candidate per the same visibility rule, or `None`.
    fn filter_one(&self, from: ConfigId, name: &PackageName, constraint: &VersionConstraint) -> Option<AvailablePackage> {
        self.filter(from, name, constraint).into_iter().next()
    }
}

/// User-resolver callback (spec.md §6.4): yields a command-line-pinned
/// target configuration for a dependency, or `None` to fall back to the
/// ordinary resolution rules in §4.5.
pub trait PrereqResolver: Send + Sync {
    /// Returns `Err` only when the pin itself is ambiguous (two
    /// command-line options both claim the same dependency); `Ok(None)`
    /// means "no pin, use ordinary resolution".
    fn find_prereq_database(&self, dependent: ConfigId, name: &PackageName, buildtime: bool) -> Result<Option<ConfigId>, String>;
}

/// A [`PrereqResolver`] with no pins, for scenarios with no command-line
/// configuration overrides.
#[derive(Debug, Default)]
pub struct NoPrereqResolver;

impl PrereqResolver for NoPrereqResolver {
    fn find_prereq_database(&self, _dependent: ConfigId, _name: &PackageName, _buildtime: bool) -> Result<Option<ConfigId>, String> {
        Ok(None)
    }
}

/// Private-configuration creator (spec.md §6.5): invoked when the
/// collector must create and link a new host/build2 configuration to
/// satisfy a build-time dependency (spec.md §4.5).
pub trait PrivateConfigCreator: Send + Sync {
    fn add_priv_cfg(&self, parent: ConfigId, config_type: bpkg_config::ConfigType, relative_dir: &str) -> ConfigId;
}

/// Plan executor (spec.md §6.7): consumes the ordered list in its
/// `execute_plan(simulate)` form. The simulated half lives in
/// `bpkg_store::simulate`; a real, side-effecting implementation is out
/// of scope.
pub trait PlanExecutor: Send + Sync {
    fn execute_plan(&self, actions: &[bpkg_store::PlanAction], simulate: bool) -> Result<(), String>;
}

/// A recommendation for a configured, unheld package's target version
/// (spec.md §4.10 step 10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub version: bpkg_core::Version,
    pub system: bool,
}

/// Post-simulation recommendation evaluator (spec.md §4.10 step 10):
/// after simulating plan execution, asked for every configured,
/// non-held package whether its currently-planned target still looks
/// right, and — for recursive scopes — whether anything further should
/// be pulled in.
pub trait RecommendationEvaluator: Send + Sync {
    /// Recommend a target for `key`, or `None` to leave the current plan
    /// alone.
    fn evaluate_dependency(&self, key: &bpkg_config::PackageKey) -> Option<Recommendation>;

    /// Additional keys a recursive scope recommends pulling into the
    /// plan (new build entries), beyond what `evaluate_dependency` alone
    /// would revise.
    fn evaluate_recursive(&self, key: &bpkg_config::PackageKey) -> Vec<bpkg_config::PackageKey>;
}

/// A [`RecommendationEvaluator`] that never recommends a change, for
/// scenarios with no recursive scopes and a plan that should be taken
/// at face value.
#[derive(Debug, Default)]
pub struct NoRecommendations;

impl RecommendationEvaluator for NoRecommendations {
    fn evaluate_dependency(&self, _key: &bpkg_config::PackageKey) -> Option<Recommendation> {
        None
    }

    fn evaluate_recursive(&self, _key: &bpkg_config::PackageKey) -> Vec<bpkg_config::PackageKey> {
        Vec::new()
    }
}
