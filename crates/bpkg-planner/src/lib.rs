//! The build plan computation engine (spec.md §1/§2): dependency
//! collection with version and configuration satisfaction, dependency-
//! alternative selection, dependent-driven configuration negotiation
//! with postponement and backtracking, repointing of prerequisites
//! across configurations, plan ordering, and iterative refinement driven
//! by simulated plan execution.
//!
//! Layered on [`bpkg_core`] (package/version identity) and
//! [`bpkg_config`] (configuration graph, skeleton evaluation) and
//! [`bpkg_store`] (persisted selected/available package state, simulated
//! execution). See `collector` for the central module.

pub mod collector;
pub mod configure;
pub mod entry;
pub mod error;
pub mod interfaces;
pub mod map;
pub mod negotiate;
pub mod order;
pub mod postpone;
pub mod refine;

pub use collector::{Collector, CollectorState, Snapshot};
pub use configure::apply_config_vars;
pub use entry::{Action, BuildPackageEntry, CollectedGroup, ConstraintOrigin, EntryFlags};
pub use error::{MissingReason, PlanError, Result};
pub use interfaces::{
    NoPrereqResolver, NoRecommendations, PlanExecutor, PrereqResolver, PrivateConfigCreator, Recommendation, RecommendationEvaluator,
    RepositoryQuery,
};
pub use map::{BuildPackageMap, OrderedList};
pub use negotiate::{begin_negotiation, detect_cycle, format_cycle, seal, ConfigNegotiator, CycleStep, LiteralConfigNegotiator};
pub use postpone::{
    Cluster, ClusterDependent, Clusters, Collected, Negotiated, PostponedAltEntry, PostponedAlts, PostponedDepEntry, PostponedDependents,
    PostponedDeps, PostponedRepo, ReplacedVersionEntry, ReplacedVersions, Signal,
};
pub use refine::{Plan, RefinementInput, UserSelection};
