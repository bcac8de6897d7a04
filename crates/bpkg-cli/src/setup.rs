//! Wires a loaded configuration/database pair into a ready-to-refine
//! [`Collector`], using the literal/no-op collaborator implementations
//! appropriate for an offline CLI run.

use crate::manifest::Loaded;
use crate::repo::StoreBackedRepo;
use bpkg_config::LiteralSkeletonEvaluator;
use bpkg_planner::interfaces::NoPrereqResolver;
use bpkg_planner::negotiate::LiteralConfigNegotiator;
use bpkg_planner::{Collector, RefinementInput};
use std::sync::Arc;

/// Consumes a [`Loaded`] manifest/database pair and returns a ready-to-run
/// [`Collector`] plus the refinement input the caller should feed it.
#[must_use]
pub fn build_collector(loaded: Loaded) -> (Collector, RefinementInput) {
    let collector = Collector::new(
        loaded.store.clone(),
        Arc::new(StoreBackedRepo(loaded.store.clone())),
        Arc::new(NoPrereqResolver),
        Arc::new(LiteralSkeletonEvaluator),
        Arc::new(LiteralConfigNegotiator),
        loaded.graph,
    );
    let input = RefinementInput { selections: loaded.selections, repointed: Vec::new() };
    (collector, input)
}
