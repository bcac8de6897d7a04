//! Refinement driver: the outer iteration tying collection, ordering,
//! simulated execution and recommendation evaluation together into a
//! stable plan (spec.md §4.10).

use crate::entry::{Action, ConstraintOrigin};
use crate::error::{PlanError, Result as PlanResult};
use crate::postpone::Signal;
use ahash::AHashMap;
use bpkg_config::{ConfigType, PackageKey};
use bpkg_core::VersionConstraint;
use bpkg_store::{AvailablePackage, PlanAction, RepositoryFragmentId, RepointedMap, SelectedPackage, Simulation};

/// A hold-build (or hold-dependency) user selection (spec.md §4.10 step
/// 2/3: "user selection" + "user-pinned dependencies").
#[derive(Debug, Clone)]
pub struct UserSelection {
    pub key: PackageKey,
    pub available: AvailablePackage,
    pub fragment: Option<RepositoryFragmentId>,
    pub system: bool,
    pub hold_package: bool,
    pub hold_version: bool,
}

/// Everything the refinement driver needs from the caller to run one
/// `pkg_build` invocation (spec.md §6 "Inputs/outputs of the core").
#[derive(Debug, Clone, Default)]
pub struct RefinementInput {
    pub selections: Vec<UserSelection>,
    pub repointed: Vec<(PackageKey, RepointedMap)>,
}

/// Output of a successful refinement: the ordered plan plus its
/// idempotence checksum (spec.md §6 "Output").
#[derive(Debug, Clone)]
pub struct Plan {
    pub actions: Vec<PlanAction>,
    pub checksum: String,
}

/// Bound on the outer refine loop so a buggy recommender/negotiator
/// cannot spin forever; real plans converge in a handful of iterations
/// (spec.md §4.10 step 11 "repeat until no changes").
const MAX_REFINE_ITERATIONS: usize = 64;
const MAX_RESTART_ITERATIONS: usize = 256;

impl crate::collector::Collector {
    /// Run one full refinement cycle (spec.md §4.10).
    ///
    /// # Errors
    /// Returns the first fatal [`PlanError`]; scratch/postpone signals are
    /// handled internally by restarting collection.
    pub fn refine(&mut self, input: &RefinementInput) -> PlanResult<Plan> {
        for iteration in 0..MAX_REFINE_ITERATIONS {
            tracing::debug!(iteration, "refinement pass");
            let repointed_snapshots = self.stage_repointed_prerequisites(input)?;
            self.collect_round(input)?;
            self.order_round()?;
            self.restore_repointed_prerequisites(repointed_snapshots)?;

            let recommendations = self.simulate_and_recommend()?;
            if recommendations.is_empty() {
                break;
            }
            tracing::debug!(count = recommendations.len(), "plan stale; applying recommendations and re-collecting");
            self.apply_recommendations(recommendations)?;
        }

        self.verify_cross_configuration()?;

        let actions = self.plan_actions();
        let checksum = bpkg_store::plan_checksum(&actions);
        Ok(Plan { actions, checksum })
    }

    /// Step 1: snapshot every repointed dependent's persisted
    /// prerequisites, then temporarily add the replacement prerequisite
    /// to the dependent's persisted set (spec.md §4.10 step 1). This is
    /// what lets `collect_repointed_dependents` and the orderer's
    /// persisted-prerequisite walk both see the repointed edge during
    /// this iteration.
    fn stage_repointed_prerequisites(&mut self, input: &RefinementInput) -> PlanResult<Vec<(PackageKey, SelectedPackage)>> {
        let mut snapshots = Vec::new();
        for (dependent, moves) in &input.repointed {
            let Some(original) = self.store.find_selected(dependent) else { continue };
            let mut augmented = original.clone();
            for (prereq_key, is_replacement) in moves {
                if *is_replacement {
                    if !augmented.prerequisites.iter().any(|(k, _)| k == prereq_key) {
                        augmented.prerequisites.push((prereq_key.clone(), VersionConstraint::any()));
                    }
                } else {
                    augmented.prerequisites.retain(|(k, _)| k != prereq_key);
                }
            }
            self.stage_one(dependent, augmented)?;
            snapshots.push((dependent.clone(), original));
        }
        Ok(snapshots)
    }

    /// Step 8: restore what step 1 staged, once ordering has captured the
    /// repointed edge (spec.md §4.10 step 8).
    fn restore_repointed_prerequisites(&mut self, snapshots: Vec<(PackageKey, SelectedPackage)>) -> PlanResult<()> {
        for (dependent, original) in snapshots {
            self.stage_one(&dependent, original)?;
        }
        Ok(())
    }

    fn stage_one(&mut self, key: &PackageKey, package: SelectedPackage) -> PlanResult<()> {
        self.store.begin_transaction(key.config).map_err(|e| PlanError::Invariant(format!("{key}: {e}")))?;
        self.store.stage_selected(key.clone(), package).map_err(|e| PlanError::Invariant(format!("{key}: {e}")))?;
        self.store.commit(key.config).map_err(|e| PlanError::Invariant(format!("{key}: {e}")))
    }

    /// Steps 2-6: pre-enter, collect user selection/unhold/repointed
    /// dependents, then drain postponed work, restarting collection on
    /// any of the five scratch signals (spec.md §4.10 step 6, §5).
    fn collect_round(&mut self, input: &RefinementInput) -> PlanResult<()> {
        for attempt in 0..MAX_RESTART_ITERATIONS {
            match self.try_collect_round(input) {
                Ok(()) => return Ok(()),
                Err(Signal::ReplaceVersion) => continue,
                Err(Signal::PostponeDependent) => continue,
                Err(Signal::PostponeDependency(_)) => continue,
                Err(Signal::CancelPostponement) => {
                    self.state.postponed_deps.drain_bogus(true);
                    self.state.postponed_deps.drain_bogus(false);
                    continue;
                }
                Err(Signal::ScratchCollection(why)) => {
                    if attempt + 1 == MAX_RESTART_ITERATIONS {
                        return Err(PlanError::Invariant(format!("refinement did not converge: {why}")));
                    }
                    self.state.replaced_versions.clear();
                    self.state.postponed_deps.clear();
                    self.state.postponed_dependents.clear();
                    continue;
                }
            }
        }
        Err(PlanError::Invariant("refinement exceeded the restart budget".to_string()))
    }

    fn try_collect_round(&mut self, input: &RefinementInput) -> Result<(), Signal> {
        for sel in &input.selections {
            let origin = ConstraintOrigin {
                config: sel.key.config,
                dependent: None,
                constraint: VersionConstraint::exact(sel.available.version.clone()),
            };
            let already_clustered = self.state.clusters.contains_dependency(&sel.key);
            self.collect_build(sel.key.clone(), sel.available.clone(), sel.fragment, sel.system, Some(origin), false)?;
            if let Some(e) = self.state.map.entered_build_mut(&sel.key) {
                e.hold_package = e.hold_package || sel.hold_package;
                e.hold_version = e.hold_version || sel.hold_version;
            }
            if already_clustered {
                self.state.postponed_deps.mark_wout_config(sel.key.clone(), true);
            } else {
                self.collect_build_prerequisites(&sel.key, None, true)?;
            }
        }

        for sel in &input.selections {
            if let Some(selected) = self.store.find_selected(&sel.key) {
                if selected.hold_package || selected.hold_version {
                    self.collect_unhold(sel.key.clone(), selected)?;
                }
            }
        }

        for (dependent, moves) in &input.repointed {
            self.collect_repointed_dependents(dependent.clone(), moves.clone())?;
        }

        self.collect_build_postponed(None)
    }

    /// Step 7: order every entered key, then `collect_order_dependents`.
    fn order_round(&mut self) -> PlanResult<()> {
        let keys: Vec<PackageKey> = self.state.map.iter().map(|(k, _)| k.clone()).collect();
        for key in keys {
            let mut chain = Vec::new();
            self.order(&key, &mut chain, false)?;
        }
        self.collect_order_dependents()?;
        self.verify_order_invariant()
    }

    /// Every entry in the map must also carry an order position once
    /// `order_round` has run (spec.md §4.10 step 7 "ordering-invariant
    /// verification").
    fn verify_order_invariant(&self) -> PlanResult<()> {
        for (key, _) in self.state.map.iter() {
            if !self.state.map.is_ordered(key) {
                return Err(PlanError::Invariant(format!("{key} was entered but never ordered")));
            }
        }
        Ok(())
    }

    /// Step 9 (simulate) + step 10 (evaluate recommendations). Runs the
    /// plan's actions through an in-memory [`Simulation`] layered over the
    /// real store, then asks the recommender about every configured,
    /// non-held key; divergent recommendations are returned for the
    /// caller to fold back into the next collection round.
    fn simulate_and_recommend(&mut self) -> PlanResult<Vec<(PackageKey, AvailablePackage)>> {
        let mut sim = Simulation::new(self.store.as_ref());
        let keys: Vec<PackageKey> = self.state.order.iter().cloned().collect();
        for key in &keys {
            let Some(entry) = self.state.map.entered_build(key) else { continue };
            match entry.action {
                Some(Action::Build) => {
                    if let Some(available) = &entry.available {
                        let selected = bpkg_store::SelectedPackage::new(key.name.clone(), available.version.clone(), bpkg_store::SelectedState::Configured);
                        sim.simulate_build(key.clone(), selected);
                    }
                }
                Some(Action::Drop) => sim.simulate_drop(key.clone()),
                _ => {}
            }
        }
        // Simulation is rolled back implicitly: `sim` is dropped here
        // without ever being committed to `self.store` (spec.md §4.10
        // step 9 "roll back the transaction and restore session state").

        let mut recommendations = Vec::new();
        for key in &keys {
            let Some(entry) = self.state.map.entered_build(key) else { continue };
            if entry.action != Some(Action::Build) || entry.hold_version {
                continue;
            }
            if let Some(rec) = self.recommender.evaluate_dependency(key) {
                let current = entry.available.as_ref().map(|a| (a.version.clone(), entry.system));
                if current != Some((rec.version.clone(), rec.system)) {
                    let mut replacement = entry.available.clone().unwrap_or_else(|| AvailablePackage::new(key.name.clone(), rec.version.clone()));
                    replacement.version = rec.version;
                    recommendations.push((key.clone(), replacement));
                }
            }
            if entry.recursive_collection {
                for extra in self.recommender.evaluate_recursive(key) {
                    if !self.state.map.contains(&extra) {
                        if let Some(available) = self.store.query_available(&extra.name).into_iter().next() {
                            recommendations.push((extra, available));
                        }
                    }
                }
            }
        }
        Ok(recommendations)
    }

    /// Fold recommendations back in: drop the stale entry (so the next
    /// `collect_round` rebuilds it) and re-seed a replaced-version entry
    /// so the rebuild picks the recommended target (spec.md §4.10 step
    /// 10 "the plan is stale; set scratch_exe and remove affected deps
    /// entries").
    fn apply_recommendations(&mut self, recommendations: Vec<(PackageKey, AvailablePackage)>) -> PlanResult<()> {
        for (key, available) in recommendations {
            self.state.order.erase_key(&mut self.state.map, &key);
            self.state.map.remove(&key);
            self.state.replaced_versions.insert(
                key,
                crate::postpone::ReplacedVersionEntry {
                    available,
                    fragment: None,
                    system: false,
                    replaced: false,
                },
            );
        }
        Ok(())
    }

    /// Step 12: no runtime dependency or build-system module may be
    /// configured in more than one configuration of the same type within
    /// the reachable closure.
    fn verify_cross_configuration(&self) -> PlanResult<()> {
        let mut seen: AHashMap<(String, ConfigType), PackageKey> = AHashMap::default();
        for (key, entry) in self.state.map.iter() {
            if !matches!(entry.action, Some(Action::Build) | Some(Action::Adjust)) {
                continue;
            }
            let Some(handle) = self.config_graph.get(key.config) else { continue };
            let config_type = handle.config_type();
            let name = key.name.as_str().to_string();
            if let Some(other) = seen.get(&(name.clone(), config_type)) {
                if other.config != key.config {
                    return Err(PlanError::CrossConfigurationDuplication(key.name.clone()));
                }
            } else {
                seen.insert((name, config_type), key.clone());
            }
        }
        Ok(())
    }

    fn plan_actions(&self) -> Vec<PlanAction> {
        self.state
            .order
            .iter()
            .filter_map(|key| {
                let entry = self.state.map.entered_build(key)?;
                let (version, state) = match entry.action? {
                    Action::Build => (entry.available.as_ref().map(|a| a.version.to_string())?, bpkg_store::SelectedState::Configured),
                    Action::Drop => (entry.selected.as_ref().map(|s| s.version.to_string())?, bpkg_store::SelectedState::Broken),
                    Action::Adjust => (entry.selected.as_ref().map(|s| s.version.to_string())?, entry.selected.as_ref()?.state),
                };
                let substate = if entry.system { bpkg_store::SubState::System } else { bpkg_store::SubState::Normal };
                Some(PlanAction {
                    key: key.clone(),
                    version,
                    state,
                    substate,
                })
            })
            .collect()
    }
}
