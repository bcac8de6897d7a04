//! The collector: `collect_build`, `collect_build_prerequisites`,
//! `collect_drop`, `collect_unhold`, `collect_repointed_dependents`,
//! `collect_build_postponed` (spec.md §4.2, §4.3, §4.5, §4.6, §4.7, §4.8).
//! The heart of the engine.

use crate::entry::{Action, BuildPackageEntry, CollectedGroup, ConstraintOrigin, EntryFlags};
use crate::error::{MissingReason, PlanError, Result as PlanResult};
use crate::interfaces::{NoRecommendations, PrereqResolver, PrivateConfigCreator, RecommendationEvaluator, RepositoryQuery};
use crate::map::{BuildPackageMap, OrderedList};
use crate::negotiate::{begin_negotiation, detect_cycle, format_cycle, seal, ConfigNegotiator};
use crate::postpone::{
    Cluster, ClusterDependent, Clusters, Collected, PostponedAltEntry, PostponedAlts, PostponedDependents, PostponedDeps,
    PostponedRepo, ReplacedVersions, Signal,
};
use ahash::AHashMap;
use bpkg_config::{ConfigId, ConfigType, LinkGraph, PackageKey, Skeleton, SkeletonEvaluator};
use bpkg_core::{PackageName, VersionConstraint};
use bpkg_store::{AvailablePackage, PackageStore, RepositoryFragmentId, SelectedPackage};
use std::sync::Arc;

/// All of the collector's mutable working state, grouped so it can be
/// snapshotted and restored wholesale during cluster negotiation
/// (spec.md §4.7b, §9 "Snapshot/restore").
pub struct CollectorState {
    pub map: BuildPackageMap,
    pub order: OrderedList,
    pub postponed_repo: PostponedRepo,
    pub postponed_alts: PostponedAlts,
    pub postponed_deps: PostponedDeps,
    pub clusters: Clusters,
    pub postponed_dependents: PostponedDependents,
    pub replaced_versions: ReplacedVersions,
    pub skeletons: AHashMap<PackageKey, Skeleton>,
}

impl Default for CollectorState {
    fn default() -> Self {
        Self {
            map: BuildPackageMap::new(),
            order: OrderedList::new(),
            postponed_repo: PostponedRepo::default(),
            postponed_alts: PostponedAlts::default(),
            postponed_deps: PostponedDeps::default(),
            clusters: Clusters::default(),
            postponed_dependents: PostponedDependents::default(),
            replaced_versions: ReplacedVersions::default(),
            skeletons: AHashMap::default(),
        }
    }
}

/// A restorable snapshot of [`CollectorState`] (spec.md §4.7b).
pub struct Snapshot {
    map: BuildPackageMap,
    order_keys: Vec<PackageKey>,
    postponed_repo: Vec<PackageKey>,
}

impl CollectorState {
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            map: self.map.clone(),
            order_keys: self.order.snapshot_keys(),
            postponed_repo: self.postponed_repo.iter().cloned().collect(),
        }
    }

    pub fn restore(&mut self, snap: Snapshot) {
        self.map = snap.map;
        self.order.restore_from(&mut self.map, snap.order_keys);
        self.postponed_repo = PostponedRepo::default();
        for k in snap.postponed_repo {
            self.postponed_repo.insert(k);
        }
    }
}

/// The collector. Holds injected collaborators (spec.md §9
/// "Collaborator injection instead of globals") plus the working state.
pub struct Collector {
    pub state: CollectorState,
    pub store: Arc<dyn PackageStore>,
    pub repo_query: Arc<dyn RepositoryQuery>,
    pub resolver: Arc<dyn PrereqResolver>,
    pub config_creator: Option<Arc<dyn PrivateConfigCreator>>,
    pub skeleton_evaluator: Arc<dyn SkeletonEvaluator>,
    pub negotiator: Arc<dyn ConfigNegotiator>,
    pub config_graph: LinkGraph,
    pub recommender: Arc<dyn RecommendationEvaluator>,
}

impl Collector {
    pub fn new(
        store: Arc<dyn PackageStore>,
        repo_query: Arc<dyn RepositoryQuery>,
        resolver: Arc<dyn PrereqResolver>,
        skeleton_evaluator: Arc<dyn SkeletonEvaluator>,
        negotiator: Arc<dyn ConfigNegotiator>,
        config_graph: LinkGraph,
    ) -> Self {
        Self {
            state: CollectorState::default(),
            store,
            repo_query,
            resolver,
            config_creator: None,
            skeleton_evaluator,
            negotiator,
            config_graph,
            recommender: Arc::new(NoRecommendations),
        }
    }

    /// Override the default no-op recommendation evaluator (spec.md §4.10
    /// step 10).
    #[must_use]
    pub fn with_recommender(mut self, recommender: Arc<dyn RecommendationEvaluator>) -> Self {
        self.recommender = recommender;
        self
    }

    /// spec.md §4.2 "Collect build (non-recursive core)".
    pub fn collect_build(
        &mut self,
        key: PackageKey,
        available: AvailablePackage,
        fragment: Option<RepositoryFragmentId>,
        system: bool,
        origin: Option<ConstraintOrigin>,
        recursive: bool,
    ) -> Collected<PackageKey> {
        // Step 1: version replacement application.
        let (available, fragment, system) = if let Some(replacement) = self.state.replaced_versions.take_unapplied(&key) {
            (replacement.available, replacement.fragment, replacement.system)
        } else {
            (available, fragment, system)
        };

        // Step 2: dependent postponement check.
        if let Some(cluster) = self.state.clusters.find_by_dependency(&key) {
            let is_sealed_dependent = cluster
                .dependents
                .iter()
                .any(|d| d.key == key && d.existing);
            if is_sealed_dependent && cluster.negotiated == crate::postpone::Negotiated::Sealed {
                tracing::debug!(%key, "postponing dependent: already sealed in a configuration cluster");
                self.state.postponed_dependents.insert(key);
                return Err(Signal::PostponeDependent);
            }
        }

        let mut new_entry = BuildPackageEntry::build(key.clone(), available);
        new_entry.fragment = fragment;
        new_entry.system = system;
        if let Some(o) = origin {
            new_entry.constraints.push(o);
        }

        // Step 3: merge / replacement policy.
        if let Some(existing) = self.state.map.entered_build(&key) {
            if existing.action == Some(Action::Drop) {
                // Drop entries are never overwritten by non-drop.
                return Ok(key);
            }
            if existing.action != Some(Action::Build) {
                // Non-build entries absorb the new build entry.
                let mut merged = new_entry;
                merged.hold_package = merged.hold_package || existing.hold_package;
                merged.hold_version = merged.hold_version || existing.hold_version;
                merged.constraints.extend(existing.constraints.iter().cloned());
                self.state.map.put(merged);
            } else {
                let keep_existing = Self::prefer(existing, &new_entry);
                let (mut keep, drop) = if keep_existing {
                    (existing.clone(), new_entry)
                } else {
                    (new_entry, existing.clone())
                };
                if keep.available.as_ref().map(|a| &a.version) != drop.available.as_ref().map(|a| &a.version) {
                    let keep_satisfies_drop = drop
                        .constraints
                        .iter()
                        .all(|c| c.constraint.satisfies(&keep.available.as_ref().unwrap().version));
                    let drop_satisfies_keep = keep
                        .constraints
                        .iter()
                        .all(|c| c.constraint.satisfies(&drop.available.as_ref().unwrap().version));
                    if keep_satisfies_drop {
                        // keep wins as-is.
                    } else if drop_satisfies_keep {
                        keep = drop.clone();
                    } else {
                        return Err(conflict_signal(&keep, &drop));
                    }
                }
                keep.hold_package = keep.hold_package || drop.hold_package;
                keep.hold_version = keep.hold_version || drop.hold_version;
                keep.constraints.extend(drop.constraints.iter().cloned());
                keep.flags |= drop.flags;
                self.state.map.put(keep);
            }
        } else {
            self.state.map.put(new_entry);
        }

        if recursive {
            self.collect_build_prerequisites(&key, None, true)?;
        }
        Ok(key)
    }

    /// `(user_selection desc, system asc, available_version desc)`
    /// preference order (spec.md §4.2 step 3).
    fn prefer(a: &BuildPackageEntry, b: &BuildPackageEntry) -> bool {
        let a_user = a.required_by.iter().any(|k| k.name.is_command_line());
        let b_user = b.required_by.iter().any(|k| k.name.is_command_line());
        if a_user != b_user {
            return a_user;
        }
        if a.system != b.system {
            return !a.system;
        }
        match (&a.available, &b.available) {
            (Some(av_a), Some(av_b)) => av_a.version >= av_b.version,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => true,
        }
    }

    /// Whether `key`'s dependency alternatives carry a buildfile-level
    /// clause, via the injected [`SkeletonEvaluator::has_buildfile_clause`]
    /// (spec.md §6.6, §4.3 "has_buildfile_clause"). Prefers the entry's
    /// `available` metadata when present (so the check works even before
    /// any group has been collected); falls back to the already-collected
    /// groups' cached flag for entries with no `available` (e.g. an
    /// adjust-only entry reached via `collect_unhold`/
    /// `collect_repointed_dependents`).
    fn has_buildfile_clauses(&self, key: &PackageKey) -> bool {
        let Some(entry) = self.state.map.entered_build(key) else { return false };
        if let Some(available) = &entry.available {
            let groups: Vec<Vec<bpkg_config::Clause>> =
                available.dependencies.iter().map(|g| g.alternatives.iter().filter_map(|a| a.config_clause.clone()).collect()).collect();
            return self.skeleton_evaluator.has_buildfile_clause(&groups);
        }
        entry.dependencies.as_ref().map_or(false, |groups| groups.iter().any(|g| g.has_config_clause))
    }

    /// spec.md §4.3 "Collect build prerequisites (recursive)".
    pub fn collect_build_prerequisites(&mut self, key: &PackageKey, max_alt_index: Option<usize>, initial_collection: bool) -> Collected<()> {
        let has_buildfile_clauses = self.has_buildfile_clauses(key);

        let in_cluster_as_existing = self
            .state
            .clusters
            .iter()
            .any(|c| c.dependents.iter().any(|d| &d.key == key && d.existing));

        let entry_snapshot = self.state.map.entered_build(key).cloned();
        let Some(entry) = entry_snapshot else {
            return Ok(());
        };

        if entry.is_configured_non_system() && !has_buildfile_clauses && !in_cluster_as_existing {
            return Ok(());
        }

        if entry.system {
            if let Some(e) = self.state.map.entered_build_mut(key) {
                e.recursive_collection = true;
            }
            return Ok(());
        }

        let needs_reconfigure = entry.flags.contains(EntryFlags::ADJUST_RECONFIGURE) || entry.disfigure;
        if needs_reconfigure && !self.state.clusters.contains_dependency(key) {
            let dependents = self.store.query_dependents(key);
            let has_config_dependent = !dependents.is_empty() && has_buildfile_clauses;
            if has_config_dependent {
                let cluster = Cluster::anchored(0, key.clone());
                self.state.clusters.push_or_merge(cluster);
                return Ok(());
            }
        }

        if entry.skeleton.is_none() {
            let skeleton = Skeleton::default();
            if let Some(e) = self.state.map.entered_build_mut(key) {
                e.skeleton = Some(skeleton.clone());
                e.dependencies = Some(Vec::new());
            }
            self.state.skeletons.insert(key.clone(), skeleton);
        }

        let Some(available) = entry.available.clone() else {
            return Ok(());
        };
        let start = entry.collected_group_count();

        for (group_index, group) in available.dependencies.iter().enumerate().skip(start) {
            self.collect_one_group(key, group_index, group, max_alt_index, initial_collection)?;
        }

        if let Some(e) = self.state.map.entered_build_mut(key) {
            e.recursive_collection = true;
        }
        Ok(())
    }

    fn collect_one_group(
        &mut self,
        dependent: &PackageKey,
        group_index: usize,
        group: &bpkg_store::DependencyGroup,
        max_alt_index: Option<usize>,
        initial_collection: bool,
    ) -> Collected<()> {
        if group.buildtime && group.alternatives.is_empty() {
            self.push_empty_group(dependent);
            return Ok(());
        }

        let skeleton = self.state.skeletons.entry(dependent.clone()).or_insert_with(Skeleton::default).clone();
        let enabled: Vec<usize> = group
            .alternatives
            .iter()
            .enumerate()
            .filter(|(_, alt)| alt.enable.as_deref().map_or(true, |expr| self.skeleton_evaluator.evaluate_enable(&skeleton, expr, group_index)))
            .map(|(i, _)| i)
            .collect();

        if enabled.is_empty() {
            self.push_empty_group(dependent);
            return Ok(());
        }

        let mut satisfactory = Vec::new();
        for &idx in &enabled {
            let alt = &group.alternatives[idx];
            if let Some(builds) = self.precollect_alternative(dependent, alt)? {
                satisfactory.push((idx, builds));
            }
        }

        let selection = if satisfactory.len() == 1 {
            Some(satisfactory.remove(0))
        } else if satisfactory.len() > 1 {
            if let Some(max) = max_alt_index {
                satisfactory.retain(|(idx, _)| *idx <= max);
            }
            let reused_pos = satisfactory.iter().position(|(_, builds)| builds.iter().all(|b| b.reused));
            match reused_pos {
                Some(pos) => Some(satisfactory.remove(pos)),
                None => {
                    self.state.postponed_alts.push(PostponedAltEntry {
                        key: dependent.clone(),
                        enabled_alternatives: enabled.clone(),
                        group_index,
                    });
                    return Ok(());
                }
            }
        } else {
            None
        };

        let Some((alt_idx, builds)) = selection else {
            return Err(Signal::ScratchCollection("no satisfactory alternative; diagnostics required".to_string()));
        };

        // A losing alternative may have provisionally postponed `dependent`
        // on a missing repository candidate; the group is resolved now, so
        // that postponement no longer applies.
        self.state.postponed_repo.remove(dependent);

        let alt = group.alternatives[alt_idx].clone();
        if let Some(reflect) = &alt.reflect {
            if let Some(skel) = self.state.skeletons.get_mut(dependent) {
                self.skeleton_evaluator.evaluate_reflect(skel, reflect, group_index);
            }
        }

        let has_config_clause = self.skeleton_evaluator.has_buildfile_clause(&[alt.config_clause.clone().into_iter().collect()]);
        let picked_keys: Vec<PackageKey> = builds.iter().map(|b| b.key.clone()).collect();

        if let Some(e) = self.state.map.entered_build_mut(dependent) {
            if let Some(deps) = &mut e.dependencies {
                deps.push(CollectedGroup {
                    picked: picked_keys.clone(),
                    has_config_clause,
                });
            }
        }

        if has_config_clause {
            for b in &builds {
                self.state.postponed_deps.mark_with_config(b.key.clone(), initial_collection);
            }
            let dependents = vec![ClusterDependent {
                key: dependent.clone(),
                existing: false,
                depends_position: group_index + 1,
                contributed: picked_keys,
            }];
            let mut dependencies = ahash::AHashSet::default();
            for b in &builds {
                dependencies.insert(b.key.clone());
            }
            let cluster = Cluster {
                id: 0,
                dependents,
                dependencies,
                negotiated: crate::postpone::Negotiated::NotStarted,
            };
            self.state.clusters.push_or_merge(cluster);
            return Ok(());
        }

        for build in builds {
            let dep_entry = self.state.postponed_deps.get(&build.key).copied();
            if let Some(dep_entry) = dep_entry {
                if dep_entry.wout_config && !dep_entry.with_config {
                    self.state.postponed_deps.mark_wout_config(build.key.clone(), initial_collection);
                    continue;
                }
            }
            if let Some(cluster) = self.state.clusters.find_by_dependency(&build.key) {
                let negotiating = cluster.negotiated == crate::postpone::Negotiated::InProgress;
                let in_cluster = cluster.dependents.iter().any(|d| &d.key == dependent);
                if negotiating && !in_cluster {
                    let id = cluster.id;
                    if let Some(c) = self.state.clusters.find_by_id_mut(id) {
                        c.dependents.push(ClusterDependent {
                            key: dependent.clone(),
                            existing: false,
                            depends_position: group_index + 1,
                            contributed: vec![build.key.clone()],
                        });
                    }
                    continue;
                }
            }
            let already_collected = self
                .state
                .map
                .entered_build(&build.key)
                .map_or(false, |e| e.recursive_collection);
            if already_collected {
                let is_own_existing = self
                    .state
                    .clusters
                    .find_by_dependency(&build.key)
                    .map_or(false, |c| c.dependents.iter().any(|d| d.existing && &d.key == dependent));
                if !is_own_existing {
                    let cp_deps: Vec<PackageKey> = self
                        .state
                        .map
                        .entered_build(dependent)
                        .and_then(|e| e.dependencies.as_ref())
                        .map(|groups| groups.iter().flat_map(|g| g.picked.clone()).collect())
                        .unwrap_or_default();
                    if let Some(path) = detect_cycle(&self.state.clusters, dependent, &cp_deps, group_index + 1) {
                        tracing::warn!(cycle = %format_cycle(&path), "configuration cycle proven");
                        return Err(signal_from_cycle(path));
                    }
                    tracing::debug!(key = %build.key, %dependent, "postponing dependency, already collected elsewhere");
                    return Err(Signal::PostponeDependency(build.key.clone()));
                }
            }
            self.collect_build(
                build.key.clone(),
                build.available,
                build.fragment,
                build.system,
                Some(ConstraintOrigin {
                    config: dependent.config,
                    dependent: Some(dependent.clone()),
                    constraint: build.constraint,
                }),
                false,
            )?;
            self.collect_build_prerequisites(&build.key, max_alt_index, initial_collection)?;
        }

        Ok(())
    }

    fn push_empty_group(&mut self, dependent: &PackageKey) {
        if let Some(e) = self.state.map.entered_build_mut(dependent) {
            if let Some(deps) = &mut e.dependencies {
                deps.push(CollectedGroup::default());
            }
        }
    }

    /// spec.md §4.3c "precollect": resolve target configuration, find an
    /// already-selected or available candidate, check pairwise
    /// compatibility with any already-collected build of the same
    /// dependency. Returns `None` when the alternative is not
    /// satisfactory at all (distinct from an empty-but-satisfactory
    /// toolchain alternative).
    fn precollect_alternative(&mut self, dependent: &PackageKey, alt: &bpkg_store::Alternative) -> Collected<Option<Vec<PrebuildRecord>>> {
        if alt.deps.is_empty() {
            return Ok(Some(Vec::new()));
        }
        let mut builds = Vec::with_capacity(alt.deps.len());
        for (name, constraint) in &alt.deps {
            let target_config = self.resolve_target_config(dependent, name, false)?;
            let constraint = constraint.clone().unwrap_or_else(VersionConstraint::any);
            let key = PackageKey::new(target_config, name.clone());

            if let Some(selected) = self.store.find_selected(&key) {
                if constraint.satisfies(&selected.version) {
                    builds.push(PrebuildRecord {
                        key,
                        available: AvailablePackage::new(name.clone(), selected.version.clone()),
                        fragment: None,
                        system: selected.system,
                        constraint,
                        reused: true,
                    });
                    continue;
                }
            }
            if let Some(existing) = self.state.map.entered_build(&key) {
                if let Some(av) = &existing.available {
                    if constraint.satisfies(&av.version) {
                        builds.push(PrebuildRecord {
                            key,
                            available: av.clone(),
                            fragment: existing.fragment,
                            system: existing.system,
                            constraint,
                            reused: true,
                        });
                        continue;
                    }
                }
            }
            let Some(candidate) = self.repo_query.filter_one(target_config, name, &constraint) else {
                self.state.postponed_repo.insert(dependent.clone());
                return Ok(None);
            };
            builds.push(PrebuildRecord {
                key,
                available: candidate,
                fragment: None,
                system: false,
                constraint,
                reused: false,
            });
        }
        Ok(Some(builds))
    }

    /// spec.md §4.5 "Dependency target-configuration resolution".
    fn resolve_target_config(&mut self, dependent: &PackageKey, name: &PackageName, buildtime: bool) -> Collected<ConfigId> {
        if let Ok(Some(pinned)) = self.resolver.find_prereq_database(dependent.config, name, buildtime) {
            return Ok(pinned);
        }
        let dependent_handle = self.config_graph.get(dependent.config);
        let Some(dependent_handle) = dependent_handle else {
            return Ok(dependent.config);
        };
        if !buildtime || dependent_handle.config_type() == ConfigType::Host {
            return Ok(dependent.config);
        }
        let required = ConfigType::Host;
        let search = self
            .config_graph
            .find_build_time_config(dependent.config, required)
            .map_err(|e| Signal::ScratchCollection(e.to_string()))?;
        match search {
            bpkg_config::ConfigSearch::One(id) => Ok(id),
            bpkg_config::ConfigSearch::None => {
                if let Some(creator) = &self.config_creator {
                    let new_id = creator.add_priv_cfg(dependent.config, required, &format!("host-{}", name.as_str()));
                    Ok(new_id)
                } else {
                    Ok(dependent.config)
                }
            }
            bpkg_config::ConfigSearch::Many(_) => Err(Signal::ScratchCollection("ambiguous build-time configuration".to_string())),
        }
    }

    /// spec.md §4.8 "Collect drop".
    pub fn collect_drop(&mut self, key: PackageKey, selected: SelectedPackage) -> Collected<()> {
        self.state.postponed_dependents.remove(&key);
        self.state.map.put(BuildPackageEntry::drop(key, selected));
        Ok(())
    }

    /// spec.md §4.8 "Collect unhold".
    pub fn collect_unhold(&mut self, key: PackageKey, selected: SelectedPackage) -> Collected<()> {
        if let Some(existing) = self.state.map.entered_build_mut(&key) {
            if existing.action.is_none() {
                existing.action = Some(Action::Adjust);
                existing.selected = Some(selected);
                existing.flags |= EntryFlags::ADJUST_UNHOLD;
                return Ok(());
            }
            existing.flags |= EntryFlags::ADJUST_UNHOLD;
            return Ok(());
        }
        self.state.map.put(BuildPackageEntry::adjust(key, selected, EntryFlags::ADJUST_UNHOLD));
        Ok(())
    }

    /// spec.md §4.8 "Repointed dependents". Ensures every replacement
    /// prerequisite has a build entry (and has had its own prerequisites
    /// collected), then — if `dependent` is already in the map — both
    /// flags it for reconfigure and records the replacement prerequisites
    /// in its collected-dependencies list, so the orderer (`order.rs`,
    /// which walks `entry.dependencies` for a reconfigured entry) places
    /// `dependent` after them instead of leaving it unordered relative to
    /// the repoint.
    pub fn collect_repointed_dependents(&mut self, dependent: PackageKey, moves: bpkg_store::RepointedMap) -> Collected<()> {
        let mut replacements = Vec::new();
        for (prereq_key, is_replacement) in moves {
            if !is_replacement {
                continue;
            }
            if !self.state.map.contains(&prereq_key) {
                if let Some(selected) = self.store.find_selected(&prereq_key) {
                    let mut entry = BuildPackageEntry::build(prereq_key.clone(), AvailablePackage::new(prereq_key.name.clone(), selected.version.clone()));
                    entry.flags = EntryFlags::ADJUST_RECONFIGURE | EntryFlags::BUILD_REPOINT;
                    entry.required_by_dependents = false;
                    self.state.map.put(entry);
                    self.collect_build_prerequisites(&prereq_key, None, true)?;
                }
            }
            replacements.push(prereq_key);
        }

        if let Some(existing) = self.state.map.entered_build_mut(&dependent) {
            existing.flags |= EntryFlags::ADJUST_RECONFIGURE | EntryFlags::BUILD_REPOINT;
            if !replacements.is_empty() {
                existing.skeleton.get_or_insert_with(Skeleton::default);
                existing.dependencies.get_or_insert_with(Vec::new).push(CollectedGroup { picked: replacements, has_config_clause: false });
            }
        }
        Ok(())
    }

    /// spec.md §4.7 "Collect postponed (draining loop)".
    pub fn collect_build_postponed(&mut self, target_cluster: Option<u32>) -> Collected<()> {
        if let Some(cluster_id) = target_cluster {
            self.negotiate_cluster(cluster_id)?;
        }

        loop {
            let repo_len_before = self.state.postponed_repo.len();
            if repo_len_before > 0 {
                let keys: Vec<_> = self.state.postponed_repo.iter().cloned().collect();
                for key in keys {
                    self.collect_build_prerequisites(&key, Some(0), true)?;
                }
                if self.state.postponed_repo.len() < repo_len_before {
                    continue;
                }
            }

            if let Some(next_id) = self.state.clusters.next_non_negotiated() {
                let snap = self.state.snapshot();
                match self.negotiate_cluster(next_id) {
                    Ok(()) => continue,
                    Err(Signal::PostponeDependency(pkg)) => {
                        let in_cluster = self
                            .state
                            .clusters
                            .find_by_id(next_id)
                            .map_or(false, |c| c.dependencies.contains(&pkg));
                        if in_cluster {
                            self.state.restore(snap);
                            continue;
                        }
                        return Err(Signal::PostponeDependency(pkg));
                    }
                    Err(other) => return Err(other),
                }
            }

            if !self.state.postponed_alts.is_empty() {
                let ordered = self.state.postponed_alts.ordered();
                if let Some(first) = ordered.first() {
                    let entry = (*first).clone();
                    self.state.postponed_alts.remove_key(&entry.key);
                    self.collect_build_prerequisites(&entry.key, Some(usize::MAX), true)?;
                    continue;
                }
            }

            let bogus = self.state.postponed_deps.drain_bogus(true);
            if !bogus.is_empty() {
                return Err(Signal::CancelPostponement);
            }

            break;
        }

        if !self.state.postponed_repo.is_empty() || !self.state.postponed_alts.is_empty() {
            return Err(Signal::ScratchCollection("unresolved postponements require diagnostics".to_string()));
        }
        Ok(())
    }

    fn negotiate_cluster(&mut self, cluster_id: u32) -> Collected<()> {
        let already_sealed = self
            .state
            .clusters
            .find_by_id(cluster_id)
            .map_or(true, |c| c.negotiated == crate::postpone::Negotiated::Sealed);
        if already_sealed {
            return Ok(());
        }

        let deps: Vec<PackageKey> = self
            .state
            .clusters
            .find_by_id(cluster_id)
            .map(|c| c.dependencies.iter().cloned().collect())
            .unwrap_or_default();

        for dep_key in &deps {
            let dependents = self.store.query_dependents(dep_key);
            for (existing_dependent, _constraint) in dependents {
                if self.state.map.entered_build(&existing_dependent).is_some() {
                    continue;
                }
                if let Some(selected) = self.store.find_selected(&existing_dependent) {
                    let key = existing_dependent.clone();
                    self.collect_build(
                        key.clone(),
                        AvailablePackage::new(existing_dependent.name.clone(), selected.version.clone()),
                        None,
                        selected.system,
                        None,
                        false,
                    )?;
                    if let Some(cluster) = self.state.clusters.find_by_id_mut(cluster_id) {
                        cluster.dependents.push(ClusterDependent {
                            key,
                            existing: true,
                            depends_position: 0,
                            contributed: vec![dep_key.clone()],
                        });
                    }
                }
            }
        }

        if let Some(cluster) = self.state.clusters.find_by_id_mut(cluster_id) {
            begin_negotiation(cluster);
        }

        if let Some(cluster) = self.state.clusters.find_by_id(cluster_id).cloned() {
            self.negotiator.negotiate(&cluster, &mut self.state.skeletons);
        }

        for dep_key in &deps {
            self.collect_build_prerequisites(dep_key, Some(0), false)?;
        }
        let dependents: Vec<PackageKey> = self
            .state
            .clusters
            .find_by_id(cluster_id)
            .map(|c| c.dependents.iter().map(|d| d.key.clone()).collect())
            .unwrap_or_default();
        for dependent_key in &dependents {
            self.collect_build_prerequisites(dependent_key, Some(usize::MAX), false)?;
        }

        if let Some(cluster) = self.state.clusters.find_by_id_mut(cluster_id) {
            seal(cluster);
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct PrebuildRecord {
    key: PackageKey,
    available: AvailablePackage,
    fragment: Option<RepositoryFragmentId>,
    system: bool,
    constraint: VersionConstraint,
    reused: bool,
}

fn conflict_signal(keep: &BuildPackageEntry, drop: &BuildPackageEntry) -> Signal {
    let _ = (keep, drop);
    Signal::ScratchCollection("constraint conflict requires a fatal diagnostic".to_string())
}

fn signal_from_cycle(path: Vec<crate::negotiate::CycleStep>) -> Signal {
    let msg = format_cycle(&path);
    Signal::ScratchCollection(msg)
}

/// Render a collector-level constraint conflict as a [`PlanError`] for
/// the refinement driver to surface when a merge cannot be resolved.
#[must_use]
pub fn constraint_conflict_error(dependency: PackageName, a: (PackageKey, VersionConstraint), b: (PackageKey, VersionConstraint)) -> PlanError {
    PlanError::ConstraintConflict {
        dependency,
        dependent_a: a.0,
        constraint_a: a.1,
        dependent_b: b.0,
        constraint_b: b.1,
    }
}

#[must_use]
pub fn missing_package_error(name: PackageName, reason: MissingReason) -> PlanError {
    PlanError::MissingPackage { name, reason }
}

pub type CollectorResult<T> = PlanResult<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::NoPrereqResolver;
    use crate::negotiate::LiteralConfigNegotiator;
    use bpkg_config::LiteralSkeletonEvaluator;
    use bpkg_core::Version;
    use bpkg_store::{InMemoryStore, SelectedState};

    struct NoRepo;
    impl RepositoryQuery for NoRepo {
        fn filter(&self, _from: ConfigId, _name: &PackageName, _constraint: &VersionConstraint) -> Vec<AvailablePackage> {
            Vec::new()
        }
    }

    fn collector(store: Arc<dyn PackageStore>) -> Collector {
        Collector::new(
            store,
            Arc::new(NoRepo),
            Arc::new(NoPrereqResolver),
            Arc::new(LiteralSkeletonEvaluator),
            Arc::new(LiteralConfigNegotiator),
            LinkGraph::new(),
        )
    }

    fn key(cfg: u32, n: &str) -> PackageKey {
        PackageKey::new(ConfigId::from_raw(cfg), PackageName::parse(n).unwrap())
    }

    #[test]
    fn repointed_dependent_already_in_map_is_flagged_for_reconfigure() {
        let store = InMemoryStore::new().shared();
        let mut c = collector(store.clone());
        let dependent = key(1, "app");
        let available = AvailablePackage::new(PackageName::parse("app").unwrap(), Version::parse("1.0").unwrap());
        c.collect_build(dependent.clone(), available, None, false, None, true).unwrap();

        let prereq = key(1, "liba");
        let mut moves = bpkg_store::RepointedMap::default();
        moves.insert(prereq, true);
        c.collect_repointed_dependents(dependent.clone(), moves).unwrap();

        let entry = c.state.map.entered_build(&dependent).unwrap();
        assert!(entry.flags.contains(EntryFlags::ADJUST_RECONFIGURE));
    }

    #[test]
    fn repointed_dependent_absent_from_map_builds_the_selected_prerequisite() {
        let store = InMemoryStore::new().shared();
        let prereq = key(1, "liba");
        store.seed_selected(prereq.clone(), SelectedPackage::new(PackageName::parse("liba").unwrap(), Version::parse("2.0").unwrap(), SelectedState::Configured));
        let mut c = collector(store);

        let dependent = key(1, "app");
        let mut moves = bpkg_store::RepointedMap::default();
        moves.insert(prereq.clone(), true);
        c.collect_repointed_dependents(dependent, moves).unwrap();

        let entry = c.state.map.entered_build(&prereq).unwrap();
        assert_eq!(entry.action, Some(Action::Build));
        assert!(entry.flags.contains(EntryFlags::ADJUST_RECONFIGURE | EntryFlags::BUILD_REPOINT));
        assert!(!entry.required_by_dependents);
    }

    #[test]
    fn repointed_dependent_existing_entry_records_prerequisite_in_dependencies() {
        let store = InMemoryStore::new().shared();
        let prereq = key(1, "tool");
        store.seed_selected(prereq.clone(), SelectedPackage::new(PackageName::parse("tool").unwrap(), Version::parse("2.0").unwrap(), SelectedState::Configured));
        let mut c = collector(store);

        let dependent = key(1, "dep");
        let available = AvailablePackage::new(PackageName::parse("dep").unwrap(), Version::parse("1.0").unwrap());
        c.collect_build(dependent.clone(), available, None, false, None, true).unwrap();

        let mut moves = bpkg_store::RepointedMap::default();
        moves.insert(prereq.clone(), true);
        c.collect_repointed_dependents(dependent.clone(), moves).unwrap();

        let entry = c.state.map.entered_build(&dependent).unwrap();
        assert!(entry.flags.contains(EntryFlags::ADJUST_RECONFIGURE | EntryFlags::BUILD_REPOINT));
        let picked: Vec<_> = entry.dependencies.as_ref().unwrap().iter().flat_map(|g| g.picked.clone()).collect();
        assert_eq!(picked, vec![prereq.clone()]);

        let prereq_entry = c.state.map.entered_build(&prereq).unwrap();
        assert_eq!(prereq_entry.action, Some(Action::Build));
    }

    #[test]
    fn unhold_on_a_fresh_key_creates_an_adjust_entry() {
        let store = InMemoryStore::new().shared();
        let mut c = collector(store);
        let k = key(1, "liba");
        let selected = SelectedPackage::new(PackageName::parse("liba").unwrap(), Version::parse("1.0").unwrap(), SelectedState::Configured);
        c.collect_unhold(k.clone(), selected).unwrap();

        let entry = c.state.map.entered_build(&k).unwrap();
        assert_eq!(entry.action, Some(Action::Adjust));
        assert!(entry.flags.contains(EntryFlags::ADJUST_UNHOLD));
        assert!(entry.check_invariants().is_ok());
    }

    #[test]
    fn unhold_on_a_build_entry_only_sets_the_flag() {
        let store = InMemoryStore::new().shared();
        let mut c = collector(store);
        let k = key(1, "liba");
        let available = AvailablePackage::new(PackageName::parse("liba").unwrap(), Version::parse("1.0").unwrap());
        c.collect_build(k.clone(), available, None, false, None, true).unwrap();

        let selected = SelectedPackage::new(PackageName::parse("liba").unwrap(), Version::parse("1.0").unwrap(), SelectedState::Configured);
        c.collect_unhold(k.clone(), selected).unwrap();

        let entry = c.state.map.entered_build(&k).unwrap();
        assert_eq!(entry.action, Some(Action::Build), "an existing build entry keeps its action");
        assert!(entry.flags.contains(EntryFlags::ADJUST_UNHOLD));
    }

    #[test]
    fn drop_records_a_drop_entry() {
        let store = InMemoryStore::new().shared();
        let mut c = collector(store);
        let k = key(1, "liba");
        let selected = SelectedPackage::new(PackageName::parse("liba").unwrap(), Version::parse("1.0").unwrap(), SelectedState::Configured);
        c.collect_drop(k.clone(), selected).unwrap();

        let entry = c.state.map.entered_build(&k).unwrap();
        assert_eq!(entry.action, Some(Action::Drop));
        assert!(entry.check_invariants().is_ok());
    }

    #[test]
    fn drop_evicts_a_stale_postponed_dependents_entry() {
        let store = InMemoryStore::new().shared();
        let mut c = collector(store);
        let k = key(1, "liba");
        c.state.postponed_dependents.insert(k.clone());
        assert!(c.state.postponed_dependents.contains(&k));

        let selected = SelectedPackage::new(PackageName::parse("liba").unwrap(), Version::parse("1.0").unwrap(), SelectedState::Configured);
        c.collect_drop(k.clone(), selected).unwrap();

        assert!(!c.state.postponed_dependents.contains(&k), "a dropped key can never be rebuilt, so it must not linger as postponed");
    }
}
