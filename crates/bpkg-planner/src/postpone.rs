//! Postponement registries and the collector's cancellation signals
//! (spec.md §3 "Postponed-configuration cluster" / "Postponed-dependency
//! entry" / "Repointed-dependents map", §4.4, §4.6, §5, §9).
//!
//! Exceptions-as-control-flow in the source are modelled here as a
//! discriminated [`Signal`] returned up the call stack instead of thrown,
//! per SPEC_FULL.md §9's re-architecture note.

use ahash::{AHashMap, AHashSet};
use bpkg_config::PackageKey;
use bpkg_store::{AvailablePackage, RepositoryFragmentId};
use std::fmt;

/// A typed restart signal, replacing the source's exception-based control
/// flow (spec.md §5 "Cancellation & retry semantics", §9).
#[derive(Debug, Clone)]
pub enum Signal {
    /// Restart collection from scratch; keep the deps list and
    /// replaced-versions.
    ReplaceVersion,
    /// Restart collection from scratch; the dependent has been recorded
    /// in `postponed_dependents`.
    PostponeDependent,
    /// Restart collection from scratch; swallowed by the cluster-draining
    /// loop when `key` belongs to the cluster currently being drained.
    PostponeDependency(PackageKey),
    /// Restart collection after removing bogus `postponed_deps` entries.
    CancelPostponement,
    /// Generic restart; the caller interprets further.
    ScratchCollection(String),
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReplaceVersion => write!(f, "replace_version"),
            Self::PostponeDependent => write!(f, "postpone_dependent"),
            Self::PostponeDependency(k) => write!(f, "postpone_dependency({k})"),
            Self::CancelPostponement => write!(f, "cancel_postponement"),
            Self::ScratchCollection(why) => write!(f, "scratch_collection: {why}"),
        }
    }
}

/// Result type used throughout the collector: `Ok` on normal completion,
/// `Err(Signal)` on a restart request.
pub type Collected<T> = Result<T, Signal>;

/// `postponed-repo`: dependents postponed because a version satisfying a
/// pin isn't present in their repositories yet (spec.md §4.3c, §4.7a).
#[derive(Debug, Default)]
pub struct PostponedRepo {
    entries: AHashSet<PackageKey>,
}

impl PostponedRepo {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, key: PackageKey) -> bool {
        self.entries.insert(key)
    }

    pub fn remove(&mut self, key: &PackageKey) -> bool {
        self.entries.remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageKey> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// `postponed-alts`: dependents postponed on an ambiguous alternative
/// choice, with the enabled-alternative snapshot needed to resume
/// without re-evaluating `enable` (spec.md §4.3d, §4.6).
#[derive(Debug, Clone)]
pub struct PostponedAltEntry {
    pub key: PackageKey,
    pub enabled_alternatives: Vec<usize>,
    pub group_index: usize,
}

#[derive(Debug, Default)]
pub struct PostponedAlts {
    entries: Vec<PostponedAltEntry>,
}

impl PostponedAlts {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn push(&mut self, entry: PostponedAltEntry) {
        self.entries.push(entry);
    }

    pub fn remove_key(&mut self, key: &PackageKey) {
        self.entries.retain(|e| &e.key != key);
    }

    /// Order entries per the §4.6 heuristic: descending unprocessed tail
    /// length (approximated by `enabled_alternatives.len()`), then
    /// ascending name, then ascending configuration raw id.
    #[must_use]
    pub fn ordered(&self) -> Vec<&PostponedAltEntry> {
        let mut v: Vec<_> = self.entries.iter().collect();
        v.sort_by(|a, b| {
            b.enabled_alternatives
                .len()
                .cmp(&a.enabled_alternatives.len())
                .then_with(|| a.key.name.as_str().cmp(b.key.name.as_str()))
                .then_with(|| a.key.config.raw().cmp(&b.key.config.raw()))
        });
        v
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// `postponed-deps`: spec.md §3 "Postponed-dependency entry" — per-key
/// phase tracking for whether a dependency was seen with or without a
/// configuration clause.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostponedDepEntry {
    pub wout_config: bool,
    pub with_config: bool,
    pub initial_collection: bool,
}

impl PostponedDepEntry {
    #[must_use]
    pub fn is_bogus(&self) -> bool {
        self.wout_config && !self.with_config
    }
}

#[derive(Debug, Default)]
pub struct PostponedDeps {
    entries: AHashMap<PackageKey, PostponedDepEntry>,
}

impl PostponedDeps {
    pub fn mark_wout_config(&mut self, key: PackageKey, initial_collection: bool) {
        let e = self.entries.entry(key).or_default();
        e.wout_config = true;
        e.initial_collection = initial_collection;
    }

    pub fn mark_with_config(&mut self, key: PackageKey, initial_collection: bool) {
        let e = self.entries.entry(key).or_default();
        e.with_config = true;
        e.initial_collection = initial_collection;
    }

    #[must_use]
    pub fn get(&self, key: &PackageKey) -> Option<&PostponedDepEntry> {
        self.entries.get(key)
    }

    /// Remove and return bogus entries matching `initial_collection`
    /// phase (spec.md §4.7d).
    pub fn drain_bogus(&mut self, initial_collection: bool) -> Vec<PackageKey> {
        let bogus: Vec<_> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_bogus() && e.initial_collection == initial_collection)
            .map(|(k, _)| k.clone())
            .collect();
        for k in &bogus {
            self.entries.remove(k);
        }
        bogus
    }

    #[must_use]
    pub fn has_bogus(&self) -> bool {
        self.entries.values().any(PostponedDepEntry::is_bogus)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Reset the "seen" bits but keep no entries at all — `scratch_col`
    /// only resets seen bits per spec.md §4.10 step 6, which for this
    /// registry's shape is equivalent to a full clear since entries carry
    /// no other persistent state.
    pub fn reset_seen(&mut self) {
        self.entries.clear();
    }
}

/// One dependent contributing to a [`Cluster`] (spec.md §3).
#[derive(Debug, Clone)]
pub struct ClusterDependent {
    pub key: PackageKey,
    pub existing: bool,
    pub depends_position: usize,
    pub contributed: Vec<PackageKey>,
}

/// Tri-state negotiation progress (spec.md §3 `negotiated`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Negotiated {
    NotStarted,
    InProgress,
    Sealed,
}

/// `postponed-configurations`: a cluster of dependents negotiating a
/// shared dependency configuration (spec.md §3, §4.4, §4.7).
#[derive(Debug, Clone)]
pub struct Cluster {
    pub id: u32,
    pub dependents: Vec<ClusterDependent>,
    pub dependencies: AHashSet<PackageKey>,
    pub negotiated: Negotiated,
}

impl Cluster {
    #[must_use]
    pub fn anchored(id: u32, dependency: PackageKey) -> Self {
        let mut dependencies = AHashSet::default();
        dependencies.insert(dependency);
        Self {
            id,
            dependents: Vec::new(),
            dependencies,
            negotiated: Negotiated::NotStarted,
        }
    }

    #[must_use]
    pub fn shares_dependency(&self, other: &Self) -> bool {
        self.dependencies.intersection(&other.dependencies).next().is_some()
    }
}

#[derive(Debug, Default)]
pub struct Clusters {
    next_id: u32,
    clusters: Vec<Cluster>,
}

impl Clusters {
    /// Create and register a new cluster, merging into any existing
    /// cluster that already shares a dependency (spec.md §3 "Two
    /// clusters merge when they share any dependency").
    pub fn push_or_merge(&mut self, mut cluster: Cluster) -> u32 {
        cluster.id = self.next_id;
        self.next_id += 1;
        let mut merge_into = None;
        for (idx, existing) in self.clusters.iter().enumerate() {
            if existing.shares_dependency(&cluster) {
                merge_into = Some(idx);
                break;
            }
        }
        if let Some(idx) = merge_into {
            let target_id = self.clusters[idx].id;
            self.clusters[idx].dependencies.extend(cluster.dependencies);
            for dep in cluster.dependents {
                if !self.clusters[idx].dependents.iter().any(|d| d.key == dep.key) {
                    self.clusters[idx].dependents.push(dep);
                }
            }
            target_id
        } else {
            let id = cluster.id;
            self.clusters.push(cluster);
            id
        }
    }

    #[must_use]
    pub fn find_by_dependency(&self, key: &PackageKey) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.dependencies.contains(key))
    }

    pub fn find_by_dependency_mut(&mut self, key: &PackageKey) -> Option<&mut Cluster> {
        self.clusters.iter_mut().find(|c| c.dependencies.contains(key))
    }

    #[must_use]
    pub fn find_by_id(&self, id: u32) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == id)
    }

    pub fn find_by_id_mut(&mut self, id: u32) -> Option<&mut Cluster> {
        self.clusters.iter_mut().find(|c| c.id == id)
    }

    #[must_use]
    pub fn next_non_negotiated(&self) -> Option<u32> {
        self.clusters
            .iter()
            .find(|c| c.negotiated != Negotiated::Sealed)
            .map(|c| c.id)
    }

    #[must_use]
    pub fn all_negotiated(&self) -> bool {
        self.clusters.iter().all(|c| c.negotiated == Negotiated::Sealed)
    }

    /// All clusters, used by the configuration-cycle check (spec.md
    /// §4.4), which must inspect every `negotiated=true` cluster.
    pub fn sealed(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter().filter(|c| c.negotiated == Negotiated::Sealed)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.iter()
    }

    /// Whether `key` already belongs to some cluster (spec.md §8 "at no
    /// point does any key appear in two postponed-configuration clusters
    /// simultaneously" — checked by callers before inserting).
    #[must_use]
    pub fn contains_dependency(&self, key: &PackageKey) -> bool {
        self.clusters.iter().any(|c| c.dependencies.contains(key))
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// `postponed-dependents`: dependents whose rebuild was deferred because
/// they were already sealed in a cluster (spec.md §4.2 step 2).
#[derive(Debug, Default)]
pub struct PostponedDependents {
    entries: AHashSet<PackageKey>,
}

impl PostponedDependents {
    pub fn insert(&mut self, key: PackageKey) -> bool {
        self.entries.insert(key)
    }

    /// Evict `key`, e.g. because it was dropped and so can never be
    /// rebuilt (spec.md §4.8 "Drop... also routes through
    /// `postponed_dependents` check").
    pub fn remove(&mut self, key: &PackageKey) -> bool {
        self.entries.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &PackageKey) -> bool {
        self.entries.contains(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// `replaced-versions`: spec.md §3 "Replaced-version entry".
#[derive(Debug)]
pub struct ReplacedVersionEntry {
    pub available: AvailablePackage,
    pub fragment: Option<RepositoryFragmentId>,
    pub system: bool,
    pub replaced: bool,
}

#[derive(Debug, Default)]
pub struct ReplacedVersions {
    entries: AHashMap<PackageKey, ReplacedVersionEntry>,
}

impl ReplacedVersions {
    pub fn insert(&mut self, key: PackageKey, entry: ReplacedVersionEntry) {
        self.entries.insert(key, entry);
    }

    #[must_use]
    pub fn get(&self, key: &PackageKey) -> Option<&ReplacedVersionEntry> {
        self.entries.get(key)
    }

    /// Apply (consume) an unapplied replacement entry for `key`,
    /// returning it and marking it applied (spec.md §4.2 step 1).
    pub fn take_unapplied(&mut self, key: &PackageKey) -> Option<ReplacedVersionEntry> {
        let entry = self.entries.get_mut(key)?;
        if entry.replaced {
            return None;
        }
        entry.replaced = true;
        self.entries.get(key).cloned()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Clone for ReplacedVersionEntry {
    fn clone(&self) -> Self {
        Self {
            available: self.available.clone(),
            fragment: self.fragment,
            system: self.system,
            replaced: self.replaced,
        }
    }
}
