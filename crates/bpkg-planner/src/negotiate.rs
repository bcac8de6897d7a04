//! Configuration negotiator and configuration-cycle detection
//! (spec.md §4.4, §4.6/§4.7 negotiation step).

use crate::postpone::{Cluster, Clusters, Negotiated};
use ahash::AHashMap;
use bpkg_config::{PackageKey, Skeleton};

/// Negotiates the shared configuration of a cluster's dependencies
/// against all of its dependents' configuration clauses. Spec.md §4.7
/// step 1 explicitly scopes the negotiation itself out of core: "the
/// specification requires only that the act is idempotent, records its
/// result into each dependent's skeleton, and leaves the dependency
/// entries collectible." This trait is that seam.
pub trait ConfigNegotiator: Send + Sync {
    /// Negotiate variables for the dependencies in `cluster`, writing the
    /// agreed values into each dependent's skeleton. Must be idempotent:
    /// calling it twice on an already-negotiated cluster with unchanged
    /// inputs reproduces the same variables.
    fn negotiate(&self, cluster: &Cluster, dependent_skeletons: &mut AHashMap<PackageKey, Skeleton>);
}

/// A negotiator that unions every dependent's already-assigned skeleton
/// variables (later dependents in `depends_position` order win on
/// conflicting keys) into a single agreed set, then writes that set back
/// into every dependent's skeleton. This is a cluster-level union over
/// whole skeletons, independent of
/// [`bpkg_config::LiteralSkeletonEvaluator::negotiate`], which instead
/// merges a single dependency's raw `Clause` list into `ConfigVar`s; the
/// two operate at different layers (cluster-wide dependents vs. one
/// dependency's clauses) and are not meant to call one another.
#[derive(Debug, Default)]
pub struct LiteralConfigNegotiator;

impl ConfigNegotiator for LiteralConfigNegotiator {
    fn negotiate(&self, cluster: &Cluster, dependent_skeletons: &mut AHashMap<PackageKey, Skeleton>) {
        let mut agreed: Vec<(String, String)> = Vec::new();
        let mut dependents: Vec<_> = cluster.dependents.iter().collect();
        dependents.sort_by_key(|d| d.depends_position);
        for dependent in dependents {
            if let Some(skeleton) = dependent_skeletons.get(&dependent.key) {
                for (k, v) in skeleton.vars() {
                    if let Some(existing) = agreed.iter_mut().find(|(ek, _)| ek == k) {
                        existing.1 = v.clone();
                    } else {
                        agreed.push((k.clone(), v.clone()));
                    }
                }
            }
        }
        for dependent in &cluster.dependents {
            let skeleton = dependent_skeletons.entry(dependent.key.clone()).or_insert_with(Skeleton::default);
            for (k, v) in &agreed {
                skeleton.set(k.clone(), v.clone());
            }
        }
    }
}

/// One hop in a proven or would-be cycle, for diagnostics.
#[derive(Debug, Clone)]
pub struct CycleStep {
    pub dependent: PackageKey,
    pub dependency: PackageKey,
    pub depends_position: usize,
}

/// Configuration-cycle detection (spec.md §4.4): check whether adding a
/// tentative cluster membership `(cp at di+1 depending on dcp)` would
/// create a cycle across already-sealed clusters.
///
/// For every sealed cluster, for every dependent `d`, collect the
/// transitive dependents of `d` that still lie within that cluster,
/// tracking the maximum `depends_position` through which each reaches
/// `d`. If any such transitive dependent `t` also depends (within
/// `deps(cp)`) on something `t` already committed to configuring at a
/// lower `depends_position` than `d`'s, a cycle is proven.
///
/// Returns `Some(path)` describing the cycle when one is proven, `None`
/// when no cycle is proven (in which case the caller should throw
/// `postpone_dependency`, per spec.md §4.3e).
#[must_use]
pub fn detect_cycle(clusters: &Clusters, cp: &PackageKey, cp_deps: &[PackageKey], di_plus_1: usize) -> Option<Vec<CycleStep>> {
    for cluster in clusters.sealed() {
        for d in &cluster.dependents {
            // Transitive dependents of `d` still inside this cluster: a
            // dependent `t` reaches `d` if `t` contributed `d`'s key as
            // one of its dependencies.
            let mut reach: AHashMap<PackageKey, usize> = AHashMap::default();
            let mut frontier = vec![(d.key.clone(), d.depends_position)];
            while let Some((target, _)) = frontier.pop() {
                for t in &cluster.dependents {
                    if t.contributed.contains(&target) {
                        let best = reach.entry(t.key.clone()).or_insert(t.depends_position);
                        *best = (*best).max(t.depends_position);
                        frontier.push((t.key.clone(), t.depends_position));
                    }
                }
            }
            for (t_key, t_pos) in &reach {
                let t_dependent = cluster.dependents.iter().find(|x| &x.key == t_key);
                let Some(t_dependent) = t_dependent else { continue };
                for x in &t_dependent.contributed {
                    if cp_deps.contains(x) && *t_pos < d.depends_position && d.depends_position <= di_plus_1 {
                        return Some(vec![
                            CycleStep {
                                dependent: t_key.clone(),
                                dependency: x.clone(),
                                depends_position: *t_pos,
                            },
                            CycleStep {
                                dependent: cp.clone(),
                                dependency: x.clone(),
                                depends_position: di_plus_1,
                            },
                        ]);
                    }
                }
            }
        }
    }
    None
}

/// Format a proven cycle path for a fatal diagnostic (spec.md §7
/// "Dependency cycle").
#[must_use]
pub fn format_cycle(path: &[CycleStep]) -> String {
    path.iter()
        .map(|s| format!("{} depends on {} (position {})", s.dependent, s.dependency, s.depends_position))
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Helper the collector uses before adding a tentative cluster
/// membership: mark a cluster as in-progress negotiation.
pub fn begin_negotiation(cluster: &mut Cluster) {
    if cluster.negotiated == Negotiated::NotStarted {
        cluster.negotiated = Negotiated::InProgress;
    }
}

pub fn seal(cluster: &mut Cluster) {
    cluster.negotiated = Negotiated::Sealed;
}
