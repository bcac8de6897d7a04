//! Post-select configuration: resolve each build entry's `config.*`
//! variables against its skeleton before handing the plan to an executor
//! (spec.md §4.11, grounded on `examples/original_source/bpkg/pkg-configure.cxx`'s
//! post-select configuration step).

use crate::collector::Collector;
use crate::entry::Action;
use ahash::AHashMap;
use bpkg_config::ConfigVar;
use bpkg_config::PackageKey;

/// Resolve the final `config.*` variable assignments for every `build`
/// entry in `collector`'s map, in plan order.
///
/// Entries without a skeleton (never collected past the pre-enter stage,
/// e.g. a stray `drop`/`adjust` entry) are omitted rather than given an
/// empty assignment set, so callers can distinguish "nothing to configure"
/// from "not configured at all".
#[must_use]
pub fn apply_config_vars(collector: &Collector) -> AHashMap<PackageKey, Vec<ConfigVar>> {
    let mut out = AHashMap::default();
    for (key, entry) in collector.state.map.iter() {
        if entry.action != Some(Action::Build) {
            continue;
        }
        let Some(skeleton) = collector.state.skeletons.get(key) else { continue };
        let vars = skeleton
            .vars()
            .iter()
            .map(|(name, value)| ConfigVar { name: name.clone(), value: value.clone() })
            .collect();
        out.insert(key.clone(), vars);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::{NoPrereqResolver, NoRecommendations};
    use crate::negotiate::LiteralConfigNegotiator;
    use bpkg_config::{ConfigId, LinkGraph, LiteralSkeletonEvaluator};
    use bpkg_core::{PackageName, Version};
    use bpkg_store::{AvailablePackage, InMemoryStore};
    use std::sync::Arc;

    struct NoRepo;
    impl crate::interfaces::RepositoryQuery for NoRepo {
        fn filter(&self, _from: ConfigId, _name: &PackageName, _constraint: &bpkg_core::VersionConstraint) -> Vec<AvailablePackage> {
            Vec::new()
        }
    }

    #[test]
    fn entries_without_a_skeleton_are_omitted() {
        let store = InMemoryStore::new().shared();
        let collector = Collector::new(
            store,
            Arc::new(NoRepo),
            Arc::new(NoPrereqResolver),
            Arc::new(LiteralSkeletonEvaluator),
            Arc::new(LiteralConfigNegotiator),
            LinkGraph::new(),
        )
        .with_recommender(Arc::new(NoRecommendations));
        let vars = apply_config_vars(&collector);
        assert!(vars.is_empty());
    }

    #[test]
    fn resolves_vars_from_the_entry_skeleton() {
        let store = InMemoryStore::new().shared();
        let mut collector = Collector::new(
            store,
            Arc::new(NoRepo),
            Arc::new(NoPrereqResolver),
            Arc::new(LiteralSkeletonEvaluator),
            Arc::new(LiteralConfigNegotiator),
            LinkGraph::new(),
        );
        let key = PackageKey::new(ConfigId::from_raw(1), PackageName::parse("foo").unwrap());
        let available = AvailablePackage::new(PackageName::parse("foo").unwrap(), Version::parse("1.0").unwrap());
        collector.collect_build(key.clone(), available, None, false, None, true).unwrap();
        if let Some(skeleton) = collector.state.skeletons.get_mut(&key) {
            skeleton.set("config.foo.shared", "true");
        }

        let vars = apply_config_vars(&collector);
        let entry_vars = vars.get(&key).expect("foo was collected");
        assert_eq!(entry_vars.len(), 1);
        assert_eq!(entry_vars[0].name, "config.foo.shared");
        assert_eq!(entry_vars[0].value, "true");
    }
}
