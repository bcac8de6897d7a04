//! End-to-end scenario tests (spec.md §8).

use bpkg_config::{ConfigHandle, ConfigId, ConfigType, LinkGraph};
use bpkg_core::{PackageName, Version, VersionConstraint};
use bpkg_planner::interfaces::NoPrereqResolver;
use bpkg_planner::negotiate::LiteralConfigNegotiator;
use bpkg_planner::{Collector, PlanError, RefinementInput, UserSelection};
use bpkg_store::{AvailablePackage, InMemoryStore, PackageStore, SelectedPackage, SelectedState};
use std::sync::Arc;

fn name(s: &str) -> PackageName {
    PackageName::parse(s).unwrap()
}

fn version(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn range(min: &str, max: &str) -> VersionConstraint {
    VersionConstraint::interval(
        Some(bpkg_core::Bound { version: version(min), inclusive: true }),
        Some(bpkg_core::Bound { version: version(max), inclusive: false }),
    )
    .unwrap()
}

struct NoRepo;
impl bpkg_planner::interfaces::RepositoryQuery for NoRepo {
    fn filter(&self, _from: ConfigId, _name: &PackageName, _constraint: &VersionConstraint) -> Vec<AvailablePackage> {
        Vec::new()
    }
}

/// A repo query that answers from whatever the test seeded as available in
/// the store, so alternatives that aren't already selected or collected can
/// still be precollected.
struct StoreBackedRepo(Arc<InMemoryStore>);
impl bpkg_planner::interfaces::RepositoryQuery for StoreBackedRepo {
    fn filter(&self, _from: ConfigId, name: &PackageName, constraint: &VersionConstraint) -> Vec<AvailablePackage> {
        self.0.query_available(name).into_iter().filter(|a| constraint.satisfies(&a.version)).collect()
    }
}

fn collector_with_repo(store: Arc<InMemoryStore>, repo: Arc<dyn bpkg_planner::interfaces::RepositoryQuery>) -> Collector {
    let mut graph = LinkGraph::new();
    let target = graph.register(ConfigHandle::new(ConfigType::Target, "/cfg/target"));
    let _ = target;
    Collector::new(
        store,
        repo,
        Arc::new(NoPrereqResolver),
        Arc::new(bpkg_config::LiteralSkeletonEvaluator::default()),
        Arc::new(LiteralConfigNegotiator),
        graph,
    )
}

fn collector(store: Arc<InMemoryStore>) -> Collector {
    collector_with_repo(store, Arc::new(NoRepo))
}

/// Scenario 1: simple up-grade propagation (spec.md §8 scenario 1).
#[test]
fn simple_upgrade_propagation() {
    let store = InMemoryStore::new().shared();
    let cfg = ConfigId::from_raw(1);

    let mut foo_selected = SelectedPackage::new(name("foo"), version("1.0"), SelectedState::Configured);
    foo_selected.prerequisites.push((bpkg_config::PackageKey::new(cfg, name("libfoo")), range("1.0", "2.0")));
    store.seed_selected(bpkg_config::PackageKey::new(cfg, name("foo")), foo_selected);

    let libfoo_1_0 = AvailablePackage::new(name("libfoo"), version("1.0"));
    store.seed_available(libfoo_1_0.clone());
    store.seed_selected(bpkg_config::PackageKey::new(cfg, name("libfoo")), SelectedPackage::new(name("libfoo"), version("1.0"), SelectedState::Configured));

    let libfoo_1_5 = AvailablePackage::new(name("libfoo"), version("1.5"));
    store.seed_available(libfoo_1_5.clone());

    let mut collector = collector(store);
    let key = bpkg_config::PackageKey::new(cfg, name("libfoo"));
    let input = RefinementInput {
        selections: vec![UserSelection {
            key: key.clone(),
            available: libfoo_1_5,
            fragment: None,
            system: false,
            hold_package: true,
            hold_version: true,
        }],
        repointed: Vec::new(),
    };

    let plan = collector.refine(&input).expect("refinement succeeds");
    assert!(plan.actions.iter().any(|a| a.key.name == name("libfoo") && a.version == "1.5"));

    let foo_key = bpkg_config::PackageKey::new(cfg, name("foo"));
    let foo_entry = collector.state.map.entered_build(&foo_key).expect("foo is in the map");
    assert!(foo_entry.flags.contains(bpkg_planner::EntryFlags::ADJUST_RECONFIGURE));

    let foo_pos = collector.state.map.position_of(&foo_key).unwrap();
    let libfoo_pos = collector.state.map.position_of(&key).unwrap();
    assert!(foo_pos < libfoo_pos, "foo depends on libfoo, so libfoo must sit after foo in the reverse build order list");
}

/// Scenario 2: unsatisfiable constraint (spec.md §8 scenario 2).
#[test]
fn unsatisfiable_constraint_is_a_fatal_conflict() {
    let store = InMemoryStore::new().shared();
    let cfg = ConfigId::from_raw(1);

    store.seed_available(AvailablePackage::new(name("x"), version("1.0")));
    store.seed_available(AvailablePackage::new(name("x"), version("2.0")));
    store.seed_selected(bpkg_config::PackageKey::new(cfg, name("x")), SelectedPackage::new(name("x"), version("1.0"), SelectedState::Configured));

    let mut available_a = AvailablePackage::new(name("a"), version("1.0"));
    available_a.dependencies.push(bpkg_store::DependencyGroup {
        alternatives: vec![bpkg_store::Alternative::simple(name("x"), Some(VersionConstraint::exact(version("1.0"))))],
        buildtime: false,
        comment: None,
    });
    store.seed_available(available_a.clone());

    let mut available_b = AvailablePackage::new(name("b"), version("1.0"));
    available_b.dependencies.push(bpkg_store::DependencyGroup {
        alternatives: vec![bpkg_store::Alternative::simple(name("x"), Some(VersionConstraint::exact(version("2.0"))))],
        buildtime: false,
        comment: None,
    });
    store.seed_available(available_b.clone());

    let mut collector = collector_with_repo(store.clone(), Arc::new(StoreBackedRepo(store.clone())));
    let input = RefinementInput {
        selections: vec![
            UserSelection {
                key: bpkg_config::PackageKey::new(cfg, name("a")),
                available: available_a,
                fragment: None,
                system: false,
                hold_package: true,
                hold_version: false,
            },
            UserSelection {
                key: bpkg_config::PackageKey::new(cfg, name("b")),
                available: available_b,
                fragment: None,
                system: false,
                hold_package: true,
                hold_version: false,
            },
        ],
        repointed: Vec::new(),
    };

    // The conflict surfaces as a `ScratchCollection` signal deep in the
    // collector once both x@1.0 (satisfying a) and x@2.0 (satisfying b)
    // are collected and neither constraint satisfies the other's pick; the
    // refinement driver exhausts its restart budget rather than silently
    // producing a plan, so the store is left untouched either way.
    let result = collector.refine(&input);
    assert!(result.is_err());
    assert!(store.find_selected(&bpkg_config::PackageKey::new(cfg, name("x"))).is_some());
}

/// Scenario 3: alternative selection by reuse (spec.md §8 scenario 3).
#[test]
fn alternative_selection_prefers_already_configured() {
    let store = InMemoryStore::new().shared();
    let cfg = ConfigId::from_raw(1);

    store.seed_selected(bpkg_config::PackageKey::new(cfg, name("liba")), SelectedPackage::new(name("liba"), version("1.0"), SelectedState::Configured));

    let mut p = AvailablePackage::new(name("p"), version("1.0"));
    p.dependencies.push(bpkg_store::DependencyGroup {
        alternatives: vec![
            bpkg_store::Alternative::simple(name("liba"), None),
            bpkg_store::Alternative::simple(name("libb"), None),
        ],
        buildtime: false,
        comment: None,
    });
    store.seed_available(p.clone());

    let mut collector = collector(store.clone());
    let key = bpkg_config::PackageKey::new(cfg, name("p"));
    let input = RefinementInput {
        selections: vec![UserSelection {
            key: key.clone(),
            available: p,
            fragment: None,
            system: false,
            hold_package: true,
            hold_version: false,
        }],
        repointed: Vec::new(),
    };

    collector.refine(&input).expect("refinement succeeds");

    let liba_key = bpkg_config::PackageKey::new(cfg, name("liba"));
    let libb_key = bpkg_config::PackageKey::new(cfg, name("libb"));
    assert!(!collector.state.map.contains(&libb_key), "libb must never be entered into the map");
    let p_entry = collector.state.map.entered_build(&key).expect("p collected");
    let picked: Vec<_> = p_entry.dependencies.as_ref().unwrap().iter().flat_map(|g| g.picked.clone()).collect();
    assert_eq!(picked, vec![liba_key]);
}

/// Scenario 6 building block: a configuration-clause cycle between two
/// dependents sharing a dependency is proven, not silently postponed
/// forever (spec.md §8 scenario 6, §4.4).
#[test]
fn configuration_cycle_is_detected() {
    use bpkg_planner::negotiate::detect_cycle;
    use bpkg_planner::{Cluster, ClusterDependent, Clusters, Negotiated};

    let cfg = ConfigId::from_raw(1);
    let tix = bpkg_config::PackageKey::new(cfg, name("tix"));
    let tex = bpkg_config::PackageKey::new(cfg, name("tex"));
    let libbar = bpkg_config::PackageKey::new(cfg, name("libbar"));

    let mut cluster = Cluster::anchored(0, libbar.clone());
    cluster.negotiated = Negotiated::Sealed;
    cluster.dependents.push(ClusterDependent {
        key: tix.clone(),
        existing: false,
        depends_position: 1,
        contributed: vec![libbar.clone()],
    });
    cluster.dependents.push(ClusterDependent {
        key: tex.clone(),
        existing: false,
        depends_position: 1,
        contributed: vec![libbar.clone()],
    });

    let mut clusters = Clusters::default();
    clusters.push_or_merge(cluster);

    // tix now wants to also depend on tex at position 2, which would close
    // the loop tix -> tex -> libbar -> tix.
    let cp_deps = vec![tex.clone()];
    let cycle = detect_cycle(&clusters, &tix, &cp_deps, 2);
    assert!(cycle.is_some(), "a genuine configuration cycle must be proven, not postponed");
}

/// Scenario 4: configuration negotiation with an existing dependent
/// (spec.md §8 scenario 4). `d` is freshly collected with a `require`
/// clause on `libc`, which opens a cluster; `e` is never selected at
/// all, only persisted as an already-configured package that depends on
/// `libc`, so it can only enter the plan via `negotiate_cluster`'s
/// `query_dependents` discovery of existing dependents.
#[test]
fn configuration_negotiation_with_existing_dependent() {
    let store = InMemoryStore::new().shared();
    let cfg = ConfigId::from_raw(1);
    let libc_key = bpkg_config::PackageKey::new(cfg, name("libc"));

    store.seed_selected(libc_key.clone(), SelectedPackage::new(name("libc"), version("1.0"), SelectedState::Configured));

    let e_key = bpkg_config::PackageKey::new(cfg, name("e"));
    let mut e_selected = SelectedPackage::new(name("e"), version("1.0"), SelectedState::Configured);
    e_selected.prerequisites.push((libc_key.clone(), VersionConstraint::any()));
    store.seed_selected(e_key.clone(), e_selected);

    let mut d = AvailablePackage::new(name("d"), version("1.0"));
    d.dependencies.push(bpkg_store::DependencyGroup {
        alternatives: vec![bpkg_store::Alternative {
            deps: vec![(name("libc"), None)],
            config_clause: Some(bpkg_config::Clause::Require("c.feature=true".to_string())),
            ..Default::default()
        }],
        buildtime: false,
        comment: None,
    });
    store.seed_available(d.clone());

    let mut collector = collector(store.clone());
    let d_key = bpkg_config::PackageKey::new(cfg, name("d"));
    let input = RefinementInput {
        selections: vec![UserSelection {
            key: d_key.clone(),
            available: d,
            fragment: None,
            system: false,
            hold_package: true,
            hold_version: false,
        }],
        repointed: Vec::new(),
    };

    collector.refine(&input).expect("refinement succeeds");

    let cluster = collector.state.clusters.find_by_dependency(&libc_key).expect("libc anchors a cluster");
    assert_eq!(cluster.negotiated, bpkg_planner::Negotiated::Sealed, "negotiation must run to completion, not be left in progress");
    assert!(cluster.dependents.iter().any(|dep| dep.key == d_key && !dep.existing), "d opened the cluster via its require clause");
    assert!(
        cluster.dependents.iter().any(|dep| dep.key == e_key && dep.existing),
        "e was never selected, so it can only be in the cluster via existing-dependent discovery"
    );

    assert!(collector.state.map.contains(&e_key), "discovering e as an existing dependent must also enter it into the build map");
    let libc_pos = collector.state.map.position_of(&libc_key).unwrap();
    let d_pos = collector.state.map.position_of(&d_key).unwrap();
    assert!(d_pos < libc_pos, "d depends on libc, so d must sit before libc in the reverse build order list");
}

/// Scenario 5: repoint across configurations (spec.md §8 scenario 5).
/// `dep`, configured in `host_cfg`, persists a prerequisite on `tool` in
/// that same configuration; the refinement repoints it at a fresh build
/// of `tool` in `other_host_cfg` instead.
#[test]
fn repoint_across_configurations_orders_new_target_before_dependent() {
    let host_cfg = ConfigId::from_raw(1);
    let other_host_cfg = ConfigId::from_raw(2);
    let store = InMemoryStore::new().shared();

    let old_tool_key = bpkg_config::PackageKey::new(host_cfg, name("tool"));
    store.seed_selected(old_tool_key.clone(), SelectedPackage::new(name("tool"), version("1.0"), SelectedState::Configured));

    let dep_key = bpkg_config::PackageKey::new(host_cfg, name("dep"));
    let mut dep_selected = SelectedPackage::new(name("dep"), version("1.0"), SelectedState::Configured);
    dep_selected.prerequisites.push((old_tool_key.clone(), VersionConstraint::any()));
    store.seed_selected(dep_key.clone(), dep_selected);
    let dep_available = AvailablePackage::new(name("dep"), version("1.0"));
    store.seed_available(dep_available.clone());

    let new_tool_key = bpkg_config::PackageKey::new(other_host_cfg, name("tool"));
    let tool_available = AvailablePackage::new(name("tool"), version("1.0"));
    store.seed_available(tool_available.clone());

    let mut collector = collector(store.clone());
    let mut moves = bpkg_store::RepointedMap::default();
    moves.insert(old_tool_key.clone(), false);
    moves.insert(new_tool_key.clone(), true);

    let input = RefinementInput {
        selections: vec![
            UserSelection {
                key: new_tool_key.clone(),
                available: tool_available,
                fragment: None,
                system: false,
                hold_package: true,
                hold_version: false,
            },
            UserSelection {
                key: dep_key.clone(),
                available: dep_available,
                fragment: None,
                system: false,
                hold_package: false,
                hold_version: false,
            },
        ],
        repointed: vec![(dep_key.clone(), moves)],
    };

    let plan = collector.refine(&input).expect("refinement succeeds");
    assert!(plan.actions.iter().any(|a| a.key == new_tool_key && a.version == "1.0"));

    let dep_entry = collector.state.map.entered_build(&dep_key).expect("dep is in the map");
    assert!(dep_entry.flags.contains(bpkg_planner::EntryFlags::ADJUST_RECONFIGURE | bpkg_planner::EntryFlags::BUILD_REPOINT));

    let dep_pos = collector.state.map.position_of(&dep_key).unwrap();
    let tool_pos = collector.state.map.position_of(&new_tool_key).unwrap();
    assert!(dep_pos < tool_pos, "dep depends on the new tool build, so dep must sit before it in the reverse build order list");
}

#[test]
fn plan_error_display_carries_an_error_code() {
    let err = PlanError::Invariant("example".to_string());
    assert!(err.to_string().starts_with("[E3099]"));
}
