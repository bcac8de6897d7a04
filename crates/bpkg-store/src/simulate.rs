//! Simulated plan execution (spec.md §4.10 step 9, §9 "simulating
//! executor"): apply a plan's selected-package writes to an in-memory
//! snapshot without touching the real store, so the refinement driver can
//! evaluate a skeleton's `enable`/`reflect` clauses against the
//! post-build state before committing to it.

use crate::checksum::PlanAction;
use crate::store::PackageStore;
use crate::types::SelectedPackage;
use ahash::AHashMap;
use bpkg_config::PackageKey;

/// A cheap, disposable overlay on top of a [`PackageStore`]: reads fall
/// through to the underlying store, writes are kept local until
/// [`Simulation::into_actions`] or the simulation is dropped.
pub struct Simulation<'s> {
    base: &'s dyn PackageStore,
    overlay: AHashMap<PackageKey, Option<SelectedPackage>>,
}

impl<'s> Simulation<'s> {
    #[must_use]
    pub fn new(base: &'s dyn PackageStore) -> Self {
        Self {
            base,
            overlay: AHashMap::default(),
        }
    }

    /// Look up a package, preferring the simulated overlay.
    #[must_use]
    pub fn find_selected(&self, key: &PackageKey) -> Option<SelectedPackage> {
        match self.overlay.get(key) {
            Some(Some(pkg)) => Some(pkg.clone()),
            Some(None) => None,
            None => self.base.find_selected(key),
        }
    }

    /// Record a simulated build/configure of `key`.
    pub fn simulate_build(&mut self, key: PackageKey, package: SelectedPackage) {
        self.overlay.insert(key, Some(package));
    }

    /// Record a simulated drop of `key`.
    pub fn simulate_drop(&mut self, key: PackageKey) {
        self.overlay.insert(key, None);
    }

    /// Take a restorable snapshot of the overlay, for cluster negotiation
    /// rollback (spec.md §9 "Persistent-store session cache reload").
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            overlay: self.overlay.clone(),
        }
    }

    /// Restore the overlay to a previously taken snapshot, discarding any
    /// writes made since.
    pub fn restore(&mut self, snapshot: Snapshot) {
        self.overlay = snapshot.overlay;
    }

    /// Render the overlay as an ordered list of plan actions for
    /// checksumming, in key order for determinism.
    #[must_use]
    pub fn into_actions(self) -> Vec<PlanAction> {
        let mut keys: Vec<_> = self.overlay.keys().cloned().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| {
                self.overlay.get(&key).cloned().flatten().map(|pkg| PlanAction {
                    key,
                    version: pkg.version.to_string(),
                    state: pkg.state,
                    substate: pkg.substate,
                })
            })
            .collect()
    }
}

/// An opaque, restorable copy of a [`Simulation`]'s pending writes.
#[derive(Clone)]
pub struct Snapshot {
    overlay: AHashMap<PackageKey, Option<SelectedPackage>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use crate::types::SelectedState;
    use bpkg_config::ConfigId;
    use bpkg_core::{PackageName, Version};

    fn key(name: &str) -> PackageKey {
        PackageKey::new(ConfigId::from_raw(1), PackageName::parse(name).unwrap())
    }

    #[test]
    fn snapshot_restore_undoes_writes() {
        let store = InMemoryStore::new();
        let mut sim = Simulation::new(&store);
        let snap = sim.snapshot();
        sim.simulate_build(
            key("libfoo"),
            SelectedPackage::new(PackageName::parse("libfoo").unwrap(), Version::parse("1.0.0").unwrap(), SelectedState::Configured),
        );
        assert!(sim.find_selected(&key("libfoo")).is_some());
        sim.restore(snap);
        assert!(sim.find_selected(&key("libfoo")).is_none());
    }

    #[test]
    fn overlay_falls_through_to_base() {
        let store = InMemoryStore::new();
        store.seed_selected(
            key("libbar"),
            SelectedPackage::new(PackageName::parse("libbar").unwrap(), Version::parse("1.0.0").unwrap(), SelectedState::Configured),
        );
        let sim = Simulation::new(&store);
        assert!(sim.find_selected(&key("libbar")).is_some());
    }

    #[test]
    fn into_actions_is_key_ordered() {
        let store = InMemoryStore::new();
        let mut sim = Simulation::new(&store);
        sim.simulate_build(
            key("libz"),
            SelectedPackage::new(PackageName::parse("libz").unwrap(), Version::parse("1.0.0").unwrap(), SelectedState::Configured),
        );
        sim.simulate_build(
            key("liba"),
            SelectedPackage::new(PackageName::parse("liba").unwrap(), Version::parse("1.0.0").unwrap(), SelectedState::Configured),
        );
        let actions = sim.into_actions();
        assert_eq!(actions[0].key, key("liba"));
        assert_eq!(actions[1].key, key("libz"));
    }
}
