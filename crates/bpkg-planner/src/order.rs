//! Orderer: topological placement of collected entries with cycle
//! detection and reorder-on-demand (spec.md §4.9).

use crate::collector::Collector;
use crate::error::{PlanError, Result};
use ahash::AHashSet;
use bpkg_config::PackageKey;

impl Collector {
    /// `order(name, buildtime?, chain, reorder)` (spec.md §4.9).
    ///
    /// Resolves the entry via the map, detects cycles along `chain`,
    /// recursively orders prerequisites first (persisted ones for an
    /// already-configured non-system entry with no pending changes,
    /// collected ones otherwise), then inserts the entry at the earliest
    /// position among its recursed prerequisites.
    pub fn order(&mut self, key: &PackageKey, chain: &mut Vec<PackageKey>, reorder: bool) -> Result<usize> {
        if chain.contains(key) {
            let path = chain
                .iter()
                .skip_while(|k| *k != key)
                .map(std::string::ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(PlanError::Cycle(format!("{path} -> {key}")));
        }

        if let Some(pos) = self.state.map.position_of(key) {
            if !reorder {
                return Ok(pos);
            }
            self.state.order.erase_key(&mut self.state.map, key);
        }

        chain.push(key.clone());
        let result = self.order_inner(key, chain, reorder);
        chain.pop();
        result
    }

    fn order_inner(&mut self, key: &PackageKey, chain: &mut Vec<PackageKey>, reorder: bool) -> Result<usize> {
        let Some(entry) = self.state.map.entered_build(key).cloned() else {
            return Err(PlanError::Invariant(format!("order: {key} is not in the build map")));
        };

        let use_persisted = entry.is_configured_non_system()
            && !entry.flags.contains(crate::entry::EntryFlags::ADJUST_RECONFIGURE)
            && entry.dependencies.as_ref().map_or(true, |d| !d.iter().any(|g| g.has_config_clause));

        let mut earliest: Option<usize> = None;
        if use_persisted {
            if let Some(selected) = &entry.selected {
                for (prereq, _) in &selected.prerequisites {
                    if self.state.map.contains(prereq) {
                        let pos = self.order(prereq, chain, false)?;
                        earliest = Some(earliest.map_or(pos, |e: usize| e.min(pos)));
                    }
                }
            }
        } else if let Some(groups) = &entry.dependencies {
            for group in groups.iter().rev() {
                if group.picked.is_empty() {
                    continue;
                }
                for picked in &group.picked {
                    let pos = self.order(picked, chain, false)?;
                    earliest = Some(earliest.map_or(pos, |e: usize| e.min(pos)));
                }
            }
        }

        if entry.disfigure {
            if let Some(selected) = &entry.selected {
                for (prereq, _) in &selected.prerequisites {
                    if self.state.map.contains(prereq) {
                        let pos = self.order(prereq, chain, false)?;
                        earliest = Some(earliest.map_or(pos, |e: usize| e.min(pos)));
                    }
                }
            }
        }

        let insert_at = earliest.unwrap_or(self.state.order.len());
        let pos = self.state.order.len().min(insert_at);
        self.state.order.insert_ordered(&mut self.state.map, pos, key.clone());
        let _ = reorder;
        Ok(self.state.map.position_of(key).unwrap_or(pos))
    }

    /// `collect_order_dependents`: for each already-ordered build entry
    /// that is configured and will be reconfigured/up/down-graded, walk
    /// every dependent configuration and adjust it ahead of the
    /// dependency (spec.md §4.9).
    pub fn collect_order_dependents(&mut self) -> Result<()> {
        let candidates: Vec<PackageKey> = self
            .state
            .map
            .iter()
            .filter(|(k, e)| {
                self.state.map.is_ordered(k)
                    && e.action == Some(crate::entry::Action::Build)
                    && e.available.as_ref().is_some_and(|available| {
                        self.store
                            .find_selected(k)
                            .is_some_and(|persisted| persisted.version != available.version)
                    })
            })
            .map(|(k, _)| k.clone())
            .collect();

        let mut visited = AHashSet::default();
        for key in candidates {
            self.walk_dependents(&key, &mut visited)?;
        }
        Ok(())
    }

    fn walk_dependents(&mut self, key: &PackageKey, visited: &mut AHashSet<PackageKey>) -> Result<()> {
        if !visited.insert(key.clone()) {
            return Ok(());
        }
        let Some(new_version) = self.state.map.entered_build(key).and_then(|e| e.available.as_ref()).map(|a| a.version.clone()) else {
            return Ok(());
        };
        let dependents = self.store.query_dependents(key);
        for (dependent_key, constraint) in dependents {
            if !constraint.satisfies(&new_version) {
                let being_rebuilt = self.state.map.contains(&dependent_key);
                if !being_rebuilt {
                    return Err(PlanError::DependentConstraintViolated {
                        dependency: key.name.clone(),
                        new_version,
                        dependent: dependent_key,
                        constraint,
                    });
                }
            }

            if let Some(selected) = self.store.find_selected(&dependent_key) {
                if !self.state.map.contains(&dependent_key) {
                    let entry = crate::entry::BuildPackageEntry::adjust(dependent_key.clone(), selected, crate::entry::EntryFlags::ADJUST_RECONFIGURE);
                    self.state.map.put(entry);
                }
            }
            if let Some(e) = self.state.map.entered_build_mut(&dependent_key) {
                e.flags |= crate::entry::EntryFlags::ADJUST_RECONFIGURE;
            }

            let dep_pos = self.state.map.position_of(key);
            let existing_pos = self.state.map.position_of(&dependent_key);
            match (dep_pos, existing_pos) {
                (Some(dpos), Some(epos)) if epos > dpos => {
                    self.state.order.erase_key(&mut self.state.map, &dependent_key);
                    self.state.order.insert_ordered(&mut self.state.map, dpos, dependent_key.clone());
                }
                (Some(dpos), None) => {
                    self.state.order.insert_ordered(&mut self.state.map, dpos, dependent_key.clone());
                }
                _ => {}
            }

            self.walk_dependents(&dependent_key, visited)?;
        }
        Ok(())
    }
}
