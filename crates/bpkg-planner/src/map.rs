//! Build-package map & ordered list (spec.md §4.1).

use crate::entry::BuildPackageEntry;
use bpkg_config::PackageKey;
use indexmap::IndexMap;

/// Keyed by `(configuration, name)`; uniquely owns every
/// [`BuildPackageEntry`]. The ordered list below aliases it by key, never
/// by pointer, so snapshot/restore only ever needs to re-resolve keys
/// (spec.md §9 "Cyclic ownership in the postponement graph").
#[derive(Debug, Default, Clone)]
pub struct BuildPackageMap {
    entries: IndexMap<PackageKey, BuildPackageEntry>,
    /// Position of each key in the ordered list, `None` meaning
    /// "not yet ordered" (spec.md §4.1 "end = not yet ordered").
    positions: IndexMap<PackageKey, Option<usize>>,
}

impl BuildPackageMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a not-yet-actioned entry; fails if the key is already
    /// present (spec.md §4.1 `enter`).
    ///
    /// # Errors
    /// Returns the key already present.
    pub fn enter(&mut self, entry: BuildPackageEntry) -> Result<(), PackageKey> {
        if self.entries.contains_key(&entry.key) {
            return Err(entry.key);
        }
        let key = entry.key.clone();
        self.entries.insert(key.clone(), entry);
        self.positions.insert(key, None);
        Ok(())
    }

    /// Insert or overwrite an entry unconditionally — the merge/replace
    /// paths in the collector go through this, not `enter`.
    pub fn put(&mut self, entry: BuildPackageEntry) {
        let key = entry.key.clone();
        self.entries.insert(key.clone(), entry);
        self.positions.entry(key).or_insert(None);
    }

    #[must_use]
    pub fn entered_build(&self, key: &PackageKey) -> Option<&BuildPackageEntry> {
        self.entries.get(key)
    }

    pub fn entered_build_mut(&mut self, key: &PackageKey) -> Option<&mut BuildPackageEntry> {
        self.entries.get_mut(key)
    }

    #[must_use]
    pub fn contains(&self, key: &PackageKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn remove(&mut self, key: &PackageKey) -> Option<BuildPackageEntry> {
        self.positions.shift_remove(key);
        self.entries.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PackageKey, &BuildPackageEntry)> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut BuildPackageEntry> {
        self.entries.values_mut()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn position_of(&self, key: &PackageKey) -> Option<usize> {
        self.positions.get(key).copied().flatten()
    }

    #[must_use]
    pub fn is_ordered(&self, key: &PackageKey) -> bool {
        self.position_of(key).is_some()
    }

    /// Reset every entry's order position, keeping the map (spec.md §4.1
    /// `clear_order`).
    pub fn clear_order(&mut self) {
        for pos in self.positions.values_mut() {
            *pos = None;
        }
    }

    /// Drop both map and positions (spec.md §4.1 `clear`).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.positions.clear();
    }

    pub(crate) fn mark_position(&mut self, key: &PackageKey, pos: Option<usize>) {
        if let Some(slot) = self.positions.get_mut(key) {
            *slot = pos;
        }
    }
}

/// Doubly-linked (by key) ordered list: entries arranged so every
/// package only depends on those after it — reverse build order
/// (spec.md §3 "Ordered list").
#[derive(Debug, Default, Clone)]
pub struct OrderedList {
    keys: Vec<PackageKey>,
}

impl OrderedList {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn position_of(&self, key: &PackageKey) -> Option<usize> {
        self.keys.iter().position(|k| k == key)
    }

    /// Insert `key` at `pos`, shifting later entries back, and update the
    /// map's position bookkeeping for every shifted key (spec.md §4.1
    /// `insert_ordered`).
    pub fn insert_ordered(&mut self, map: &mut BuildPackageMap, pos: usize, key: PackageKey) {
        let pos = pos.min(self.keys.len());
        self.keys.insert(pos, key);
        self.reindex_from(map, pos);
    }

    /// Append at the end (earliest build position, per the
    /// last-to-build-first-in-list convention used by the orderer).
    pub fn push_back(&mut self, map: &mut BuildPackageMap, key: PackageKey) -> usize {
        let pos = self.keys.len();
        self.keys.push(key);
        map.mark_position(&self.keys[pos], Some(pos));
        pos
    }

    /// Remove the entry at `pos` (spec.md §4.1 `erase_ordered`).
    pub fn erase_ordered(&mut self, map: &mut BuildPackageMap, pos: usize) {
        if pos >= self.keys.len() {
            return;
        }
        map.mark_position(&self.keys[pos], None);
        self.keys.remove(pos);
        self.reindex_from(map, pos);
    }

    /// Remove `key` wherever it is, if present.
    pub fn erase_key(&mut self, map: &mut BuildPackageMap, key: &PackageKey) {
        if let Some(pos) = self.position_of(key) {
            self.erase_ordered(map, pos);
        }
    }

    fn reindex_from(&mut self, map: &mut BuildPackageMap, from: usize) {
        for (idx, key) in self.keys.iter().enumerate().skip(from) {
            map.mark_position(key, Some(idx));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageKey> {
        self.keys.iter()
    }

    /// Deep-copy the list's keys for a snapshot; positions are rebuilt in
    /// the destination map by re-linking via key lookup (spec.md §4.1
    /// "Copy/snapshot").
    #[must_use]
    pub fn snapshot_keys(&self) -> Vec<PackageKey> {
        self.keys.clone()
    }

    /// Rebuild from a snapshot's keys, re-linking positions into `map`
    /// via key lookup rather than any stale pointer (spec.md §9).
    pub fn restore_from(&mut self, map: &mut BuildPackageMap, keys: Vec<PackageKey>) {
        map.clear_order();
        self.keys = keys;
        for (idx, key) in self.keys.iter().enumerate() {
            map.mark_position(key, Some(idx));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::BuildPackageEntry;
    use bpkg_config::ConfigId;
    use bpkg_core::PackageName;
    use bpkg_store::{AvailablePackage, SelectedPackage};

    fn key(name: &str) -> PackageKey {
        PackageKey::new(ConfigId::from_raw(1), PackageName::parse(name).unwrap())
    }

    #[test]
    fn enter_rejects_duplicate() {
        let mut map = BuildPackageMap::new();
        let k = key("libfoo");
        map.enter(BuildPackageEntry::pre_entered(k.clone())).unwrap();
        assert!(map.enter(BuildPackageEntry::pre_entered(k)).is_err());
    }

    #[test]
    fn ordered_list_tracks_positions() {
        let mut map = BuildPackageMap::new();
        let mut list = OrderedList::new();
        let a = key("liba");
        let b = key("libb");
        map.put(BuildPackageEntry::build(a.clone(), AvailablePackage::new(a.name.clone(), bpkg_core::Version::parse("1.0").unwrap())));
        map.put(BuildPackageEntry::build(b.clone(), AvailablePackage::new(b.name.clone(), bpkg_core::Version::parse("1.0").unwrap())));
        list.push_back(&mut map, a.clone());
        list.push_back(&mut map, b.clone());
        assert_eq!(map.position_of(&a), Some(0));
        assert_eq!(map.position_of(&b), Some(1));
        list.insert_ordered(&mut map, 0, key("libc"));
        assert_eq!(map.position_of(&a), Some(1));
        assert_eq!(map.position_of(&b), Some(2));
    }

    #[test]
    fn clear_order_resets_positions_keeps_entries() {
        let mut map = BuildPackageMap::new();
        let mut list = OrderedList::new();
        let a = key("liba");
        map.put(BuildPackageEntry::drop(a.clone(), SelectedPackage::new(a.name.clone(), bpkg_core::Version::parse("1.0").unwrap(), bpkg_store::SelectedState::Configured)));
        list.push_back(&mut map, a.clone());
        map.clear_order();
        assert!(map.contains(&a));
        assert_eq!(map.position_of(&a), None);
    }
}
