//! The `PackageStore` trait and an in-memory reference implementation
//! (spec.md §6.1 "Package store").
//!
//! The planner never touches persistence directly: it asks a
//! `PackageStore` for selected/available packages and wraps its mutations
//! in a transaction, mirroring the teacher's session-scoped lockfile
//! transactions.

use crate::error::{Result, StoreError};
use crate::types::{AvailablePackage, RepositoryFragmentId, SelectedPackage};
use ahash::AHashMap;
use bpkg_config::{ConfigId, PackageKey};
use bpkg_core::PackageName;
use parking_lot::Mutex;
use std::sync::Arc;

/// External collaborator: persisted selected/available package state
/// plus transactional mutation, per configuration (spec.md §6.1).
///
/// A concrete on-disk implementation (schema, locking, migration) is out
/// of scope; this trait is the seam the planner and tests are written
/// against.
pub trait PackageStore: Send + Sync {
    /// Look up a selected package by key.
    fn find_selected(&self, key: &PackageKey) -> Option<SelectedPackage>;

    /// All configured dependents of `key` across every configuration the
    /// store knows about, together with the dependency constraint they
    /// recorded for it.
    fn query_dependents(&self, key: &PackageKey) -> Vec<(PackageKey, bpkg_core::VersionConstraint)>;

    /// Available packages of `name` across all loaded repository
    /// fragments, ordered newest-first.
    fn query_available(&self, name: &PackageName) -> Vec<AvailablePackage>;

    /// Ensure a repository fragment is loaded, returning its id.
    fn load_repository_fragment(&self, location: &str) -> Result<RepositoryFragmentId>;

    /// Open a transaction for `config`. Only one transaction per
    /// configuration may be open at a time.
    fn begin_transaction(&self, config: ConfigId) -> Result<()>;

    /// Commit the open transaction for `config`, making its staged
    /// selected-package writes visible.
    fn commit(&self, config: ConfigId) -> Result<()>;

    /// Discard the open transaction for `config` and its staged writes.
    fn rollback(&self, config: ConfigId) -> Result<()>;

    /// Stage a selected-package write within the open transaction.
    fn stage_selected(&self, key: PackageKey, package: SelectedPackage) -> Result<()>;

    /// Stage the removal of a selected package within the open
    /// transaction.
    fn stage_drop(&self, key: &PackageKey) -> Result<()>;
}

#[derive(Default, Debug)]
struct Transaction {
    writes: AHashMap<PackageKey, Option<SelectedPackage>>,
}

#[derive(Debug)]
struct Inner {
    selected: AHashMap<PackageKey, SelectedPackage>,
    available: AHashMap<PackageName, Vec<AvailablePackage>>,
    fragments: Vec<String>,
    open_txns: AHashMap<ConfigId, Transaction>,
}

/// A session-scoped, in-process `PackageStore`. Mirrors the shape of a
/// real on-disk store closely enough to drive the planner and its tests
/// without touching the filesystem.
#[derive(Debug)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                selected: AHashMap::default(),
                available: AHashMap::default(),
                fragments: Vec::new(),
                open_txns: AHashMap::default(),
            }),
        }
    }

    /// Seed a selected package directly, bypassing transactions. Used by
    /// tests and by initial store construction from a lockfile.
    pub fn seed_selected(&self, key: PackageKey, package: SelectedPackage) {
        self.inner.lock().selected.insert(key, package);
    }

    /// Seed an available package directly. Used by tests and by
    /// repository-fragment loading.
    pub fn seed_available(&self, package: AvailablePackage) {
        let mut inner = self.inner.lock();
        inner.available.entry(package.name.clone()).or_default().push(package);
    }

    /// Wrap this store in an `Arc` for sharing with the planner.
    #[must_use]
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl PackageStore for InMemoryStore {
    fn find_selected(&self, key: &PackageKey) -> Option<SelectedPackage> {
        self.inner.lock().selected.get(key).cloned()
    }

    fn query_dependents(&self, key: &PackageKey) -> Vec<(PackageKey, bpkg_core::VersionConstraint)> {
        let inner = self.inner.lock();
        inner
            .selected
            .iter()
            .flat_map(|(dependent_key, pkg)| {
                pkg.prerequisites
                    .iter()
                    .filter(|(prereq, _)| prereq == key)
                    .map(move |(_, constraint)| (dependent_key.clone(), constraint.clone()))
            })
            .collect()
    }

    fn query_available(&self, name: &PackageName) -> Vec<AvailablePackage> {
        let mut versions = self.inner.lock().available.get(name).cloned().unwrap_or_default();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        versions
    }

    fn load_repository_fragment(&self, location: &str) -> Result<RepositoryFragmentId> {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.fragments.iter().position(|f| f == location) {
            return Ok(RepositoryFragmentId(pos as u32));
        }
        inner.fragments.push(location.to_string());
        Ok(RepositoryFragmentId((inner.fragments.len() - 1) as u32))
    }

    fn begin_transaction(&self, config: ConfigId) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.open_txns.contains_key(&config) {
            return Err(StoreError::TransactionAlreadyOpen(config));
        }
        inner.open_txns.insert(config, Transaction::default());
        Ok(())
    }

    fn commit(&self, config: ConfigId) -> Result<()> {
        let mut inner = self.inner.lock();
        let txn = inner
            .open_txns
            .remove(&config)
            .ok_or(StoreError::NoOpenTransaction(config))?;
        for (key, write) in txn.writes {
            match write {
                Some(pkg) => {
                    inner.selected.insert(key, pkg);
                }
                None => {
                    inner.selected.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn rollback(&self, config: ConfigId) -> Result<()> {
        let mut inner = self.inner.lock();
        inner
            .open_txns
            .remove(&config)
            .ok_or(StoreError::NoOpenTransaction(config))?;
        Ok(())
    }

    fn stage_selected(&self, key: PackageKey, package: SelectedPackage) -> Result<()> {
        let mut inner = self.inner.lock();
        let txn = inner
            .open_txns
            .get_mut(&key.config)
            .ok_or(StoreError::NoOpenTransaction(key.config))?;
        txn.writes.insert(key, Some(package));
        Ok(())
    }

    fn stage_drop(&self, key: &PackageKey) -> Result<()> {
        let mut inner = self.inner.lock();
        let txn = inner
            .open_txns
            .get_mut(&key.config)
            .ok_or(StoreError::NoOpenTransaction(key.config))?;
        txn.writes.insert(key.clone(), None);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SelectedState;
    use bpkg_core::Version;

    fn key(config: u32, name: &str) -> PackageKey {
        PackageKey::new(ConfigId::from_raw(config), PackageName::parse(name).unwrap())
    }

    #[test]
    fn commit_makes_staged_write_visible() {
        let store = InMemoryStore::new();
        let k = key(1, "libfoo");
        store.begin_transaction(k.config).unwrap();
        store
            .stage_selected(
                k.clone(),
                SelectedPackage::new(k.name.clone(), Version::parse("1.0.0").unwrap(), SelectedState::Configured),
            )
            .unwrap();
        assert!(store.find_selected(&k).is_none());
        store.commit(k.config).unwrap();
        assert!(store.find_selected(&k).is_some());
    }

    #[test]
    fn rollback_discards_staged_write() {
        let store = InMemoryStore::new();
        let k = key(1, "libfoo");
        store.begin_transaction(k.config).unwrap();
        store
            .stage_selected(
                k.clone(),
                SelectedPackage::new(k.name.clone(), Version::parse("1.0.0").unwrap(), SelectedState::Configured),
            )
            .unwrap();
        store.rollback(k.config).unwrap();
        assert!(store.find_selected(&k).is_none());
    }

    #[test]
    fn double_begin_fails() {
        let store = InMemoryStore::new();
        store.begin_transaction(ConfigId::from_raw(1)).unwrap();
        assert!(store.begin_transaction(ConfigId::from_raw(1)).is_err());
    }

    #[test]
    fn query_available_sorts_newest_first() {
        let store = InMemoryStore::new();
        let name = PackageName::parse("libfoo").unwrap();
        store.seed_available(AvailablePackage::new(name.clone(), Version::parse("1.0.0").unwrap()));
        store.seed_available(AvailablePackage::new(name.clone(), Version::parse("2.0.0").unwrap()));
        let versions = store.query_available(&name);
        assert_eq!(versions[0].version.to_string(), "2.0.0");
    }
}
