//! Repository query backed by whatever was seeded into the store's
//! available-package table. Real repository fetch over the network is an
//! explicit Non-goal; this is the offline stand-in the CLI wires in.

use bpkg_config::ConfigId;
use bpkg_core::{PackageName, VersionConstraint};
use bpkg_planner::interfaces::RepositoryQuery;
use bpkg_store::{AvailablePackage, InMemoryStore, PackageStore};
use std::sync::Arc;

#[derive(Debug)]
pub struct StoreBackedRepo(pub Arc<InMemoryStore>);

impl RepositoryQuery for StoreBackedRepo {
    fn filter(&self, _from: ConfigId, name: &PackageName, constraint: &VersionConstraint) -> Vec<AvailablePackage> {
        self.0.query_available(name).into_iter().filter(|a| constraint.satisfies(&a.version)).collect()
    }
}
