//! Selected/available package store, transactions, simulated execution,
//! and the system-version authority for the bpkg build planner.
//!
//! This crate owns spec.md §3's "Selected package" and "Available
//! package" records and the external collaborators described in §6.1
//! ("Package store"), §6.3 ("System-version authority") and §6.7 ("Plan
//! executor", simulated half only). A real on-disk schema, repository
//! fetch, and process-executing plan runner are out of scope; what's
//! here is the trait seam plus in-memory implementations the planner and
//! its tests are built against.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod atomic;
pub mod checksum;
mod error;
pub mod simulate;
mod store;
pub mod system;
mod types;

pub use checksum::{plan_checksum, PlanAction};
pub use error::{Result, StoreError};
pub use simulate::{Simulation, Snapshot};
pub use store::{InMemoryStore, PackageStore};
pub use system::{NoSystemAuthority, SystemCatalog, SystemVersionAuthority};
pub use types::{
    Alternative, AvailablePackage, DependencyGroup, PackageType, ReplacedVersion, RepointedMap,
    RepositoryFragmentId, SelectedPackage, SelectedState, SubState,
};
