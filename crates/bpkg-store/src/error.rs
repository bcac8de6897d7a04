//! Errors raised by the package store, transactions and simulation.

use bpkg_config::PackageKey;
use thiserror::Error;

/// Result alias used throughout `bpkg-store`.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors raised while querying, transacting against, or persisting the
/// selected/available package store (spec.md §6.1, §6.7).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No transaction is open for the configuration being written.
    #[error("[E2001] no open transaction for configuration {0:?}")]
    NoOpenTransaction(bpkg_config::ConfigId),

    /// A transaction was already open when `begin_transaction` was called
    /// again for the same configuration.
    #[error("[E2002] transaction already open for configuration {0:?}")]
    TransactionAlreadyOpen(bpkg_config::ConfigId),

    /// The referenced package key has no selected record.
    #[error("[E2003] package {0} is not selected")]
    NotSelected(PackageKey),

    /// The referenced repository fragment has not been loaded.
    #[error("[E2004] repository fragment {0:?} has not been loaded")]
    FragmentNotLoaded(crate::types::RepositoryFragmentId),

    /// Persisting the store to disk failed.
    #[error("[E2005] failed to persist store at {path}: {source}")]
    Persist {
        /// Path the store was being written to.
        path: std::path::PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The system catalog has no record for the given package.
    #[error("[E2006] no system package information for '{0}'")]
    NoSystemInfo(String),
}
