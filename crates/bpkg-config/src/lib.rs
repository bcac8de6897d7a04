//! Configuration (database) handles, their link graph, and skeleton
//! evaluation for the bpkg build planner.
//!
//! This crate models spec.md §3's "Configuration (database)": an opaque
//! handle with a type tag, canonical path, link graph, and per-package
//! skeleton evaluation context. It is the planner's view of the
//! collaborators described in spec.md §6.5/§6.6 (private-configuration
//! creator, skeleton evaluator).

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod config;
mod error;
mod graph;
mod key;
pub mod loader;
mod skeleton;
pub mod validate;

pub use config::{ConfigHandle, ConfigId, ConfigType};
pub use error::{ConfigError, Result};
pub use graph::{ConfigSearch, LinkGraph};
pub use key::PackageKey;
pub use skeleton::{Clause, ConfigVar, LiteralSkeletonEvaluator, Skeleton, SkeletonEvaluator};
