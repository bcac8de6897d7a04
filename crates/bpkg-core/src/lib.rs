//! Foundational identity and ordering primitives for the bpkg build planner.
//!
//! This crate provides the types every other `bpkg-*` crate builds on:
//! - [`PackageName`]: a validated package identifier with a canonical
//!   variable form.
//! - [`Version`] and [`VersionConstraint`]: a totally ordered version model
//!   (epoch, upstream, pre-release, revision, iteration) with a wildcard
//!   sentinel and closed/half-open interval constraints.
//! - [`Error`]/[`Result`]: the shared error type for parse/validation
//!   failures in this crate.

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod constraint;
mod error;
mod name;
mod version;

pub use constraint::{Bound, VersionConstraint};
pub use error::{Error, Result};
pub use name::PackageName;
pub use version::{PreRelease, Version};

pub use ahash::{AHashMap, AHashSet};
