//! Loads the two ambient input files the planner needs: a configuration
//! manifest (`bpkg_config::loader`) and a package database describing the
//! selected/available packages and the user's requested build selection.
//!
//! Dependency-version syntax is intentionally limited to "exact version or
//! unconstrained" — parsing a full build2 version-constraint grammar at the
//! CLI boundary is the kind of package-spec lexing the planner explicitly
//! treats as out of scope.

use ahash::AHashMap;
use anyhow::{Context, Result};
use bpkg_config::{ConfigId, PackageKey};
use bpkg_core::{PackageName, Version, VersionConstraint};
use bpkg_store::{Alternative, AvailablePackage, DependencyGroup, InMemoryStore, SelectedPackage, SelectedState};
use bpkg_planner::UserSelection;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawConfigName {
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawConfigNames {
    #[serde(default)]
    configurations: Vec<RawConfigName>,
}

#[derive(Debug, Deserialize)]
struct RawDb {
    #[serde(default)]
    available: Vec<RawAvailable>,
    #[serde(default)]
    selected: Vec<RawSelected>,
    #[serde(default)]
    selection: Vec<RawSelection>,
}

#[derive(Debug, Deserialize)]
struct RawAvailable {
    name: String,
    version: String,
    #[serde(default)]
    depends: Vec<RawDependencyGroup>,
}

#[derive(Debug, Deserialize)]
struct RawDependencyGroup {
    #[serde(default)]
    buildtime: bool,
    #[serde(default)]
    comment: Option<String>,
    alternatives: Vec<RawAlternative>,
}

#[derive(Debug, Deserialize)]
struct RawAlternative {
    name: String,
    #[serde(default)]
    constraint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSelected {
    name: String,
    version: String,
    config: String,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    hold_package: bool,
    #[serde(default)]
    hold_version: bool,
    #[serde(default)]
    prerequisites: Vec<RawPrerequisite>,
}

#[derive(Debug, Deserialize)]
struct RawPrerequisite {
    name: String,
    config: String,
    #[serde(default)]
    constraint: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSelection {
    name: String,
    version: String,
    config: String,
    #[serde(default)]
    system: bool,
    #[serde(default)]
    hold_package: bool,
    #[serde(default)]
    hold_version: bool,
}

fn parse_version(s: &str) -> Result<Version> {
    Version::parse(s).with_context(|| format!("invalid version '{s}'"))
}

fn parse_name(s: &str) -> Result<PackageName> {
    PackageName::parse(s).with_context(|| format!("invalid package name '{s}'"))
}

fn parse_constraint(s: &Option<String>) -> Result<VersionConstraint> {
    match s {
        None => Ok(VersionConstraint::any()),
        Some(v) => Ok(VersionConstraint::exact(parse_version(v)?)),
    }
}

fn parse_state(s: &Option<String>) -> Result<SelectedState> {
    match s.as_deref() {
        None | Some("configured") => Ok(SelectedState::Configured),
        Some("broken") => Ok(SelectedState::Broken),
        Some("fetched") => Ok(SelectedState::Fetched),
        Some("unpacked") => Ok(SelectedState::Unpacked),
        Some("transient") => Ok(SelectedState::Transient),
        Some(other) => anyhow::bail!("unknown selected-package state '{other}'"),
    }
}

/// The result of loading a configuration manifest plus a package database:
/// a ready-to-use link graph, package store and the user's selections.
pub struct Loaded {
    pub graph: bpkg_config::LinkGraph,
    pub configs: Vec<ConfigId>,
    pub store: std::sync::Arc<InMemoryStore>,
    pub selections: Vec<UserSelection>,
}

/// Load `config_path` (the `[[configurations]]` manifest consumed by
/// `bpkg_config::loader::load`) and `db_path` (selected/available packages
/// and the user's requested build), and validate the resulting graph.
pub fn load(config_path: &Path, db_path: &Path) -> Result<Loaded> {
    let (graph, configs) = bpkg_config::loader::load(config_path)
        .with_context(|| format!("loading configuration manifest {}", config_path.display()))?;
    bpkg_config::validate::validate(&graph, &configs).context("validating configuration graph")?;

    let names_text = std::fs::read_to_string(config_path)?;
    let names: RawConfigNames = toml::from_str(&names_text)?;
    anyhow::ensure!(
        names.configurations.len() == configs.len(),
        "configuration manifest changed between reads"
    );
    let name_to_id: AHashMap<String, ConfigId> =
        names.configurations.into_iter().map(|c| c.name).zip(configs.iter().copied()).collect();

    let resolve = |name: &str| -> Result<ConfigId> {
        name_to_id.get(name).copied().with_context(|| format!("unknown configuration '{name}'"))
    };

    let db_text = std::fs::read_to_string(db_path).with_context(|| format!("reading package database {}", db_path.display()))?;
    let raw: RawDb = toml::from_str(&db_text).with_context(|| format!("parsing package database {}", db_path.display()))?;

    let store = InMemoryStore::new().shared();

    for a in &raw.available {
        let mut available = AvailablePackage::new(parse_name(&a.name)?, parse_version(&a.version)?);
        for group in &a.depends {
            let mut alternatives = Vec::with_capacity(group.alternatives.len());
            for alt in &group.alternatives {
                alternatives.push(Alternative::simple(parse_name(&alt.name)?, Some(parse_constraint(&alt.constraint)?)));
            }
            available.dependencies.push(DependencyGroup { alternatives, buildtime: group.buildtime, comment: group.comment.clone() });
        }
        store.seed_available(available);
    }

    for s in &raw.selected {
        let config = resolve(&s.config)?;
        let mut selected = SelectedPackage::new(parse_name(&s.name)?, parse_version(&s.version)?, parse_state(&s.state)?);
        selected.hold_package = s.hold_package;
        selected.hold_version = s.hold_version;
        for p in &s.prerequisites {
            let prereq_config = resolve(&p.config)?;
            selected.prerequisites.push((PackageKey::new(prereq_config, parse_name(&p.name)?), parse_constraint(&p.constraint)?));
        }
        store.seed_selected(PackageKey::new(config, parse_name(&s.name)?), selected);
    }

    let mut selections = Vec::with_capacity(raw.selection.len());
    for sel in &raw.selection {
        let config = resolve(&sel.config)?;
        selections.push(UserSelection {
            key: PackageKey::new(config, parse_name(&sel.name)?),
            available: AvailablePackage::new(parse_name(&sel.name)?, parse_version(&sel.version)?),
            fragment: None,
            system: sel.system,
            hold_package: sel.hold_package,
            hold_version: sel.hold_version,
        });
    }

    Ok(Loaded { graph, configs, store, selections })
}
