//! Loading a set of linked configuration databases from a TOML manifest.
//!
//! This is the ambient "configuration loading" layer the core treats as an
//! external collaborator: it produces the [`LinkGraph`] and the list of
//! "current" configurations the planner is asked to operate on.

use crate::config::{ConfigHandle, ConfigType};
use crate::error::{ConfigError, Result};
use crate::graph::LinkGraph;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    configurations: Vec<RawConfig>,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    name: String,
    path: PathBuf,
    #[serde(rename = "type")]
    config_type: String,
    #[serde(default)]
    links: Vec<String>,
    #[serde(default)]
    vars: BTreeMap<String, String>,
}

fn parse_type(s: &str) -> Result<ConfigType> {
    match s {
        "target" => Ok(ConfigType::Target),
        "host" => Ok(ConfigType::Host),
        "build2" => Ok(ConfigType::Build2),
        other => Err(ConfigError::UnknownLink(other.to_string())),
    }
}

/// Parse and link a set of configuration databases from a TOML manifest.
///
/// Returns the populated [`LinkGraph`] plus the list of configurations
/// named under `[[configurations]]`, in file order (this order becomes the
/// planner's "current configurations" list, spec.md §6 "Input").
pub fn load(path: &Path) -> Result<(LinkGraph, Vec<crate::config::ConfigId>)> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: RawManifest = toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })?;

    let mut graph = LinkGraph::new();
    let mut by_name = BTreeMap::new();
    let mut ordered = Vec::new();

    for cfg in &raw.configurations {
        let mut handle = ConfigHandle::new(parse_type(&cfg.config_type)?, cfg.path.clone());
        for (k, v) in &cfg.vars {
            handle.set_var(k.clone(), v.clone());
        }
        let id = graph.register(handle);
        by_name.insert(cfg.name.clone(), id);
        ordered.push(id);
        debug!(name = %cfg.name, ty = %cfg.config_type, "loaded configuration");
    }

    for cfg in &raw.configurations {
        let from = by_name[&cfg.name];
        for link in &cfg.links {
            let to = *by_name
                .get(link)
                .ok_or_else(|| ConfigError::UnknownLink(link.clone()))?;
            graph.link_explicit(from, to);
        }
    }

    Ok((graph, ordered))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_linked_configurations() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            f,
            r#"
            [[configurations]]
            name = "target"
            path = "/cfg/target"
            type = "target"
            links = ["host"]

            [[configurations]]
            name = "host"
            path = "/cfg/host"
            type = "host"
            "#
        )
        .unwrap();

        let (graph, ordered) = load(f.path()).unwrap();
        assert_eq!(ordered.len(), 2);
        let target = ordered[0];
        let host = ordered[1];
        assert_eq!(graph.get(target).unwrap().config_type(), ConfigType::Target);
        assert!(graph.cluster_of(target).contains(&host));
    }
}
