//! Structural validation of a loaded configuration set.

use crate::config::ConfigId;
use crate::error::{ConfigError, Result};
use crate::graph::LinkGraph;
use ahash::AHashSet;

/// Check that every configuration path is unique and that every private
/// configuration has a registered parent. This runs once after
/// [`crate::loader::load`], before the planner ever sees the graph.
pub fn validate(graph: &LinkGraph, configs: &[ConfigId]) -> Result<()> {
    let mut seen_paths = AHashSet::default();
    for &id in configs {
        let Some(handle) = graph.get(id) else {
            continue;
        };
        if !seen_paths.insert(handle.path().to_path_buf()) {
            return Err(ConfigError::UnknownLink(format!(
                "duplicate configuration path {}",
                handle.path().display()
            )));
        }
        if handle.is_private() && graph.parent_of(id).is_none() {
            return Err(ConfigError::UnknownLink(format!(
                "private configuration {} has no parent",
                handle.path().display()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigHandle, ConfigType};

    #[test]
    fn rejects_duplicate_paths() {
        let mut graph = LinkGraph::new();
        let a = graph.register(ConfigHandle::new(ConfigType::Target, "/cfg/x"));
        let b = graph.register(ConfigHandle::new(ConfigType::Target, "/cfg/x"));
        assert!(validate(&graph, &[a, b]).is_err());
    }

    #[test]
    fn accepts_well_formed_graph() {
        let mut graph = LinkGraph::new();
        let a = graph.register(ConfigHandle::new(ConfigType::Target, "/cfg/a"));
        let b = graph.register(ConfigHandle::new(ConfigType::Host, "/cfg/b"));
        graph.link_explicit(a, b);
        assert!(validate(&graph, &[a, b]).is_ok());
    }
}
