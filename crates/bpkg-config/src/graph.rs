//! The configuration link graph: dependent-configs, dependency-configs,
//! explicit-links and cluster-configs (spec.md §3 "Configuration (database)").

use crate::config::{ConfigHandle, ConfigId, ConfigType};
use crate::error::{ConfigError, Result};
use ahash::{AHashMap, AHashSet};

/// Outcome of searching a dependent's explicit links for a configuration of
/// a required type (spec.md §4.5).
#[derive(Debug)]
pub enum ConfigSearch {
    /// No matching configuration exists; the caller should create a private one.
    None,
    /// Exactly one match.
    One(ConfigId),
    /// More than one match; the caller must fail and ask for `--config-*`.
    Many(Vec<ConfigId>),
}

/// Registry of configuration handles plus their link graph.
#[derive(Debug, Default)]
pub struct LinkGraph {
    configs: AHashMap<ConfigId, ConfigHandle>,
    /// For config `c`, the configs whose packages have `c` as a dependency.
    dependent_configs: AHashMap<ConfigId, AHashSet<ConfigId>>,
    /// For config `c`, the configs `c`'s packages depend on.
    dependency_configs: AHashMap<ConfigId, AHashSet<ConfigId>>,
    /// Explicit `--link`ed configurations, searched to satisfy build-time
    /// dependencies before a private configuration is created.
    explicit_links: AHashMap<ConfigId, AHashSet<ConfigId>>,
    /// Union-find-ish grouping of configs that share a link cluster, used
    /// by the final "no build-system module twice in one cluster" check.
    cluster_configs: AHashMap<ConfigId, AHashSet<ConfigId>>,
    /// Private configuration -> the parent it was created under.
    parents: AHashMap<ConfigId, ConfigId>,
}

impl LinkGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handle: ConfigHandle) -> ConfigId {
        let id = handle.id();
        self.configs.insert(id, handle);
        self.cluster_configs.entry(id).or_default().insert(id);
        id
    }

    pub fn register_private(&mut self, handle: ConfigHandle, parent: ConfigId) -> ConfigId {
        let id = self.register(handle);
        self.parents.insert(id, parent);
        self.link_explicit(parent, id);
        id
    }

    #[must_use]
    pub fn get(&self, id: ConfigId) -> Option<&ConfigHandle> {
        self.configs.get(&id)
    }

    pub fn get_mut(&mut self, id: ConfigId) -> Option<&mut ConfigHandle> {
        self.configs.get_mut(&id)
    }

    #[must_use]
    pub fn parent_of(&self, id: ConfigId) -> Option<ConfigId> {
        self.parents.get(&id).copied()
    }

    /// Link `from` to `to`: `to` becomes a dependency-config of `from`, an
    /// explicit link, and both join the same cluster.
    pub fn link_explicit(&mut self, from: ConfigId, to: ConfigId) {
        self.dependency_configs.entry(from).or_default().insert(to);
        self.dependent_configs.entry(to).or_default().insert(from);
        self.explicit_links.entry(from).or_default().insert(to);
        self.explicit_links.entry(to).or_default().insert(from);
        self.merge_clusters(from, to);
    }

    fn merge_clusters(&mut self, a: ConfigId, b: ConfigId) {
        let b_cluster: Vec<ConfigId> = self
            .cluster_configs
            .get(&b)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        let a_cluster: Vec<ConfigId> = self
            .cluster_configs
            .get(&a)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        let merged: AHashSet<ConfigId> = a_cluster.iter().chain(b_cluster.iter()).copied().collect();
        for id in &merged {
            self.cluster_configs.insert(*id, merged.clone());
        }
    }

    #[must_use]
    pub fn cluster_of(&self, id: ConfigId) -> AHashSet<ConfigId> {
        self.cluster_configs.get(&id).cloned().unwrap_or_else(|| {
            let mut s = AHashSet::default();
            s.insert(id);
            s
        })
    }

    #[must_use]
    pub fn explicit_links(&self, id: ConfigId) -> impl Iterator<Item = ConfigId> + '_ {
        self.explicit_links.get(&id).into_iter().flatten().copied()
    }

    /// Search `dependent`'s explicit links (walking up to the parent if
    /// `dependent` is itself private) for a configuration of `required`
    /// type, per spec.md §4.5.
    pub fn find_build_time_config(&self, dependent: ConfigId, required: ConfigType) -> Result<ConfigSearch> {
        let search_root = if self
            .configs
            .get(&dependent)
            .is_some_and(ConfigHandle::is_private)
        {
            self.parent_of(dependent).unwrap_or(dependent)
        } else {
            dependent
        };

        let matches: Vec<ConfigId> = self
            .explicit_links(search_root)
            .filter(|id| self.configs.get(id).map(ConfigHandle::config_type) == Some(required))
            .collect();

        match matches.len() {
            0 => Ok(ConfigSearch::None),
            1 => Ok(ConfigSearch::One(matches[0])),
            _ => Ok(ConfigSearch::Many(matches)),
        }
    }

    /// Validate a would-be dependency edge against the forbidden
    /// combinations of spec.md §4.5: a build-time dependency reaching into
    /// a build-system-module (`build2`) configuration from a non-module
    /// dependent in the *same* configuration, or vice versa.
    pub fn check_forbidden(
        &self,
        dependent: ConfigId,
        dependency: ConfigId,
        buildtime: bool,
        dependent_is_module: bool,
        dependency_is_module: bool,
    ) -> Result<()> {
        let same_config = dependent == dependency;
        if same_config && dependency_is_module && !dependent_is_module {
            return Err(ConfigError::ForbiddenCombination(
                "build-system module depended on from a non-module package in the same configuration".into(),
            ));
        }
        if buildtime
            && self
                .configs
                .get(&dependent)
                .map(ConfigHandle::config_type)
                == Some(ConfigType::Build2)
        {
            return Err(ConfigError::ForbiddenCombination(
                "build-time dependency inside a build-system-module configuration".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn links_create_shared_cluster() {
        let mut g = LinkGraph::new();
        let target = g.register(ConfigHandle::new(ConfigType::Target, "/cfg/target"));
        let host = g.register(ConfigHandle::new(ConfigType::Host, "/cfg/host"));
        g.link_explicit(target, host);
        assert!(g.cluster_of(target).contains(&host));
        assert!(g.cluster_of(host).contains(&target));
    }

    #[test]
    fn find_build_time_config_reports_arity() {
        let mut g = LinkGraph::new();
        let target = g.register(ConfigHandle::new(ConfigType::Target, "/cfg/target"));
        assert!(matches!(
            g.find_build_time_config(target, ConfigType::Host).unwrap(),
            ConfigSearch::None
        ));

        let host = g.register(ConfigHandle::new(ConfigType::Host, "/cfg/host"));
        g.link_explicit(target, host);
        assert!(matches!(
            g.find_build_time_config(target, ConfigType::Host).unwrap(),
            ConfigSearch::One(id) if id == host
        ));

        let host2 = g.register(ConfigHandle::new(ConfigType::Host, "/cfg/host2"));
        g.link_explicit(target, host2);
        assert!(matches!(
            g.find_build_time_config(target, ConfigType::Host).unwrap(),
            ConfigSearch::Many(_)
        ));
    }

    #[test]
    fn private_config_search_walks_to_parent() {
        let mut g = LinkGraph::new();
        let target = g.register(ConfigHandle::new(ConfigType::Target, "/cfg/target"));
        let host = g.register(ConfigHandle::new(ConfigType::Host, "/cfg/host"));
        g.link_explicit(target, host);
        let build2 = g.register_private(ConfigHandle::private(ConfigType::Build2, "/cfg/host".as_ref(), "b2"), host);
        assert!(matches!(
            g.find_build_time_config(build2, ConfigType::Host).unwrap(),
            ConfigSearch::One(id) if id == host
        ));
    }
}
