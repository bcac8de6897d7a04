//! Configuration (database) handle: spec.md §3 "Configuration (database)".

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

/// The kind of configuration a [`ConfigId`] points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigType {
    /// Builds and installs for the target platform.
    Target,
    /// Hosts build-time tools that run on the build machine.
    Host,
    /// Hosts `build2` build-system modules.
    Build2,
}

impl ConfigType {
    /// Short lowercase tag, used in `--config-<tag>` diagnostics.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Target => "target",
            Self::Host => "host",
            Self::Build2 => "build2",
        }
    }
}

/// Opaque, stable identity for one configuration database. Cheap to copy
/// and compare; all graph/collector bookkeeping is keyed by this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigId(u32);

static NEXT_ID: AtomicU32 = AtomicU32::new(1);

impl ConfigId {
    /// Allocate a fresh configuration id (used when creating private
    /// configurations, spec.md §4.5).
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Build an id from a raw value (used in tests and deterministic
    /// fixtures where stable ids matter for assertions).
    #[must_use]
    pub const fn from_raw(v: u32) -> Self {
        Self(v)
    }

    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// A configuration database handle: a type tag, a canonical installation
/// path, and a set of configuration variables.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    id: ConfigId,
    config_type: ConfigType,
    path: PathBuf,
    /// Whether this configuration was created implicitly to host a
    /// build-time dependency (spec.md §4.5 "create a private configuration").
    private: bool,
    vars: BTreeMap<String, String>,
}

impl ConfigHandle {
    /// Construct a new, unlinked configuration handle.
    #[must_use]
    pub fn new(config_type: ConfigType, path: impl Into<PathBuf>) -> Self {
        Self {
            id: ConfigId::fresh(),
            config_type,
            path: path.into(),
            private: false,
            vars: BTreeMap::new(),
        }
    }

    /// Construct a private configuration nested under `parent_dir` (spec.md
    /// §4.5's `add_priv_cfg` callback target).
    #[must_use]
    pub fn private(config_type: ConfigType, parent_dir: &Path, relative: &str) -> Self {
        let mut h = Self::new(config_type, parent_dir.join(relative));
        h.private = true;
        h
    }

    #[must_use]
    pub fn id(&self) -> ConfigId {
        self.id
    }

    #[must_use]
    pub fn config_type(&self) -> ConfigType {
        self.config_type
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn is_private(&self) -> bool {
        self.private
    }

    #[must_use]
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn set_var(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn vars(&self) -> &BTreeMap<String, String> {
        &self.vars
    }
}
