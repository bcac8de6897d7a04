//! Errors for configuration loading, linking and validation.

use thiserror::Error;

/// Result alias used throughout `bpkg-config`.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or linking configuration databases.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("[E1102] cannot read configuration at {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: std::path::PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file failed to parse as TOML.
    #[error("[E1101] invalid configuration at {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: std::path::PathBuf,
        /// Underlying parse error.
        #[source]
        source: Box<toml::de::Error>,
    },

    /// Multiple candidate build-time configurations of the required type
    /// were found and none is unambiguous (spec.md §4.5).
    #[error("ambiguous {config_type} configuration for dependency '{dependency}': use --config-{config_type}")]
    AmbiguousConfig {
        /// The configuration type being searched for (`host` or `build2`).
        config_type: String,
        /// The dependency that triggered the search.
        dependency: String,
    },

    /// A configuration references an unknown link target.
    #[error("configuration '{0}' has no such link")]
    UnknownLink(String),

    /// Forbidden combination: a build-time dependency reaches into a
    /// build-system-module configuration, or vice versa (spec.md §4.5).
    #[error("forbidden dependency: {0}")]
    ForbiddenCombination(String),
}
