//! Error types for configuration resolution.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while resolving exporter configuration.
///
/// All of these are fatal and surface once at startup, before the
/// snapshot scheduler is armed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid interval: {name}={value:?} is not a positive integer")]
    InvalidInterval { name: &'static str, value: String },

    #[error("missing credential: {0} is not set or empty")]
    MissingCredential(&'static str),

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid {name}: {value:?} (expected one of: {expected})")]
    Invalid {
        name: &'static str,
        value: String,
        expected: String,
    },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
