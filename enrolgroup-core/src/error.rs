//! Error types for enrolgroup-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from loading, saving, or validating the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML serialization error (save path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML parse error on load, with the offending file.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// The config file did not exist at the expected path.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// Structurally invalid configuration.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Failures reading from the remote source.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The source could not be opened at all.
    #[error("cannot connect to remote source: {0}")]
    Connect(String),

    /// A query failed to execute. The source closes its connection afterwards.
    #[error("error reading remote table {table}: {message}")]
    Query { table: String, message: String },

    /// A previous failure closed the shared connection; it is not reopened.
    #[error("remote connection is closed")]
    ConnectionClosed,
}

/// Failures reported by the local store.
#[derive(Debug, Error)]
pub enum LocalError {
    /// The storage backend rejected the operation.
    #[error("local store error: {0}")]
    Backend(String),

    /// A handle passed to the store does not exist.
    #[error("{kind} {id} not found in local store")]
    NotFound { kind: &'static str, id: i64 },
}

/// Convenience constructor for [`ConfigError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
