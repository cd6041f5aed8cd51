//! Error types for enrolgroup-sqlite.

use std::path::PathBuf;

use thiserror::Error;

use enrolgroup_core::{LocalError, RemoteError};

#[derive(Debug, Error)]
pub enum SqliteError {
    /// The database file could not be opened.
    #[error("cannot open database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// A read-only database was requested but the file is missing.
    #[error("database file not found: {path}")]
    Missing { path: PathBuf },

    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),
}

pub(crate) fn open_err(path: impl Into<PathBuf>, source: rusqlite::Error) -> SqliteError {
    SqliteError::Open {
        path: path.into(),
        source,
    }
}

impl From<SqliteError> for RemoteError {
    fn from(err: SqliteError) -> Self {
        RemoteError::Connect(err.to_string())
    }
}

impl From<SqliteError> for LocalError {
    fn from(err: SqliteError) -> Self {
        LocalError::Backend(err.to_string())
    }
}

/// Map a driver error onto the local store error.
pub(crate) fn backend(err: rusqlite::Error) -> LocalError {
    LocalError::Backend(err.to_string())
}
