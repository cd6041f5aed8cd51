//! # enrolgroup-sqlite
//!
//! SQLite-backed collaborators for the reconciler:
//!
//! - [`SqliteRemoteSource`] reads the configured remote groups and
//!   membership tables.
//! - [`SqliteLocalStore`] is the local system of record: courses,
//!   enrolments, users, groups and group memberships.

pub mod error;
pub mod local;
pub mod remote;
pub mod schema;

pub use error::SqliteError;
pub use local::SqliteLocalStore;
pub use remote::SqliteRemoteSource;
