//! enrolgroup core library: identifiers, records, configuration, errors.
//!
//! Public API surface:
//! - [`types`]: identifier newtypes, remote/local records
//! - [`config`]: [`SyncConfiguration`] and the on-disk [`AppConfig`]
//! - [`field_map`]: query projections and row normalization
//! - [`ports`]: collaborator traits the reconciler calls into
//! - [`trace`]: the line-oriented progress sink
//! - [`error`]: [`ConfigError`], [`RemoteError`], [`LocalError`]

pub mod config;
pub mod error;
pub mod field_map;
pub mod ports;
pub mod trace;
pub mod types;

pub use config::{
    AppConfig, DatabaseConfig, GroupsMapping, MembersMapping, RemoveGroupsAction, SyncConfiguration,
};
pub use error::{ConfigError, LocalError, RemoteError};
pub use ports::{CourseDirectory, GroupStore, LocalStore, MembershipStore, RemoteReader};
pub use trace::{MemoryTrace, ProgressTrace, TextTrace};
pub use types::{
    CourseId, EnrolledUser, GroupChanges, GroupId, GroupRow, IdNumber, InstanceId, LocalGroup,
    LocalMembershipCandidate, NewGroup, OwnerTag, RemoteGroupRecord, RemoteMembershipRecord,
    UserId,
};
