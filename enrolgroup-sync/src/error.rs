//! Error types for enrolgroup-sync.

use thiserror::Error;

use enrolgroup_core::{CourseId, IdNumber, LocalError, RemoteError};

/// Why one course or one group could not be reconciled.
///
/// Never escapes a run: the pipeline writes it to the trace and records the
/// scope as failed, then moves on.
#[derive(Debug, Error)]
pub enum ScopeError {
    /// Reading the remote source failed.
    #[error("Error reading data from the external enrolment table: {0}")]
    Remote(#[from] RemoteError),

    /// The local store rejected a read or a mutation.
    #[error("{0}")]
    Local(#[from] LocalError),

    /// The course has no database enrolment instance to own synced groups.
    #[error("Error getting enrolment instance for course {idnumber} (id {course})")]
    MissingSyncInstance { idnumber: IdNumber, course: CourseId },

    /// Two enrolled users share an idnumber, so remote rows cannot be matched.
    #[error("idnumber '{idnumber}' is shared by more than one enrolled user")]
    DuplicateUserIdNumber { idnumber: IdNumber },
}
