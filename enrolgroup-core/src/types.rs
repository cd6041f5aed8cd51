//! Domain types for group reconciliation.
//!
//! Remote and local records are joined on [`IdNumber`] only. Internal
//! handles (`CourseId`, `GroupId`, ...) belong to the local system and are
//! never compared with anything coming from the remote side.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// External identifier
// ---------------------------------------------------------------------------

/// A stable external identifier ("idnumber") shared by both systems.
///
/// Case-sensitive and compared as an exact string. Empty and
/// whitespace-only values never make it into an `IdNumber`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdNumber(String);

impl IdNumber {
    /// Wrap `raw` if it carries at least one non-whitespace character.
    ///
    /// The value is kept verbatim; surrounding whitespace is part of the
    /// identity.
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            None
        } else {
            Some(Self(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl TryFrom<String> for IdNumber {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value).ok_or_else(|| "idnumber must not be blank".to_string())
    }
}

impl From<IdNumber> for String {
    fn from(id: IdNumber) -> Self {
        id.0
    }
}

// ---------------------------------------------------------------------------
// Local handles
// ---------------------------------------------------------------------------

macro_rules! local_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

local_handle!(
    /// Internal handle of a local course.
    CourseId
);
local_handle!(
    /// Internal handle of a local group.
    GroupId
);
local_handle!(
    /// Internal handle of a local user.
    UserId
);
local_handle!(
    /// Internal handle of the enrolment instance that owns synced groups.
    InstanceId
);

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

/// Marker recorded on groups and memberships created by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerTag {
    pub component: String,
    pub item_id: i64,
}

impl OwnerTag {
    /// Component name stamped on everything the reconciler creates.
    pub const COMPONENT: &'static str = "enrol_database";

    /// Ownership of a group created for the given enrolment instance.
    pub fn for_instance(instance: InstanceId) -> Self {
        Self {
            component: Self::COMPONENT.to_string(),
            item_id: instance.0,
        }
    }

    /// Ownership of a membership row; memberships are not tied to an instance.
    pub fn membership() -> Self {
        Self {
            component: Self::COMPONENT.to_string(),
            item_id: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Remote records
// ---------------------------------------------------------------------------

/// One group row from the remote groups table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteGroupRecord {
    pub course_idnumber: IdNumber,
    pub group_idnumber: IdNumber,
    pub name: String,
}

/// One membership row from the remote membership table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteMembershipRecord {
    pub course_idnumber: IdNumber,
    pub group_idnumber: IdNumber,
    pub user_idnumber: IdNumber,
}

// ---------------------------------------------------------------------------
// Local rows as the store returns them
// ---------------------------------------------------------------------------

/// A group exactly as the local store holds it; the idnumber may be blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRow {
    pub id: GroupId,
    pub idnumber: String,
    pub name: String,
    pub component: String,
    pub item_id: i64,
}

/// A user enrolled in a course; the idnumber may be blank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrolledUser {
    pub id: UserId,
    pub username: String,
    pub idnumber: String,
}

/// Data for a group the reconciler asks the store to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub course: CourseId,
    pub idnumber: IdNumber,
    pub name: String,
    pub owner: OwnerTag,
}

/// Fields the reconciler is allowed to change on an existing group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupChanges {
    pub name: String,
}

// ---------------------------------------------------------------------------
// Local records keyed by idnumber
// ---------------------------------------------------------------------------

/// A local group that carries a valid idnumber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalGroup {
    pub id: GroupId,
    pub idnumber: IdNumber,
    pub name: String,
    pub owner: OwnerTag,
}

/// An enrolled user with a valid idnumber, flagged with membership in one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMembershipCandidate {
    pub user_idnumber: IdNumber,
    pub user: UserId,
    pub username: String,
    pub is_member: bool,
}
