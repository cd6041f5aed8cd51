//! Collaborator traits consumed by the reconciler.
//!
//! The reconciler never talks to a database driver directly. It reads the
//! remote side through [`RemoteReader`] and reads/mutates the local side
//! through [`CourseDirectory`], [`GroupStore`] and [`MembershipStore`].
//! All calls are blocking; a run drives them from a single thread.

use crate::error::{LocalError, RemoteError};
use crate::types::{
    CourseId, EnrolledUser, GroupChanges, GroupId, GroupRow, IdNumber, InstanceId, NewGroup,
    OwnerTag, RemoteGroupRecord, RemoteMembershipRecord, UserId,
};

/// Read-only access to the authoritative remote tables.
///
/// Every call re-executes against the source. Implementations drop rows
/// whose required fields are blank before returning them.
pub trait RemoteReader {
    /// Distinct course idnumbers that own at least one remote group.
    fn list_courses_with_groups(&mut self) -> Result<Vec<IdNumber>, RemoteError>;

    /// Remote groups of one course, in fetch order.
    fn list_groups_for_course(
        &mut self,
        course: &IdNumber,
    ) -> Result<Vec<RemoteGroupRecord>, RemoteError>;

    /// Remote membership rows of one group.
    fn list_members_for_group(
        &mut self,
        course: &IdNumber,
        group: &IdNumber,
    ) -> Result<Vec<RemoteMembershipRecord>, RemoteError>;
}

impl<R: RemoteReader + ?Sized> RemoteReader for &mut R {
    fn list_courses_with_groups(&mut self) -> Result<Vec<IdNumber>, RemoteError> {
        (**self).list_courses_with_groups()
    }

    fn list_groups_for_course(
        &mut self,
        course: &IdNumber,
    ) -> Result<Vec<RemoteGroupRecord>, RemoteError> {
        (**self).list_groups_for_course(course)
    }

    fn list_members_for_group(
        &mut self,
        course: &IdNumber,
        group: &IdNumber,
    ) -> Result<Vec<RemoteMembershipRecord>, RemoteError> {
        (**self).list_members_for_group(course, group)
    }
}

/// Local course and enrolment lookups.
pub trait CourseDirectory {
    /// `(idnumber, course)` pairs for every local course; idnumbers may be blank.
    fn course_idnumbers(&self) -> Result<Vec<(String, CourseId)>, LocalError>;

    /// The enrolment instance that synced groups hang off, if provisioned.
    fn sync_instance(&self, course: CourseId) -> Result<Option<InstanceId>, LocalError>;

    /// Users enrolled in `course`, ordered by username.
    fn enrolled_users(&self, course: CourseId) -> Result<Vec<EnrolledUser>, LocalError>;
}

/// Local group CRUD.
pub trait GroupStore {
    fn list_groups(&self, course: CourseId) -> Result<Vec<GroupRow>, LocalError>;

    fn create_group(&mut self, group: &NewGroup) -> Result<GroupId, LocalError>;

    fn update_group(&mut self, id: GroupId, changes: &GroupChanges) -> Result<(), LocalError>;

    /// Permanently delete a group together with its memberships.
    fn delete_group(&mut self, id: GroupId) -> Result<(), LocalError>;
}

/// Local group membership.
pub trait MembershipStore {
    fn is_member(&self, group: GroupId, user: UserId) -> Result<bool, LocalError>;

    fn add_member(&mut self, group: GroupId, user: UserId, owner: &OwnerTag)
        -> Result<(), LocalError>;

    fn remove_member(&mut self, group: GroupId, user: UserId) -> Result<(), LocalError>;
}

/// Everything the reconciler needs from the local system.
pub trait LocalStore: CourseDirectory + GroupStore + MembershipStore {}

impl<T: CourseDirectory + GroupStore + MembershipStore> LocalStore for T {}
