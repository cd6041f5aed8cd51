//! In-memory collaborators.
//!
//! [`MemoryRemote`] keeps raw remote rows and pushes them through the field
//! mapper on every read, so blank values are dropped exactly as a database
//! reader drops them. [`MemoryLocal`] is a small local store that records
//! every mutation it receives. Both back the tests and let callers rehearse
//! a run against fixture data.

use std::collections::{BTreeMap, HashMap, HashSet};

use enrolgroup_core::{
    field_map::{self, logical, NormalizedRow},
    CourseDirectory, CourseId, EnrolledUser, GroupChanges, GroupId, GroupRow, GroupStore,
    IdNumber, InstanceId, LocalError, MembershipStore, NewGroup, OwnerTag, RemoteError,
    RemoteGroupRecord, RemoteMembershipRecord, RemoteReader, UserId,
};

// ---------------------------------------------------------------------------
// MemoryRemote
// ---------------------------------------------------------------------------

/// A read that [`MemoryRemote`] should fail.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CourseListing,
    Groups { course: String },
    Members { course: String, group: String },
}

/// Remote groups and membership tables held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    /// `[course, group, name]`
    groups: Vec<[String; 3]>,
    /// `[course, group, user]`
    members: Vec<[String; 3]>,
    failing: HashSet<FailPoint>,
    reads: usize,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&mut self, course: &str, group: &str, name: &str) -> &mut Self {
        self.groups
            .push([course.to_string(), group.to_string(), name.to_string()]);
        self
    }

    /// Drop every row of `group` from the groups table.
    pub fn remove_group(&mut self, course: &str, group: &str) -> &mut Self {
        self.groups.retain(|[c, g, _]| !(c == course && g == group));
        self
    }

    pub fn rename_group(&mut self, course: &str, group: &str, name: &str) -> &mut Self {
        for [c, g, n] in &mut self.groups {
            if c == course && g == group {
                *n = name.to_string();
            }
        }
        self
    }

    pub fn add_member(&mut self, course: &str, group: &str, user: &str) -> &mut Self {
        self.members
            .push([course.to_string(), group.to_string(), user.to_string()]);
        self
    }

    pub fn remove_member(&mut self, course: &str, group: &str, user: &str) -> &mut Self {
        self.members
            .retain(|[c, g, u]| !(c == course && g == group && u == user));
        self
    }

    pub fn fail(&mut self, point: FailPoint) -> &mut Self {
        self.failing.insert(point);
        self
    }

    /// Number of reads served (including failed ones).
    pub fn reads(&self) -> usize {
        self.reads
    }

    fn check(&mut self, point: FailPoint) -> Result<(), RemoteError> {
        self.reads += 1;
        if self.failing.contains(&point) {
            return Err(RemoteError::Query {
                table: "memory".to_string(),
                message: format!("injected failure at {point:?}"),
            });
        }
        Ok(())
    }
}

impl RemoteReader for MemoryRemote {
    fn list_courses_with_groups(&mut self) -> Result<Vec<IdNumber>, RemoteError> {
        self.check(FailPoint::CourseListing)?;
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for [course, _, _] in &self.groups {
            let row =
                NormalizedRow::from_columns([(logical::COURSE_IDNUMBER, Some(course.clone()))]);
            if let Some(id) = field_map::course_from_row(&row) {
                if seen.insert(id.clone()) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }

    fn list_groups_for_course(
        &mut self,
        course: &IdNumber,
    ) -> Result<Vec<RemoteGroupRecord>, RemoteError> {
        self.check(FailPoint::Groups {
            course: course.to_string(),
        })?;
        Ok(self
            .groups
            .iter()
            .filter(|[c, _, _]| c == course.as_str())
            .filter_map(|[c, g, n]| {
                let row = NormalizedRow::from_columns([
                    (logical::COURSE_IDNUMBER, Some(c.clone())),
                    (logical::GROUP_IDNUMBER, Some(g.clone())),
                    (logical::GROUP_NAME, Some(n.clone())),
                ]);
                field_map::group_from_row(&row, course)
            })
            .collect())
    }

    fn list_members_for_group(
        &mut self,
        course: &IdNumber,
        group: &IdNumber,
    ) -> Result<Vec<RemoteMembershipRecord>, RemoteError> {
        self.check(FailPoint::Members {
            course: course.to_string(),
            group: group.to_string(),
        })?;
        Ok(self
            .members
            .iter()
            .filter(|[c, g, _]| c == course.as_str() && g == group.as_str())
            .filter_map(|[_, _, u]| {
                let row = NormalizedRow::from_columns([(logical::USER_IDNUMBER, Some(u.clone()))]);
                field_map::member_from_row(&row, course, group)
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// MemoryLocal
// ---------------------------------------------------------------------------

/// A mutation received by [`MemoryLocal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalCall {
    CreateGroup {
        course: CourseId,
        idnumber: IdNumber,
        name: String,
    },
    UpdateGroup {
        group: GroupId,
        name: String,
    },
    DeleteGroup {
        group: GroupId,
    },
    AddMember {
        group: GroupId,
        user: UserId,
    },
    RemoveMember {
        group: GroupId,
        user: UserId,
    },
}

/// Local courses, enrolments, groups and memberships held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocal {
    courses: Vec<(String, CourseId)>,
    instances: HashMap<CourseId, InstanceId>,
    enrolments: Vec<(CourseId, EnrolledUser)>,
    groups: BTreeMap<GroupId, (CourseId, GroupRow)>,
    members: BTreeMap<(GroupId, UserId), OwnerTag>,
    failing_groups: HashSet<GroupId>,
    calls: Vec<LocalCall>,
    next_id: i64,
}

impl MemoryLocal {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    /// Add a course; `provisioned` gives it a database enrolment instance.
    pub fn add_course(&mut self, idnumber: &str, provisioned: bool) -> CourseId {
        let course = CourseId(self.next_id());
        self.courses.push((idnumber.to_string(), course));
        if provisioned {
            let instance = InstanceId(self.next_id());
            self.instances.insert(course, instance);
        }
        course
    }

    /// Create a user enrolled in `course`.
    pub fn add_user(&mut self, course: CourseId, username: &str, idnumber: &str) -> UserId {
        let user = UserId(self.next_id());
        self.enrolments.push((
            course,
            EnrolledUser {
                id: user,
                username: username.to_string(),
                idnumber: idnumber.to_string(),
            },
        ));
        user
    }

    /// Add a group as if created by hand (no ownership tag).
    pub fn add_group(&mut self, course: CourseId, idnumber: &str, name: &str) -> GroupId {
        let id = GroupId(self.next_id());
        self.groups.insert(
            id,
            (
                course,
                GroupRow {
                    id,
                    idnumber: idnumber.to_string(),
                    name: name.to_string(),
                    component: String::new(),
                    item_id: 0,
                },
            ),
        );
        id
    }

    /// Add a membership as if created by hand.
    pub fn add_membership(&mut self, group: GroupId, user: UserId) {
        self.members.insert(
            (group, user),
            OwnerTag {
                component: String::new(),
                item_id: 0,
            },
        );
    }

    /// Make every add/remove against `group` fail.
    pub fn fail_membership_writes(&mut self, group: GroupId) {
        self.failing_groups.insert(group);
    }

    pub fn calls(&self) -> &[LocalCall] {
        &self.calls
    }

    /// Return and clear the recorded mutations.
    pub fn take_calls(&mut self) -> Vec<LocalCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn instance_of(&self, course: CourseId) -> Option<InstanceId> {
        self.instances.get(&course).copied()
    }

    pub fn groups_in(&self, course: CourseId) -> Vec<GroupRow> {
        self.groups
            .values()
            .filter(|(c, _)| *c == course)
            .map(|(_, row)| row.clone())
            .collect()
    }

    pub fn find_group(&self, course: CourseId, idnumber: &str) -> Option<GroupRow> {
        self.groups_in(course)
            .into_iter()
            .find(|row| row.idnumber == idnumber)
    }

    pub fn members_of(&self, group: GroupId) -> Vec<UserId> {
        self.members
            .keys()
            .filter(|(g, _)| *g == group)
            .map(|(_, u)| *u)
            .collect()
    }

    pub fn membership_owner(&self, group: GroupId, user: UserId) -> Option<&OwnerTag> {
        self.members.get(&(group, user))
    }

    fn check_membership_write(&self, group: GroupId) -> Result<(), LocalError> {
        if self.failing_groups.contains(&group) {
            return Err(LocalError::Backend(format!(
                "membership writes to group {group} are disabled"
            )));
        }
        if !self.groups.contains_key(&group) {
            return Err(LocalError::NotFound {
                kind: "group",
                id: group.0,
            });
        }
        Ok(())
    }
}

impl CourseDirectory for MemoryLocal {
    fn course_idnumbers(&self) -> Result<Vec<(String, CourseId)>, LocalError> {
        Ok(self.courses.clone())
    }

    fn sync_instance(&self, course: CourseId) -> Result<Option<InstanceId>, LocalError> {
        Ok(self.instance_of(course))
    }

    fn enrolled_users(&self, course: CourseId) -> Result<Vec<EnrolledUser>, LocalError> {
        let mut users: Vec<EnrolledUser> = self
            .enrolments
            .iter()
            .filter(|(c, _)| *c == course)
            .map(|(_, u)| u.clone())
            .collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }
}

impl GroupStore for MemoryLocal {
    fn list_groups(&self, course: CourseId) -> Result<Vec<GroupRow>, LocalError> {
        Ok(self.groups_in(course))
    }

    fn create_group(&mut self, group: &NewGroup) -> Result<GroupId, LocalError> {
        if !self.courses.iter().any(|(_, c)| *c == group.course) {
            return Err(LocalError::NotFound {
                kind: "course",
                id: group.course.0,
            });
        }
        let id = GroupId(self.next_id());
        self.groups.insert(
            id,
            (
                group.course,
                GroupRow {
                    id,
                    idnumber: group.idnumber.to_string(),
                    name: group.name.clone(),
                    component: group.owner.component.clone(),
                    item_id: group.owner.item_id,
                },
            ),
        );
        self.calls.push(LocalCall::CreateGroup {
            course: group.course,
            idnumber: group.idnumber.clone(),
            name: group.name.clone(),
        });
        Ok(id)
    }

    fn update_group(&mut self, id: GroupId, changes: &GroupChanges) -> Result<(), LocalError> {
        let (_, row) = self.groups.get_mut(&id).ok_or(LocalError::NotFound {
            kind: "group",
            id: id.0,
        })?;
        row.name = changes.name.clone();
        self.calls.push(LocalCall::UpdateGroup {
            group: id,
            name: changes.name.clone(),
        });
        Ok(())
    }

    fn delete_group(&mut self, id: GroupId) -> Result<(), LocalError> {
        if self.groups.remove(&id).is_none() {
            return Err(LocalError::NotFound {
                kind: "group",
                id: id.0,
            });
        }
        self.members.retain(|(g, _), _| *g != id);
        self.calls.push(LocalCall::DeleteGroup { group: id });
        Ok(())
    }
}

impl MembershipStore for MemoryLocal {
    fn is_member(&self, group: GroupId, user: UserId) -> Result<bool, LocalError> {
        Ok(self.members.contains_key(&(group, user)))
    }

    fn add_member(
        &mut self,
        group: GroupId,
        user: UserId,
        owner: &OwnerTag,
    ) -> Result<(), LocalError> {
        self.check_membership_write(group)?;
        self.members.entry((group, user)).or_insert_with(|| owner.clone());
        self.calls.push(LocalCall::AddMember { group, user });
        Ok(())
    }

    fn remove_member(&mut self, group: GroupId, user: UserId) -> Result<(), LocalError> {
        self.check_membership_write(group)?;
        self.members.remove(&(group, user));
        self.calls.push(LocalCall::RemoveMember { group, user });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> IdNumber {
        IdNumber::parse(s).unwrap()
    }

    #[test]
    fn remote_drops_blank_rows_like_a_database_reader() {
        let mut remote = MemoryRemote::new();
        remote
            .add_group("courseX", "g1", "Alpha")
            .add_group("courseX", "", "No id")
            .add_group("courseX", "g3", "")
            .add_group(" ", "g4", "Blank course")
            .add_group("courseY", "g1", "Other");

        assert_eq!(
            remote.list_courses_with_groups().unwrap(),
            vec![id("courseX"), id("courseY")]
        );
        let groups = remote.list_groups_for_course(&id("courseX")).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, "Alpha");
    }

    #[test]
    fn remote_failure_points() {
        let mut remote = MemoryRemote::new();
        remote.add_group("courseX", "g1", "Alpha").fail(FailPoint::Groups {
            course: "courseX".into(),
        });
        assert!(remote.list_courses_with_groups().is_ok());
        assert!(remote.list_groups_for_course(&id("courseX")).is_err());
        assert_eq!(remote.reads(), 2);
    }

    #[test]
    fn local_delete_removes_memberships() {
        let mut local = MemoryLocal::new();
        let course = local.add_course("A", true);
        let group = local.add_group(course, "g1", "Alpha");
        let user = local.add_user(course, "anna", "u1");
        local.add_membership(group, user);

        local.delete_group(group).unwrap();
        assert!(local.members_of(group).is_empty());
        assert_eq!(local.calls(), [LocalCall::DeleteGroup { group }]);
    }

    #[test]
    fn local_add_member_is_idempotent() {
        let mut local = MemoryLocal::new();
        let course = local.add_course("A", true);
        let group = local.add_group(course, "g1", "Alpha");
        let user = local.add_user(course, "anna", "u1");
        let owner = OwnerTag::membership();

        local.add_member(group, user, &owner).unwrap();
        local.add_member(group, user, &owner).unwrap();
        assert_eq!(local.members_of(group), vec![user]);
    }

    #[test]
    fn local_update_unknown_group_is_not_found() {
        let mut local = MemoryLocal::new();
        let err = local
            .update_group(GroupId(99), &GroupChanges { name: "x".into() })
            .unwrap_err();
        assert!(matches!(err, LocalError::NotFound { kind: "group", id: 99 }));
    }
}
