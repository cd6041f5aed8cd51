//! Local state reader.
//!
//! Turns raw local rows into records keyed by [`IdNumber`]. Anything without
//! a usable idnumber is dropped here and is invisible to the reconcilers.

use std::collections::HashSet;

use enrolgroup_core::{
    CourseDirectory, CourseId, GroupId, GroupStore, IdNumber, LocalError, LocalGroup,
    LocalMembershipCandidate, MembershipStore, OwnerTag,
};

use crate::keyed::last_wins;

/// Local courses whose idnumber appears in `remote_courses`, in local order.
///
/// Courses without an idnumber, or unknown to the remote side, are left out
/// without comment.
pub fn courses_to_sync<L>(
    local: &L,
    remote_courses: &[IdNumber],
) -> Result<Vec<(IdNumber, CourseId)>, LocalError>
where
    L: CourseDirectory + ?Sized,
{
    let wanted: HashSet<&IdNumber> = remote_courses.iter().collect();
    let mapped = local
        .course_idnumbers()?
        .into_iter()
        .filter_map(|(raw, id)| IdNumber::parse(raw).map(|idnumber| (idnumber, id)));
    Ok(last_wins(mapped)
        .into_iter()
        .filter(|(idnumber, _)| wanted.contains(idnumber))
        .collect())
}

/// Groups of `course` that carry an idnumber.
pub fn local_groups<L>(local: &L, course: CourseId) -> Result<Vec<LocalGroup>, LocalError>
where
    L: GroupStore + ?Sized,
{
    Ok(local
        .list_groups(course)?
        .into_iter()
        .filter_map(|row| {
            let idnumber = IdNumber::parse(row.idnumber)?;
            Some(LocalGroup {
                id: row.id,
                idnumber,
                name: row.name,
                owner: OwnerTag {
                    component: row.component,
                    item_id: row.item_id,
                },
            })
        })
        .collect())
}

/// Enrolled users with an idnumber, flagged with membership in `group`.
///
/// `group` is `None` for a group that does not exist yet (dry run); nobody
/// is a member of it.
pub fn membership_candidates<L>(
    local: &L,
    course: CourseId,
    group: Option<GroupId>,
) -> Result<Vec<LocalMembershipCandidate>, LocalError>
where
    L: CourseDirectory + MembershipStore + ?Sized,
{
    let mut candidates = Vec::new();
    for user in local.enrolled_users(course)? {
        let Some(user_idnumber) = IdNumber::parse(user.idnumber) else {
            continue;
        };
        let is_member = match group {
            Some(group) => local.is_member(group, user.id)?,
            None => false,
        };
        candidates.push(LocalMembershipCandidate {
            user_idnumber,
            user: user.id,
            username: user.username,
            is_member,
        });
    }
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLocal;

    fn id(s: &str) -> IdNumber {
        IdNumber::parse(s).unwrap()
    }

    #[test]
    fn only_courses_known_on_both_sides_are_synced() {
        let mut local = MemoryLocal::new();
        let a = local.add_course("A", true);
        local.add_course("", true);
        local.add_course("B", true);
        let c = local.add_course("C", true);

        let courses = courses_to_sync(&local, &[id("C"), id("A"), id("Z")]).unwrap();
        assert_eq!(courses, vec![(id("A"), a), (id("C"), c)]);
    }

    #[test]
    fn groups_without_idnumber_are_invisible() {
        let mut local = MemoryLocal::new();
        let course = local.add_course("A", true);
        local.add_group(course, "", "Manual group");
        local.add_group(course, "  ", "Blank idnumber");
        let g1 = local.add_group(course, "g1", "Alpha");

        let groups = local_groups(&local, course).unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, g1);
        assert_eq!(groups[0].idnumber, id("g1"));
    }

    #[test]
    fn candidates_skip_users_without_idnumber_and_flag_members() {
        let mut local = MemoryLocal::new();
        let course = local.add_course("A", true);
        let group = local.add_group(course, "g1", "Alpha");
        let anna = local.add_user(course, "anna", "u1");
        local.add_user(course, "bob", "");
        local.add_user(course, "carl", "u3");
        local.add_membership(group, anna);

        let candidates = membership_candidates(&local, course, Some(group)).unwrap();
        let summary: Vec<(&str, bool)> = candidates
            .iter()
            .map(|c| (c.username.as_str(), c.is_member))
            .collect();
        assert_eq!(summary, vec![("anna", true), ("carl", false)]);
    }

    #[test]
    fn nobody_is_a_member_of_a_group_that_does_not_exist() {
        let mut local = MemoryLocal::new();
        let course = local.add_course("A", true);
        local.add_user(course, "anna", "u1");

        let candidates = membership_candidates(&local, course, None).unwrap();
        assert_eq!(candidates.len(), 1);
        assert!(!candidates[0].is_member);
    }
}
