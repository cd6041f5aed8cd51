//! Group reconciler: remote groups vs local groups for one course.
//!
//! [`plan_groups`] is a pure diff. Both sides are collapsed to one entry per
//! idnumber (last seen wins), then:
//!
//! | remote | local | action |
//! |---|---|---|
//! | yes | yes, same name | `Unchanged` |
//! | yes | yes, other name | `Rename` |
//! | yes | no | `Create` |
//! | no | yes | orphan |
//!
//! Names are compared as exact strings. What happens to orphans is decided
//! by the caller from `remove_groups_action`.

use std::collections::{HashMap, HashSet};

use enrolgroup_core::{IdNumber, LocalGroup, RemoteGroupRecord};

use crate::keyed::last_wins;

/// Decision for one remote group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupAction {
    /// No local group has this idnumber.
    Create { idnumber: IdNumber, name: String },
    /// The local group exists under a different name.
    Rename { group: LocalGroup, name: String },
    /// The local group already matches.
    Unchanged { group: LocalGroup },
}

impl GroupAction {
    pub fn idnumber(&self) -> &IdNumber {
        match self {
            GroupAction::Create { idnumber, .. } => idnumber,
            GroupAction::Rename { group, .. } | GroupAction::Unchanged { group } => &group.idnumber,
        }
    }

    /// The name the group has once the action is applied.
    pub fn target_name(&self) -> &str {
        match self {
            GroupAction::Create { name, .. } | GroupAction::Rename { name, .. } => name,
            GroupAction::Unchanged { group } => &group.name,
        }
    }
}

/// Full diff for one course.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupPlan {
    /// One action per distinct remote idnumber, in remote fetch order.
    pub actions: Vec<GroupAction>,
    /// Local groups whose idnumber is absent remotely, in local order.
    pub orphans: Vec<LocalGroup>,
}

impl GroupPlan {
    pub fn creates(&self) -> usize {
        self.count(|a| matches!(a, GroupAction::Create { .. }))
    }

    pub fn renames(&self) -> usize {
        self.count(|a| matches!(a, GroupAction::Rename { .. }))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|a| matches!(a, GroupAction::Unchanged { .. }))
    }

    fn count(&self, pred: impl Fn(&GroupAction) -> bool) -> usize {
        self.actions.iter().filter(|a| pred(a)).count()
    }
}

/// Diff the remote groups of a course against its local groups.
pub fn plan_groups(remote: &[RemoteGroupRecord], local: &[LocalGroup]) -> GroupPlan {
    let remote_by_id = last_wins(
        remote
            .iter()
            .map(|r| (r.group_idnumber.clone(), r.name.clone())),
    );
    let local_by_id = last_wins(local.iter().map(|g| (g.idnumber.clone(), g.clone())));

    let local_index: HashMap<&IdNumber, &LocalGroup> =
        local_by_id.iter().map(|(id, g)| (id, g)).collect();
    let remote_ids: HashSet<&IdNumber> = remote_by_id.iter().map(|(id, _)| id).collect();

    let actions = remote_by_id
        .iter()
        .map(|(idnumber, name)| match local_index.get(idnumber) {
            Some(group) if group.name == *name => GroupAction::Unchanged {
                group: (*group).clone(),
            },
            Some(group) => GroupAction::Rename {
                group: (*group).clone(),
                name: name.clone(),
            },
            None => GroupAction::Create {
                idnumber: idnumber.clone(),
                name: name.clone(),
            },
        })
        .collect();

    let orphans = local_by_id
        .iter()
        .filter(|(id, _)| !remote_ids.contains(id))
        .map(|(_, g)| g.clone())
        .collect();

    GroupPlan { actions, orphans }
}
