//! Membership reconciler: remote members vs enrolled candidates for one group.
//!
//! Only enrolled users with an idnumber are candidates. Remote rows naming
//! anybody else are ignored; they are reported as unmatched for diagnostics.

use std::collections::{BTreeSet, HashSet};

use enrolgroup_core::{IdNumber, LocalMembershipCandidate, RemoteMembershipRecord};

use crate::error::ScopeError;

/// Membership changes for one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipPlan {
    /// Listed remotely, not yet a member.
    pub add: Vec<LocalMembershipCandidate>,
    /// A member, no longer listed remotely.
    pub remove: Vec<LocalMembershipCandidate>,
    /// Candidates already in the desired state.
    pub unchanged: usize,
    /// Remote idnumbers with no enrolled candidate, sorted.
    pub unmatched: Vec<IdNumber>,
}

impl MembershipPlan {
    pub fn is_noop(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Diff remote membership rows against the local candidates of one group.
///
/// Duplicate remote rows collapse. Two candidates sharing an idnumber make
/// the match ambiguous, so the whole group is refused with
/// [`ScopeError::DuplicateUserIdNumber`].
pub fn plan_membership(
    remote: &[RemoteMembershipRecord],
    candidates: &[LocalMembershipCandidate],
) -> Result<MembershipPlan, ScopeError> {
    let wanted: HashSet<&IdNumber> = remote.iter().map(|r| &r.user_idnumber).collect();

    let mut seen: HashSet<&IdNumber> = HashSet::new();
    for candidate in candidates {
        if !seen.insert(&candidate.user_idnumber) {
            return Err(ScopeError::DuplicateUserIdNumber {
                idnumber: candidate.user_idnumber.clone(),
            });
        }
    }

    let mut plan = MembershipPlan::default();
    for candidate in candidates {
        match (wanted.contains(&candidate.user_idnumber), candidate.is_member) {
            (true, false) => plan.add.push(candidate.clone()),
            (false, true) => plan.remove.push(candidate.clone()),
            _ => plan.unchanged += 1,
        }
    }

    plan.unmatched = wanted
        .difference(&seen)
        .map(|id| (*id).clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Ok(plan)
}
