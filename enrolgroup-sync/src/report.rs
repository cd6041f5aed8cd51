//! Run report: what a reconciliation run did, per course.

use std::ops::AddAssign;

use chrono::{DateTime, Utc};
use serde::Serialize;

use enrolgroup_core::{CourseId, IdNumber};

use crate::pipeline::RunMode;

/// Outcome of the run as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every eligible course was visited (individual courses may have failed).
    Completed,
    /// Group sync is not configured.
    Skipped { reason: String },
    /// The remote source could not be reached or listed.
    Failed { reason: String },
}

/// Outcome for one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CourseOutcome {
    Synced,
    Skipped { reason: String },
    Failed { reason: String },
}

/// Group-level counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GroupCounts {
    pub created: usize,
    pub renamed: usize,
    pub unchanged: usize,
    pub deleted: usize,
    pub orphans_kept: usize,
}

impl AddAssign for GroupCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.created += rhs.created;
        self.renamed += rhs.renamed;
        self.unchanged += rhs.unchanged;
        self.deleted += rhs.deleted;
        self.orphans_kept += rhs.orphans_kept;
    }
}

/// Membership counters, summed over the groups of a course.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MemberCounts {
    pub added: usize,
    pub removed: usize,
    pub unchanged: usize,
    /// Groups whose membership was not reconciled because the feature is off.
    pub groups_skipped: usize,
    /// Groups whose membership reconciliation failed.
    pub groups_failed: usize,
}

impl AddAssign for MemberCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.added += rhs.added;
        self.removed += rhs.removed;
        self.unchanged += rhs.unchanged;
        self.groups_skipped += rhs.groups_skipped;
        self.groups_failed += rhs.groups_failed;
    }
}

/// Everything that happened to one course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseReport {
    pub course_idnumber: IdNumber,
    pub course_id: CourseId,
    pub outcome: CourseOutcome,
    pub groups: GroupCounts,
    pub members: MemberCounts,
}

impl CourseReport {
    pub(crate) fn new(course_idnumber: IdNumber, course_id: CourseId) -> Self {
        Self {
            course_idnumber,
            course_id,
            outcome: CourseOutcome::Synced,
            groups: GroupCounts::default(),
            members: MemberCounts::default(),
        }
    }
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub mode: RunMode,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub courses: Vec<CourseReport>,
}

impl SyncReport {
    pub(crate) fn start(mode: RunMode) -> Self {
        let now = Utc::now();
        Self {
            mode,
            status: RunStatus::Completed,
            started_at: now,
            finished_at: now,
            courses: Vec::new(),
        }
    }

    pub fn group_totals(&self) -> GroupCounts {
        let mut total = GroupCounts::default();
        for course in &self.courses {
            total += course.groups;
        }
        total
    }

    pub fn member_totals(&self) -> MemberCounts {
        let mut total = MemberCounts::default();
        for course in &self.courses {
            total += course.members;
        }
        total
    }

    /// Mutations issued (or, in a dry run, that would have been issued).
    pub fn mutation_count(&self) -> usize {
        let g = self.group_totals();
        let m = self.member_totals();
        g.created + g.renamed + g.deleted + m.added + m.removed
    }

    pub fn failed_courses(&self) -> impl Iterator<Item = &CourseReport> {
        self.courses
            .iter()
            .filter(|c| matches!(c.outcome, CourseOutcome::Failed { .. }))
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
