//! Run orchestrator.
//!
//! A run walks three levels: courses known to both sides, then the groups of
//! each course, then the membership of each group. Failures are contained at
//! the level where they happen. A course that cannot be read is marked failed
//! and the run moves to the next course; a group whose membership cannot be
//! reconciled is counted as failed and the course carries on.
//!
//! Progress goes to the caller's [`ProgressTrace`] one line per decision;
//! `finished()` is called exactly once per run, whatever the outcome.

use chrono::Utc;
use serde::Serialize;

use enrolgroup_core::{
    CourseId, GroupChanges, GroupId, IdNumber, InstanceId, LocalGroup, LocalStore, NewGroup,
    OwnerTag, ProgressTrace, RemoteError, RemoteReader, SyncConfiguration,
};

use crate::error::ScopeError;
use crate::groups::{plan_groups, GroupAction};
use crate::local;
use crate::membership::plan_membership;
use crate::report::{CourseOutcome, CourseReport, MemberCounts, RunStatus, SyncReport};

/// Whether decisions are applied or only reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    #[default]
    Apply,
    DryRun,
}

/// Per-run knobs that are not part of the stored configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub mode: RunMode,
    /// Restrict the run to these course idnumbers. Empty means every course.
    pub courses: Vec<IdNumber>,
}

/// Reconcile every eligible course against an already-open remote source.
pub fn run<R, L, T>(
    config: &SyncConfiguration,
    remote: &mut R,
    local: &mut L,
    trace: &mut T,
    options: &RunOptions,
) -> SyncReport
where
    R: RemoteReader + ?Sized,
    L: LocalStore + ?Sized,
    T: ProgressTrace + ?Sized,
{
    run_with_connector(config, || Ok(remote), local, trace, options)
}

/// Reconcile every eligible course, opening the remote source only once the
/// configuration says group sync is enabled.
pub fn run_with_connector<C, F, L, T>(
    config: &SyncConfiguration,
    connect: F,
    local: &mut L,
    trace: &mut T,
    options: &RunOptions,
) -> SyncReport
where
    C: RemoteReader,
    F: FnOnce() -> Result<C, RemoteError>,
    L: LocalStore + ?Sized,
    T: ProgressTrace + ?Sized,
{
    let mut report = SyncReport::start(options.mode);

    if !config.enabled {
        tracing::info!("group sync is switched off");
        trace.output("Group synchronisation is disabled.");
        report.status = RunStatus::Skipped {
            reason: "sync.enabled is false".to_string(),
        };
        return finish(report, trace);
    }

    if !config.group_sync_enabled() {
        tracing::info!("group sync is not configured; nothing to do");
        trace.output("Course group synchronisation skipped.");
        report.status = RunStatus::Skipped {
            reason: "remote groups table or its columns are not configured".to_string(),
        };
        return finish(report, trace);
    }

    trace.output("Starting group synchronisation...");

    let mut remote = match connect() {
        Ok(remote) => remote,
        Err(err) => {
            tracing::warn!("cannot open remote source: {err}");
            trace.output(&format!(
                "Error while communicating with external enrolment database: {err}"
            ));
            report.status = RunStatus::Failed {
                reason: err.to_string(),
            };
            return finish(report, trace);
        }
    };

    if !config.membership_sync_enabled() {
        trace.output("Course group membership synchronisation skipped.");
    }

    let mut pass = Pass {
        config,
        remote: &mut remote,
        local,
        trace: &mut *trace,
        mode: options.mode,
    };
    report.status = pass.sync_courses(&options.courses, &mut report.courses);

    finish(report, trace)
}

fn finish<T: ProgressTrace + ?Sized>(mut report: SyncReport, trace: &mut T) -> SyncReport {
    report.finished_at = Utc::now();
    if matches!(report.status, RunStatus::Completed) {
        let line = format!(
            "Group synchronisation finished: {} course(s), {} change(s){}",
            report.courses.len(),
            report.mutation_count(),
            if report.mode == RunMode::DryRun {
                " (dry run)"
            } else {
                ""
            }
        );
        tracing::info!("{line}");
        trace.output(&line);
    }
    trace.finished();
    report
}

// ---------------------------------------------------------------------------
// One pass over the courses
// ---------------------------------------------------------------------------

struct Pass<'a, R: ?Sized, L: ?Sized, T: ?Sized> {
    config: &'a SyncConfiguration,
    remote: &'a mut R,
    local: &'a mut L,
    trace: &'a mut T,
    mode: RunMode,
}

impl<R, L, T> Pass<'_, R, L, T>
where
    R: RemoteReader + ?Sized,
    L: LocalStore + ?Sized,
    T: ProgressTrace + ?Sized,
{
    fn say(&mut self, line: String) {
        tracing::debug!("{line}");
        self.trace.output(&line);
    }

    fn verb(&self, apply: &'static str, dry_run: &'static str) -> &'static str {
        match self.mode {
            RunMode::Apply => apply,
            RunMode::DryRun => dry_run,
        }
    }

    fn applying(&self) -> bool {
        self.mode == RunMode::Apply
    }

    fn sync_courses(&mut self, filter: &[IdNumber], out: &mut Vec<CourseReport>) -> RunStatus {
        let remote_courses = match self.remote.list_courses_with_groups() {
            Ok(courses) => courses,
            Err(err) => {
                let err = ScopeError::from(err);
                tracing::warn!("{err}");
                self.say(err.to_string());
                return RunStatus::Failed {
                    reason: err.to_string(),
                };
            }
        };

        let courses = match local::courses_to_sync(&*self.local, &remote_courses) {
            Ok(courses) => courses,
            Err(err) => {
                tracing::warn!("cannot list local courses: {err}");
                self.say(format!("Error reading local courses: {err}"));
                return RunStatus::Failed {
                    reason: err.to_string(),
                };
            }
        };

        let courses: Vec<(IdNumber, CourseId)> = if filter.is_empty() {
            courses
        } else {
            courses
                .into_iter()
                .filter(|(idnumber, _)| filter.contains(idnumber))
                .collect()
        };
        tracing::info!(
            "{} remote course(s), {} to synchronise",
            remote_courses.len(),
            courses.len()
        );

        for (idnumber, course) in courses {
            let report = self.sync_course(idnumber, course);
            out.push(report);
        }
        RunStatus::Completed
    }

    fn sync_course(&mut self, idnumber: IdNumber, course: CourseId) -> CourseReport {
        let mut report = CourseReport::new(idnumber.clone(), course);
        match self.reconcile_course(&idnumber, course, &mut report) {
            Ok(()) => {}
            Err(err @ ScopeError::MissingSyncInstance { .. }) => {
                tracing::info!("{err}");
                self.say(err.to_string());
                report.outcome = CourseOutcome::Skipped {
                    reason: err.to_string(),
                };
            }
            Err(err) => {
                tracing::warn!("course {idnumber}: {err}");
                self.say(format!("Course {idnumber} not synchronised: {err}"));
                report.outcome = CourseOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        }
        report
    }

    fn reconcile_course(
        &mut self,
        idnumber: &IdNumber,
        course: CourseId,
        report: &mut CourseReport,
    ) -> Result<(), ScopeError> {
        let remote_groups = self.remote.list_groups_for_course(idnumber)?;
        let instance = self
            .local
            .sync_instance(course)?
            .ok_or_else(|| ScopeError::MissingSyncInstance {
                idnumber: idnumber.clone(),
                course,
            })?;
        let local_groups = local::local_groups(&*self.local, course)?;

        let plan = plan_groups(&remote_groups, &local_groups);
        tracing::debug!(
            "course {idnumber}: {} create, {} rename, {} unchanged, {} orphan",
            plan.creates(),
            plan.renames(),
            plan.unchanged(),
            plan.orphans.len()
        );

        for action in &plan.actions {
            let target = self.apply_group_action(idnumber, instance, course, action, report)?;
            self.sync_membership(idnumber, course, action, target, &mut report.members);
        }

        for group in &plan.orphans {
            self.handle_orphan(idnumber, group, report)?;
        }
        Ok(())
    }

    /// Apply one group action; returns the group that now carries the
    /// idnumber, or `None` when a dry run skipped its creation.
    fn apply_group_action(
        &mut self,
        course_idnumber: &IdNumber,
        instance: InstanceId,
        course: CourseId,
        action: &GroupAction,
        report: &mut CourseReport,
    ) -> Result<Option<GroupId>, ScopeError> {
        match action {
            GroupAction::Create { idnumber, name } => {
                let verb = self.verb("Creating", "[dry-run] Would create");
                self.say(format!(
                    "{verb} group {name} in course {course_idnumber} with idnumber {idnumber}"
                ));
                let created = if self.applying() {
                    Some(self.local.create_group(&NewGroup {
                        course,
                        idnumber: idnumber.clone(),
                        name: name.clone(),
                        owner: OwnerTag::for_instance(instance),
                    })?)
                } else {
                    None
                };
                report.groups.created += 1;
                Ok(created)
            }
            GroupAction::Rename { group, name } => {
                let verb = self.verb("Updating", "[dry-run] Would update");
                self.say(format!(
                    "{verb} group {} in course {course_idnumber} with idnumber {}: name {name}",
                    group.name, group.idnumber
                ));
                if self.applying() {
                    self.local
                        .update_group(group.id, &GroupChanges { name: name.clone() })?;
                }
                report.groups.renamed += 1;
                Ok(Some(group.id))
            }
            GroupAction::Unchanged { group } => {
                tracing::debug!("group {} ({}) is up to date", group.name, group.idnumber);
                report.groups.unchanged += 1;
                Ok(Some(group.id))
            }
        }
    }

    fn handle_orphan(
        &mut self,
        course_idnumber: &IdNumber,
        group: &LocalGroup,
        report: &mut CourseReport,
    ) -> Result<(), ScopeError> {
        if !self.config.removes_orphans() {
            self.say(format!(
                "Keeping group {} in course {course_idnumber} with idnumber {}: no longer listed remotely",
                group.name, group.idnumber
            ));
            report.groups.orphans_kept += 1;
            return Ok(());
        }
        let verb = self.verb("Deleting", "[dry-run] Would delete");
        self.say(format!(
            "{verb} group {} in course {course_idnumber} with idnumber {}",
            group.name, group.idnumber
        ));
        if self.applying() {
            self.local.delete_group(group.id)?;
        }
        report.groups.deleted += 1;
        Ok(())
    }

    fn sync_membership(
        &mut self,
        course_idnumber: &IdNumber,
        course: CourseId,
        action: &GroupAction,
        target: Option<GroupId>,
        counts: &mut MemberCounts,
    ) {
        if !self.config.membership_sync_enabled() {
            counts.groups_skipped += 1;
            return;
        }
        let group_name = action.target_name();
        if let Err(err) = self.reconcile_membership(
            course_idnumber,
            course,
            action.idnumber(),
            group_name,
            target,
            counts,
        ) {
            tracing::warn!("membership of group {group_name}: {err}");
            self.say(format!(
                "Membership of group {group_name} in course {course_idnumber} not synchronised: {err}"
            ));
            counts.groups_failed += 1;
        }
    }

    fn reconcile_membership(
        &mut self,
        course_idnumber: &IdNumber,
        course: CourseId,
        group_idnumber: &IdNumber,
        group_name: &str,
        target: Option<GroupId>,
        counts: &mut MemberCounts,
    ) -> Result<(), ScopeError> {
        let remote = self
            .remote
            .list_members_for_group(course_idnumber, group_idnumber)?;
        let candidates = local::membership_candidates(&*self.local, course, target)?;
        let plan = plan_membership(&remote, &candidates)?;
        if !plan.unmatched.is_empty() {
            tracing::debug!(
                "group {group_idnumber}: {} remote member(s) not enrolled in course {course_idnumber}",
                plan.unmatched.len()
            );
        }
        counts.unchanged += plan.unchanged;

        let owner = OwnerTag::membership();
        for candidate in &plan.add {
            let verb = self.verb("Adding", "[dry-run] Would add");
            self.say(format!(
                "{verb} {} ({}) to {group_name}",
                candidate.username, candidate.user_idnumber
            ));
            if let (RunMode::Apply, Some(group)) = (self.mode, target) {
                self.local.add_member(group, candidate.user, &owner)?;
            }
            counts.added += 1;
        }
        for candidate in &plan.remove {
            let verb = self.verb("Removing", "[dry-run] Would remove");
            self.say(format!(
                "{verb} {} ({}) from {group_name}",
                candidate.username, candidate.user_idnumber
            ));
            if let (RunMode::Apply, Some(group)) = (self.mode, target) {
                self.local.remove_member(group, candidate.user)?;
            }
            counts.removed += 1;
        }
        Ok(())
    }
}
