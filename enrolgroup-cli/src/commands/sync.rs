//! `enrolgroup sync`: reconcile groups and memberships.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, Local, Utc};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use enrolgroup_core::{IdNumber, RemoteError, TextTrace};
use enrolgroup_sqlite::{SqliteLocalStore, SqliteRemoteSource};
use enrolgroup_sync::{
    run_with_connector, CourseOutcome, CourseReport, RunMode, RunOptions, RunStatus, SyncReport,
};

/// Arguments for `enrolgroup sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Report what would change without touching the local database.
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON (progress moves to stderr).
    #[arg(long)]
    pub json: bool,

    /// Only reconcile the course with this idnumber (repeatable).
    #[arg(long = "course", value_name = "IDNUMBER")]
    pub courses: Vec<String>,
}

impl SyncArgs {
    pub fn run(self, config_path: &Path) -> Result<()> {
        let config = super::load_config(config_path)?;

        let mut courses = Vec::with_capacity(self.courses.len());
        for raw in &self.courses {
            let idnumber = IdNumber::parse(raw.as_str())
                .with_context(|| format!("invalid course idnumber '{raw}'"))?;
            courses.push(idnumber);
        }
        let options = RunOptions {
            mode: if self.dry_run {
                RunMode::DryRun
            } else {
                RunMode::Apply
            },
            courses,
        };

        let mut local = SqliteLocalStore::open(&config.local.path).with_context(|| {
            format!(
                "failed to open local database {}",
                config.local.path.display()
            )
        })?;

        let sink: Box<dyn Write> = if self.json {
            Box::new(io::stderr())
        } else {
            Box::new(io::stdout())
        };
        let mut trace = TextTrace::new(sink);

        let report = run_with_connector(
            &config.sync,
            || {
                SqliteRemoteSource::open(&config.remote.path, &config.sync)
                    .map_err(RemoteError::from)
            },
            &mut local,
            &mut trace,
            &options,
        );
        drop(trace);

        if self.json {
            println!(
                "{}",
                report
                    .to_json_pretty()
                    .context("failed to serialize sync report")?
            );
        } else {
            print_summary(&report);
        }

        if let RunStatus::Failed { reason } = &report.status {
            bail!("group synchronisation failed: {reason}");
        }
        Ok(())
    }
}

#[derive(Tabled)]
struct CourseRow {
    #[tabled(rename = "course")]
    course: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "groups")]
    groups: String,
    #[tabled(rename = "members")]
    members: String,
}

fn print_summary(report: &SyncReport) {
    if report.courses.is_empty() {
        if matches!(report.status, RunStatus::Completed) {
            println!("No courses with remote groups matched a local course.");
        }
        return;
    }

    let rows: Vec<CourseRow> = report.courses.iter().map(course_row).collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    let elapsed: Duration = report.finished_at - report.started_at;
    let prefix = if report.mode == RunMode::DryRun {
        "[dry-run] "
    } else {
        ""
    };
    println!(
        "{prefix}{} change(s) across {} course(s) in {} ms (started {})",
        report.mutation_count(),
        report.courses.len(),
        elapsed.num_milliseconds(),
        local_time(report.started_at)
    );

    let failed = report.failed_courses().count();
    if failed > 0 {
        println!(
            "{}",
            format!("{failed} course(s) failed; see the messages above.")
                .red()
                .bold()
        );
    }
}

fn local_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn course_row(course: &CourseReport) -> CourseRow {
    let g = course.groups;
    let m = course.members;
    let mut members = format!("+{} -{} ={}", m.added, m.removed, m.unchanged);
    if m.groups_failed > 0 {
        members.push_str(&format!(" ({} group(s) failed)", m.groups_failed));
    }
    if m.groups_skipped > 0 {
        members = "skipped".to_string();
    }
    CourseRow {
        course: course.course_idnumber.to_string(),
        outcome: outcome_label(&course.outcome),
        groups: format!(
            "+{} ~{} -{} ={} kept {}",
            g.created, g.renamed, g.deleted, g.unchanged, g.orphans_kept
        ),
        members,
    }
}

fn outcome_label(outcome: &CourseOutcome) -> String {
    match outcome {
        CourseOutcome::Synced => "synced".green().to_string(),
        CourseOutcome::Skipped { .. } => "skipped".yellow().to_string(),
        CourseOutcome::Failed { .. } => "failed".red().bold().to_string(),
    }
}
