//! # enrolgroup-sync
//!
//! Three-level group reconciliation.
//!
//! Call [`pipeline::run`] (or [`pipeline::run_with_connector`]) to reconcile
//! every course that has remote groups. The per-level diffs are pure
//! functions in [`groups`] and [`membership`]; [`pipeline`] applies them
//! through the local store collaborators.

pub mod error;
pub mod groups;
mod keyed;
pub mod local;
pub mod membership;
pub mod memory;
pub mod pipeline;
pub mod report;

pub use error::ScopeError;
pub use groups::{plan_groups, GroupAction, GroupPlan};
pub use membership::{plan_membership, MembershipPlan};
pub use pipeline::{run, run_with_connector, RunMode, RunOptions};
pub use report::{CourseOutcome, CourseReport, GroupCounts, MemberCounts, RunStatus, SyncReport};
