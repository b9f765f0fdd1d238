//! jobdeck: supervise long-running child processes and aggregate their logs
//!
//! The pipeline: a [`job::Supervisor`] spawns named jobs (piped or
//! PTY-backed), their raw output chunks flow through a per-job
//! [`output::OutputRouter`] (partial-line reconciliation, escape stripping,
//! URL extraction, timestamping) into an append-only [`crate::core::LogStore`],
//! and [`aggregate::merged_view`] combines all non-PTY stores into one
//! time-ordered sequence on demand. Job configuration (never output) is
//! persisted as a JSON snapshot and can be restored at startup.
//!
//! All supervisor state is mutated from the host's single event loop; process
//! tasks and timers communicate only through the supervisor's event channel.

pub mod aggregate;
pub mod command;
pub mod core;
pub mod error;
pub mod job;
pub mod output;
pub mod persist;
pub mod project;

pub use crate::aggregate::{merged_view, MergedEntry, MergedView};
pub use crate::command::{parse_invocation, Invocation};
pub use crate::core::{
    HandlerRule, InstanceId, JobEvent, LogLine, LogStore, Notice, Settings, Severity,
    SpecialFormat,
};
pub use crate::error::{Error, Result};
pub use crate::job::{
    BatchReport, Job, JobSpec, JobStatus, JobSummary, StartOptions, Supervisor,
};
pub use crate::persist::{JobSnapshot, SavedJob, StateFile};
pub use crate::project::{Project, ProjectJob};
