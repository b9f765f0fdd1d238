//! Job types and lifecycle status

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use uuid::Uuid;

use crate::core::settings::SpecialFormat;
use crate::core::{InstanceId, LogStore};
use crate::output::OutputRouter;

/// Lifecycle status of a supervised job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// Spawn requested, process not yet confirmed
    Starting,
    /// Process is running
    Running,
    /// Termination signalled, waiting for the process to exit
    Stopping,
    /// Process has exited
    Stopped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::Running => "running",
            JobStatus::Stopping => "stopping",
            JobStatus::Stopped => "stopped",
        }
    }

    /// Whether a live process handle backs this status
    pub fn is_live(&self) -> bool {
        matches!(self, JobStatus::Starting | JobStatus::Running | JobStatus::Stopping)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options for starting a job
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartOptions {
    /// Working directory; inherits the supervisor's when absent
    #[serde(default)]
    pub cwd: Option<PathBuf>,

    /// Environment overrides
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Attach a pseudo-terminal
    #[serde(default)]
    pub pty: bool,

    /// Strip terminal escapes and run the line processor (PTY jobs only)
    #[serde(default)]
    pub clean_ansi: bool,

    /// Restart automatically after a non-zero exit
    #[serde(default)]
    pub auto_restart: bool,
}

/// Everything needed to (re)create a job
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub name: String,
    pub cmd: Vec<String>,
    pub opts: StartOptions,
}

/// Termination half of a live process
pub enum Stopper {
    /// Pipe-backed job: wakes the wait task, which kills the child
    Pipe(tokio::sync::oneshot::Sender<()>),
    /// PTY-backed job: kills through the pty child killer
    Pty(Box<dyn portable_pty::ChildKiller + Send + Sync>),
}

impl std::fmt::Debug for Stopper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stopper::Pipe(_) => write!(f, "Stopper::Pipe"),
            Stopper::Pty(_) => write!(f, "Stopper::Pty"),
        }
    }
}

/// Handle to a running child process
#[derive(Debug)]
pub struct JobHandle {
    pub pid: Option<u32>,
    stopper: Option<Stopper>,
}

impl JobHandle {
    pub fn new(pid: Option<u32>, stopper: Stopper) -> Self {
        Self {
            pid,
            stopper: Some(stopper),
        }
    }

    /// Signal termination once; later calls are no-ops
    pub fn signal_stop(&mut self) {
        match self.stopper.take() {
            Some(Stopper::Pipe(tx)) => {
                let _ = tx.send(());
            }
            Some(Stopper::Pty(mut killer)) => {
                let _ = killer.kill();
            }
            None => {}
        }
    }
}

/// A supervised job
#[derive(Debug)]
pub struct Job {
    /// Unique name, process-wide
    pub name: String,
    /// The command as requested, without handler-injected arguments
    pub cmd: Vec<String>,
    /// Requested options; toggles land here and apply on the next restart
    pub opts: StartOptions,
    /// PTY mode resolved at spawn time (handler rule or options)
    pub pty: bool,
    /// ANSI cleaning in effect since the last spawn
    pub active_clean_ansi: bool,
    /// Structured reformatting from the matched handler rule
    pub special: Option<SpecialFormat>,
    /// Current lifecycle status
    pub status: JobStatus,
    /// Identifier of this incarnation
    pub instance: InstanceId,
    /// When this incarnation was created
    pub created_at: DateTime<Local>,
    /// OS process id while live
    pub pid: Option<u32>,
    /// Exit code of the last run
    pub exit_code: Option<i32>,
    /// Consecutive automatic restarts
    pub restart_count: u32,
    /// Append-only processed output
    pub log: LogStore,
    /// Per-job stream state
    pub router: OutputRouter,
    /// Live process handle; `Some` iff status is live
    pub handle: Option<JobHandle>,
}

impl Job {
    /// Create a job in `Starting` state with a fresh incarnation id
    pub fn new(
        spec: JobSpec,
        pty: bool,
        clean_ansi: bool,
        special: Option<SpecialFormat>,
        history_cap: usize,
    ) -> Self {
        Self {
            name: spec.name,
            cmd: spec.cmd,
            opts: spec.opts,
            pty,
            active_clean_ansi: clean_ansi,
            special,
            status: JobStatus::Starting,
            instance: Uuid::new_v4(),
            created_at: Local::now(),
            pid: None,
            exit_code: None,
            restart_count: 0,
            log: LogStore::new(history_cap),
            router: OutputRouter::new(),
            handle: None,
        }
    }

    /// Capture the parameters needed to recreate this job
    pub fn to_spec(&self) -> JobSpec {
        JobSpec {
            name: self.name.clone(),
            cmd: self.cmd.clone(),
            opts: self.opts.clone(),
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            name: self.name.clone(),
            status: self.status,
            pid: self.pid,
            created_at: self.created_at,
            exit_code: self.exit_code,
            pty: self.pty,
            clean_ansi: self.active_clean_ansi,
            auto_restart: self.opts.auto_restart,
            restart_count: self.restart_count,
        }
    }
}

/// Read-only view of a job for listings
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub name: String,
    pub status: JobStatus,
    pub pid: Option<u32>,
    pub created_at: DateTime<Local>,
    pub exit_code: Option<i32>,
    pub pty: bool,
    pub clean_ansi: bool,
    pub auto_restart: bool,
    pub restart_count: u32,
}
