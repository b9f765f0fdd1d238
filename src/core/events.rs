//! Events and notices flowing between process tasks and the supervisor

use uuid::Uuid;

use crate::job::JobSpec;

/// Identifier of one job incarnation.
///
/// A job keeps its name across restarts but gets a fresh instance id each
/// time it is spawned; events and scheduled follow-ups carry the id so that
/// a delete or re-create reliably suppresses stale deliveries.
pub type InstanceId = Uuid;

/// Events emitted by process tasks and timers, applied by the supervisor
#[derive(Debug)]
pub enum JobEvent {
    /// A job produced a raw output chunk
    Output {
        name: String,
        instance: InstanceId,
        chunk: String,
        from_stderr: bool,
    },
    /// A job's process has exited
    Exited {
        name: String,
        instance: InstanceId,
        code: Option<i32>,
    },
    /// An automatic restart delay has elapsed
    RestartDue { name: String, instance: InstanceId },
    /// A deferred start (manual-restart settling delay) is due
    StartDue { spec: JobSpec },
    /// The next step of a sequential batch start is due
    BatchDue { id: Uuid },
}

/// Severity of a user-visible notice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warn => write!(f, "warn"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single human-readable notice about a failure or state transition
#[derive(Debug, Clone)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl Notice {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }
}
