//! Error taxonomy for supervision and persistence operations

use std::io;

/// Errors surfaced by the supervision core.
///
/// User errors (duplicate name, empty command, unknown job) abort the
/// operation with no state change; resource errors leave the system in its
/// last-known-good state.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("job already exists: {0}")]
    DuplicateJob(String),

    #[error("empty command")]
    EmptyCommand,

    #[error("failed to spawn process: {0}")]
    Spawn(#[source] io::Error),

    #[error("pty error: {0}")]
    Pty(String),

    #[error("project file: {0}")]
    Project(String),

    #[error("unsupported project version: {0} (expected 1)")]
    BadVersion(u64),

    #[error("project defines no jobs")]
    NoJobs,

    #[error("invalid invocation: {0}")]
    Invocation(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
