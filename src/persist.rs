//! Durable job-configuration snapshots
//!
//! One JSON file mapping job name to configuration, fully rewritten on every
//! job-set mutation. Output, process handles, and runtime status are never
//! persisted. Missing or corrupt state reads as "nothing to restore".

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::job::{Job, StartOptions};

/// Persisted record of one job's configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedJob {
    pub cmd: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub opts: SavedOptions,
    #[serde(default)]
    pub auto_restart: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedOptions {
    #[serde(default)]
    pub pty: bool,
    #[serde(default)]
    pub clean_ansi: bool,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Full job-configuration snapshot: name → saved configuration
pub type JobSnapshot = BTreeMap<String, SavedJob>;

impl SavedJob {
    pub fn from_job(job: &Job) -> Self {
        Self {
            cmd: job.cmd.clone(),
            cwd: job.opts.cwd.clone(),
            opts: SavedOptions {
                pty: job.opts.pty,
                clean_ansi: job.opts.clean_ansi,
                env: job.opts.env.clone(),
            },
            auto_restart: job.opts.auto_restart,
        }
    }

    /// Rebuild start options from the wire form
    pub fn options(&self) -> StartOptions {
        StartOptions {
            cwd: self.cwd.clone(),
            env: self.opts.env.clone(),
            pty: self.opts.pty,
            clean_ansi: self.opts.clean_ansi,
            auto_restart: self.auto_restart,
        }
    }
}

/// Single-file JSON store for the job snapshot
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Default location under the platform data directory
    pub fn default_path() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jobdeck")
            .join("state.json")
    }

    /// Serialize the full snapshot, overwriting the file
    pub fn save(&self, snapshot: &JobSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, text)?;
        Ok(())
    }

    /// Deserialize the snapshot; missing or malformed files yield an empty one
    pub fn load(&self) -> JobSnapshot {
        let Ok(text) = fs::read_to_string(&self.path) else {
            return JobSnapshot::new();
        };
        serde_json::from_str(&text).unwrap_or_default()
    }
}
