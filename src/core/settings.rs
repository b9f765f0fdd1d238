//! Runtime settings consumed read-only by the supervision core

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Structured reformatting applied by a special handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialFormat {
    /// Tunnel-style diagnostics (forwarding address, session status, request log).
    Tunnel,
}

/// Rule mapping a command's executable basename to forced PTY/ANSI behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerRule {
    /// Substring matched against the executable basename.
    pub pattern: String,

    /// Run the job with a pseudo-terminal attached.
    #[serde(default)]
    pub pty: bool,

    /// Strip terminal escapes and apply line processing.
    #[serde(default)]
    pub clean_ansi: bool,

    /// Extra arguments appended to the command at spawn time.
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Optional structured reformatting of the job's output.
    #[serde(default)]
    pub special: Option<SpecialFormat>,
}

impl HandlerRule {
    pub fn matches(&self, basename: &str) -> bool {
        basename.contains(&self.pattern)
    }
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Format for the per-line timestamp prefix (must contain no spaces)
    #[serde(default = "default_timestamp_format")]
    pub timestamp_format: String,

    /// Prefix non-empty log lines with a timestamp
    #[serde(default = "default_true")]
    pub timestamps: bool,

    /// Maximum log lines kept per job
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,

    /// Delay before an automatic restart after a non-zero exit
    #[serde(default = "default_restart_delay")]
    pub restart_delay_ms: u64,

    /// Settling delay between delete and re-create on manual restart
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Consecutive automatic restarts before giving up
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Re-create persisted jobs at startup
    #[serde(default)]
    pub auto_restore: bool,

    /// Location of the persisted job-configuration snapshot
    #[serde(default)]
    pub state_path: Option<PathBuf>,

    /// Ordered special-handler table, first match wins
    #[serde(default = "default_handlers")]
    pub handlers: Vec<HandlerRule>,
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_timestamp_format() -> String {
    "%H:%M:%S".to_string()
}

fn default_history_cap() -> usize {
    10_000
}

fn default_restart_delay() -> u64 {
    500
}

fn default_settle_delay() -> u64 {
    500
}

fn default_max_restarts() -> u32 {
    3
}

fn default_handlers() -> Vec<HandlerRule> {
    vec![HandlerRule {
        pattern: "ngrok".to_string(),
        pty: true,
        clean_ansi: true,
        extra_args: Vec::new(),
        special: Some(SpecialFormat::Tunnel),
    }]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timestamp_format: default_timestamp_format(),
            timestamps: true,
            history_cap: default_history_cap(),
            restart_delay_ms: default_restart_delay(),
            settle_delay_ms: default_settle_delay(),
            max_restarts: default_max_restarts(),
            auto_restore: false,
            state_path: None,
            handlers: default_handlers(),
        }
    }
}

impl Settings {
    /// Get the default settings file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("jobdeck")
            .join("settings.yaml")
    }

    /// Load settings from file; an absent file yields the defaults
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.unwrap_or_else(Self::default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let settings: Settings = serde_yaml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the first handler rule matching the executable basename
    pub fn resolve_handler(&self, basename: &str) -> Option<&HandlerRule> {
        self.handlers.iter().find(|rule| rule.matches(basename))
    }
}
