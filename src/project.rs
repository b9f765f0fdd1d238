//! Versioned project definitions consumed as ordered start batches
//!
//! A project file declares a set of jobs to bring up together. The version
//! tag is required and checked before anything starts; a bad file never
//! results in a partially started project.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::job::{JobSpec, StartOptions};

pub const SUPPORTED_VERSION: u64 = 1;

/// One job definition within a project
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectJob {
    pub cmd: Vec<String>,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub pty: bool,
    #[serde(default)]
    pub clean_ansi: bool,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub auto_restart: bool,
    /// Delay before the next job in the batch is attempted
    #[serde(default)]
    pub startup_delay_ms: u64,
}

#[derive(Debug, Deserialize)]
struct RawProject {
    version: u64,
    #[serde(default)]
    jobs: serde_yaml::Mapping,
}

/// A validated project: ordered job definitions
#[derive(Debug, Clone)]
pub struct Project {
    pub jobs: Vec<(String, ProjectJob)>,
}

impl Project {
    /// Load and validate a project file; relative `cwd` values resolve
    /// against the file's directory
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Project(format!("{}: {e}", path.display())))?;
        Self::parse(&text, path.parent())
    }

    /// Parse and validate project text
    pub fn parse(text: &str, base_dir: Option<&Path>) -> Result<Self> {
        let raw: RawProject = serde_yaml::from_str(text)?;
        if raw.version != SUPPORTED_VERSION {
            return Err(Error::BadVersion(raw.version));
        }
        if raw.jobs.is_empty() {
            return Err(Error::NoJobs);
        }

        // the yaml mapping preserves declaration order
        let mut jobs = Vec::with_capacity(raw.jobs.len());
        for (key, value) in raw.jobs {
            let name = key
                .as_str()
                .ok_or_else(|| Error::Project("job names must be strings".to_string()))?
                .to_string();
            let mut job: ProjectJob = serde_yaml::from_value(value)
                .map_err(|e| Error::Project(format!("job '{name}': {e}")))?;
            if let (Some(base), Some(cwd)) = (base_dir, job.cwd.as_mut()) {
                if cwd.is_relative() {
                    *cwd = base.join(&*cwd);
                }
            }
            jobs.push((name, job));
        }
        Ok(Self { jobs })
    }

    /// Ordered (spec, startup delay) entries for a sequential batch start
    pub fn batch_entries(&self) -> Vec<(JobSpec, u64)> {
        self.jobs
            .iter()
            .map(|(name, job)| {
                let spec = JobSpec {
                    name: name.clone(),
                    cmd: job.cmd.clone(),
                    opts: StartOptions {
                        cwd: job.cwd.clone(),
                        env: job.env.clone(),
                        pty: job.pty,
                        clean_ansi: job.clean_ansi,
                        auto_restart: job.auto_restart,
                    },
                };
                (spec, job.startup_delay_ms)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = "\
version: 1
jobs:
  web:
    cmd: [npm, run, dev]
    cwd: app
    auto_restart: true
    startup_delay_ms: 250
  tunnel:
    cmd: [ngrok, http, \"3000\"]
    pty: true
    clean_ansi: true
  worker:
    cmd: [cargo, run]
    env:
      RUST_LOG: debug
";

    #[test]
    fn parses_jobs_in_declaration_order() {
        let project = Project::parse(PROJECT, Some(Path::new("/srv"))).unwrap();
        let names: Vec<&str> = project.jobs.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["web", "tunnel", "worker"]);

        let (_, web) = &project.jobs[0];
        assert_eq!(web.cwd.as_deref(), Some(Path::new("/srv/app")));
        assert!(web.auto_restart);
        assert_eq!(web.startup_delay_ms, 250);

        let (_, worker) = &project.jobs[2];
        assert_eq!(worker.env.get("RUST_LOG").map(String::as_str), Some("debug"));
        assert_eq!(worker.startup_delay_ms, 0);
    }

    #[test]
    fn batch_entries_carry_options() {
        let project = Project::parse(PROJECT, None).unwrap();
        let entries = project.batch_entries();
        assert_eq!(entries.len(), 3);

        let (tunnel, delay) = &entries[1];
        assert_eq!(tunnel.name, "tunnel");
        assert!(tunnel.opts.pty);
        assert!(tunnel.opts.clean_ansi);
        assert_eq!(*delay, 0);
    }

    #[test]
    fn wrong_version_is_rejected() {
        let text = "version: 2\njobs:\n  a:\n    cmd: [true]\n";
        assert!(matches!(
            Project::parse(text, None),
            Err(Error::BadVersion(2))
        ));
    }

    #[test]
    fn missing_version_is_rejected() {
        let text = "jobs:\n  a:\n    cmd: [true]\n";
        assert!(matches!(Project::parse(text, None), Err(Error::Yaml(_))));
    }

    #[test]
    fn empty_project_is_rejected() {
        assert!(matches!(
            Project::parse("version: 1\n", None),
            Err(Error::NoJobs)
        ));
        assert!(matches!(
            Project::parse("version: 1\njobs: {}\n", None),
            Err(Error::NoJobs)
        ));
    }

    #[test]
    fn absolute_cwd_is_untouched() {
        let text = "version: 1\njobs:\n  a:\n    cmd: [\"true\"]\n    cwd: /opt/app\n";
        let project = Project::parse(text, Some(Path::new("/srv"))).unwrap();
        assert_eq!(project.jobs[0].1.cwd.as_deref(), Some(Path::new("/opt/app")));
    }
}
