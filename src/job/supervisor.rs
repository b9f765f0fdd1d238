//! Job supervisor: owns the job table and drives lifecycles
//!
//! All mutation happens inside this type, driven by the host's event loop:
//! reader tasks, wait tasks, and timers communicate exclusively through one
//! unbounded event channel, so no locks guard the job table. Handlers never
//! block; delays are timer tasks that emit events.

use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::aggregate::{merged_view, MergedView};
use crate::core::events::{InstanceId, JobEvent, Notice, Severity};
use crate::core::settings::Settings;
use crate::core::LogLine;
use crate::error::{Error, Result};
use crate::output::RouteContext;
use crate::persist::{JobSnapshot, SavedJob, StateFile};
use crate::project::Project;

use super::types::{Job, JobHandle, JobSpec, JobStatus, JobSummary, StartOptions, Stopper};

const NOTICE_CAP: usize = 1000;

/// Outcome of a sequential batch start
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub started: Vec<String>,
    /// (name, reason) for each definition that failed to start
    pub failed: Vec<(String, String)>,
}

#[derive(Debug)]
struct Batch {
    remaining: VecDeque<(JobSpec, u64)>,
    report: BatchReport,
}

/// Supervises a set of named jobs.
///
/// Owns the job table exclusively; multiple independent supervisors may
/// coexist (no ambient state). Must be driven from within a tokio runtime.
#[derive(Debug)]
pub struct Supervisor {
    settings: Settings,
    jobs: HashMap<String, Job>,
    /// Creation order, for stable listings and merge ordering
    order: Vec<String>,
    batches: HashMap<Uuid, Batch>,
    finished_batches: HashMap<Uuid, BatchReport>,
    event_tx: mpsc::UnboundedSender<JobEvent>,
    event_rx: mpsc::UnboundedReceiver<JobEvent>,
    notices: VecDeque<Notice>,
    state: StateFile,
}

impl Supervisor {
    pub fn new(settings: Settings) -> Self {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let state = StateFile::new(
            settings
                .state_path
                .clone()
                .unwrap_or_else(StateFile::default_path),
        );
        Self {
            settings,
            jobs: HashMap::new(),
            order: Vec::new(),
            batches: HashMap::new(),
            finished_batches: HashMap::new(),
            event_tx,
            event_rx,
            notices: VecDeque::new(),
            state,
        }
    }

    // === Queries ===

    /// Summaries of all jobs in creation order
    pub fn jobs(&self) -> Vec<JobSummary> {
        self.order
            .iter()
            .filter_map(|name| self.jobs.get(name))
            .map(Job::summary)
            .collect()
    }

    pub fn job(&self, name: &str) -> Option<&Job> {
        self.jobs.get(name)
    }

    /// Line-range query into one job's log store
    pub fn log_range(&self, name: &str, start: usize, count: usize) -> Option<Vec<&LogLine>> {
        self.jobs.get(name).map(|job| job.log.range(start, count))
    }

    /// Time-ordered merge of all non-PTY jobs' logs, recomputed on demand
    pub fn merged_view(&self) -> MergedView {
        merged_view(
            self.order.iter().filter_map(|name| self.jobs.get(name)),
            &self.settings.timestamp_format,
        )
    }

    /// Take all queued notices
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain(..).collect()
    }

    /// Report of a completed batch, if still retained
    pub fn batch_report(&self, id: Uuid) -> Option<&BatchReport> {
        self.finished_batches.get(&id)
    }

    // === Mutators ===

    /// Start a new job. Fails on duplicate name, empty command, or spawn
    /// failure, in which case nothing is registered. Returns the pid.
    pub fn start(&mut self, name: &str, cmd: Vec<String>, opts: StartOptions) -> Result<u32> {
        self.start_with_restarts(name, cmd, opts, 0)
    }

    fn start_spec(&mut self, spec: JobSpec) -> Result<u32> {
        let JobSpec { name, cmd, opts } = spec;
        self.start_with_restarts(&name, cmd, opts, 0)
    }

    fn start_with_restarts(
        &mut self,
        name: &str,
        cmd: Vec<String>,
        opts: StartOptions,
        restart_count: u32,
    ) -> Result<u32> {
        if self.jobs.contains_key(name) {
            self.notice(Severity::Error, format!("job '{name}' already exists"));
            return Err(Error::DuplicateJob(name.to_string()));
        }
        if cmd.is_empty() || cmd[0].trim().is_empty() {
            self.notice(Severity::Error, format!("job '{name}': empty command"));
            return Err(Error::EmptyCommand);
        }

        // First matching handler rule wins; otherwise the caller's options hold.
        let rule = self.settings.resolve_handler(&basename(&cmd[0])).cloned();
        let (pty, clean_ansi, special, extra_args) = match &rule {
            Some(rule) => (rule.pty, rule.clean_ansi, rule.special, rule.extra_args.clone()),
            None => (opts.pty, opts.clean_ansi, None, Vec::new()),
        };
        let mut argv = cmd.clone();
        argv.extend(extra_args);

        let spec = JobSpec {
            name: name.to_string(),
            cmd,
            opts,
        };
        let mut job = Job::new(spec, pty, clean_ansi, special, self.settings.history_cap);
        job.restart_count = restart_count;
        write_header(&mut job);

        let handle = if pty {
            self.spawn_pty(name, job.instance, &argv, &job.opts)
        } else {
            self.spawn_pipe(name, job.instance, &argv, &job.opts)
        };
        let handle = match handle {
            Ok(handle) => handle,
            Err(e) => {
                self.notice(Severity::Error, format!("failed to start '{name}': {e}"));
                return Err(e);
            }
        };

        let pid = handle.pid.unwrap_or(0);
        job.pid = handle.pid;
        job.handle = Some(handle);
        job.status = JobStatus::Running;

        self.order.push(name.to_string());
        self.jobs.insert(name.to_string(), job);
        self.notice(Severity::Info, format!("job '{name}' started (pid {pid})"));
        self.persist();
        Ok(pid)
    }

    /// Signal a running job to stop. Returns false when the job is absent
    /// or not running; the `Stopped` transition arrives with the exit event.
    pub fn stop(&mut self, name: &str) -> bool {
        let status = self.jobs.get(name).map(|job| job.status);
        let Some(status) = status else {
            self.notice(Severity::Warn, format!("job '{name}' not found"));
            return false;
        };
        if status != JobStatus::Running {
            self.notice(
                Severity::Warn,
                format!("job '{name}' is not running ({status})"),
            );
            return false;
        }
        if let Some(job) = self.jobs.get_mut(name) {
            if let Some(handle) = job.handle.as_mut() {
                handle.signal_stop();
            }
            job.status = JobStatus::Stopping;
        }
        self.notice(Severity::Info, format!("stopping job '{name}'"));
        true
    }

    /// Delete a job: stop it if live, discard its log store, persist
    pub fn delete(&mut self, name: &str) -> bool {
        let Some(mut job) = self.jobs.remove(name) else {
            self.notice(Severity::Warn, format!("job '{name}' not found"));
            return false;
        };
        self.order.retain(|n| n != name);
        if job.status.is_live() {
            if let Some(handle) = job.handle.as_mut() {
                handle.signal_stop();
            }
        }
        self.notice(Severity::Info, format!("job '{name}' deleted"));
        self.persist();
        true
    }

    /// Recreate a job with identical parameters after the settling delay.
    /// A job that is not running is recreated immediately.
    pub fn restart(&mut self, name: &str) -> bool {
        let captured = self
            .jobs
            .get(name)
            .map(|job| (job.to_spec(), job.status.is_live()));
        let Some((spec, was_live)) = captured else {
            self.notice(Severity::Warn, format!("job '{name}' not found"));
            return false;
        };
        self.delete(name);

        if was_live {
            let delay = self.settings.settle_delay_ms;
            self.notice(
                Severity::Info,
                format!("restarting job '{name}' in {delay} ms"),
            );
            self.schedule_start(spec, delay);
        } else if let Err(e) = self.start_spec(spec) {
            debug!("immediate restart of '{name}' failed: {e}");
        }
        true
    }

    /// Flip a job's auto-restart flag
    pub fn toggle_auto_restart(&mut self, name: &str) -> bool {
        if !self.jobs.contains_key(name) {
            self.notice(Severity::Warn, format!("job '{name}' not found"));
            return false;
        }
        let mut enabled = false;
        if let Some(job) = self.jobs.get_mut(name) {
            job.opts.auto_restart = !job.opts.auto_restart;
            enabled = job.opts.auto_restart;
        }
        let state = if enabled { "on" } else { "off" };
        self.notice(
            Severity::Info,
            format!("auto-restart {state} for job '{name}'"),
        );
        self.persist();
        true
    }

    /// Flip a job's ANSI-cleaning flag; takes effect on the next restart
    pub fn toggle_ansi_clean(&mut self, name: &str) -> bool {
        if !self.jobs.contains_key(name) {
            self.notice(Severity::Warn, format!("job '{name}' not found"));
            return false;
        }
        let mut enabled = false;
        if let Some(job) = self.jobs.get_mut(name) {
            job.opts.clean_ansi = !job.opts.clean_ansi;
            enabled = job.opts.clean_ansi;
        }
        let state = if enabled { "on" } else { "off" };
        self.notice(
            Severity::Info,
            format!("ansi cleaning {state} for job '{name}' (takes effect on next restart)"),
        );
        self.persist();
        true
    }

    /// Stop every running job (shutdown path)
    pub fn stop_all(&mut self) {
        let running: Vec<String> = self
            .jobs
            .values()
            .filter(|job| job.status == JobStatus::Running)
            .map(|job| job.name.clone())
            .collect();
        for name in running {
            self.stop(&name);
        }
    }

    // === Batch starts ===

    /// Start a project's jobs strictly sequentially, each definition's
    /// startup delay elapsing before the next attempt
    pub fn start_project(&mut self, project: &Project) -> Uuid {
        self.notice(
            Severity::Info,
            format!("starting project batch of {} jobs", project.jobs.len()),
        );
        self.start_batch(project.batch_entries())
    }

    /// Start an ordered batch of (spec, startup delay) entries
    pub fn start_batch(&mut self, entries: Vec<(JobSpec, u64)>) -> Uuid {
        let id = Uuid::new_v4();
        self.batches.insert(
            id,
            Batch {
                remaining: entries.into(),
                report: BatchReport::default(),
            },
        );
        // the first attempt is deferred too, keeping handlers non-blocking
        self.schedule_batch(id, 0);
        id
    }

    /// Recreate persisted jobs, if auto-restore is enabled
    pub fn restore_saved(&mut self) -> usize {
        if !self.settings.auto_restore {
            return 0;
        }
        let snapshot = self.state.load();
        let mut restored = 0;
        for (name, saved) in snapshot {
            match self.start(&name, saved.cmd.clone(), saved.options()) {
                Ok(_) => restored += 1,
                Err(e) => debug!("could not restore job '{name}': {e}"),
            }
        }
        if restored > 0 {
            self.notice(Severity::Info, format!("restored {restored} saved jobs"));
        }
        restored
    }

    // === Event pump ===

    /// Drain all queued events without blocking (for hosts with tick loops)
    pub fn handle_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.event_rx.try_recv() {
            self.apply(event);
            handled += 1;
        }
        handled
    }

    /// Await and apply the next event (for hosts that block on the supervisor)
    pub async fn drive(&mut self) {
        // the supervisor holds a sender, so recv never yields None
        if let Some(event) = self.event_rx.recv().await {
            self.apply(event);
        }
    }

    fn apply(&mut self, event: JobEvent) {
        match event {
            JobEvent::Output {
                name,
                instance,
                chunk,
                from_stderr,
            } => self.on_output(&name, instance, &chunk, from_stderr),
            JobEvent::Exited {
                name,
                instance,
                code,
            } => self.on_exited(&name, instance, code),
            JobEvent::RestartDue { name, instance } => self.on_restart_due(&name, instance),
            JobEvent::StartDue { spec } => self.on_start_due(spec),
            JobEvent::BatchDue { id } => self.on_batch_due(id),
        }
    }

    fn on_output(&mut self, name: &str, instance: InstanceId, chunk: &str, from_stderr: bool) {
        let settings = &self.settings;
        let Some(job) = self.jobs.get_mut(name) else {
            return;
        };
        if job.instance != instance {
            // output from a previous incarnation
            return;
        }
        let ctx = RouteContext {
            clean: job.pty && job.active_clean_ansi,
            special: job.special,
            timestamps: settings.timestamps,
            timestamp_format: &settings.timestamp_format,
        };
        job.router.route(&mut job.log, &ctx, chunk, from_stderr);
    }

    fn on_exited(&mut self, name: &str, instance: InstanceId, code: Option<i32>) {
        let settings = &self.settings;
        let Some(job) = self.jobs.get_mut(name) else {
            return;
        };
        if job.instance != instance {
            return;
        }

        let ctx = RouteContext {
            clean: job.pty && job.active_clean_ansi,
            special: job.special,
            timestamps: settings.timestamps,
            timestamp_format: &settings.timestamp_format,
        };
        job.router.flush(&mut job.log, &ctx);

        let was_stopping = job.status == JobStatus::Stopping;
        job.status = JobStatus::Stopped;
        job.exit_code = code;
        job.pid = None;
        job.handle = None;

        let code_text = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
        job.log.push(format!("--- exited: {code_text} ---"), false);

        let failed = code.map_or(true, |c| c != 0);
        let auto_restart = job.opts.auto_restart;
        let restarts = job.restart_count;
        let current = job.instance;

        self.notice(
            if failed { Severity::Warn } else { Severity::Info },
            format!("job '{name}' exited ({code_text})"),
        );

        // a user-requested stop never auto-restarts
        if was_stopping || !failed || !auto_restart {
            return;
        }
        if restarts >= self.settings.max_restarts {
            self.notice(
                Severity::Warn,
                format!(
                    "job '{name}' exceeded {} auto-restarts; giving up",
                    self.settings.max_restarts
                ),
            );
            return;
        }
        let delay = self.settings.restart_delay_ms;
        self.notice(
            Severity::Info,
            format!("auto-restarting job '{name}' in {delay} ms"),
        );
        self.schedule_restart(name.to_string(), current, delay);
    }

    fn on_restart_due(&mut self, name: &str, instance: InstanceId) {
        let Some(job) = self.jobs.get(name) else {
            // deleted while the restart was pending
            return;
        };
        if job.instance != instance || job.status != JobStatus::Stopped {
            // recreated or manually resumed in the meantime
            return;
        }
        let spec = job.to_spec();
        let restarts = job.restart_count + 1;
        self.jobs.remove(name);
        self.order.retain(|n| n != name);

        let job_name = spec.name.clone();
        if let Err(e) = self.start_with_restarts(&job_name, spec.cmd, spec.opts, restarts) {
            error!("auto-restart of '{job_name}' failed: {e}");
        }
    }

    fn on_start_due(&mut self, spec: JobSpec) {
        let name = spec.name.clone();
        if let Err(e) = self.start_spec(spec) {
            debug!("deferred start of '{name}' failed: {e}");
        }
    }

    fn on_batch_due(&mut self, id: Uuid) {
        let Some(mut batch) = self.batches.remove(&id) else {
            return;
        };
        let Some((spec, delay)) = batch.remaining.pop_front() else {
            self.finish_batch(id, batch.report);
            return;
        };

        let name = spec.name.clone();
        match self.start_spec(spec) {
            Ok(_) => batch.report.started.push(name),
            Err(e) => batch.report.failed.push((name, e.to_string())),
        }

        if batch.remaining.is_empty() {
            self.finish_batch(id, batch.report);
        } else {
            // the just-attempted job's startup delay gates the next attempt
            self.batches.insert(id, batch);
            self.schedule_batch(id, delay);
        }
    }

    fn finish_batch(&mut self, id: Uuid, report: BatchReport) {
        let severity = if report.failed.is_empty() {
            Severity::Info
        } else {
            Severity::Warn
        };
        let failed: Vec<&str> = report.failed.iter().map(|(n, _)| n.as_str()).collect();
        self.notice(
            severity,
            format!(
                "batch complete: {} started [{}], {} failed [{}]",
                report.started.len(),
                report.started.join(", "),
                failed.len(),
                failed.join(", "),
            ),
        );
        self.finished_batches.insert(id, report);
    }

    // === Timers ===

    fn schedule_restart(&self, name: String, instance: InstanceId, delay_ms: u64) {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = tx.send(JobEvent::RestartDue { name, instance });
        });
    }

    fn schedule_start(&self, spec: JobSpec, delay_ms: u64) {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            let _ = tx.send(JobEvent::StartDue { spec });
        });
    }

    fn schedule_batch(&self, id: Uuid, delay_ms: u64) {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            let _ = tx.send(JobEvent::BatchDue { id });
        });
    }

    // === Spawning ===

    fn spawn_pipe(
        &self,
        name: &str,
        instance: InstanceId,
        argv: &[String],
        opts: &StartOptions,
    ) -> Result<JobHandle> {
        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(cwd) = &opts.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &opts.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(Error::Spawn)?;
        let pid = child.id();

        if let Some(stdout) = child.stdout.take() {
            self.spawn_chunk_reader(stdout, name, instance, false);
        }
        if let Some(stderr) = child.stderr.take() {
            self.spawn_chunk_reader(stderr, name, instance, true);
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let tx = self.event_tx.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = &mut stop_rx => {
                    let _ = child.start_kill();
                    child.wait().await
                }
            };
            let code = status.ok().and_then(|s| s.code());
            let _ = tx.send(JobEvent::Exited {
                name,
                instance,
                code,
            });
        });

        Ok(JobHandle::new(pid, Stopper::Pipe(stop_tx)))
    }

    fn spawn_chunk_reader<R>(&self, mut reader: R, name: &str, instance: InstanceId, from_stderr: bool)
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        let tx = self.event_tx.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                        let event = JobEvent::Output {
                            name: name.clone(),
                            instance,
                            chunk,
                            from_stderr,
                        };
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }

    fn spawn_pty(
        &self,
        name: &str,
        instance: InstanceId,
        argv: &[String],
        opts: &StartOptions,
    ) -> Result<JobHandle> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: 24,
                cols: 120,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| Error::Pty(e.to_string()))?;

        let mut builder = CommandBuilder::new(&argv[0]);
        builder.args(&argv[1..]);
        if let Some(cwd) = &opts.cwd {
            builder.cwd(cwd);
        }
        for (key, value) in &opts.env {
            builder.env(key, value);
        }

        let mut child = pair
            .slave
            .spawn_command(builder)
            .map_err(|e| Error::Pty(e.to_string()))?;
        drop(pair.slave);

        let pid = child.process_id();
        let killer = child.clone_killer();
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| Error::Pty(e.to_string()))?;
        let master = pair.master;

        let tx = self.event_tx.clone();
        let name = name.to_string();
        // pty reads are blocking; a plain thread feeds the event channel
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                        let event = JobEvent::Output {
                            name: name.clone(),
                            instance,
                            chunk,
                            from_stderr: false,
                        };
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                }
            }
            let code = child.wait().ok().map(|status| status.exit_code() as i32);
            let _ = tx.send(JobEvent::Exited {
                name,
                instance,
                code,
            });
            drop(master);
        });

        Ok(JobHandle::new(pid, Stopper::Pty(killer)))
    }

    // === Helpers ===

    fn persist(&mut self) {
        let snapshot = self.snapshot();
        if let Err(e) = self.state.save(&snapshot) {
            self.notice(Severity::Warn, format!("failed to persist job state: {e}"));
        }
    }

    /// Current job-configuration snapshot (runtime fields excluded)
    pub fn snapshot(&self) -> JobSnapshot {
        self.jobs
            .values()
            .map(|job| (job.name.clone(), SavedJob::from_job(job)))
            .collect()
    }

    fn notice(&mut self, severity: Severity, message: String) {
        match severity {
            Severity::Info => info!("{message}"),
            Severity::Warn => warn!("{message}"),
            Severity::Error => error!("{message}"),
        }
        if self.notices.len() >= NOTICE_CAP {
            self.notices.pop_front();
        }
        self.notices.push_back(Notice::new(severity, message));
    }
}

fn basename(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| program.to_string())
}

fn write_header(job: &mut Job) {
    job.log.push(format!("--- job: {} ---", job.name), false);
    job.log.push(format!("--- cmd: {} ---", job.cmd.join(" ")), false);
    if let Some(cwd) = &job.opts.cwd {
        job.log.push(format!("--- cwd: {} ---", cwd.display()), false);
    }
    job.log.push(
        format!("--- started: {} ---", job.created_at.format("%Y-%m-%d %H:%M:%S")),
        false,
    );
    if job.pty {
        let clean = if job.active_clean_ansi { "on" } else { "off" };
        job.log
            .push(format!("--- pty: on, ansi clean: {clean} ---"), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::settings::{HandlerRule, SpecialFormat};
    use tempfile::TempDir;

    fn fixture() -> (Supervisor, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Settings::default();
        settings.state_path = Some(dir.path().join("state.json"));
        settings.restart_delay_ms = 50;
        settings.settle_delay_ms = 50;
        settings.timestamps = false;
        (Supervisor::new(settings), dir)
    }

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    async fn drive_until(sup: &mut Supervisor, mut pred: impl FnMut(&Supervisor) -> bool) -> bool {
        for _ in 0..200 {
            if pred(sup) {
                return true;
            }
            let _ = tokio::time::timeout(Duration::from_millis(50), sup.drive()).await;
        }
        pred(sup)
    }

    fn log_contains(sup: &Supervisor, name: &str, needle: &str) -> bool {
        sup.job(name)
            .map(|j| j.log.iter().any(|l| l.content.contains(needle)))
            .unwrap_or(false)
    }

    fn status_is(sup: &Supervisor, name: &str, status: JobStatus) -> bool {
        sup.job(name).map(|j| j.status == status).unwrap_or(false)
    }

    #[tokio::test]
    async fn duplicate_name_leaves_one_job() {
        let (mut sup, _dir) = fixture();
        sup.start("a", sh("sleep 30"), StartOptions::default()).unwrap();
        let err = sup
            .start("a", sh("sleep 30"), StartOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateJob(_)));
        assert_eq!(sup.jobs().len(), 1);
        sup.delete("a");
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let (mut sup, _dir) = fixture();
        let err = sup.start("a", vec![], StartOptions::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyCommand));
        assert!(sup.jobs().is_empty());
    }

    #[tokio::test]
    async fn spawn_failure_registers_nothing() {
        let (mut sup, _dir) = fixture();
        let result = sup.start(
            "a",
            vec!["definitely-not-a-real-binary-123".to_string()],
            StartOptions::default(),
        );
        assert!(matches!(result, Err(Error::Spawn(_))));
        assert!(sup.jobs().is_empty());
    }

    #[tokio::test]
    async fn job_runs_to_completion() {
        let (mut sup, _dir) = fixture();
        sup.start("echo", sh("echo hello"), StartOptions::default())
            .unwrap();
        assert!(
            drive_until(&mut sup, |s| {
                status_is(s, "echo", JobStatus::Stopped) && log_contains(s, "echo", "hello")
            })
            .await
        );
        let job = sup.job("echo").unwrap();
        assert_eq!(job.exit_code, Some(0));
        assert!(job.handle.is_none());
        assert!(log_contains(&sup, "echo", "--- job: echo ---"));
        assert!(log_contains(&sup, "echo", "--- exited: 0 ---"));

        let window = sup.log_range("echo", 0, 2).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].content, "--- job: echo ---");
        assert!(sup.log_range("missing", 0, 2).is_none());
    }

    #[tokio::test]
    async fn stderr_lands_in_the_same_log() {
        let (mut sup, _dir) = fixture();
        sup.start("both", sh("echo out; echo err >&2"), StartOptions::default())
            .unwrap();
        assert!(
            drive_until(&mut sup, |s| {
                status_is(s, "both", JobStatus::Stopped)
                    && s.job("both").map_or(false, |j| {
                        j.log.iter().any(|l| l.content == "out")
                            && j.log.iter().any(|l| l.content == "err")
                    })
            })
            .await
        );
        let job = sup.job("both").unwrap();
        assert!(job.log.iter().any(|l| l.content == "err" && l.from_stderr));
    }

    #[tokio::test]
    async fn stop_kills_a_running_job() {
        let (mut sup, _dir) = fixture();
        sup.start("sleeper", sh("sleep 30"), StartOptions::default())
            .unwrap();
        assert!(sup.stop("sleeper"));
        assert_eq!(sup.job("sleeper").unwrap().status, JobStatus::Stopping);
        assert!(!sup.stop("sleeper"));
        assert!(drive_until(&mut sup, |s| status_is(s, "sleeper", JobStatus::Stopped)).await);
        assert!(!sup.stop("missing"));
    }

    #[tokio::test]
    async fn nonzero_exit_with_auto_restart_recreates_until_the_cap() {
        let (mut sup, _dir) = fixture();
        let opts = StartOptions {
            auto_restart: true,
            ..StartOptions::default()
        };
        sup.start("flaky", sh("exit 7"), opts).unwrap();
        let first_instance = sup.job("flaky").unwrap().instance;

        assert!(
            drive_until(&mut sup, |s| {
                s.job("flaky").map(|j| j.restart_count >= 1).unwrap_or(false)
            })
            .await
        );
        assert_ne!(sup.job("flaky").unwrap().instance, first_instance);

        // the crash loop gives up once the cap is hit
        assert!(
            drive_until(&mut sup, |s| {
                s.job("flaky")
                    .map(|j| j.restart_count == 3 && j.status == JobStatus::Stopped)
                    .unwrap_or(false)
            })
            .await
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
        sup.handle_events();
        let job = sup.job("flaky").unwrap();
        assert_eq!(job.restart_count, 3);
        assert_eq!(job.status, JobStatus::Stopped);
    }

    #[tokio::test]
    async fn delete_cancels_a_pending_auto_restart() {
        let (mut sup, _dir) = fixture();
        let opts = StartOptions {
            auto_restart: true,
            ..StartOptions::default()
        };
        sup.start("doomed", sh("exit 1"), opts).unwrap();
        assert!(drive_until(&mut sup, |s| status_is(s, "doomed", JobStatus::Stopped)).await);
        assert!(sup.delete("doomed"));

        // let the scheduled restart fire into the void
        tokio::time::sleep(Duration::from_millis(200)).await;
        sup.handle_events();
        assert!(sup.job("doomed").is_none());
        assert!(sup.jobs().is_empty());
    }

    #[tokio::test]
    async fn user_stop_does_not_auto_restart() {
        let (mut sup, _dir) = fixture();
        let opts = StartOptions {
            auto_restart: true,
            ..StartOptions::default()
        };
        sup.start("svc", sh("sleep 30"), opts).unwrap();
        assert!(sup.stop("svc"));
        assert!(drive_until(&mut sup, |s| status_is(s, "svc", JobStatus::Stopped)).await);
        let instance = sup.job("svc").unwrap().instance;

        tokio::time::sleep(Duration::from_millis(200)).await;
        sup.handle_events();
        assert_eq!(sup.job("svc").unwrap().instance, instance);
        assert_eq!(sup.job("svc").unwrap().status, JobStatus::Stopped);
    }

    #[tokio::test]
    async fn restart_running_job_recreates_after_settle_delay() {
        let (mut sup, _dir) = fixture();
        sup.start("svc", sh("sleep 30"), StartOptions::default())
            .unwrap();
        let first = sup.job("svc").unwrap().instance;
        assert!(sup.restart("svc"));
        assert!(sup.job("svc").is_none());
        assert!(drive_until(&mut sup, |s| status_is(s, "svc", JobStatus::Running)).await);
        assert_ne!(sup.job("svc").unwrap().instance, first);
        sup.delete("svc");
    }

    #[tokio::test]
    async fn restart_of_stopped_job_is_a_plain_start() {
        let (mut sup, _dir) = fixture();
        sup.start("once", sh("echo done"), StartOptions::default())
            .unwrap();
        assert!(drive_until(&mut sup, |s| status_is(s, "once", JobStatus::Stopped)).await);
        assert!(sup.restart("once"));
        assert!(sup.job("once").is_some());
        assert!(!sup.restart("missing"));
    }

    #[tokio::test]
    async fn batch_start_is_sequential_and_records_failures() {
        let (mut sup, _dir) = fixture();
        let spec = |name: &str| JobSpec {
            name: name.to_string(),
            cmd: sh("echo hi"),
            opts: StartOptions::default(),
        };
        let entries = vec![(spec("a"), 0), (spec("a"), 0), (spec("b"), 0)];
        let id = sup.start_batch(entries);
        assert!(drive_until(&mut sup, |s| s.batch_report(id).is_some()).await);

        let report = sup.batch_report(id).unwrap();
        assert_eq!(report.started, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "a");
    }

    #[tokio::test]
    async fn toggles_flip_flags_and_persist() {
        let (mut sup, dir) = fixture();
        sup.start("j", sh("sleep 30"), StartOptions::default())
            .unwrap();
        assert!(sup.toggle_auto_restart("j"));
        assert!(sup.jobs()[0].auto_restart);
        assert!(sup.toggle_ansi_clean("j"));
        assert!(sup.job("j").unwrap().opts.clean_ansi);
        // the active setting is untouched until a restart
        assert!(!sup.job("j").unwrap().active_clean_ansi);
        assert!(!sup.toggle_auto_restart("missing"));

        let snapshot = StateFile::new(dir.path().join("state.json")).load();
        assert!(snapshot.get("j").unwrap().auto_restart);
        sup.delete("j");
    }

    #[tokio::test]
    async fn deleted_jobs_leave_the_snapshot() {
        let (mut sup, dir) = fixture();
        sup.start("keep", sh("sleep 30"), StartOptions::default())
            .unwrap();
        sup.start("drop", sh("sleep 30"), StartOptions::default())
            .unwrap();
        sup.delete("drop");

        let snapshot = StateFile::new(dir.path().join("state.json")).load();
        assert!(snapshot.contains_key("keep"));
        assert!(!snapshot.contains_key("drop"));
        sup.delete("keep");
    }

    #[tokio::test]
    async fn restore_recreates_saved_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let mut snapshot = JobSnapshot::new();
        snapshot.insert(
            "saved".to_string(),
            SavedJob {
                cmd: sh("sleep 30"),
                cwd: None,
                opts: Default::default(),
                auto_restart: false,
            },
        );
        StateFile::new(path.clone()).save(&snapshot).unwrap();

        let mut settings = Settings::default();
        settings.state_path = Some(path);
        settings.auto_restore = true;
        settings.timestamps = false;
        let mut sup = Supervisor::new(settings);
        assert_eq!(sup.restore_saved(), 1);
        assert!(sup.job("saved").is_some());
        sup.delete("saved");
    }

    #[tokio::test]
    async fn pty_tunnel_job_gets_a_summary_and_skips_the_merge() {
        let (mut sup, _dir) = fixture();
        // route `sh` through the tunnel handler to exercise the pty path
        sup.settings.handlers.insert(
            0,
            HandlerRule {
                pattern: "sh".to_string(),
                pty: true,
                clean_ansi: true,
                extra_args: Vec::new(),
                special: Some(SpecialFormat::Tunnel),
            },
        );
        sup.start(
            "tunnel",
            sh("printf 'Forwarding   https://abc.ngrok.io -> http://localhost:3000\\n'"),
            StartOptions::default(),
        )
        .unwrap();
        assert!(sup.job("tunnel").unwrap().pty);
        assert!(
            drive_until(&mut sup, |s| {
                log_contains(s, "tunnel", "FORWARDING URL: https://abc.ngrok.io")
            })
            .await
        );

        let view = sup.merged_view();
        assert_eq!(view.pty_skipped, vec!["tunnel".to_string()]);
        assert!(!view.entries.iter().any(|e| e.job == "tunnel"));
    }
}
