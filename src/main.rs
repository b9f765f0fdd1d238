//! jobdeck: headless job runner
//!
//! Loads a project definition and/or ad-hoc invocations, supervises the
//! jobs, and streams notices to stdout until interrupted.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jobdeck::{parse_invocation, Project, Settings, Supervisor};

/// Supervise long-running jobs and aggregate their logs
#[derive(Parser, Debug)]
#[command(name = "jobdeck")]
#[command(version = "0.1.0")]
#[command(about = "Supervise long-running jobs and aggregate their logs")]
struct Cli {
    /// Project definition file (version 1)
    project: Option<PathBuf>,

    /// Ad-hoc job invocation: "name [flags] command..." (repeatable)
    #[arg(short, long = "job")]
    job: Vec<String>,

    /// Settings file path
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Override the state-file location
    #[arg(long)]
    state: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.debug { "jobdeck=debug" } else { "jobdeck=warn" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let mut settings = Settings::load(cli.settings)?;
    if let Some(state) = cli.state {
        settings.state_path = Some(state);
    }

    let mut supervisor = Supervisor::new(settings);
    supervisor.restore_saved();

    if let Some(path) = &cli.project {
        let project = Project::load(path)?;
        supervisor.start_project(&project);
    }
    for text in &cli.job {
        let invocation = parse_invocation(text)?;
        // start failures are reported through the notice stream
        let _ = supervisor.start(&invocation.name, invocation.cmd, invocation.opts);
    }

    // Run the main loop
    loop {
        tokio::select! {
            _ = supervisor.drive() => {
                print_notices(&mut supervisor);
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    // Give stop signals a moment to land before exiting
    supervisor.stop_all();
    print_notices(&mut supervisor);
    for _ in 0..40 {
        if !supervisor.jobs().iter().any(|job| job.status.is_live()) {
            break;
        }
        let _ = tokio::time::timeout(Duration::from_millis(50), supervisor.drive()).await;
    }
    print_notices(&mut supervisor);

    Ok(())
}

fn print_notices(supervisor: &mut Supervisor) {
    for notice in supervisor.drain_notices() {
        println!("[{}] {}", notice.severity, notice.message);
    }
}
