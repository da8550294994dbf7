//! Operator-gated AR placement walkthrough.
//!
//! Opens a WebDriver session against the device, switches into the AR page's
//! web view, and walks through place, reset, move, grow and shrink. Each
//! gesture asks for confirmation first; after each gesture the object's new
//! position is read back from the page.
//!
//! # Usage
//!
//! ```bash
//! # Interactive run against a local Appium server
//! arbridge
//!
//! # Remote server, screenshots in ./shots, JSON report
//! arbridge --server http://10.0.0.5:4723 --screenshot-dir shots --report run.json
//!
//! # Unattended: approve every step
//! arbridge --yes
//!
//! # More detail
//! RUST_LOG=arbridge_core=debug arbridge --log-file arbridge.log
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use arbridge_core::config::{default_config_path, ArBridgeConfig};
use arbridge_core::operator::{AutoApprove, LineOperator};
use arbridge_core::scenario::{run_session_until, RunReport, ScenarioSettings};
use arbridge_core::step::StepOutcome;
use arbridge_core::webdriver::WebDriverSession;

/// Operator-gated AR placement walkthrough over a WebDriver session.
#[derive(Parser)]
#[command(name = "arbridge")]
#[command(about = "Drive an AR placement page step by step and read back where the object went")]
#[command(version)]
struct Cli {
    /// WebDriver / Appium server URL
    #[arg(short, long, env = "ARBRIDGE_SERVER")]
    server: Option<String>,

    /// CSS selector of the coordinate probe element
    #[arg(long)]
    selector: Option<String>,

    /// Directory for before/after screenshots
    #[arg(long)]
    screenshot_dir: Option<PathBuf>,

    /// Approve every step without prompting
    #[arg(short, long)]
    yes: bool,

    /// Write the run report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Config file (default: ~/.arbridge/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let _guard = init_tracing(cli.log_file.as_deref());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `info`). With
/// `--log-file` the same events are also appended to that file.
fn init_tracing(log_file: Option<&Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().map(|n| n.to_os_string()).unwrap_or_else(|| "arbridge.log".into());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

#[derive(Debug)]
enum CliError {
    Config(String),
    Connection(String),
    RunFailed(String),
    Interrupted(String),
    Report(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::RunFailed(_) | CliError::Report(_) => ExitCode::from(1),
            CliError::Connection(_) => ExitCode::from(2),
            CliError::Config(_) => ExitCode::from(3),
            CliError::Interrupted(_) => ExitCode::from(130),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Connection(msg) => write!(f, "Connection error: {}", msg),
            CliError::RunFailed(msg) => write!(f, "Run failed: {}", msg),
            CliError::Interrupted(msg) => write!(f, "Run aborted: {}", msg),
            CliError::Report(msg) => write!(f, "Report error: {}", msg),
        }
    }
}

/// Loads the config file and applies command-line overrides.
///
/// An explicit `--config` must exist and parse; the default location falls
/// back to built-in defaults.
fn load_config(cli: &Cli) -> Result<ArBridgeConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => ArBridgeConfig::load_from(path)
            .map_err(|e| CliError::Config(format!("{}: {}", path.display(), e)))?,
        None => {
            info!(path = %default_config_path().display(), "loading config");
            ArBridgeConfig::load()
        }
    };

    if let Some(server) = &cli.server {
        config.server_url = server.clone();
    }
    if let Some(selector) = &cli.selector {
        config.probe_selector = selector.clone();
    }
    if let Some(dir) = &cli.screenshot_dir {
        config.screenshot_dir = dir.clone();
    }

    config.validate().map_err(|e| CliError::Config(e.to_string()))?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = load_config(&cli)?;
    let settings = ScenarioSettings::from_config(&config);

    info!(server = %config.server_url, "opening session");
    let mut session = WebDriverSession::start(&config.server_url, &config.capabilities)
        .await
        .map_err(|e| {
            CliError::Connection(format!("Failed to open session at {}: {}", config.server_url, e))
        })?;

    let report = if cli.yes {
        run_session_until(&mut session, AutoApprove, &settings, ctrl_c()).await
    } else {
        run_session_until(&mut session, LineOperator::console(), &settings, ctrl_c()).await
    };

    print_report(&report);

    if let Some(path) = &cli.report {
        write_report(&report, path)?;
    }

    match report.error {
        Some(message) if report.interrupted => Err(CliError::Interrupted(message)),
        Some(message) => Err(CliError::RunFailed(message)),
        None => Ok(()),
    }
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves,
/// so the run goes on without interrupt support.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

fn print_report(report: &RunReport) {
    println!();
    println!("Run {}", report.run_id);
    for step in &report.steps {
        let status = match &step.outcome {
            StepOutcome::Success => "ok".to_string(),
            StepOutcome::Skipped => "skipped".to_string(),
            StepOutcome::Failed(reason) => format!("FAILED: {}", reason),
        };
        match step.point {
            Some(point) => println!("  {:<32} {} {}", step.name, status, point),
            None => println!("  {:<32} {}", step.name, status),
        }
    }
    match report.final_point {
        Some(point) => println!("Final coordinates: {}", point),
        None => println!("Final coordinates: unknown"),
    }
}

fn write_report(report: &RunReport, path: &Path) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| CliError::Report(format!("Failed to serialize report: {}", e)))?;
    std::fs::write(path, json).map_err(|e| {
        warn!(path = %path.display(), error = %e, "could not write report");
        CliError::Report(format!("Failed to write {}: {}", path.display(), e))
    })?;
    info!(path = %path.display(), "wrote run report");
    Ok(())
}
