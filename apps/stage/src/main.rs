//! # Weave stage
//!
//! Build-pipeline entry point. The host writes an invocation manifest, runs
//! the stage, and reads the build report from stdout (or `--report`).
//! Logs go to stderr and, with `--log-dir`, to a rolling file.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use weave::{BuildReport, Pipeline};
use weave::domain::invocation::BuildInvocation;
use weave_kernel::config::load_weave_config;
use weave_logger::Logger;
use weave_runtime::build_pipeline_runtime;

#[derive(Debug, Parser)]
#[command(name = "weave-stage")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Registers marker implementations in the registry class of a build")]
struct Args {
    /// JSON manifest describing the containers of this build.
    #[arg(long)]
    invocation: PathBuf,
    /// Configuration file, layered under `WEAVE__*` environment overrides.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Writes the build report here instead of stdout.
    #[arg(long)]
    report: Option<PathBuf>,
    /// Directory for log files.
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Writes the log file as JSON lines.
    #[arg(long, requires = "log_dir")]
    json_logs: bool,
    /// Raises log verbosity (`-v` debug, `-vv` trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let _logger = init_logger(&args)?;

    let config = load_weave_config(args.config.as_deref()).context("Configuration is malformed")?;
    let invocation = read_invocation(&args.invocation)?;

    let runtime = build_pipeline_runtime(config.workers)?;
    let report = runtime.block_on(Pipeline::new(config).run(&invocation))?;
    info!(discovered = report.discovered.len(), patched = report.patched(), "stage finished");

    write_report(&report, args.report.as_deref())
}

fn init_logger(args: &Args) -> Result<Logger> {
    let builder = Logger::builder().name(env!("CARGO_PKG_NAME")).verbosity(args.verbose);
    let logger = match &args.log_dir {
        Some(dir) if args.json_logs => builder.path(dir).json().init(),
        Some(dir) => builder.path(dir).init(),
        None => builder.init(),
    };
    logger.context("Failed to initialize logging")
}

fn read_invocation(path: &Path) -> Result<BuildInvocation> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read invocation {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid invocation {}", path.display()))
}

#[allow(clippy::print_stdout)]
fn write_report(report: &BuildReport, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    match path {
        Some(path) => fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display())),
        None => {
            println!("{json}");
            Ok(())
        },
    }
}
