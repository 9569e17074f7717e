mod app;
mod effects;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use engine_logging::{engine_info, LogDestination};
use grabber_engine::{ensure_output_dir, BackendSettings, EngineHandle};
use log::LevelFilter;

use crate::app::Options;
use crate::effects::EffectRunner;

#[derive(Parser)]
#[command(name = "grabber", about = "Download a video through a grabber backend")]
struct Cli {
    /// Video page URL
    url: String,

    /// Format id to download. Without it the available formats are listed
    /// and one is read from stdin.
    #[arg(short, long)]
    format: Option<String>,

    /// Backend service root
    #[arg(short, long, env = "GRABBER_BACKEND_URL", default_value = "http://localhost:8000")]
    backend: String,

    /// Directory the finished file is saved into
    #[arg(short, long, default_value = "./downloads")]
    output: PathBuf,

    /// Where log output goes
    #[arg(long, value_enum, default_value_t = LogTarget::File)]
    log: LogTarget,

    /// Log file used by `--log file` and `--log both`
    #[arg(long, default_value = "./grabber.log")]
    log_file: PathBuf,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// Connect timeout in seconds
    #[arg(long, default_value_t = 10)]
    connect_timeout: u64,

    /// Timeout in seconds for request/response calls
    #[arg(long, default_value_t = 30)]
    request_timeout: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    engine_logging::initialize(cli.log.into(), level, &cli.log_file);

    ensure_output_dir(&cli.output)
        .with_context(|| format!("Output directory {} is not usable", cli.output.display()))?;

    let settings = BackendSettings {
        base_url: cli.backend.clone(),
        connect_timeout: Duration::from_secs(cli.connect_timeout),
        request_timeout: Duration::from_secs(cli.request_timeout),
    };
    engine_info!("Using backend {}", settings.base_url);
    let engine = EngineHandle::new(settings).context("Failed to start the download engine")?;
    let runner = EffectRunner::new(engine, cli.output.clone());

    let outcome = app::run(
        runner,
        Options {
            url: cli.url,
            format: cli.format,
        },
    );
    Ok(outcome.report())
}
