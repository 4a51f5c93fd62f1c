/*
[INPUT]:  CLI arguments, optional YAML configuration file, OS shutdown signals
[OUTPUT]: Interactive terminal session driving the share pipeline
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

mod tui;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use sharegate_core::{FailingWorkload, Phase, PipelineConfig, SimulatedWorkload, Workload};

use crate::tui::{LogBuffer, LogBufferHandle, LogWriterFactory, TRACE_BUFFER_CAPACITY};

#[derive(Parser, Debug)]
#[command(name = "sharegate", version, about = "Cancellable generate/confirm/share pipeline")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Write trace output to this file instead of the Trace panel
    #[arg(long = "trace-file", value_name = "PATH")]
    trace_file: Option<PathBuf>,
    /// Validate the configuration, print it as YAML and exit
    #[arg(long = "dry-run")]
    dry_run: bool,
    /// Make the workload fail, e.g. `generate:40` or `share:10`
    #[arg(long = "fail-at", value_name = "PHASE:PERCENT", value_parser = parse_fail_at)]
    fail_at: Option<FailingWorkload>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let config = load_config(args.config_path.as_deref())?;

    if args.dry_run {
        let yaml = serde_yaml::to_string(&config).context("render config as yaml")?;
        print!("{yaml}");
        return Ok(());
    }

    let trace_buffer: LogBufferHandle =
        Arc::new(Mutex::new(LogBuffer::new(TRACE_BUFFER_CAPACITY)));
    let _guard = init_tracing(&args.log_level, args.trace_file.as_deref(), &trace_buffer)?;
    let trace_panel = args.trace_file.is_none().then_some(trace_buffer);

    let workload: Arc<dyn Workload> = match args.fail_at {
        Some(failing) => {
            info!(phase = %failing.phase, percent = failing.percent, "workload failure injected");
            Arc::new(failing)
        }
        None => Arc::new(SimulatedWorkload),
    };

    let shutdown = CancellationToken::new();
    setup_signal_handlers(shutdown.clone());

    info!("starting sharegate");
    tui::run_tui(config, workload, trace_panel, shutdown)
        .await
        .context("run terminal ui")?;
    info!("sharegate stopped");
    Ok(())
}

fn init_tracing(
    log_level: &str,
    trace_file: Option<&Path>,
    trace_buffer: &LogBufferHandle,
) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false);

    match trace_file {
        Some(path) => {
            let directory = path.parent().unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .context("trace file path must name a file")?;
            let appender = tracing_appender::rolling::never(directory, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            builder
                .with_writer(writer)
                .try_init()
                .map_err(|err| anyhow!(err))
                .context("initialize tracing subscriber")?;
            Ok(Some(guard))
        }
        None => {
            builder
                .with_writer(LogWriterFactory::new(trace_buffer.clone()))
                .try_init()
                .map_err(|err| anyhow!(err))
                .context("initialize tracing subscriber")?;
            Ok(None)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let Some(path) = path else {
        let config = PipelineConfig::default();
        config.validate().context("validate default config")?;
        return Ok(config);
    };
    let path_str = path.to_str().context("config path must be valid utf-8")?;
    PipelineConfig::from_file(path_str).context("load config")
}

fn parse_fail_at(value: &str) -> Result<FailingWorkload> {
    let (phase, percent) = value
        .split_once(':')
        .context("expected PHASE:PERCENT")?;
    let phase = match phase.trim().to_ascii_lowercase().as_str() {
        "generate" => Phase::Generate,
        "share" => Phase::Share,
        other => bail!("unknown phase '{other}' (expected generate or share)"),
    };
    let percent: u8 = percent
        .trim()
        .parse()
        .with_context(|| format!("invalid percent '{percent}'"))?;
    if !(1..=100).contains(&percent) {
        bail!("percent must be within 1..=100 (got {percent})");
    }
    Ok(FailingWorkload { phase, percent })
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "failed to install ctrl-c handler");
                return;
            }
            info!("received ctrl-c");
            shutdown.cancel();
        });
    }
}
