//! Gridprobe binary entry point.

use anyhow::{Result, bail};
use clap::Parser;
use gridprobe::{ArchiveSink, ChartSink, Orchestrator, ProbeSet};
use gridprobe_common::{LogConfig, example_config, init_logging, load_config, load_nodes};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "gridprobe",
    version,
    about = "Probe remote compute nodes and aggregate per-node health scores"
)]
struct Cli {
    /// Path to gridprobe.toml (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for rendered charts (overrides [charts].output_dir)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Uptime sampling window in seconds (overrides [uptime].duration_secs)
    #[arg(long)]
    uptime_duration: Option<u64>,

    /// Uptime tick interval in seconds (overrides [uptime].interval_secs)
    #[arg(long)]
    uptime_interval: Option<u64>,

    /// Node batteries in flight at once (overrides [probe].concurrency)
    #[arg(long)]
    concurrency: Option<usize>,

    /// Do not upload the metrics to the archive gateway
    #[arg(long)]
    skip_archive: bool,

    /// Do not render charts
    #[arg(long)]
    skip_charts: bool,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_example_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Raise the log level for `--verbose`, unless an explicit environment
/// setting already chose one.
fn apply_verbosity(config: LogConfig, verbose: bool, level_from_env: bool) -> LogConfig {
    if verbose && !level_from_env {
        config.with_level("debug")
    } else {
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.print_example_config {
        println!("{}", example_config());
        return Ok(());
    }

    let log_config = apply_verbosity(
        LogConfig::from_env("info"),
        cli.verbose,
        std::env::var_os("GRIDPROBE_LOG_LEVEL").is_some(),
    );
    let _guards = init_logging(&log_config)?;

    let config = load_config(cli.config.as_deref())?;
    let nodes = load_nodes(&config);
    if nodes.is_empty() {
        bail!("No enabled nodes configured; run with --print-example-config to get started");
    }

    let concurrency = cli.concurrency.unwrap_or(config.probe.concurrency);
    let uptime_duration = cli
        .uptime_duration
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.uptime.duration());
    let uptime_interval = cli
        .uptime_interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.uptime.interval());

    // Ctrl-C stops issuing new probes; in-flight work drains and whatever
    // accumulated still gets reduced and reported.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, finishing in-flight work");
                cancel.cancel();
            }
        });
    }

    let probes = ProbeSet::from_config(&config);
    let orchestrator = Orchestrator::new(
        nodes,
        probes,
        concurrency,
        uptime_duration,
        uptime_interval,
    );
    let report = orchestrator.run(cancel).await;

    println!("{}", serde_json::to_string_pretty(&report.metrics)?);

    if cli.skip_archive {
        info!("Archival skipped by flag");
    } else {
        let sink = ArchiveSink::from_settings(&config.archive);
        if sink.is_enabled() {
            match sink.upload(&report.metrics).await {
                Ok(cid) => info!("Metrics archived under {}", cid),
                Err(e) => warn!("Archival failed: {:#}", e),
            }
        } else {
            info!("Archival disabled: no API key in environment");
        }
    }

    if cli.skip_charts {
        info!("Charts skipped by flag");
    } else {
        let mut chart_settings = config.charts.clone();
        if let Some(dir) = cli.output_dir {
            chart_settings.output_dir = dir;
        }
        let sink = ChartSink::from_settings(&chart_settings);
        if let Err(e) = sink.render_all(&report.metrics) {
            warn!("Chart rendering failed: {:#}", e);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_raises_default_level() {
        let config = apply_verbosity(LogConfig::default(), true, false);
        assert_eq!(config.level, "debug");
    }

    #[test]
    fn test_verbose_defers_to_env_level() {
        let config = LogConfig::default().with_level("warn");
        let config = apply_verbosity(config, true, true);
        assert_eq!(config.level, "warn");
    }

    #[test]
    fn test_no_verbose_keeps_level() {
        let config = apply_verbosity(LogConfig::default(), false, false);
        assert_eq!(config.level, "info");
    }
}
