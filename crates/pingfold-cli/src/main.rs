//! pingfold — scheduled-job entry points.
//!
//! Each subcommand is a single run-to-completion batch job; the
//! scheduling itself (per-cycle, daily, weekly, …) stays outside, in
//! cron or a systemd timer:
//!
//! ```text
//! pingfold measure                  submit, wait, normalize, stage
//! pingfold promote [--date]         fold yesterday's partition into the
//!                                   canonical store, then drop it
//! pingfold report --horizon weekly  aggregate and publish one horizon
//! pingfold prune                    retention sweep
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{Days, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use pingfold_client::{MeasurementClient, PollConfig, ProbeSelector};
use pingfold_core::PingfoldConfig;
use pingfold_ingest::{run_cycle, CycleConfig};
use pingfold_rollup::{
    promote_and_drop, prune_expired, render_reports, Horizon, ReportSink, RollupResult,
};
use pingfold_state::{MeasurementAggregate, ResultAggregate, StateStore};

#[derive(Parser)]
#[command(name = "pingfold", about = "Network-path latency collection and rollup", version)]
struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, default_value = "pingfold.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one measurement cycle into today's staging partition.
    Measure,
    /// Promote a day's partition into the canonical store, then drop it.
    Promote {
        /// Partition date (YYYY-MM-DD); defaults to yesterday.
        #[arg(long)]
        date: Option<String>,
    },
    /// Aggregate every configured target over a horizon and publish it.
    Report {
        /// One of: daily, weekly, monthly, yearly.
        #[arg(long)]
        horizon: String,
    },
    /// Remove canonical aggregates past their retention expiry.
    Prune,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pingfold=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = PingfoldConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    let store = StateStore::open(Path::new(&config.store.path))?;

    match cli.command {
        Command::Measure => measure(&config, &store).await,
        Command::Promote { date } => promote(&store, date),
        Command::Report { horizon } => report(&config, &store, &horizon),
        Command::Prune => {
            let removed = prune_expired(&store, Utc::now())?;
            println!("pruned {removed} expired aggregate records");
            Ok(())
        }
    }
}

async fn measure(config: &PingfoldConfig, store: &StateStore) -> anyhow::Result<()> {
    let mut builder = MeasurementClient::builder().endpoint(&config.api.endpoint);
    if let Some(token) = &config.api.token {
        builder = builder.token(token);
    }
    if let Some(secs) = config.api.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let client = builder.build()?;

    let measure = &config.measure;
    let poll_defaults = PollConfig::default();
    let cycle = CycleConfig {
        targets: measure.targets.clone(),
        selector: ProbeSelector {
            magic: measure.probe_magic.clone().unwrap_or_else(|| "world".to_string()),
            limit: measure.probe_limit.unwrap_or(10),
        },
        packets: measure.packets.unwrap_or(16),
        poll: PollConfig {
            base_interval: measure
                .poll_interval_secs
                .map_or(poll_defaults.base_interval, Duration::from_secs),
            max_interval: measure
                .poll_max_interval_secs
                .map_or(poll_defaults.max_interval, Duration::from_secs),
            deadline: measure
                .poll_deadline_secs
                .map_or(poll_defaults.deadline, Duration::from_secs),
        },
    };

    let report = run_cycle(&client, store, &cycle, Utc::now().date_naive()).await?;
    println!(
        "measured {} targets ({} failed): {} measurements, {} results, {} new probes",
        report.targets_measured,
        report.targets_failed,
        report.measurements_staged,
        report.results_staged,
        report.probes_created
    );
    Ok(())
}

fn promote(store: &StateStore, date: Option<String>) -> anyhow::Result<()> {
    let date: NaiveDate = match date {
        Some(s) => s.parse().with_context(|| format!("invalid date '{s}'"))?,
        None => Utc::now().date_naive() - Days::new(1),
    };
    let report = promote_and_drop(store, date, Utc::now())?;
    println!(
        "promoted {}: {} targets, {} measurement aggregates, {} result aggregates",
        date, report.targets, report.measurement_aggregates, report.result_aggregates
    );
    Ok(())
}

fn report(config: &PingfoldConfig, store: &StateStore, horizon: &str) -> anyhow::Result<()> {
    let horizon: Horizon = horizon.parse().map_err(|e: String| anyhow::anyhow!(e))?;
    let mut sink = LineSink;
    let summary = render_reports(
        store,
        &mut sink,
        &config.measure.targets,
        horizon,
        Utc::now().date_naive(),
        Utc::now(),
    )?;
    println!(
        "{horizon} report: {} targets published, {} skipped (no data)",
        summary.published, summary.skipped
    );
    Ok(())
}

/// Sink that prints one summary line per published target. Layout and
/// templating belong to downstream renderers, not the engine.
struct LineSink;

impl ReportSink for LineSink {
    fn publish(
        &mut self,
        target: &str,
        _horizon: Horizon,
        measurement: &MeasurementAggregate,
        results: &[ResultAggregate],
    ) -> RollupResult<()> {
        println!(
            "{target} [{}]: {} measurements, avg {:.3}s over {} probes",
            measurement.label,
            measurement.count,
            measurement.avg_duration,
            results.len()
        );
        Ok(())
    }
}
