//! One measurement cycle: submit, wait, normalize, stage.
//!
//! Run-to-completion batch job, scheduled externally. Jobs for every
//! target are submitted up front so they execute upstream concurrently,
//! then each is polled to a terminal state in turn. A target whose job
//! fails or stalls is logged and skipped; the cycle carries on with the
//! rest. New probes are flushed before any staged rows that reference
//! them, so staged results never dangle.

use chrono::NaiveDate;
use pingfold_client::{MeasurementClient, PollConfig, ProbeSelector};
use pingfold_state::StateStore;
use tracing::{debug, info, warn};

use crate::error::IngestResult;
use crate::normalize::normalize;
use crate::registry::ProbeRegistry;
use crate::staging::StagingWriter;

/// Measurement fan-out parameters for one cycle.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub targets: Vec<String>,
    pub selector: ProbeSelector,
    /// Ping packets per probe.
    pub packets: u32,
    pub poll: PollConfig,
}

/// What one cycle accomplished.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Targets whose measurement was staged.
    pub targets_measured: usize,
    /// Targets skipped after a submission or polling failure.
    pub targets_failed: usize,
    pub measurements_staged: usize,
    pub results_staged: usize,
    pub probes_created: usize,
}

/// Execute one measurement cycle against `today`'s staging partition.
pub async fn run_cycle(
    client: &MeasurementClient,
    store: &StateStore,
    config: &CycleConfig,
    today: NaiveDate,
) -> IngestResult<CycleReport> {
    let mut registry = ProbeRegistry::load(store)?;
    let mut report = CycleReport::default();

    let mut jobs = Vec::new();
    for target in &config.targets {
        match client
            .submit(target, &config.selector, config.packets)
            .await
        {
            Ok(job_id) => jobs.push((target.clone(), job_id)),
            Err(e) => {
                warn!(%target, error = %e, "submission failed, target skipped");
                report.targets_failed += 1;
            }
        }
    }

    let mut normalized = Vec::new();
    for (target, job_id) in jobs {
        let raw = match client.wait_terminal(&job_id, &config.poll).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%target, %job_id, error = %e, "measurement lost, target skipped");
                report.targets_failed += 1;
                continue;
            }
        };
        match normalize(&raw, &mut registry)? {
            Some((measurement, results)) => {
                report.targets_measured += 1;
                normalized.push((measurement, results));
            }
            None => {
                debug!(%target, %job_id, "no usable sub-results this cycle");
            }
        }
    }

    // Probes land before the rows that reference them.
    report.probes_created = registry.flush(store)?;

    let writer = StagingWriter::new(store.clone());
    for (measurement, results) in &normalized {
        writer.append(today, measurement, results)?;
        report.measurements_staged += 1;
        report.results_staged += results.len();
    }

    info!(
        date = %today,
        measured = report.targets_measured,
        failed = report.targets_failed,
        probes_created = report.probes_created,
        results = report.results_staged,
        "measurement cycle complete"
    );
    Ok(report)
}
