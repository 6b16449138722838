//! Report publication.
//!
//! Rendering lives outside the engine; this module only defines the
//! sink interface that receives computed aggregates and the driver that
//! feeds it one target at a time. A target with no data in the horizon
//! is skipped rather than failing the run; the remaining targets still
//! publish.

use chrono::{DateTime, NaiveDate, Utc};
use pingfold_state::{MeasurementAggregate, ResultAggregate, StateStore};
use tracing::info;

use crate::aggregate::aggregate_horizon;
use crate::error::{RollupError, RollupResult};
use crate::horizon::Horizon;

/// Receives computed aggregates for one target and horizon.
pub trait ReportSink {
    fn publish(
        &mut self,
        target: &str,
        horizon: Horizon,
        measurement: &MeasurementAggregate,
        results: &[ResultAggregate],
    ) -> RollupResult<()>;
}

/// Outcome of one report run.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReportRunSummary {
    pub published: usize,
    /// Targets with no data in the horizon.
    pub skipped: usize,
}

/// Aggregate every target over `horizon` and hand the records to the
/// sink. `NoData` skips the target; any other error aborts the run.
pub fn render_reports(
    store: &StateStore,
    sink: &mut dyn ReportSink,
    targets: &[String],
    horizon: Horizon,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> RollupResult<ReportRunSummary> {
    let mut summary = ReportRunSummary::default();
    for target in targets {
        match aggregate_horizon(store, target, horizon, today, now) {
            Ok((measurement, results)) => {
                sink.publish(target, horizon, &measurement, &results)?;
                summary.published += 1;
            }
            Err(RollupError::NoData { label, .. }) => {
                info!(%target, %label, "no data in horizon, target skipped");
                summary.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(summary)
}

/// Sink that records every publish call. Used as a test double and by
/// drivers that only need the records in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub published: Vec<PublishedReport>,
}

/// One captured publish call.
#[derive(Debug)]
pub struct PublishedReport {
    pub target: String,
    pub horizon: Horizon,
    pub measurement: MeasurementAggregate,
    pub results: Vec<ResultAggregate>,
}

impl ReportSink for RecordingSink {
    fn publish(
        &mut self,
        target: &str,
        horizon: Horizon,
        measurement: &MeasurementAggregate,
        results: &[ResultAggregate],
    ) -> RollupResult<()> {
        self.published.push(PublishedReport {
            target: target.to_string(),
            horizon,
            measurement: measurement.clone(),
            results: results.to_vec(),
        });
        Ok(())
    }
}
