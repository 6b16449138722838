//! Horizon aggregation.
//!
//! Two folding modes share one output shape:
//!
//! - **Daily** folds the raw measurement and result rows of one staging
//!   partition.
//! - **Weekly/monthly/yearly** fold the already-promoted daily
//!   aggregates of their member days, read from the canonical store:
//!   counts and totals sum, minima take the min, maxima take the max,
//!   and the derived averages and loss rate are recomputed from the
//!   merged totals. Raw rows are never reread once their day closed.
//!
//! An empty selection surfaces as [`RollupError::NoData`]; a per-probe
//! division guard (zero packets sent or received over the whole
//! horizon) skips that probe's record rather than producing infinity.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use tracing::warn;

use pingfold_state::{
    Measurement, MeasurementAggregate, ProbeId, ResultAggregate, ResultRecord, StateStore,
};

use crate::error::{RollupError, RollupResult};
use crate::horizon::Horizon;

/// Days a promoted aggregate is retained before pruning may remove it.
pub const RETENTION_DAYS: i64 = 370;

/// Expiry stamp for aggregates produced at `now`.
pub(crate) fn expiry(now: DateTime<Utc>) -> i64 {
    (now + TimeDelta::days(RETENTION_DAYS)).timestamp()
}

/// Fold one staging partition into a daily aggregate for `target`.
pub fn aggregate_daily(
    store: &StateStore,
    target: &str,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> RollupResult<(MeasurementAggregate, Vec<ResultAggregate>)> {
    let label = date.to_string();
    let measurements: Vec<Measurement> = store
        .staging_measurements(date)?
        .into_iter()
        .filter(|m| m.target == target)
        .collect();

    let Some((first, rest)) = measurements.split_first() else {
        return Err(RollupError::NoData {
            target: target.to_string(),
            label,
        });
    };

    let mut fold = MeasurementFold::from_measurement(first);
    for m in rest {
        fold.add_measurement(m);
    }
    let measurement_aggregate = fold.finish(target, &label, expiry(now));

    // A result belongs to the selection iff its measurement does; rows
    // for other targets in the same partition fall out here.
    let selected: HashSet<&str> = measurements.iter().map(|m| m.id.as_str()).collect();
    let mut groups: BTreeMap<ProbeId, ResultFold> = BTreeMap::new();
    for record in store.staging_results(date)? {
        if !selected.contains(record.measurement_id.as_str()) {
            continue;
        }
        groups
            .entry(record.probe_id)
            .and_modify(|fold| fold.add_record(&record))
            .or_insert_with(|| ResultFold::from_record(&record));
    }

    let result_aggregates = finish_groups(groups, target, &label, expiry(now));
    Ok((measurement_aggregate, result_aggregates))
}

/// Aggregate `target` over a horizon ending before `today`.
///
/// The daily horizon folds its staging partition; all coarser horizons
/// read only the canonical store. Member days with no promoted record
/// contribute nothing; zero member records is `NoData`.
pub fn aggregate_horizon(
    store: &StateStore,
    target: &str,
    horizon: Horizon,
    today: NaiveDate,
    now: DateTime<Utc>,
) -> RollupResult<(MeasurementAggregate, Vec<ResultAggregate>)> {
    if horizon == Horizon::Daily {
        let day = horizon.member_days(today)[0];
        return aggregate_daily(store, target, day, now);
    }

    let label = horizon.label(today);
    let member_labels = horizon.member_labels(today);

    let dailies = store.measurement_aggregates_for(target, &member_labels)?;
    let Some((first, rest)) = dailies.split_first() else {
        return Err(RollupError::NoData {
            target: target.to_string(),
            label,
        });
    };

    let mut fold = MeasurementFold::from_daily(first);
    for daily in rest {
        fold.add_daily(daily);
    }
    let measurement_aggregate = fold.finish(target, &label, expiry(now));

    let mut groups: BTreeMap<ProbeId, ResultFold> = BTreeMap::new();
    for daily in store.result_aggregates_for(target, &member_labels)? {
        groups
            .entry(daily.probe_id)
            .and_modify(|fold| fold.add_daily(&daily))
            .or_insert_with(|| ResultFold::from_daily(&daily));
    }

    let result_aggregates = finish_groups(groups, target, &label, expiry(now));
    Ok((measurement_aggregate, result_aggregates))
}

fn finish_groups(
    groups: BTreeMap<ProbeId, ResultFold>,
    target: &str,
    label: &str,
    expires_at: i64,
) -> Vec<ResultAggregate> {
    groups
        .into_iter()
        .filter_map(|(probe_id, fold)| fold.finish(target, label, probe_id, expires_at))
        .collect()
}

// ── Folding state ─────────────────────────────────────────────────

/// Running measurement statistics for one target over one horizon.
struct MeasurementFold {
    count: u64,
    duration_min: f64,
    duration_max: f64,
    duration_total: f64,
    probes_min: u64,
    probes_max: u64,
    probes_total: u64,
}

impl MeasurementFold {
    fn from_measurement(m: &Measurement) -> Self {
        // The probe list length counts a duplicated probe twice, as
        // upstream reported it.
        let probes = m.probes.len() as u64;
        Self {
            count: 1,
            duration_min: m.duration,
            duration_max: m.duration,
            duration_total: m.duration,
            probes_min: probes,
            probes_max: probes,
            probes_total: probes,
        }
    }

    fn add_measurement(&mut self, m: &Measurement) {
        let probes = m.probes.len() as u64;
        self.count += 1;
        self.duration_min = self.duration_min.min(m.duration);
        self.duration_max = self.duration_max.max(m.duration);
        self.duration_total += m.duration;
        self.probes_min = self.probes_min.min(probes);
        self.probes_max = self.probes_max.max(probes);
        self.probes_total += probes;
    }

    fn from_daily(a: &MeasurementAggregate) -> Self {
        Self {
            count: a.count,
            duration_min: a.duration_min,
            duration_max: a.duration_max,
            duration_total: a.duration_total,
            probes_min: a.probes_min,
            probes_max: a.probes_max,
            probes_total: a.probes_total,
        }
    }

    fn add_daily(&mut self, a: &MeasurementAggregate) {
        self.count += a.count;
        self.duration_min = self.duration_min.min(a.duration_min);
        self.duration_max = self.duration_max.max(a.duration_max);
        self.duration_total += a.duration_total;
        self.probes_min = self.probes_min.min(a.probes_min);
        self.probes_max = self.probes_max.max(a.probes_max);
        self.probes_total += a.probes_total;
    }

    fn finish(self, target: &str, label: &str, expires_at: i64) -> MeasurementAggregate {
        MeasurementAggregate {
            target: target.to_string(),
            label: label.to_string(),
            count: self.count,
            duration_min: self.duration_min,
            duration_max: self.duration_max,
            duration_total: self.duration_total,
            avg_duration: self.duration_total / self.count as f64,
            probes_min: self.probes_min,
            probes_max: self.probes_max,
            probes_total: self.probes_total,
            avg_probes: round_ratio(self.probes_total, self.count),
            expires_at,
        }
    }
}

/// Running per-probe result statistics over one horizon.
struct ResultFold {
    count: u64,
    timing_min: f64,
    timing_max: f64,
    timing_total: f64,
    packets_total_min: u64,
    packets_total_max: u64,
    packets_total_total: u64,
    packets_rcv_min: u64,
    packets_rcv_max: u64,
    packets_rcv_total: u64,
}

impl ResultFold {
    fn from_record(r: &ResultRecord) -> Self {
        Self {
            count: 1,
            timing_min: r.timing_min,
            timing_max: r.timing_max,
            timing_total: r.timing_total,
            packets_total_min: r.packets_total,
            packets_total_max: r.packets_total,
            packets_total_total: r.packets_total,
            packets_rcv_min: r.packets_rcv,
            packets_rcv_max: r.packets_rcv,
            packets_rcv_total: r.packets_rcv,
        }
    }

    fn add_record(&mut self, r: &ResultRecord) {
        self.count += 1;
        self.timing_min = self.timing_min.min(r.timing_min);
        self.timing_max = self.timing_max.max(r.timing_max);
        self.timing_total += r.timing_total;
        self.packets_total_min = self.packets_total_min.min(r.packets_total);
        self.packets_total_max = self.packets_total_max.max(r.packets_total);
        self.packets_total_total += r.packets_total;
        self.packets_rcv_min = self.packets_rcv_min.min(r.packets_rcv);
        self.packets_rcv_max = self.packets_rcv_max.max(r.packets_rcv);
        self.packets_rcv_total += r.packets_rcv;
    }

    fn from_daily(a: &ResultAggregate) -> Self {
        Self {
            count: a.count,
            timing_min: a.timing_min,
            timing_max: a.timing_max,
            timing_total: a.timing_total,
            packets_total_min: a.packets_total_min,
            packets_total_max: a.packets_total_max,
            packets_total_total: a.packets_total_total,
            packets_rcv_min: a.packets_rcv_min,
            packets_rcv_max: a.packets_rcv_max,
            packets_rcv_total: a.packets_rcv_total,
        }
    }

    fn add_daily(&mut self, a: &ResultAggregate) {
        self.count += a.count;
        self.timing_min = self.timing_min.min(a.timing_min);
        self.timing_max = self.timing_max.max(a.timing_max);
        self.timing_total += a.timing_total;
        self.packets_total_min = self.packets_total_min.min(a.packets_total_min);
        self.packets_total_max = self.packets_total_max.max(a.packets_total_max);
        self.packets_total_total += a.packets_total_total;
        self.packets_rcv_min = self.packets_rcv_min.min(a.packets_rcv_min);
        self.packets_rcv_max = self.packets_rcv_max.max(a.packets_rcv_max);
        self.packets_rcv_total += a.packets_rcv_total;
    }

    fn finish(
        self,
        target: &str,
        label: &str,
        probe_id: ProbeId,
        expires_at: i64,
    ) -> Option<ResultAggregate> {
        if self.packets_total_total == 0 {
            warn!(%target, probe_id, %label, "zero packets sent over horizon, probe skipped");
            return None;
        }
        if self.packets_rcv_total == 0 {
            warn!(%target, probe_id, %label, "zero packets received over horizon, probe skipped");
            return None;
        }
        let sent = self.packets_total_total;
        let rcv = self.packets_rcv_total;
        Some(ResultAggregate {
            target: target.to_string(),
            label: label.to_string(),
            probe_id,
            count: self.count,
            timing_min: self.timing_min,
            timing_max: self.timing_max,
            timing_total: self.timing_total,
            avg_timing: self.timing_total / rcv as f64,
            packets_total_min: self.packets_total_min,
            packets_total_max: self.packets_total_max,
            packets_total_total: sent,
            avg_packets_total: round_ratio(sent, self.count),
            packets_rcv_min: self.packets_rcv_min,
            packets_rcv_max: self.packets_rcv_max,
            packets_rcv_total: rcv,
            avg_packets_rcv: round_ratio(rcv, self.count),
            loss_rate: round3(100.0 * (sent - rcv) as f64 / sent as f64),
            expires_at,
        })
    }
}

fn round_ratio(total: u64, count: u64) -> u64 {
    (total as f64 / count as f64).round() as u64
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
