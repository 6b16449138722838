//! Partition lifecycle — promotion into the canonical store, then drop.
//!
//! A staging partition is the only copy of its raw rows, so the drop is
//! gated on promotion having fully succeeded: any promotion error
//! leaves the partition intact for the operator.

use chrono::{DateTime, NaiveDate, Utc};
use pingfold_state::StateStore;
use tracing::info;

use crate::aggregate::aggregate_daily;
use crate::error::RollupResult;

/// What a promotion run wrote.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct PromotionReport {
    /// Targets found in the partition.
    pub targets: usize,
    pub measurement_aggregates: usize,
    pub result_aggregates: usize,
}

/// Fold `date`'s partition per target and append the daily aggregates
/// to the canonical collections. An empty or absent partition promotes
/// nothing and reports zeros.
pub fn promote(
    store: &StateStore,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> RollupResult<PromotionReport> {
    let mut targets: Vec<String> = store
        .staging_measurements(date)?
        .iter()
        .map(|m| m.target.clone())
        .collect();
    targets.sort();
    targets.dedup();

    let mut measurement_aggregates = Vec::new();
    let mut result_aggregates = Vec::new();
    for target in &targets {
        // Cannot be NoData: every target came from the partition itself.
        let (measurement, results) = aggregate_daily(store, target, date, now)?;
        measurement_aggregates.push(measurement);
        result_aggregates.extend(results);
    }

    store.insert_measurement_aggregates(&measurement_aggregates)?;
    store.insert_result_aggregates(&result_aggregates)?;

    let report = PromotionReport {
        targets: targets.len(),
        measurement_aggregates: measurement_aggregates.len(),
        result_aggregates: result_aggregates.len(),
    };
    info!(
        %date,
        targets = report.targets,
        measurement_aggregates = report.measurement_aggregates,
        result_aggregates = report.result_aggregates,
        "partition promoted"
    );
    Ok(report)
}

/// Promote `date`'s partition, then drop it. The `?` ordering is the
/// lifecycle invariant: drop never runs after a failed promote.
pub fn promote_and_drop(
    store: &StateStore,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> RollupResult<PromotionReport> {
    let report = promote(store, date, now)?;
    let existed = store.drop_partition(date)?;
    info!(%date, existed, "partition dropped after promotion");
    Ok(report)
}

/// Remove canonical aggregates whose retention expiry has passed.
pub fn prune_expired(store: &StateStore, now: DateTime<Utc>) -> RollupResult<u64> {
    let removed = store.prune_expired(now.timestamp())?;
    info!(removed, "retention prune complete");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pingfold_state::{Measurement, ResultRecord};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap()
    }

    fn seed(store: &StateStore, day: NaiveDate) {
        let measurement = Measurement {
            id: "m1".to_string(),
            target: "example.com".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap(),
            duration: 5.0,
            probes: vec![1],
        };
        let record = ResultRecord {
            measurement_id: "m1".to_string(),
            probe_id: 1,
            target: "example.com".to_string(),
            resolved_address: "93.184.216.34".to_string(),
            timing_min: 10.0,
            timing_max: 20.0,
            timing_total: 30.0,
            packets_total: 2,
            packets_rcv: 2,
        };
        store
            .append_staging(day, &[measurement], &[record])
            .unwrap();
    }

    #[test]
    fn promote_writes_canonical_records() {
        let store = StateStore::open_in_memory().unwrap();
        let day = date("2024-03-14");
        seed(&store, day);

        let report = promote(&store, day, now()).unwrap();
        assert_eq!(
            report,
            PromotionReport {
                targets: 1,
                measurement_aggregates: 1,
                result_aggregates: 1,
            }
        );

        let stored = store
            .measurement_aggregate("example.com-2024-03-14")
            .unwrap()
            .unwrap();
        assert_eq!(stored.count, 1);
        let expected_expiry =
            (now() + chrono::TimeDelta::days(crate::aggregate::RETENTION_DAYS)).timestamp();
        assert_eq!(stored.expires_at, expected_expiry);

        let results = store
            .result_aggregates_for("example.com", &["2024-03-14".to_string()])
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].table_key(), "example.com-2024-03-14-1");
    }

    #[test]
    fn promote_keeps_the_partition() {
        let store = StateStore::open_in_memory().unwrap();
        let day = date("2024-03-14");
        seed(&store, day);

        promote(&store, day, now()).unwrap();
        // Promotion alone never destroys the raw rows.
        assert_eq!(store.staging_measurements(day).unwrap().len(), 1);
    }

    #[test]
    fn promote_and_drop_removes_the_partition() {
        let store = StateStore::open_in_memory().unwrap();
        let day = date("2024-03-14");
        seed(&store, day);

        promote_and_drop(&store, day, now()).unwrap();
        assert!(store.staging_measurements(day).unwrap().is_empty());
        assert!(store.staging_dates().unwrap().is_empty());
        // The canonical record survives the drop.
        assert!(store
            .measurement_aggregate("example.com-2024-03-14")
            .unwrap()
            .is_some());
    }

    #[test]
    fn promote_empty_partition_reports_zeros() {
        let store = StateStore::open_in_memory().unwrap();
        let report = promote_and_drop(&store, date("2024-03-14"), now()).unwrap();
        assert_eq!(report, PromotionReport::default());
    }

    #[test]
    fn prune_drops_expired_promotions() {
        let store = StateStore::open_in_memory().unwrap();
        let day = date("2024-03-14");
        seed(&store, day);
        promote(&store, day, now()).unwrap();

        // Nothing expires yet.
        assert_eq!(prune_expired(&store, now()).unwrap(), 0);

        // Just past the retention window, everything from that day goes.
        let later = now() + chrono::TimeDelta::days(crate::aggregate::RETENTION_DAYS + 1);
        assert_eq!(prune_expired(&store, later).unwrap(), 2);
        assert!(store
            .measurement_aggregate("example.com-2024-03-14")
            .unwrap()
            .is_none());
    }
}
