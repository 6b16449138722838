//! End-to-end pipeline regression: raw payloads → normalized staging →
//! daily promotion → coarse rollup, with the staging partitions gone by
//! the time the weekly fold runs.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use pingfold_client::RawMeasurement;
use pingfold_ingest::{normalize, ProbeRegistry, StagingWriter};
use pingfold_rollup::{
    aggregate_daily, aggregate_horizon, promote_and_drop, render_reports, Horizon, RecordingSink,
};
use pingfold_state::StateStore;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 15, 6, 0, 0).unwrap()
}

/// A raw payload with one New York probe and one Berlin probe for the
/// target, as the upstream would report it on `day`.
fn raw_payload(id: &str, target: &str, day: &str) -> RawMeasurement {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "status": "finished",
        "target": target,
        "createdAt": format!("{day}T00:00:00.000Z"),
        "updatedAt": format!("{day}T00:00:04.000Z"),
        "results": [
            {
                "probe": {
                    "region": "Northern America",
                    "country": "US", "city": "NY", "asn": 64500,
                    "network": "ExampleNet", "latitude": 40.71, "longitude": -74.01
                },
                "result": {
                    "status": "finished",
                    "resolvedAddress": "93.184.216.34",
                    "timings": [{"rtt": 10.0}, {"rtt": 20.0}],
                    "stats": {"min": 10.0, "max": 20.0, "total": 2, "rcv": 2}
                }
            },
            {
                "probe": {
                    "region": "Western Europe",
                    "country": "DE", "city": "Berlin", "asn": 64501,
                    "network": "BeispielNetz", "latitude": 52.52, "longitude": 13.40
                },
                "result": {
                    "status": "finished",
                    "resolvedAddress": "93.184.216.34",
                    "timings": [{"rtt": 30.0}, {"rtt": 40.0}],
                    "stats": {"min": 30.0, "max": 40.0, "total": 4, "rcv": 2}
                }
            }
        ]
    }))
    .unwrap()
}

/// One ingestion cycle for `day`, the way the measure job runs it: load
/// the registry, normalize, flush new probes, stage the records.
fn ingest_day(store: &StateStore, day: &str, measurement_id: &str) {
    let date: NaiveDate = day.parse().unwrap();
    let mut registry = ProbeRegistry::load(store).unwrap();

    let raw = raw_payload(measurement_id, "example.com", day);
    let (measurement, results) = normalize(&raw, &mut registry).unwrap().unwrap();

    registry.flush(store).unwrap();
    StagingWriter::new(store.clone())
        .append(date, &measurement, &results)
        .unwrap();
}

#[test]
fn raw_payloads_to_weekly_rollup() {
    let store = StateStore::open_in_memory().unwrap();
    let days = ["2024-03-11", "2024-03-12", "2024-03-13"];

    for (i, day) in days.iter().enumerate() {
        ingest_day(&store, day, &format!("m{i}"));
    }

    // The same fingerprints resolved to the same two probes every day.
    let probes = store.list_probes().unwrap();
    assert_eq!(probes.len(), 2);
    assert_eq!(probes[0].city, "NY");
    assert_eq!(probes[1].city, "Berlin");

    // Capture each day's count before promotion closes the day.
    let mut daily_counts = Vec::new();
    for day in days {
        let date: NaiveDate = day.parse().unwrap();
        let (agg, _) = aggregate_daily(&store, "example.com", date, now()).unwrap();
        daily_counts.push(agg.count);
        promote_and_drop(&store, date, now()).unwrap();
    }

    // Every partition is gone; the canonical store is all that remains.
    assert!(store.staging_dates().unwrap().is_empty());

    let (weekly, weekly_results) = aggregate_horizon(
        &store,
        "example.com",
        Horizon::Weekly,
        "2024-03-15".parse().unwrap(),
        now(),
    )
    .unwrap();

    // Decomposition: the week's count is exactly the sum of its member
    // dailies' counts.
    assert_eq!(weekly.count, daily_counts.iter().sum::<u64>());
    assert_eq!(weekly.count, 3);
    assert_eq!(weekly.duration_min, 4.0);
    assert_eq!(weekly.duration_max, 4.0);
    assert_eq!(weekly.probes_total, 6);
    assert_eq!(weekly.avg_probes, 2);

    // Per-probe rollup: NY lost nothing, Berlin lost half.
    assert_eq!(weekly_results.len(), 2);
    let ny = &weekly_results[0];
    assert_eq!(ny.count, 3);
    assert_eq!(ny.loss_rate, 0.0);
    assert_eq!(ny.timing_total, 90.0);
    let berlin = &weekly_results[1];
    assert_eq!(berlin.count, 3);
    assert_eq!(berlin.loss_rate, 50.0);
    assert_eq!(berlin.avg_timing, 35.0); // 210 / 6
}

#[test]
fn report_run_covers_mixed_targets() {
    let store = StateStore::open_in_memory().unwrap();
    ingest_day(&store, "2024-03-14", "m1");
    promote_and_drop(&store, "2024-03-14".parse().unwrap(), now()).unwrap();

    let targets = vec!["example.com".to_string(), "never-measured.com".to_string()];
    let mut sink = RecordingSink::default();
    let summary = render_reports(
        &store,
        &mut sink,
        &targets,
        Horizon::Weekly,
        "2024-03-15".parse().unwrap(),
        now(),
    )
    .unwrap();

    assert_eq!(summary.published, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(sink.published[0].target, "example.com");
    assert_eq!(sink.published[0].measurement.label, "2024-03-08..2024-03-14");
}
