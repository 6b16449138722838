//! Measurement normalization.
//!
//! Converts one terminal raw measurement into a [`Measurement`] plus one
//! [`ResultRecord`] per usable sub-result, resolving probe identities
//! through the registry along the way. Sub-results that did not finish
//! or carry no timing samples are a valid sparse outcome and are dropped
//! silently.

use chrono::{DateTime, Utc};
use pingfold_client::api::RawMeasurement;
use pingfold_state::{Measurement, ResultRecord};
use tracing::debug;

use crate::error::{IngestError, IngestResult};
use crate::registry::ProbeRegistry;

/// Normalize a terminal measurement payload.
///
/// Returns `Ok(None)` when every sub-result was filtered out; the
/// measurement is then not staged at all, matching the upstream
/// contract that an empty result set simply never happened.
pub fn normalize(
    raw: &RawMeasurement,
    registry: &mut ProbeRegistry,
) -> IngestResult<Option<(Measurement, Vec<ResultRecord>)>> {
    let created_at = parse_timestamp(&raw.created_at)?;
    let updated_at = parse_timestamp(&raw.updated_at)?;
    let duration = (updated_at - created_at).num_milliseconds() as f64 / 1000.0;

    let mut probes = Vec::new();
    let mut results = Vec::new();

    for sub in raw.results.iter().filter(|sub| sub.is_usable()) {
        let probe_id = registry.resolve(&sub.probe);
        // Ordered, not deduplicated: a probe the upstream reports twice
        // appears twice and counts twice in probe-count statistics.
        probes.push(probe_id);

        let timing_total: f64 = sub.result.timings.iter().map(|t| t.rtt).sum();
        results.push(ResultRecord {
            measurement_id: raw.id.clone(),
            probe_id,
            target: raw.target.clone(),
            resolved_address: sub.result.resolved_address.clone(),
            // Min/max straight from the upstream report; the total is
            // re-summed from samples to avoid rounding drift.
            timing_min: sub.result.stats.min,
            timing_max: sub.result.stats.max,
            timing_total,
            packets_total: sub.result.stats.total,
            packets_rcv: sub.result.stats.rcv,
        });
    }

    if results.is_empty() {
        debug!(id = %raw.id, target = %raw.target, "no usable sub-results, measurement dropped");
        return Ok(None);
    }

    let measurement = Measurement {
        id: raw.id.clone(),
        target: raw.target.clone(),
        created_at,
        duration,
        probes,
    };
    Ok(Some((measurement, results)))
}

fn parse_timestamp(value: &str) -> IngestResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| IngestError::Timestamp(format!("{value}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingfold_state::StateStore;

    fn raw(payload: serde_json::Value) -> RawMeasurement {
        serde_json::from_value(payload).unwrap()
    }

    fn scenario_payload() -> serde_json::Value {
        serde_json::json!({
            "id": "m-1",
            "status": "finished",
            "target": "example.com",
            "createdAt": "2024-01-01T00:00:00.000Z",
            "updatedAt": "2024-01-01T00:00:05.000Z",
            "results": [{
                "probe": {
                    "country": "US", "city": "NY", "asn": 1, "network": "A",
                    "latitude": 1.0, "longitude": 1.0
                },
                "result": {
                    "status": "finished",
                    "resolvedAddress": "1.2.3.4",
                    "timings": [{"rtt": 10.0}, {"rtt": 20.0}],
                    "stats": {"min": 10.0, "max": 20.0, "total": 2, "rcv": 2}
                }
            }]
        })
    }

    #[test]
    fn normalizes_single_probe_measurement() {
        let store = StateStore::open_in_memory().unwrap();
        let mut registry = ProbeRegistry::load(&store).unwrap();

        let (measurement, results) = normalize(&raw(scenario_payload()), &mut registry)
            .unwrap()
            .unwrap();

        assert_eq!(measurement.id, "m-1");
        assert_eq!(measurement.target, "example.com");
        assert_eq!(measurement.duration, 5.0);
        assert_eq!(measurement.probes, vec![1]);

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.table_key(), "m-1-1");
        assert_eq!(result.resolved_address, "1.2.3.4");
        assert_eq!(result.timing_min, 10.0);
        assert_eq!(result.timing_max, 20.0);
        assert_eq!(result.timing_total, 30.0);
        assert_eq!(result.packets_total, 2);
        assert_eq!(result.packets_rcv, 2);

        // Exactly one new probe was created.
        assert_eq!(registry.fresh().len(), 1);
        assert_eq!(registry.fresh()[0].id, 1);
    }

    #[test]
    fn unfinished_and_sampleless_sub_results_are_dropped() {
        let store = StateStore::open_in_memory().unwrap();
        let mut registry = ProbeRegistry::load(&store).unwrap();

        let mut payload = scenario_payload();
        payload["results"].as_array_mut().unwrap().extend([
            // Still in progress upstream.
            serde_json::json!({
                "probe": {"country": "DE", "city": "Berlin", "asn": 2, "network": "B",
                          "latitude": 2.0, "longitude": 2.0},
                "result": {"status": "in-progress"}
            }),
            // Finished but with an empty timing list (total loss); must
            // not be fabricated into a zero-result.
            serde_json::json!({
                "probe": {"country": "FR", "city": "Paris", "asn": 3, "network": "C",
                          "latitude": 3.0, "longitude": 3.0},
                "result": {"status": "finished", "timings": [],
                           "stats": {"min": 0.0, "max": 0.0, "total": 2, "rcv": 0}}
            }),
        ]);

        let (measurement, results) = normalize(&raw(payload), &mut registry).unwrap().unwrap();
        assert_eq!(measurement.probes, vec![1]);
        assert_eq!(results.len(), 1);
        // Filtered probes were never registered.
        assert_eq!(registry.fresh().len(), 1);
    }

    #[test]
    fn all_sub_results_filtered_yields_none() {
        let store = StateStore::open_in_memory().unwrap();
        let mut registry = ProbeRegistry::load(&store).unwrap();

        let mut payload = scenario_payload();
        payload["results"][0]["result"]["status"] = "timeout".into();

        assert!(normalize(&raw(payload), &mut registry).unwrap().is_none());
        assert!(registry.fresh().is_empty());
    }

    #[test]
    fn renormalizing_clean_payload_is_a_noop() {
        let store = StateStore::open_in_memory().unwrap();
        let mut registry = ProbeRegistry::load(&store).unwrap();
        let payload = raw(scenario_payload());

        let first = normalize(&payload, &mut registry).unwrap().unwrap();
        let second = normalize(&payload, &mut registry).unwrap().unwrap();
        assert_eq!(first, second);
        // Still only one probe.
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn duplicate_probe_report_counts_twice() {
        let store = StateStore::open_in_memory().unwrap();
        let mut registry = ProbeRegistry::load(&store).unwrap();

        let mut payload = scenario_payload();
        let dup = payload["results"][0].clone();
        payload["results"].as_array_mut().unwrap().push(dup);

        let (measurement, results) = normalize(&raw(payload), &mut registry).unwrap().unwrap();
        // The probe list keeps both entries; the natural key collapses
        // the duplicate result rows at the store layer.
        assert_eq!(measurement.probes, vec![1, 1]);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].table_key(), results[1].table_key());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn malformed_timestamp_is_an_error() {
        let store = StateStore::open_in_memory().unwrap();
        let mut registry = ProbeRegistry::load(&store).unwrap();

        let mut payload = scenario_payload();
        payload["createdAt"] = "yesterday".into();

        let err = normalize(&raw(payload), &mut registry).unwrap_err();
        assert!(matches!(err, IngestError::Timestamp(_)));
    }

    #[test]
    fn fractional_second_duration() {
        let store = StateStore::open_in_memory().unwrap();
        let mut registry = ProbeRegistry::load(&store).unwrap();

        let mut payload = scenario_payload();
        payload["updatedAt"] = "2024-01-01T00:00:03.250Z".into();

        let (measurement, _) = normalize(&raw(payload), &mut registry).unwrap().unwrap();
        assert_eq!(measurement.duration, 3.25);
    }
}
