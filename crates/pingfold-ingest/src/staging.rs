//! Staging writer — date-partitioned persistence of normalized records.
//!
//! Appends into the partition named by the passed UTC date. The
//! partition date is explicit state, not read from a wall clock, so a
//! cycle that straddles midnight stays in the day it was started for
//! and tests can pin any date they like.

use chrono::NaiveDate;
use pingfold_state::{Measurement, ResultRecord, StateStore};

use crate::error::IngestResult;

/// Writes normalized measurements and results into daily partitions.
#[derive(Clone)]
pub struct StagingWriter {
    store: StateStore,
}

impl StagingWriter {
    pub fn new(store: StateStore) -> Self {
        Self { store }
    }

    /// Append one measurement and its results into `date`'s partition.
    /// Safe to call any number of times within the same day; partition
    /// creation is implicit on first write.
    pub fn append(
        &self,
        date: NaiveDate,
        measurement: &Measurement,
        results: &[ResultRecord],
    ) -> IngestResult<()> {
        self.store
            .append_staging(date, std::slice::from_ref(measurement), results)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn measurement(id: &str) -> Measurement {
        Measurement {
            id: id.to_string(),
            target: "example.com".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            duration: 5.0,
            probes: vec![1],
        }
    }

    fn result(measurement_id: &str) -> ResultRecord {
        ResultRecord {
            measurement_id: measurement_id.to_string(),
            probe_id: 1,
            target: "example.com".to_string(),
            resolved_address: "1.2.3.4".to_string(),
            timing_min: 10.0,
            timing_max: 20.0,
            timing_total: 30.0,
            packets_total: 2,
            packets_rcv: 2,
        }
    }

    #[test]
    fn repeated_same_day_appends_accumulate() {
        let store = StateStore::open_in_memory().unwrap();
        let writer = StagingWriter::new(store.clone());
        let day: NaiveDate = "2024-01-01".parse().unwrap();

        writer.append(day, &measurement("m1"), &[result("m1")]).unwrap();
        writer.append(day, &measurement("m2"), &[result("m2")]).unwrap();

        assert_eq!(store.staging_measurements(day).unwrap().len(), 2);
        assert_eq!(store.staging_results(day).unwrap().len(), 2);
    }

    #[test]
    fn appends_land_in_their_own_partition() {
        let store = StateStore::open_in_memory().unwrap();
        let writer = StagingWriter::new(store.clone());

        writer
            .append("2024-01-01".parse().unwrap(), &measurement("m1"), &[])
            .unwrap();
        writer
            .append("2024-01-02".parse().unwrap(), &measurement("m2"), &[])
            .unwrap();

        let first = store
            .staging_measurements("2024-01-01".parse().unwrap())
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "m1");
    }
}
