//! StateStore — redb-backed persistence for pingfold.
//!
//! Provides typed operations over the probe catalog, the per-day staging
//! partitions, and the canonical aggregate collections. All values are
//! JSON-serialized into redb's `&[u8]` value columns. The store supports
//! both on-disk and in-memory backends (the latter for testing).
//!
//! Mutation discipline: probe and staging writes are append-only (inserts
//! for a fixed key are idempotent), and `drop_partition` is the sole
//! deletion operation apart from retention pruning.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition, TableHandle};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create the canonical tables if they don't exist yet. Staging
    /// tables are created lazily, on the first append for their date.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(PROBES).map_err(map_err!(Table))?;
        txn.open_table(MEASUREMENT_AGGREGATES).map_err(map_err!(Table))?;
        txn.open_table(RESULT_AGGREGATES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Probes ─────────────────────────────────────────────────────

    /// Append a batch of newly registered probes in one transaction.
    pub fn insert_probes(&self, probes: &[Probe]) -> StateResult<()> {
        if probes.is_empty() {
            return Ok(());
        }
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(PROBES).map_err(map_err!(Table))?;
            for probe in probes {
                let value = serde_json::to_vec(probe).map_err(map_err!(Serialize))?;
                table
                    .insert(probe.id, value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count = probes.len(), "probes stored");
        Ok(())
    }

    /// List the full probe catalog, ordered by id.
    pub fn list_probes(&self) -> StateResult<Vec<Probe>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROBES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let probe: Probe =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(probe);
        }
        Ok(results)
    }

    /// Highest assigned probe id, if any probes exist.
    pub fn max_probe_id(&self) -> StateResult<Option<ProbeId>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(PROBES).map_err(map_err!(Table))?;
        let last = table.last().map_err(map_err!(Read))?;
        Ok(last.map(|(key, _)| key.value()))
    }

    // ── Staging partitions ─────────────────────────────────────────

    /// Append normalized records into the partition for `date`, creating
    /// its tables on first write. Records accumulate across calls; the
    /// result natural key is the only dedup.
    pub fn append_staging(
        &self,
        date: NaiveDate,
        measurements: &[Measurement],
        results: &[ResultRecord],
    ) -> StateResult<()> {
        let m_name = staging_measurements_name(date);
        let r_name = staging_results_name(date);
        let m_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&m_name);
        let r_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&r_name);

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut m_table = txn.open_table(m_def).map_err(map_err!(Table))?;
            for m in measurements {
                let value = serde_json::to_vec(m).map_err(map_err!(Serialize))?;
                m_table
                    .insert(m.id.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
            let mut r_table = txn.open_table(r_def).map_err(map_err!(Table))?;
            for r in results {
                let key = r.table_key();
                let value = serde_json::to_vec(r).map_err(map_err!(Serialize))?;
                r_table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(
            %date,
            measurements = measurements.len(),
            results = results.len(),
            "staging partition appended"
        );
        Ok(())
    }

    /// All measurements staged for `date`. An absent partition reads as
    /// empty rather than erroring.
    pub fn staging_measurements(&self, date: NaiveDate) -> StateResult<Vec<Measurement>> {
        let name = staging_measurements_name(date);
        self.read_all(&name)
    }

    /// All results staged for `date`. An absent partition reads as empty.
    pub fn staging_results(&self, date: NaiveDate) -> StateResult<Vec<ResultRecord>> {
        let name = staging_results_name(date);
        self.read_all(&name)
    }

    /// Dates that currently have a staging partition, ascending.
    pub fn staging_dates(&self) -> StateResult<Vec<NaiveDate>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let mut dates: Vec<NaiveDate> = txn
            .list_tables()
            .map_err(map_err!(Read))?
            .filter_map(|handle| partition_date(handle.name()))
            .collect();
        dates.sort();
        dates.dedup();
        Ok(dates)
    }

    /// Delete the staging partition for `date`. Returns true if it existed.
    pub fn drop_partition(&self, date: NaiveDate) -> StateResult<bool> {
        let m_name = staging_measurements_name(date);
        let r_name = staging_results_name(date);
        let m_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&m_name);
        let r_def: TableDefinition<&str, &[u8]> = TableDefinition::new(&r_name);

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let dropped_m = txn.delete_table(m_def).map_err(map_err!(Table))?;
        let dropped_r = txn.delete_table(r_def).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        let existed = dropped_m || dropped_r;
        debug!(%date, existed, "staging partition dropped");
        Ok(existed)
    }

    /// Read every document of a dynamically named table, tolerating a
    /// table that was never created.
    fn read_all<T: serde::de::DeserializeOwned>(&self, name: &str) -> StateResult<Vec<T>> {
        let def: TableDefinition<&str, &[u8]> = TableDefinition::new(name);
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = match txn.open_table(def) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(StateError::Table(e.to_string())),
        };
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let doc: T = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(doc);
        }
        Ok(results)
    }

    // ── Canonical aggregates ───────────────────────────────────────

    /// Append promoted measurement aggregates in one transaction.
    pub fn insert_measurement_aggregates(
        &self,
        aggregates: &[MeasurementAggregate],
    ) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn
                .open_table(MEASUREMENT_AGGREGATES)
                .map_err(map_err!(Table))?;
            for agg in aggregates {
                let key = agg.table_key();
                let value = serde_json::to_vec(agg).map_err(map_err!(Serialize))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Append promoted result aggregates in one transaction.
    pub fn insert_result_aggregates(&self, aggregates: &[ResultAggregate]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(RESULT_AGGREGATES).map_err(map_err!(Table))?;
            for agg in aggregates {
                let key = agg.table_key();
                let value = serde_json::to_vec(agg).map_err(map_err!(Serialize))?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get one measurement aggregate by its `{target}-{label}` key.
    pub fn measurement_aggregate(&self, key: &str) -> StateResult<Option<MeasurementAggregate>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn
            .open_table(MEASUREMENT_AGGREGATES)
            .map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let agg: MeasurementAggregate =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(agg))
            }
            None => Ok(None),
        }
    }

    /// Measurement aggregates for a target whose label is in `labels`.
    /// Labels with no promoted record are simply absent from the output.
    pub fn measurement_aggregates_for(
        &self,
        target: &str,
        labels: &[String],
    ) -> StateResult<Vec<MeasurementAggregate>> {
        let mut results = Vec::new();
        for label in labels {
            let key = format!("{target}-{label}");
            if let Some(agg) = self.measurement_aggregate(&key)? {
                results.push(agg);
            }
        }
        Ok(results)
    }

    /// Result aggregates for a target whose label is in `labels`
    /// (key prefix scan over `{target}-{label}-`).
    pub fn result_aggregates_for(
        &self,
        target: &str,
        labels: &[String],
    ) -> StateResult<Vec<ResultAggregate>> {
        let prefixes: Vec<String> = labels
            .iter()
            .map(|label| format!("{target}-{label}-"))
            .collect();
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(RESULT_AGGREGATES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if prefixes.iter().any(|p| key.value().starts_with(p.as_str())) {
                let agg: ResultAggregate =
                    serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
                results.push(agg);
            }
        }
        Ok(results)
    }

    /// Remove canonical aggregates whose expiry is at or before `now`
    /// (unix seconds). Returns the number of records removed.
    pub fn prune_expired(&self, now: i64) -> StateResult<u64> {
        // Collect expired keys in a read transaction first.
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let expired_m = collect_expired(
            &txn.open_table(MEASUREMENT_AGGREGATES).map_err(map_err!(Table))?,
            |agg: &MeasurementAggregate| agg.expires_at,
            now,
        )?;
        let expired_r = collect_expired(
            &txn.open_table(RESULT_AGGREGATES).map_err(map_err!(Table))?,
            |agg: &ResultAggregate| agg.expires_at,
            now,
        )?;
        drop(txn);

        // Delete in a write transaction.
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let count = (expired_m.len() + expired_r.len()) as u64;
        {
            let mut table = txn
                .open_table(MEASUREMENT_AGGREGATES)
                .map_err(map_err!(Table))?;
            for key in &expired_m {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
            let mut table = txn.open_table(RESULT_AGGREGATES).map_err(map_err!(Table))?;
            for key in &expired_r {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        if count > 0 {
            debug!(count, "expired aggregates pruned");
        }
        Ok(count)
    }
}

/// Scan a table for keys whose document expired at or before `now`.
fn collect_expired<T: serde::de::DeserializeOwned>(
    table: &impl ReadableTable<&'static str, &'static [u8]>,
    expires_at: impl Fn(&T) -> i64,
    now: i64,
) -> StateResult<Vec<String>> {
    let mut expired = Vec::new();
    for entry in table.iter().map_err(map_err!(Read))? {
        let (key, value) = entry.map_err(map_err!(Read))?;
        let doc: T = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
        if expires_at(&doc) <= now {
            expired.push(key.value().to_string());
        }
    }
    Ok(expired)
}
