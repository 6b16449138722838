//! redb table definitions for the pingfold state store.
//!
//! Canonical tables use `&str` keys and `&[u8]` values (JSON-serialized
//! domain types); probes use ordered `u64` keys so the highest assigned
//! identity is the last entry. Staging tables are created per UTC day and
//! dropped after promotion, so their definitions are built at runtime from
//! the partition date.

use chrono::NaiveDate;
use redb::TableDefinition;

/// Probe catalog keyed by probe id. Append-only.
pub const PROBES: TableDefinition<u64, &[u8]> = TableDefinition::new("probes");

/// Promoted daily measurement aggregates keyed by `{target}-{date}`.
pub const MEASUREMENT_AGGREGATES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("measurement_aggregates");

/// Promoted daily result aggregates keyed by `{target}-{date}-{probe_id}`.
pub const RESULT_AGGREGATES: TableDefinition<&str, &[u8]> =
    TableDefinition::new("result_aggregates");

/// Name prefix shared by all staging partition tables.
pub const STAGING_PREFIX: &str = "staging/";

/// Table name for a partition's measurements, e.g. `staging/2024-01-01/measurements`.
pub fn staging_measurements_name(date: NaiveDate) -> String {
    format!("{STAGING_PREFIX}{date}/measurements")
}

/// Table name for a partition's results, e.g. `staging/2024-01-01/results`.
pub fn staging_results_name(date: NaiveDate) -> String {
    format!("{STAGING_PREFIX}{date}/results")
}

/// Extract the partition date from a staging table name.
pub fn partition_date(table_name: &str) -> Option<NaiveDate> {
    let rest = table_name.strip_prefix(STAGING_PREFIX)?;
    let (date, _) = rest.split_once('/')?;
    date.parse().ok()
}
