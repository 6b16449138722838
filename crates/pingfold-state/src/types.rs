//! Domain types for the pingfold state store.
//!
//! These types represent the persisted shape of probes, staged
//! measurements and per-probe results, and the promoted statistical
//! aggregates. All types are serializable to/from JSON for storage in
//! redb tables; each knows its own table key so inserts are idempotent
//! for a fixed key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity assigned to a probe by the registry. Dense from 1, never reused.
pub type ProbeId = u64;

// ── Probe ─────────────────────────────────────────────────────────

/// A vantage point that executes measurements on behalf of the upstream
/// source. Immutable once created; only new probes are ever appended.
///
/// The upstream source never furnishes stable probe identities, so two
/// observations are the same probe iff the six descriptive fields
/// (country, city, asn, network, latitude, longitude) match exactly.
/// Region is informational and excluded from matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Probe {
    pub id: ProbeId,
    pub region: String,
    pub country: String,
    pub city: String,
    pub asn: u32,
    pub network: String,
    pub latitude: f64,
    pub longitude: f64,
}

// ── Measurement ───────────────────────────────────────────────────

/// One query of one target executed across many probes at one point in
/// time. Immutable once ingested.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Measurement {
    /// Opaque identity issued by the upstream source.
    pub id: String,
    pub target: String,
    pub created_at: DateTime<Utc>,
    /// Completion minus creation, fractional seconds.
    pub duration: f64,
    /// Resolved probe ids in upstream order, one per retained
    /// sub-result. Duplicates are kept as reported.
    pub probes: Vec<ProbeId>,
}

// ── Result ────────────────────────────────────────────────────────

/// Per-probe outcome of one measurement. The composite id
/// `{measurement_id}-{probe_id}` is the natural key preventing
/// duplicate ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultRecord {
    pub measurement_id: String,
    pub probe_id: ProbeId,
    pub target: String,
    pub resolved_address: String,
    /// Round-trip-time stats in milliseconds. Min/max come straight from
    /// the upstream report; the total is the sum of individual samples.
    pub timing_min: f64,
    pub timing_max: f64,
    pub timing_total: f64,
    /// Packets sent.
    pub packets_total: u64,
    /// Packets received.
    pub packets_rcv: u64,
}

impl ResultRecord {
    /// Build the natural key for the results table.
    pub fn table_key(&self) -> String {
        format!("{}-{}", self.measurement_id, self.probe_id)
    }
}

// ── Aggregates ────────────────────────────────────────────────────

/// Per-target statistical summary over one horizon. Append-only once
/// the horizon closes; never recomputed in place.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasurementAggregate {
    pub target: String,
    /// Horizon label: a date for dailies, a coarser label otherwise.
    pub label: String,
    /// Number of measurements in the horizon.
    pub count: u64,
    pub duration_min: f64,
    pub duration_max: f64,
    pub duration_total: f64,
    pub avg_duration: f64,
    /// Responding-probe counts per measurement (list length, so a probe
    /// reported twice counts twice).
    pub probes_min: u64,
    pub probes_max: u64,
    pub probes_total: u64,
    pub avg_probes: u64,
    /// Unix timestamp (seconds) after which retention pruning may
    /// remove this record.
    pub expires_at: i64,
}

impl MeasurementAggregate {
    /// Build the composite key for the measurement aggregates table.
    pub fn table_key(&self) -> String {
        format!("{}-{}", self.target, self.label)
    }
}

/// Per-target-per-probe statistical summary over one horizon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultAggregate {
    pub target: String,
    pub label: String,
    pub probe_id: ProbeId,
    /// Number of results this probe contributed in the horizon.
    pub count: u64,
    pub timing_min: f64,
    pub timing_max: f64,
    pub timing_total: f64,
    /// Total timing divided by total received packets.
    pub avg_timing: f64,
    pub packets_total_min: u64,
    pub packets_total_max: u64,
    pub packets_total_total: u64,
    pub avg_packets_total: u64,
    pub packets_rcv_min: u64,
    pub packets_rcv_max: u64,
    pub packets_rcv_total: u64,
    pub avg_packets_rcv: u64,
    /// `100 × (sent − received) / sent`, rounded to 3 decimal places.
    pub loss_rate: f64,
    pub expires_at: i64,
}

impl ResultAggregate {
    /// Build the composite key for the result aggregates table.
    pub fn table_key(&self) -> String {
        format!("{}-{}-{}", self.target, self.label, self.probe_id)
    }
}
