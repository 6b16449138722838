//! Wire types for the measurement API.
//!
//! The upstream source issues ping jobs against a target and fans them
//! out to a set of probes it selects. Timestamps arrive as ISO-8601 UTC
//! strings with millisecond fraction and `Z` suffix; they are kept as
//! strings here and parsed at ingestion, where a malformed value has a
//! meaningful error to land in.

use serde::{Deserialize, Serialize};

/// Upstream status of a measurement that is still being executed.
pub const STATUS_IN_PROGRESS: &str = "in-progress";

/// Upstream status of a successfully completed measurement or sub-result.
pub const STATUS_FINISHED: &str = "finished";

/// Probe selection passed when submitting a job.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeSelector {
    /// Upstream "magic" location expression, e.g. `world`.
    pub magic: String,
    /// Maximum number of probes to fan out to.
    pub limit: u32,
}

/// One measurement response: one target, many per-probe sub-results.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMeasurement {
    pub id: String,
    pub status: String,
    pub target: String,
    /// ISO-8601 UTC with millisecond fraction, e.g. `2024-01-01T00:00:00.000Z`.
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub results: Vec<RawSubResult>,
}

impl RawMeasurement {
    /// Whether the job has left the in-progress state. Terminal states
    /// include finished, failed, and timed-out.
    pub fn is_terminal(&self) -> bool {
        self.status != STATUS_IN_PROGRESS
    }
}

/// Per-probe sub-result of a measurement.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSubResult {
    pub probe: ProbeLocation,
    pub result: SubResultPayload,
}

impl RawSubResult {
    /// A sub-result is usable iff the probe finished and reported at
    /// least one timing sample. An in-progress or timed-out probe
    /// yields an empty timing list and must not be fabricated into a
    /// zero-result.
    pub fn is_usable(&self) -> bool {
        self.result.status == STATUS_FINISHED && !self.result.timings.is_empty()
    }
}

/// Location descriptor of the probe that executed a sub-result. The
/// upstream source never assigns stable probe ids; identity is resolved
/// from these fields by the registry.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeLocation {
    #[serde(default)]
    pub region: String,
    pub country: String,
    pub city: String,
    pub asn: u32,
    pub network: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Outcome payload of one probe's ping run.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubResultPayload {
    pub status: String,
    #[serde(default)]
    pub resolved_address: String,
    #[serde(default)]
    pub timings: Vec<Timing>,
    #[serde(default)]
    pub stats: PacketStats,
}

/// One round-trip-time sample in milliseconds.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Timing {
    pub rtt: f64,
}

/// Upstream-reported packet statistics for one sub-result.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PacketStats {
    /// Minimum round-trip-time, milliseconds.
    pub min: f64,
    /// Maximum round-trip-time, milliseconds.
    pub max: f64,
    /// Packets sent.
    pub total: u64,
    /// Packets received.
    pub rcv: u64,
}
