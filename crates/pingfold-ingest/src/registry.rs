//! Probe registry — stable identity for an upstream that has none.
//!
//! The upstream source describes each probe only by its location
//! fingerprint (country, city, asn, network, latitude, longitude). The
//! registry maps every fingerprint it has ever seen to a dense integer
//! id, assigned once and never reused. It is loaded from the store at
//! the start of an ingestion batch, accumulates newly observed probes
//! in memory, and flushes them to the store exactly once per batch, so
//! id allocation stays collision-free even before persistence.

use pingfold_client::api::ProbeLocation;
use pingfold_state::{Probe, ProbeId, StateStore};
use tracing::debug;

use crate::error::IngestResult;

/// In-memory view of the probe catalog for one ingestion batch.
#[derive(Debug)]
pub struct ProbeRegistry {
    known: Vec<Probe>,
    fresh: Vec<Probe>,
    next_id: ProbeId,
}

impl ProbeRegistry {
    /// Load the current catalog from the store.
    pub fn load(store: &StateStore) -> IngestResult<Self> {
        let known = store.list_probes()?;
        let next_id = store.max_probe_id()?.unwrap_or(0) + 1;
        Ok(Self {
            known,
            fresh: Vec::new(),
            next_id,
        })
    }

    /// Resolve a fingerprint to its probe id, creating a new probe on
    /// first observation. Matching is exact equality over the six
    /// descriptive fields; region is informational only.
    pub fn resolve(&mut self, location: &ProbeLocation) -> ProbeId {
        if let Some(probe) = self
            .known
            .iter()
            .chain(self.fresh.iter())
            .find(|p| fingerprint_matches(p, location))
        {
            return probe.id;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.fresh.push(Probe {
            id,
            region: location.region.clone(),
            country: location.country.clone(),
            city: location.city.clone(),
            asn: location.asn,
            network: location.network.clone(),
            latitude: location.latitude,
            longitude: location.longitude,
        });
        debug!(id, country = %location.country, city = %location.city, "new probe registered");
        id
    }

    /// Probes created by this batch that have not been persisted yet.
    pub fn fresh(&self) -> &[Probe] {
        &self.fresh
    }

    /// Persist the batch's new probes and fold them into the known set.
    /// Returns how many were written.
    pub fn flush(&mut self, store: &StateStore) -> IngestResult<usize> {
        let count = self.fresh.len();
        store.insert_probes(&self.fresh)?;
        self.known.append(&mut self.fresh);
        Ok(count)
    }

    /// Number of probes known to this registry, flushed or not.
    pub fn len(&self) -> usize {
        self.known.len() + self.fresh.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exact match over the six-field fingerprint. Latitude and longitude
/// are compared bit-for-bit as reported; the upstream echoes stored
/// coordinates back verbatim, so no tolerance is wanted.
fn fingerprint_matches(probe: &Probe, location: &ProbeLocation) -> bool {
    probe.country == location.country
        && probe.city == location.city
        && probe.asn == location.asn
        && probe.network == location.network
        && probe.latitude == location.latitude
        && probe.longitude == location.longitude
}
