//! pingfold-ingest — from raw measurement payloads to staged records.
//!
//! # Architecture
//!
//! ```text
//! run_cycle()
//!   ├── ProbeRegistry::load()      catalog + dense id allocation
//!   ├── submit / wait_terminal     per target (pingfold-client)
//!   ├── normalize()                filter sub-results, resolve probes
//!   ├── ProbeRegistry::flush()     new probes persisted once per batch
//!   └── StagingWriter::append()    into today's partition
//! ```
//!
//! Probe identity is the load-bearing piece: the upstream source never
//! assigns stable probe ids, so the registry maps each observed
//! location fingerprint to an integer id, assigned once, densely from
//! 1, and never reused.

pub mod cycle;
pub mod error;
pub mod normalize;
pub mod registry;
pub mod staging;

pub use cycle::{run_cycle, CycleConfig, CycleReport};
pub use error::{IngestError, IngestResult};
pub use normalize::normalize;
pub use registry::ProbeRegistry;
pub use staging::StagingWriter;
