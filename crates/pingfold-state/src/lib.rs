//! pingfold-state — embedded measurement store for pingfold.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and
//! in-memory storage for the probe catalog, per-day staging partitions,
//! and the canonical aggregate collections.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value
//! columns. Aggregate keys (`{target}-{label}`,
//! `{target}-{label}-{probe_id}`) enable prefix scans for related
//! records; staging tables are named by partition date
//! (`staging/{date}/…`) so a whole day can be dropped in one call.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by
//! `Arc<Database>`) and can be shared across async tasks.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
