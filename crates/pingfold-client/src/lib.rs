//! pingfold-client — measurement API collaborator.
//!
//! Models the upstream measurement service: submit a ping job for a
//! target with a probe selector, then poll the job until it reaches a
//! terminal state. The engine itself never sees the network; it only
//! consumes the [`RawMeasurement`] payloads this crate produces.
//!
//! # Architecture
//!
//! ```text
//! MeasurementClient
//!   ├── submit() → job id
//!   ├── fetch() → RawMeasurement (any status)
//!   └── wait_terminal() → RawMeasurement (terminal) | Stalled
//!         └── PollBackoff (doubling interval, capped, hard deadline)
//! ```

pub mod api;
pub mod client;
pub mod error;
pub mod poll;

pub use api::{ProbeSelector, RawMeasurement, RawSubResult};
pub use client::MeasurementClient;
pub use error::{ClientError, ClientResult};
pub use poll::{PollBackoff, PollConfig};
