//! pingfold-rollup — multi-horizon aggregation and partition lifecycle.
//!
//! # Architecture
//!
//! ```text
//! Horizon::member_days()        pure calendar walking
//! aggregate_daily()             staging partition → daily aggregates
//! aggregate_horizon()           promoted dailies → weekly/monthly/yearly
//! promote() / promote_and_drop  dailies into canonical store, then drop
//! prune_expired()               retention sweep over canonical tables
//! render_reports()              aggregates → ReportSink, NoData skipped
//! ```
//!
//! Once a day's partition is promoted and dropped, every coarser
//! horizon is folded from the promoted dailies alone; closed horizons
//! never require raw-data reprocessing.

pub mod aggregate;
pub mod error;
pub mod horizon;
pub mod lifecycle;
pub mod report;

pub use aggregate::{aggregate_daily, aggregate_horizon, RETENTION_DAYS};
pub use error::{RollupError, RollupResult};
pub use horizon::Horizon;
pub use lifecycle::{promote, promote_and_drop, prune_expired, PromotionReport};
pub use report::{render_reports, RecordingSink, ReportRunSummary, ReportSink};
