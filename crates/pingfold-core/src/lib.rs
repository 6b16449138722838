//! pingfold-core — shared configuration for the pingfold jobs.

pub mod config;

pub use config::{ApiConfig, MeasureConfig, PingfoldConfig, StoreConfig};
