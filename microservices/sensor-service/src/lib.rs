//! Sensor Service
//!
//! Ingest and query core for field-device readings:
//! - Derived metrics (volume, flow, overflow) applied before insert
//! - Range queries across the partitions of a device group
//! - Daily and monthly rollups

pub mod config;
pub mod fanout;
pub mod merger;
pub mod rollup;
pub mod service;

pub use config::SensorServiceConfig;
pub use fanout::{FanOut, FanOutConfig, FanOutMetrics};
pub use merger::{GroupLatest, QueryMerger};
pub use rollup::{MonthlyRollup, RollupEngine};
pub use service::{ImportRejection, ImportSummary, SensorService};
