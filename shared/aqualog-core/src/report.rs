//! Rollup report rows

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Round half-up to 2 decimal places, applied to every published aggregate
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    (value * 100.0 + 0.5).floor() / 100.0
}

/// Per-day statistics of one partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    /// UTC calendar date, `YYYY-MM-DD`
    pub date: String,
    /// Records in the day bucket
    pub count: u64,
    pub avg: BTreeMap<String, f64>,
    pub min: BTreeMap<String, f64>,
    pub max: BTreeMap<String, f64>,
    /// Numeric samples per field; independent of `count`
    pub counts: BTreeMap<String, u64>,
}

/// Per-month total of one metric in one partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReport {
    pub partition: String,
    pub year: i32,
    pub month: u32,
    pub metric: String,
    /// Records in the month bucket
    pub count: u64,
    /// Records carrying a numeric value for `metric`
    pub samples: u64,
    pub total: f64,
    pub avg: f64,
}
