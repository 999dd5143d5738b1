//! Aqualog Derived-Metric Calculator
//!
//! Computes volume (`V`), flow (`Q`) and overflow (`Q_of`) from a water-level
//! reading using calibration curves and closed-form weir formulas. The
//! calculator configuration is immutable once published and can be replaced
//! as a whole while computations are in flight.

mod calculator;
mod config;
mod curve;
mod hydraulics;

pub use calculator::{DerivedMetricCalculator, DerivedMetrics};
pub use config::{CalculatorConfig, CalibrationSettings};
pub use curve::{Curve, Point};
pub use hydraulics::HydraulicParams;
