//! Closed-form weir formulas

use serde::{Deserialize, Serialize};

/// Overflow weir constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HydraulicParams {
    /// Overflow coefficient `m`
    pub overflow_coefficient: f64,
    /// Weir crest width `B` in metres
    pub weir_width: f64,
    /// Gravity `g` in m/s²
    pub gravity: f64,
}

impl Default for HydraulicParams {
    fn default() -> Self {
        Self {
            overflow_coefficient: 0.49,
            weir_width: 10.0,
            gravity: 9.81,
        }
    }
}

impl HydraulicParams {
    /// `Q_of = m · B · √(2g) · L^1.5`, zero when the level is not above the crest
    pub fn overflow(&self, level: f64) -> f64 {
        if level <= 0.0 {
            return 0.0;
        }
        self.overflow_coefficient * self.weir_width * (2.0 * self.gravity).sqrt() * level.powf(1.5)
    }

    /// `Q = D · √(2gL)`, used when no flow curve is configured
    pub fn orifice_flow(&self, level: f64, discharge: f64) -> f64 {
        if level <= 0.0 {
            return 0.0;
        }
        discharge * (2.0 * self.gravity * level).sqrt()
    }
}
