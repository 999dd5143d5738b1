//! Calculator configuration

use aqualog_core::{AquaError, Result};
use serde::{Deserialize, Serialize};

use crate::curve::{Curve, Point};
use crate::hydraulics::HydraulicParams;

/// Level -> volume (10⁶ m³) curve used until a calibrated one is supplied
const DEFAULT_VOLUME_CURVE: &[(f64, f64)] = &[
    (0.0, 0.0),
    (1.0, 0.5),
    (2.0, 1.2),
    (3.0, 2.1),
    (4.0, 3.2),
    (5.0, 4.5),
];

/// One immutable version of the calculator configuration
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatorConfig {
    pub volume_curve: Curve,
    pub flow_curve: Option<Curve>,
    pub hydraulics: HydraulicParams,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            volume_curve: Curve::new(DEFAULT_VOLUME_CURVE.iter().copied()),
            flow_curve: None,
            hydraulics: HydraulicParams::default(),
        }
    }
}

impl CalculatorConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            volume_curve: match std::env::var("VOLUME_CURVE") {
                Ok(json) => parse_curve("VOLUME_CURVE", &json)?,
                Err(_) => defaults.volume_curve,
            },
            flow_curve: std::env::var("FLOW_CURVE")
                .ok()
                .map(|json| parse_curve("FLOW_CURVE", &json))
                .transpose()?,
            hydraulics: HydraulicParams {
                overflow_coefficient: env_f64("OVERFLOW_M", defaults.hydraulics.overflow_coefficient)?,
                weir_width: env_f64("OVERFLOW_B", defaults.hydraulics.weir_width)?,
                gravity: env_f64("GRAVITY", defaults.hydraulics.gravity)?,
            },
        })
    }

    /// New version with the supplied settings layered on top
    pub fn with_settings(&self, settings: &CalibrationSettings) -> Self {
        let mut next = self.clone();
        if let Some(points) = &settings.volume_curve {
            next.volume_curve = Curve::new(points.iter().copied());
        }
        if let Some(points) = &settings.flow_curve {
            next.flow_curve = (!points.is_empty()).then(|| Curve::new(points.iter().copied()));
        }
        if let Some(m) = settings.overflow_m {
            next.hydraulics.overflow_coefficient = m;
        }
        if let Some(b) = settings.overflow_b {
            next.hydraulics.weir_width = b;
        }
        if let Some(g) = settings.gravity {
            next.hydraulics.gravity = g;
        }
        next
    }
}

/// Calibration document delivered through the settings API.
///
/// Absent fields keep their current value; an empty flow curve removes the
/// flow curve so the orifice formula applies again.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_curve: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_curve: Option<Vec<Point>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overflow_m: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overflow_b: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gravity: Option<f64>,
}

impl CalibrationSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("overflow_m", self.overflow_m),
            ("overflow_b", self.overflow_b),
            ("gravity", self.gravity),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(AquaError::Validation(format!(
                        "{} must be a non-negative number, got {}",
                        name, v
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_curve(var: &str, json: &str) -> Result<Curve> {
    let points: Vec<Point> = serde_json::from_str(json)
        .map_err(|e| AquaError::Config(format!("Invalid {}: {}", var, e)))?;
    Ok(Curve::new(points))
}

fn env_f64(var: &str, default: f64) -> Result<f64> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| AquaError::Config(format!("Invalid {}: {}", var, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CalculatorConfig::default();
        assert_eq!(config.volume_curve.len(), 6);
        assert!(config.flow_curve.is_none());
        assert_eq!(config.hydraulics.overflow_coefficient, 0.49);
    }

    #[test]
    fn test_settings_layering() {
        let settings = CalibrationSettings::from_json(
            r#"{"flow_curve": [{"x": 0, "y": 0}, {"x": 4, "y": 8}], "overflow_b": 12.5}"#,
        )
        .unwrap();
        let next = CalculatorConfig::default().with_settings(&settings);

        assert_eq!(next.flow_curve.as_ref().map(Curve::len), Some(2));
        assert_eq!(next.hydraulics.weir_width, 12.5);
        assert_eq!(next.hydraulics.overflow_coefficient, 0.49);
        assert_eq!(next.volume_curve, CalculatorConfig::default().volume_curve);

        let cleared = next.with_settings(&CalibrationSettings {
            flow_curve: Some(Vec::new()),
            ..CalibrationSettings::default()
        });
        assert!(cleared.flow_curve.is_none());
    }

    #[test]
    fn test_settings_reject_negative_constants() {
        assert!(matches!(
            CalibrationSettings::from_json(r#"{"gravity": -9.81}"#),
            Err(AquaError::Validation(_))
        ));
        assert!(matches!(
            CalibrationSettings::from_json("{not json"),
            Err(AquaError::Serialization(_))
        ));
    }
}
