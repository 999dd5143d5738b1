//! Piecewise-linear calibration curves

use serde::{Deserialize, Serialize};

/// Calibration point: `x` is the level, `y` the calibrated value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Immutable curve, points ascending by `x`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Point>", into = "Vec<Point>")]
pub struct Curve {
    points: Vec<Point>,
}

impl Curve {
    /// Build a curve; non-finite points are dropped and the rest sorted by `x`
    pub fn new<I, P>(points: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Point>,
    {
        let mut points: Vec<Point> = points
            .into_iter()
            .map(Into::into)
            .filter(|p| p.x.is_finite() && p.y.is_finite())
            .collect();
        points.sort_by(|a, b| a.x.total_cmp(&b.x));
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Linear interpolation, clamped to the end points.
    ///
    /// An empty curve yields 0 and a single-point curve yields its `y` for
    /// every input. A NaN input yields NaN.
    pub fn interpolate(&self, x: f64) -> f64 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if self.points.len() == 1 {
            return first.y;
        }
        if x.is_nan() {
            return f64::NAN;
        }
        if x <= first.x {
            return first.y;
        }
        if x >= last.x {
            return last.y;
        }

        // first.x < x < last.x, so 1 <= idx < len and x1 < x <= x2
        let idx = self.points.partition_point(|p| p.x < x);
        let Point { x: x1, y: y1 } = self.points[idx - 1];
        let Point { x: x2, y: y2 } = self.points[idx];
        y1 + (x - x1) * (y2 - y1) / (x2 - x1)
    }
}

impl From<Vec<Point>> for Curve {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

impl From<Curve> for Vec<Point> {
    fn from(curve: Curve) -> Self {
        curve.points
    }
}
