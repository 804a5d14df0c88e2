//! Fitted track types: 2D line classification, 3D line and dE/dx samples.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A detected line segment between two integer grid points `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineSegment {
    /// Start point `(x, y)`.
    pub start: (i32, i32),
    /// End point `(x, y)`.
    pub end: (i32, i32),
}

impl LineSegment {
    /// Creates a segment from two endpoints.
    #[must_use]
    pub fn new(start: (i32, i32), end: (i32, i32)) -> Self {
        Self { start, end }
    }

    /// Column extent `x1 - x0`.
    #[must_use]
    pub fn dx(&self) -> i32 {
        self.end.0 - self.start.0
    }

    /// Row extent `y1 - y0`.
    #[must_use]
    pub fn dy(&self) -> i32 {
        self.end.1 - self.start.1
    }

    /// Angle from the column axis, `atan(dx / dy)`.
    ///
    /// A column-parallel segment has angle 0; a row-parallel one has angle
    /// `+pi/2` or `-pi/2` following the sign of `dx`. Row-parallel segments
    /// are not reported with a zero slope, so an angle of 0 always means a
    /// track along the columns.
    #[must_use]
    pub fn angle(&self) -> f64 {
        let (dx, dy) = (f64::from(self.dx()), f64::from(self.dy()));
        if self.dy() == 0 {
            if dx < 0.0 {
                -std::f64::consts::FRAC_PI_2
            } else {
                std::f64::consts::FRAC_PI_2
            }
        } else {
            (dx / dy).atan()
        }
    }
}

/// Classification of a candidate's 2D line search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LineClass {
    /// Exactly one line was detected.
    Single,
    /// No line was detected but the hits sit on an adjacent column (or row) pair.
    Degenerate,
    /// No line and no degenerate fallback.
    NoLine,
    /// Two or more lines were detected.
    Ambiguous,
}

impl LineClass {
    /// Short lowercase name used in tables and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Degenerate => "degenerate",
            Self::NoLine => "no_line",
            Self::Ambiguous => "ambiguous",
        }
    }
}

impl std::fmt::Display for LineClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the 2D line search on a projected grid.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FittedLine2D {
    /// Number of Hough lines found.
    pub lines_detected: usize,
    /// Fraction of occupied pixels on the line, in `[0, 1]`.
    pub accuracy: Option<f64>,
    /// Angle from the column axis in radians.
    pub angle: Option<f64>,
    /// The detected segment, when exactly one was found.
    pub segment: Option<LineSegment>,
    /// Outcome class.
    pub class: LineClass,
}

impl FittedLine2D {
    /// One detected line with its coverage accuracy.
    #[must_use]
    pub fn single(segment: LineSegment, accuracy: f64) -> Self {
        Self {
            lines_detected: 1,
            accuracy: Some(accuracy),
            angle: Some(segment.angle()),
            segment: Some(segment),
            class: LineClass::Single,
        }
    }

    /// No Hough line, but a degenerate column or row pair covers every hit.
    #[must_use]
    pub fn degenerate(angle: f64) -> Self {
        Self {
            lines_detected: 0,
            accuracy: Some(1.0),
            angle: Some(angle),
            segment: None,
            class: LineClass::Degenerate,
        }
    }

    /// No line at all.
    #[must_use]
    pub fn no_line() -> Self {
        Self {
            lines_detected: 0,
            accuracy: None,
            angle: None,
            segment: None,
            class: LineClass::NoLine,
        }
    }

    /// Several competing lines.
    #[must_use]
    pub fn ambiguous(lines_detected: usize) -> Self {
        Self {
            lines_detected,
            accuracy: None,
            angle: None,
            segment: None,
            class: LineClass::Ambiguous,
        }
    }

    /// Returns true if the candidate should go on to the 3D fit.
    #[must_use]
    pub fn is_track_like(&self, accuracy_cutoff: f64) -> bool {
        match self.class {
            LineClass::Single => self.accuracy.is_some_and(|a| a >= accuracy_cutoff),
            LineClass::Degenerate => true,
            LineClass::NoLine | LineClass::Ambiguous => false,
        }
    }
}

/// A straight line in detector space (mm).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FittedLine3D {
    /// Centroid of the fitted points.
    pub point: Vector3<f64>,
    /// Unit direction.
    pub direction: Vector3<f64>,
}

impl FittedLine3D {
    /// Position at parameter `t` along the line.
    #[must_use]
    pub fn at(&self, t: f64) -> Vector3<f64> {
        self.point + self.direction * t
    }

    /// Polar angle of the direction from the drift (z) axis, in radians.
    #[must_use]
    pub fn polar_angle(&self) -> f64 {
        self.direction.z.abs().clamp(0.0, 1.0).acos()
    }
}

/// Amplitude per unit path length for one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DxDSample {
    /// Column.
    pub grid_x: u16,
    /// Row.
    pub grid_y: u16,
    /// Representative amplitude of the pixel.
    pub amplitude: f64,
    /// Chord length of the line through the pixel (mm).
    pub path_length: f64,
    /// `amplitude / path_length`.
    pub dadc_dx: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

    #[test]
    fn test_segment_angle() {
        assert_relative_eq!(LineSegment::new((10, 4), (10, 15)).angle(), 0.0);
        assert_relative_eq!(LineSegment::new((2, 5), (9, 5)).angle(), FRAC_PI_2);
        assert_relative_eq!(LineSegment::new((9, 5), (2, 5)).angle(), -FRAC_PI_2);
        assert_relative_eq!(LineSegment::new((0, 0), (4, 4)).angle(), FRAC_PI_4);
        // Row tracks never share the column track's angle
        assert!(LineSegment::new((0, 7), (20, 7)).angle().abs() > 1.5);
    }

    #[test]
    fn test_track_like() {
        let seg = LineSegment::new((0, 0), (0, 10));
        assert!(FittedLine2D::single(seg, 0.8).is_track_like(0.75));
        assert!(FittedLine2D::single(seg, 0.75).is_track_like(0.75));
        assert!(!FittedLine2D::single(seg, 0.7).is_track_like(0.75));
        assert!(FittedLine2D::degenerate(0.0).is_track_like(0.75));
        assert!(!FittedLine2D::no_line().is_track_like(0.0));
        assert!(!FittedLine2D::ambiguous(3).is_track_like(0.0));
    }

    #[test]
    fn test_line3d_at() {
        let line = FittedLine3D {
            point: Vector3::new(1.0, 2.0, 3.0),
            direction: Vector3::new(0.0, 0.0, 1.0),
        };
        assert_relative_eq!(line.at(2.0), Vector3::new(1.0, 2.0, 5.0));
        assert_relative_eq!(line.polar_angle(), 0.0);
    }
}
