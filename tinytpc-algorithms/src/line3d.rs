//! Straight-line fit in 3D by principal component analysis.

#![allow(clippy::cast_precision_loss)]

use nalgebra::{Matrix3, Vector3};
use tinytpc_core::{CandidateWindow, Error, FittedLine3D, Result};

/// Points with less spread than this (mm^2 of variance) have no direction.
const MIN_VARIANCE: f64 = 1e-12;

/// Components smaller than this are skipped when fixing the direction sign.
const SIGN_EPSILON: f64 = 1e-9;

/// Detector-space points of a candidate's hits (mm).
///
/// `x` and `y` are pixel centres, `z` is the drift distance since the
/// window's earliest hit.
#[must_use]
pub fn hit_points(window: &CandidateWindow, pitch_mm: f64, mm_per_tick: f64) -> Vec<Vector3<f64>> {
    let Some(t0) = window.first_hit_time() else {
        return Vec::new();
    };
    window
        .hits
        .iter()
        .map(|hit| {
            Vector3::new(
                (f64::from(hit.x()) + 0.5) * pitch_mm,
                (f64::from(hit.y()) + 0.5) * pitch_mm,
                (hit.time - t0) as f64 * mm_per_tick,
            )
        })
        .collect()
}

/// Smallest and largest drift coordinate of `points`.
#[must_use]
pub fn drift_span(points: &[Vector3<f64>]) -> Option<(f64, f64)> {
    let first = points.first()?.z;
    Some(
        points
            .iter()
            .fold((first, first), |(lo, hi), p| (lo.min(p.z), hi.max(p.z))),
    )
}

/// Fit a line through `points`.
///
/// Returns the centroid and the unit eigenvector of the largest covariance
/// eigenvalue, signed so its first non-negligible component is positive.
pub fn fit_line(points: &[Vector3<f64>]) -> Result<FittedLine3D> {
    if points.len() < 3 {
        return Err(Error::InsufficientPoints {
            found: points.len(),
        });
    }

    let n = points.len() as f64;
    let centroid = points.iter().fold(Vector3::<f64>::zeros(), |acc, p| acc + p) / n;
    let covariance = points.iter().fold(Matrix3::<f64>::zeros(), |acc, p| {
        let d = p - centroid;
        acc + d * d.transpose()
    }) / n;

    let eigen = covariance.symmetric_eigen();
    let major = eigen.eigenvalues.imax();
    let spread = eigen.eigenvalues[major];
    if spread.is_nan() || spread <= MIN_VARIANCE {
        return Err(Error::DegenerateFit);
    }

    let mut direction: Vector3<f64> = eigen.eigenvectors.column(major).normalize();
    if let Some(&first) = direction.iter().find(|c| c.abs() > SIGN_EPSILON) {
        if first < 0.0 {
            direction = -direction;
        }
    }

    Ok(FittedLine3D {
        point: centroid,
        direction,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tinytpc_core::Hit;

    #[test]
    fn test_too_few_points() {
        let points = [Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)];
        assert_eq!(
            fit_line(&points),
            Err(Error::InsufficientPoints { found: 2 })
        );
    }

    #[test]
    fn test_coincident_points_degenerate() {
        let points = [Vector3::new(1.0, 2.0, 3.0); 4];
        assert_eq!(fit_line(&points), Err(Error::DegenerateFit));
    }

    #[test]
    fn test_axis_aligned_line() {
        let points: Vec<_> = (0..5).map(|i| Vector3::new(2.0, f64::from(i), 7.0)).collect();
        let line = fit_line(&points).unwrap();
        assert_relative_eq!(line.point, Vector3::new(2.0, 2.0, 7.0), epsilon = 1e-12);
        assert_relative_eq!(line.direction, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_diagonal_line_sign() {
        // Listed in decreasing x so a naive fit could flip
        let points: Vec<_> = (0..6)
            .rev()
            .map(|i| {
                let t = f64::from(i);
                Vector3::new(t, 2.0 * t, -t)
            })
            .collect();
        let line = fit_line(&points).unwrap();
        let expected = Vector3::new(1.0, 2.0, -1.0).normalize();
        assert_relative_eq!(line.direction, expected, epsilon = 1e-9);
        assert_relative_eq!(line.direction.norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_drift_span() {
        assert_eq!(drift_span(&[]), None);
        let points = [
            Vector3::new(0.0, 0.0, 2.0),
            Vector3::new(0.0, 1.0, -1.0),
            Vector3::new(0.0, 2.0, 5.5),
        ];
        assert_eq!(drift_span(&points), Some((-1.0, 5.5)));
    }

    #[test]
    fn test_hit_points() {
        let window = CandidateWindow::from_hits(
            0,
            vec![Hit::new(0, 0, 100, 1.0), Hit::new(2, 1, 110, 1.0)],
        );
        let points = hit_points(&window, 2.0, 0.5);
        assert_relative_eq!(points[0], Vector3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(points[1], Vector3::new(5.0, 3.0, 5.0));
    }
}
