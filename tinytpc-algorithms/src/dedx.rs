//! Amplitude per unit path length along a fitted 3D line.

#![allow(clippy::cast_precision_loss)]

use log::trace;
use tinytpc_core::{
    AmplitudeStatistic, DxDSample, Error, FittedLine3D, PixelCoord, ProjectedGrid,
};

/// Direction components below this are treated as parallel to the slab.
const PARALLEL_EPSILON: f64 = 1e-12;

/// Chords at or below this length (mm) are skipped.
const MIN_CHORD_MM: f64 = 1e-9;

/// dE/dx samples of one candidate, with the cells that produced none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedxEstimate {
    /// One sample per occupied cell crossed by the line, row-major.
    pub samples: Vec<DxDSample>,
    /// Occupied cells the line does not cross.
    pub missed_cells: usize,
    /// Occupied cells crossed with a zero-length chord.
    pub degenerate_chords: usize,
}

impl DedxEstimate {
    /// Mean dADC/dx over the samples.
    #[must_use]
    pub fn mean_dadc_dx(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().map(|s| s.dadc_dx).sum::<f64>() / self.samples.len() as f64)
    }
}

/// Computes per-pixel dADC/dx for a fitted line.
#[derive(Debug, Clone, Copy)]
pub struct DedxEstimator {
    pitch_mm: f64,
    statistic: AmplitudeStatistic,
}

impl DedxEstimator {
    /// Create an estimator for a pixel pitch and amplitude statistic.
    #[must_use]
    pub fn new(pitch_mm: f64, statistic: AmplitudeStatistic) -> Self {
        Self {
            pitch_mm,
            statistic,
        }
    }

    /// Intersect `line` with every occupied cell's footprint.
    ///
    /// A line parallel to the drift axis crosses no footprint side and
    /// yields no samples.
    #[must_use]
    pub fn estimate(&self, line: &FittedLine3D, grid: &ProjectedGrid) -> DedxEstimate {
        self.estimate_in(line, grid, None)
    }

    /// Like [`estimate`](Self::estimate), with the line cut to the drift
    /// range `(z_min, z_max)` spanned by the track's hits.
    #[must_use]
    pub fn estimate_within(
        &self,
        line: &FittedLine3D,
        grid: &ProjectedGrid,
        drift_span: (f64, f64),
    ) -> DedxEstimate {
        self.estimate_in(line, grid, Some(drift_span))
    }

    fn estimate_in(
        &self,
        line: &FittedLine3D,
        grid: &ProjectedGrid,
        drift_span: Option<(f64, f64)>,
    ) -> DedxEstimate {
        let mut estimate = DedxEstimate::default();
        let d = line.direction;
        if d.x.abs() < PARALLEL_EPSILON && d.y.abs() < PARALLEL_EPSILON {
            trace!("Line is parallel to the drift axis, no dE/dx samples");
            return estimate;
        }

        for coord in grid.occupied_pixels() {
            let Some(chord) = self.chord_in(line, coord, drift_span) else {
                estimate.missed_cells += 1;
                continue;
            };
            if chord <= MIN_CHORD_MM {
                let skipped = Error::DegenerateChord {
                    x: coord.x,
                    y: coord.y,
                };
                trace!("{skipped}");
                estimate.degenerate_chords += 1;
                continue;
            }
            let Some(amplitude) = grid.representative_amplitude(coord, self.statistic) else {
                continue;
            };
            estimate.samples.push(DxDSample {
                grid_x: coord.x,
                grid_y: coord.y,
                amplitude,
                path_length: chord,
                dadc_dx: amplitude / chord,
            });
        }
        estimate
    }

    /// Length of `line` inside the footprint of `coord`, `None` if missed.
    #[must_use]
    pub fn chord(&self, line: &FittedLine3D, coord: PixelCoord) -> Option<f64> {
        self.chord_in(line, coord, None)
    }

    /// Length of `line` inside the footprint of `coord` and between the
    /// drift coordinates `drift_span`.
    ///
    /// A line with no drift component, or an empty span, is not cut in drift.
    #[must_use]
    pub fn chord_within(
        &self,
        line: &FittedLine3D,
        coord: PixelCoord,
        drift_span: (f64, f64),
    ) -> Option<f64> {
        self.chord_in(line, coord, Some(drift_span))
    }

    fn chord_in(
        &self,
        line: &FittedLine3D,
        coord: PixelCoord,
        drift_span: Option<(f64, f64)>,
    ) -> Option<f64> {
        let (x_lo, y_lo) = (
            f64::from(coord.x) * self.pitch_mm,
            f64::from(coord.y) * self.pitch_mm,
        );
        let mut slabs = vec![
            (line.point.x, line.direction.x, x_lo, x_lo + self.pitch_mm),
            (line.point.y, line.direction.y, y_lo, y_lo + self.pitch_mm),
        ];
        if let Some((z_lo, z_hi)) = drift_span {
            if z_hi - z_lo > MIN_CHORD_MM && line.direction.z.abs() >= PARALLEL_EPSILON {
                slabs.push((line.point.z, line.direction.z, z_lo, z_hi));
            }
        }

        let mut t_min = f64::NEG_INFINITY;
        let mut t_max = f64::INFINITY;
        for (origin, dir, lo, hi) in slabs {
            if dir.abs() < PARALLEL_EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }
            let t1 = (lo - origin) / dir;
            let t2 = (hi - origin) / dir;
            t_min = t_min.max(t1.min(t2));
            t_max = t_max.min(t1.max(t2));
        }

        if !t_min.is_finite() || !t_max.is_finite() || t_min > t_max {
            return None;
        }
        Some((t_max - t_min) * line.direction.norm())
    }
}
