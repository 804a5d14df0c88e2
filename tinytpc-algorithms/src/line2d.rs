//! 2D line detection and classification on a projected grid.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

use crate::hough::ProbabilisticHough;
use log::trace;
use ndarray::Array2;
use tinytpc_core::{FittedLine2D, HoughConfig, LineSegment, ProjectedGrid, GRID_SIZE};

/// Finds the line through a candidate's occupied pixels.
#[derive(Clone, Debug, Default)]
pub struct LineDetector {
    hough: ProbabilisticHough,
    row_fallback: bool,
}

impl LineDetector {
    /// Create a detector from line search settings.
    #[must_use]
    pub fn new(config: &HoughConfig) -> Self {
        Self {
            hough: ProbabilisticHough::new(config),
            row_fallback: config.row_fallback,
        }
    }

    /// Classify the occupancy of `grid`.
    ///
    /// - one Hough line: accuracy is the fraction of occupied pixels within
    ///   one pixel (along the row) of the rasterized segment;
    /// - no line: adjacent column pairs, then optionally row pairs, are tried
    ///   as a degenerate fallback;
    /// - several lines: ambiguous.
    #[must_use]
    pub fn detect(&self, grid: &ProjectedGrid) -> FittedLine2D {
        let occupancy = grid.occupancy();
        let lines = self.hough.detect(occupancy);
        trace!("Hough found {} lines", lines.len());
        match lines.as_slice() {
            [segment] => FittedLine2D::single(*segment, line_accuracy(occupancy, segment)),
            [] => self.degenerate_fallback(occupancy),
            _ => FittedLine2D::ambiguous(lines.len()),
        }
    }

    fn degenerate_fallback(&self, occupancy: &Array2<bool>) -> FittedLine2D {
        if occupancy.iter().all(|&o| !o) {
            return FittedLine2D::no_line();
        }
        let occupied: Vec<(usize, usize)> = occupancy
            .indexed_iter()
            .filter(|&(_, &o)| o)
            .map(|((row, col), _)| (row, col))
            .collect();

        if (0..GRID_SIZE).any(|c| occupied.iter().all(|&(_, col)| col == c || col == c + 1)) {
            return FittedLine2D::degenerate(0.0);
        }
        if self.row_fallback
            && (0..GRID_SIZE).any(|r| occupied.iter().all(|&(row, _)| row == r || row == r + 1))
        {
            return FittedLine2D::degenerate(std::f64::consts::FRAC_PI_2);
        }
        FittedLine2D::no_line()
    }
}

/// Cells covered by `segment`, widened by one pixel on each side along each row.
#[must_use]
pub fn line_band(segment: &LineSegment) -> Array2<bool> {
    let mut band = Array2::from_elem((GRID_SIZE, GRID_SIZE), false);
    let limit = GRID_SIZE as i32;
    let mut mark = |x: i32, y: i32| {
        if (0..limit).contains(&y) {
            for cx in (x - 1)..=(x + 1) {
                if (0..limit).contains(&cx) {
                    band[[y as usize, cx as usize]] = true;
                }
            }
        }
    };

    let (x0, y0) = segment.start;
    let (dx, dy) = (segment.dx(), segment.dy());
    let steps = dx.abs().max(dy.abs());
    if steps == 0 {
        mark(x0, y0);
        return band;
    }
    for i in 0..=steps {
        let t = f64::from(i) / f64::from(steps);
        let x = (f64::from(x0) + t * f64::from(dx)).round() as i32;
        let y = (f64::from(y0) + t * f64::from(dy)).round() as i32;
        mark(x, y);
    }
    band
}

/// `1 - uncovered / occupied` for the band around `segment`.
#[must_use]
pub fn line_accuracy(occupancy: &Array2<bool>, segment: &LineSegment) -> f64 {
    let band = line_band(segment);
    let mut occupied = 0usize;
    let mut uncovered = 0usize;
    ndarray::Zip::from(occupancy).and(&band).for_each(|&o, &b| {
        if o {
            occupied += 1;
            if !b {
                uncovered += 1;
            }
        }
    });
    if occupied == 0 {
        return 0.0;
    }
    1.0 - uncovered as f64 / occupied as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tinytpc_core::{LineClass, PixelCoord};

    fn grid_from(points: &[(u16, u16)]) -> ProjectedGrid {
        let mut grid = ProjectedGrid::new();
        for &(x, y) in points {
            grid.push(PixelCoord::new(x, y), 10.0, 0.0);
        }
        grid
    }

    #[test]
    fn test_short_column_degenerate() {
        let points: Vec<_> = (0..6).map(|y| (10, y)).collect();
        let fit = LineDetector::default().detect(&grid_from(&points));
        assert_eq!(fit.lines_detected, 0);
        assert_eq!(fit.class, LineClass::Degenerate);
        assert_relative_eq!(fit.accuracy.unwrap(), 1.0);
        assert_relative_eq!(fit.angle.unwrap(), 0.0);
    }

    #[test]
    fn test_two_adjacent_columns_degenerate() {
        let points = [(4, 0), (5, 1), (4, 2), (5, 3)];
        let fit = LineDetector::default().detect(&grid_from(&points));
        assert_eq!(fit.class, LineClass::Degenerate);
    }

    #[test]
    fn test_short_row_needs_row_fallback() {
        let points: Vec<_> = (2..7).map(|x| (x, 9)).collect();
        let grid = grid_from(&points);
        let fit = LineDetector::default().detect(&grid);
        assert_eq!(fit.class, LineClass::NoLine);
        assert!(fit.accuracy.is_none());

        let config = HoughConfig::default().with_row_fallback(true);
        let fit = LineDetector::new(&config).detect(&grid);
        assert_eq!(fit.class, LineClass::Degenerate);
        assert_relative_eq!(fit.angle.unwrap(), std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn test_empty_grid_no_line() {
        let fit = LineDetector::default().detect(&ProjectedGrid::new());
        assert_eq!(fit.class, LineClass::NoLine);
    }

    #[test]
    fn test_long_column_single() {
        let points: Vec<_> = (5..15).map(|y| (10, y)).collect();
        let fit = LineDetector::default().detect(&grid_from(&points));
        assert_eq!(fit.class, LineClass::Single);
        assert_eq!(fit.lines_detected, 1);
        assert_relative_eq!(fit.accuracy.unwrap(), 1.0);
        assert_relative_eq!(fit.angle.unwrap(), 0.0);
        assert!(fit.is_track_like(0.75));
    }

    #[test]
    fn test_full_grid_ambiguous() {
        let points: Vec<_> = PixelCoord::all().map(|c| (c.x, c.y)).collect();
        let fit = LineDetector::default().detect(&grid_from(&points));
        assert_eq!(fit.class, LineClass::Ambiguous);
        assert!(fit.lines_detected >= 2);
        assert!(fit.accuracy.is_none());
        assert!(!fit.is_track_like(0.0));
    }

    #[test]
    fn test_band_grows_along_rows() {
        let band = line_band(&LineSegment::new((5, 2), (5, 4)));
        for y in 2..=4 {
            for x in 4..=6 {
                assert!(band[[y, x]]);
            }
            assert!(!band[[y, 3]]);
            assert!(!band[[y, 7]]);
        }
        assert!(!band[[1, 5]]);
        assert!(!band[[5, 5]]);
    }

    #[test]
    fn test_band_shallow_segment_has_no_gaps() {
        let band = line_band(&LineSegment::new((0, 0), (20, 2)));
        for x in 0..GRID_SIZE {
            assert!((0..3).any(|y| band[[y, x]]), "column {x} uncovered");
        }
    }

    #[test]
    fn test_accuracy_counts_off_line_pixels() {
        let mut occupancy = Array2::from_elem((GRID_SIZE, GRID_SIZE), false);
        for y in 0..6 {
            occupancy[[y, 10]] = true;
        }
        occupancy[[3, 15]] = true;
        occupancy[[20, 0]] = true;
        let acc = line_accuracy(&occupancy, &LineSegment::new((10, 0), (10, 5)));
        assert_relative_eq!(acc, 6.0 / 8.0);
        assert!((0.0..=1.0).contains(&acc));
    }
}
