//! Progressive probabilistic Hough transform on a binary grid.
//!
//! Points are visited in a seeded random order. Each point votes into a
//! `(rho, theta)` accumulator; once a bin reaches the threshold, the line is
//! walked in both directions from the point with a fixed-point stepper,
//! tolerating up to `line_gap` empty pixels. Pixels on the walked line are
//! removed from the image and their votes withdrawn, so each pixel supports
//! at most one line.

#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tinytpc_core::{HoughConfig, LineSegment};

const SHIFT: u32 = 16;

/// Probabilistic Hough line detector.
#[derive(Clone, Debug)]
pub struct ProbabilisticHough {
    threshold: usize,
    line_length: usize,
    line_gap: usize,
    seed: u64,
    cos_table: Vec<f64>,
    sin_table: Vec<f64>,
}

impl Default for ProbabilisticHough {
    fn default() -> Self {
        Self::new(&HoughConfig::default())
    }
}

impl ProbabilisticHough {
    /// Create a detector; angles are `theta_steps` values evenly spaced over
    /// `[-pi/2, pi/2)`.
    #[must_use]
    pub fn new(config: &HoughConfig) -> Self {
        let steps = config.theta_steps.max(1);
        let step = std::f64::consts::PI / steps as f64;
        let thetas = (0..steps).map(|j| -std::f64::consts::FRAC_PI_2 + j as f64 * step);
        let (cos_table, sin_table) = thetas.map(|t| (t.cos(), t.sin())).unzip();
        Self {
            threshold: config.threshold,
            line_length: config.line_length,
            line_gap: config.line_gap,
            seed: config.seed,
            cos_table,
            sin_table,
        }
    }

    /// Number of angles.
    #[must_use]
    pub fn theta_steps(&self) -> usize {
        self.cos_table.len()
    }

    /// Detect line segments on a `[row, col]` occupancy image.
    ///
    /// Segment endpoints are `(x, y)` = `(col, row)`.
    #[must_use]
    pub fn detect(&self, image: &Array2<bool>) -> Vec<LineSegment> {
        let (height, width) = image.dim();
        if height == 0 || width == 0 {
            return Vec::new();
        }
        let max_distance = 2 * ((height * height + width * width) as f64).sqrt().ceil() as usize;
        let offset = (max_distance / 2) as i64;
        let nthetas = self.theta_steps();

        let mut accum = Array2::<i32>::zeros((max_distance + 1, nthetas));
        let mut mask = image.clone();
        let mut voted = Array2::from_elem((height, width), false);

        let mut points: Vec<(usize, usize)> = image
            .indexed_iter()
            .filter(|&(_, &v)| v)
            .map(|((y, x), _)| (x, y))
            .collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        points.shuffle(&mut rng);

        let rho_index = |j: usize, x: usize, y: usize| -> usize {
            let rho = (self.cos_table[j] * x as f64 + self.sin_table[j] * y as f64).round() as i64;
            (rho + offset) as usize
        };

        let mut lines = Vec::new();
        let threshold = self.threshold as i32;

        for (x, y) in points {
            // Already consumed by an earlier line
            if !mask[[y, x]] {
                continue;
            }

            let mut max_value = threshold - 1;
            let mut max_theta = None;
            for j in 0..nthetas {
                let idx = rho_index(j, x, y);
                accum[[idx, j]] += 1;
                let value = accum[[idx, j]];
                if value > max_value {
                    max_value = value;
                    max_theta = Some(j);
                }
            }
            voted[[y, x]] = true;

            let Some(max_theta) = max_theta else {
                continue;
            };

            let stepper = Stepper::new(
                -self.sin_table[max_theta],
                self.cos_table[max_theta],
                x as i64,
                y as i64,
            );

            // Pass 1: find both line ends, bridging short gaps
            let mut line_end = [(x as i64, y as i64); 2];
            for (k, end) in line_end.iter_mut().enumerate() {
                let mut gap = 0;
                for (x1, y1) in stepper.walk(k == 1) {
                    if x1 < 0 || y1 < 0 || x1 >= width as i64 || y1 >= height as i64 {
                        break;
                    }
                    gap += 1;
                    if mask[[y1 as usize, x1 as usize]] {
                        gap = 0;
                        *end = (x1, y1);
                    } else if gap > self.line_gap {
                        break;
                    }
                }
            }

            let length = self.line_length as i64;
            let good_line = (line_end[1].1 - line_end[0].1).abs() >= length
                || (line_end[1].0 - line_end[0].0).abs() >= length;

            // Pass 2: clear the walked pixels, withdrawing votes of accepted lines
            for (k, end) in line_end.iter().enumerate() {
                for (x1, y1) in stepper.walk(k == 1) {
                    if x1 < 0 || y1 < 0 || x1 >= width as i64 || y1 >= height as i64 {
                        break;
                    }
                    let (ux, uy) = (x1 as usize, y1 as usize);
                    if mask[[uy, ux]] {
                        if good_line && voted[[uy, ux]] {
                            for j in 0..nthetas {
                                accum[[rho_index(j, ux, uy), j]] -= 1;
                            }
                            voted[[uy, ux]] = false;
                        }
                        mask[[uy, ux]] = false;
                    }
                    if (x1, y1) == *end {
                        break;
                    }
                }
            }

            if good_line {
                lines.push(LineSegment::new(
                    (line_end[0].0 as i32, line_end[0].1 as i32),
                    (line_end[1].0 as i32, line_end[1].1 as i32),
                ));
            }
        }

        lines
    }
}

/// Fixed-point walker along a line direction `(a, b)` from a pixel.
///
/// The major axis advances one pixel per step; the minor axis carries a
/// 16-bit fraction starting at the pixel centre.
#[derive(Clone, Copy, Debug)]
struct Stepper {
    x_major: bool,
    x0: i64,
    y0: i64,
    dx: i64,
    dy: i64,
}

impl Stepper {
    fn new(a: f64, b: f64, x: i64, y: i64) -> Self {
        let scale = f64::from(1u32 << SHIFT);
        let half = 1i64 << (SHIFT - 1);
        if a.abs() > b.abs() {
            Self {
                x_major: true,
                x0: x,
                y0: (y << SHIFT) + half,
                dx: if a > 0.0 { 1 } else { -1 },
                dy: (b * scale / a.abs()).round() as i64,
            }
        } else {
            Self {
                x_major: false,
                x0: (x << SHIFT) + half,
                y0: y,
                dx: (a * scale / b.abs()).round() as i64,
                dy: if b > 0.0 { 1 } else { -1 },
            }
        }
    }

    /// Pixels visited from the start point, forwards or backwards.
    ///
    /// Unbounded; callers stop on bounds, gaps or the line end.
    fn walk(self, backwards: bool) -> impl Iterator<Item = (i64, i64)> {
        let (dx, dy) = if backwards {
            (-self.dx, -self.dy)
        } else {
            (self.dx, self.dy)
        };
        let mut px = self.x0;
        let mut py = self.y0;
        std::iter::from_fn(move || {
            let pixel = if self.x_major {
                (px, py >> SHIFT)
            } else {
                (px >> SHIFT, py)
            };
            px += dx;
            py += dy;
            Some(pixel)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinytpc_core::GRID_SIZE;

    fn image_from(points: &[(usize, usize)]) -> Array2<bool> {
        let mut image = Array2::from_elem((GRID_SIZE, GRID_SIZE), false);
        for &(x, y) in points {
            image[[y, x]] = true;
        }
        image
    }

    #[test]
    fn test_empty_image() {
        let hough = ProbabilisticHough::default();
        assert!(hough.detect(&image_from(&[])).is_empty());
    }

    #[test]
    fn test_short_column_below_threshold() {
        let points: Vec<_> = (0..6).map(|y| (10, y)).collect();
        let hough = ProbabilisticHough::default();
        assert!(hough.detect(&image_from(&points)).is_empty());
    }

    #[test]
    fn test_long_column_single_line() {
        let points: Vec<_> = (5..15).map(|y| (10, y)).collect();
        let image = image_from(&points);
        for seed in 0..8 {
            let hough = ProbabilisticHough::new(&HoughConfig::default().with_seed(seed));
            let lines = hough.detect(&image);
            assert_eq!(lines.len(), 1, "seed {seed}");
            let seg = lines[0];
            assert_eq!(seg.start.0, 10);
            assert_eq!(seg.end.0, 10);
            assert_eq!(seg.dy().abs(), 9);
        }
    }

    #[test]
    fn test_long_row_single_line() {
        let points: Vec<_> = (3..17).map(|x| (x, 8)).collect();
        let lines = ProbabilisticHough::default().detect(&image_from(&points));
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].dy(), 0);
        assert_eq!(lines[0].dx().abs(), 13);
    }

    #[test]
    fn test_two_separate_columns() {
        let mut points: Vec<_> = (4..16).map(|y| (3, y)).collect();
        points.extend((4..16).map(|y| (17, y)));
        let lines = ProbabilisticHough::default().detect(&image_from(&points));
        assert!(lines.len() >= 2);
    }

    #[test]
    fn test_deterministic_for_seed() {
        let image = Array2::from_elem((GRID_SIZE, GRID_SIZE), true);
        let hough = ProbabilisticHough::new(&HoughConfig::default().with_seed(42));
        assert_eq!(hough.detect(&image), hough.detect(&image));
    }
}
