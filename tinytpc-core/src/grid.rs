//! Per-pixel projection of a candidate onto the anode grid.

#![allow(clippy::cast_precision_loss)]

use ndarray::Array2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::hit::{PixelCoord, GRID_SIZE, PIXEL_COUNT};

/// How a pixel's amplitude samples are reduced to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum AmplitudeStatistic {
    /// Arithmetic mean.
    Mean,
    /// Median (mean of the two middle samples for even counts).
    #[default]
    Median,
}

impl AmplitudeStatistic {
    /// Reduces `samples` to a single value. Returns `None` if empty.
    #[must_use]
    pub fn reduce(self, samples: &[f64]) -> Option<f64> {
        if samples.is_empty() {
            return None;
        }
        match self {
            Self::Mean => Some(samples.iter().sum::<f64>() / samples.len() as f64),
            Self::Median => {
                let mut sorted = samples.to_vec();
                sorted.sort_by(f64::total_cmp);
                let mid = sorted.len() / 2;
                if sorted.len().is_multiple_of(2) {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Some(sorted[mid])
                }
            }
        }
    }
}

/// A candidate's hits rasterized onto the 21x21 grid.
///
/// Unoccupied pixels are tracked through an explicit occupancy mask, since a
/// mean amplitude of zero is a legitimate value for an occupied pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedGrid {
    amplitude_sum: Array2<f64>,
    time_sum: Array2<f64>,
    counts: Array2<u32>,
    occupancy: Array2<bool>,
    samples: Vec<Vec<f64>>,
}

impl Default for ProjectedGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl ProjectedGrid {
    /// Creates an empty grid.
    #[must_use]
    pub fn new() -> Self {
        Self {
            amplitude_sum: Array2::zeros((GRID_SIZE, GRID_SIZE)),
            time_sum: Array2::zeros((GRID_SIZE, GRID_SIZE)),
            counts: Array2::zeros((GRID_SIZE, GRID_SIZE)),
            occupancy: Array2::from_elem((GRID_SIZE, GRID_SIZE), false),
            samples: vec![Vec::new(); PIXEL_COUNT],
        }
    }

    /// Adds one hit's amplitude and time to a pixel.
    pub fn push(&mut self, coord: PixelCoord, amplitude: f64, time: f64) {
        let idx = coord.index();
        self.amplitude_sum[idx] += amplitude;
        self.time_sum[idx] += time;
        self.counts[idx] += 1;
        self.occupancy[idx] = true;
        self.samples[coord.flat_index()].push(amplitude);
    }

    /// Occupancy mask, indexed `[row, col]`.
    #[must_use]
    pub fn occupancy(&self) -> &Array2<bool> {
        &self.occupancy
    }

    /// Returns true if the pixel has at least one hit.
    #[must_use]
    pub fn is_occupied(&self, coord: PixelCoord) -> bool {
        self.occupancy[coord.index()]
    }

    /// Number of occupied pixels.
    #[must_use]
    pub fn occupied_count(&self) -> usize {
        self.occupancy.iter().filter(|&&o| o).count()
    }

    /// Occupied pixels in row-major order.
    pub fn occupied_pixels(&self) -> impl Iterator<Item = PixelCoord> + '_ {
        PixelCoord::all().filter(|c| self.is_occupied(*c))
    }

    /// Number of hits on a pixel.
    #[must_use]
    pub fn hit_count(&self, coord: PixelCoord) -> u32 {
        self.counts[coord.index()]
    }

    /// Mean amplitude of a pixel, `None` if unoccupied.
    #[must_use]
    pub fn mean_amplitude(&self, coord: PixelCoord) -> Option<f64> {
        let idx = coord.index();
        self.occupancy[idx].then(|| self.amplitude_sum[idx] / f64::from(self.counts[idx]))
    }

    /// Mean time of a pixel, `None` if unoccupied.
    #[must_use]
    pub fn mean_time(&self, coord: PixelCoord) -> Option<f64> {
        let idx = coord.index();
        self.occupancy[idx].then(|| self.time_sum[idx] / f64::from(self.counts[idx]))
    }

    /// Raw amplitude samples of a pixel.
    #[must_use]
    pub fn samples(&self, coord: PixelCoord) -> &[f64] {
        &self.samples[coord.flat_index()]
    }

    /// Representative amplitude of a pixel under the given statistic.
    #[must_use]
    pub fn representative_amplitude(
        &self,
        coord: PixelCoord,
        statistic: AmplitudeStatistic,
    ) -> Option<f64> {
        statistic.reduce(self.samples(coord))
    }

    /// Mean amplitude map; unoccupied pixels read 0.
    #[must_use]
    pub fn amplitude_map(&self) -> Array2<f64> {
        self.mean_map(&self.amplitude_sum)
    }

    /// Mean time map; unoccupied pixels read 0.
    #[must_use]
    pub fn time_map(&self) -> Array2<f64> {
        self.mean_map(&self.time_sum)
    }

    fn mean_map(&self, sums: &Array2<f64>) -> Array2<f64> {
        let mut out = Array2::zeros((GRID_SIZE, GRID_SIZE));
        ndarray::Zip::from(&mut out)
            .and(sums)
            .and(&self.counts)
            .for_each(|o, &s, &n| {
                if n > 0 {
                    *o = s / f64::from(n);
                }
            });
        out
    }
}
