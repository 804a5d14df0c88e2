//! Spatial projection of a candidate window onto the anode grid.

#![allow(clippy::cast_precision_loss)]

use tinytpc_core::{CandidateWindow, ProjectedGrid};

/// Project a candidate's hits onto the grid.
///
/// Per pixel this keeps the mean amplitude, the mean time relative to the
/// window's earliest hit and the raw amplitude samples.
#[must_use]
pub fn project(window: &CandidateWindow) -> ProjectedGrid {
    let mut grid = ProjectedGrid::new();
    let Some(t0) = window.first_hit_time() else {
        return grid;
    };
    for hit in &window.hits {
        grid.push(hit.coord, hit.amplitude, (hit.time - t0) as f64);
    }
    grid
}
