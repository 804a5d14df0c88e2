//! tinytpc-algorithms: Track finding and fitting for pixel TPC runs.
//!
//! This crate provides the reconstruction stages after hit preparation:
//! - **Scanner** - Equal-width time bins, dense bins become candidates
//! - **Projection** - Per-pixel means and samples on the anode grid
//! - **Hough** - Progressive probabilistic Hough transform
//! - **Line2D** - Single, degenerate, ambiguous or no-line classification
//! - **Line3D** - Principal-component line fit in detector space
//! - **dE/dx** - Per-pixel chord lengths and amplitude per length
//!
#![warn(missing_docs)]

mod dedx;
mod hough;
mod line2d;
mod line3d;
mod processing;
mod projection;
mod scanner;

pub use dedx::{DedxEstimate, DedxEstimator};
pub use hough::ProbabilisticHough;
pub use line2d::{line_accuracy, line_band, LineDetector};
pub use line3d::{drift_span, fit_line, hit_points};
pub use processing::{
    reconstruct_run, reconstruct_runs, truncate_candidates, CandidateResult, CandidateStatus,
    Reconstructor, RunReconstruction,
};
pub use projection::project;
pub use scanner::{scan, WindowScanner};

// Re-export core configuration
pub use tinytpc_core::{HoughConfig, ReconstructionConfig};
