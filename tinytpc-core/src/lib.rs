//! tinytpc-core: Core types for pixelated TPC track reconstruction.
//!
//! This crate holds the data model shared by every stage of the pipeline:
//! readout packets and hits, time windows, projected grids, fitted lines
//! and the reconstruction configuration.

pub mod config;
pub mod error;
pub mod grid;
pub mod hit;
pub mod track;
pub mod window;

pub use config::{DriftModel, HoughConfig, MobilityCoefficients, ReconstructionConfig};
pub use error::{Error, Result};
pub use grid::{AmplitudeStatistic, ProjectedGrid};
pub use hit::{
    Hit, PacketType, PixelCoord, RawPacket, CHANNELS_PER_CHIP, CHIP_BLOCK, GRID_SIZE,
    PIXEL_COUNT,
};
pub use track::{DxDSample, FittedLine2D, FittedLine3D, LineClass, LineSegment};
pub use window::{CandidateWindow, TimeBin, WindowId};
