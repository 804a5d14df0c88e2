//! Error types for tinytpc-core.

use thiserror::Error;

/// Result type alias for tinytpc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for reconstruction operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No pixel is routed to this electronics address.
    #[error("unknown address: chip {chip_id}, channel {channel_id}")]
    UnknownAddress { chip_id: u8, channel_id: u8 },

    /// Pixel coordinate outside the anode grid.
    #[error("invalid pixel coordinate: ({x}, {y})")]
    InvalidCoordinate { x: u16, y: u16 },

    /// Pixel never fired during the pedestal run.
    #[error("pixel ({x}, {y}) has no pedestal calibration")]
    UncalibratedPixel { x: u16, y: u16 },

    /// Too few points for a line fit.
    #[error("line fit needs at least 3 points, found {found}")]
    InsufficientPoints { found: usize },

    /// Points have no spread, so no direction can be extracted.
    #[error("line fit is degenerate: points have no spatial spread")]
    DegenerateFit,

    /// More than one line was detected in a candidate.
    #[error("ambiguous candidate: {lines} lines detected")]
    AmbiguousLine { lines: usize },

    /// Line and pixel footprint intersect with zero length.
    #[error("zero-length chord through pixel ({x}, {y})")]
    DegenerateChord { x: u16, y: u16 },

    /// Packet stream was empty.
    #[error("run contains no packets")]
    EmptyRun,

    /// Packet stream had no packets that map to a pixel.
    #[error("run contains no usable hits ({packets} packets seen)")]
    NoUsableHits { packets: usize },

    /// Invalid anode layout tables.
    #[error("invalid anode layout: {0}")]
    InvalidLayout(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
