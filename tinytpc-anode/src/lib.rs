//! tinytpc-anode: Anode readout geometry and per-run hit preparation.
//!
//! This crate turns decoded front-end packets into pedestal-subtracted hits
//! on the 21x21 anode grid.
//!
//! # Key Components
//!
//! - [`AnodeLayout`] - Chip placement and channel routing tables
//! - [`AddressMapper`] - `(chip_id, channel_id)` to pixel lookup
//! - [`PedestalMap`] - Per-pixel baselines with calibration flags
//! - [`HitTableBuilder`] - Filters, maps and orders a run's packets
//! - [`ChannelMask`] - Channels disabled in the front-end configuration
//! - [`ChargeCalibration`] - Linear ADC to charge conversion

pub mod channel_mask;
pub mod charge;
pub mod hit_table;
pub mod layout;
pub mod mapping;
pub mod pedestal;

pub use channel_mask::ChannelMask;
pub use charge::ChargeCalibration;
pub use hit_table::{HitTable, HitTableBuilder, HitTableStats};
pub use layout::{AnodeLayout, CANONICAL_CHIP_GRID, CANONICAL_ROUTING, CHIP_GRID};
pub use mapping::AddressMapper;
pub use pedestal::{PedestalMap, PixelStats};

// Re-export core types for convenience
pub use tinytpc_core::{Hit, PixelCoord, RawPacket};
