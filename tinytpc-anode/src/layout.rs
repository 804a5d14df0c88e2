//! Anode layout tables: chip placement and per-chip channel routing.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tinytpc_core::{Error, Result, CHANNELS_PER_CHIP, CHIP_BLOCK};

/// Number of chip blocks along each side of the anode.
pub const CHIP_GRID: usize = 3;

/// Canonical chip placement, top row first.
pub const CANONICAL_CHIP_GRID: [[u8; CHIP_GRID]; CHIP_GRID] =
    [[12, 13, 14], [22, 23, 24], [32, 33, 34]];

/// Canonical channel routing inside one 7x7 chip block, row-major.
pub const CANONICAL_ROUTING: [[u8; CHIP_BLOCK]; CHIP_BLOCK] = [
    [28, 19, 20, 17, 13, 10, 3],
    [29, 26, 21, 16, 12, 5, 2],
    [30, 27, 18, 15, 11, 4, 1],
    [31, 32, 42, 14, 49, 0, 63],
    [33, 36, 43, 46, 50, 59, 62],
    [34, 37, 44, 47, 51, 58, 61],
    [35, 41, 45, 48, 53, 52, 60],
];

/// Placement of chips on the anode and of channels inside each chip block.
///
/// `chip_grid[row][col]` is the chip reading out block `(row, col)`;
/// `routing[row][col]` is the channel wired to that pixel inside a block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnodeLayout {
    /// Chip identifiers per block, row-major.
    pub chip_grid: [[u8; CHIP_GRID]; CHIP_GRID],
    /// Channel per pixel inside a block, row-major.
    pub routing: [[u8; CHIP_BLOCK]; CHIP_BLOCK],
}

impl Default for AnodeLayout {
    fn default() -> Self {
        Self::canonical()
    }
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonLayout {
    chip_grid: Option<[[u8; CHIP_GRID]; CHIP_GRID]>,
    channel_routing: Option<[[u8; CHIP_BLOCK]; CHIP_BLOCK]>,
}

impl AnodeLayout {
    /// The canonical 3x3-chip anode.
    #[must_use]
    pub fn canonical() -> Self {
        Self {
            chip_grid: CANONICAL_CHIP_GRID,
            routing: CANONICAL_ROUTING,
        }
    }

    /// Load a layout from a JSON file.
    ///
    /// Missing tables fall back to the canonical ones. The result is validated.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| Error::InvalidLayout(format!("{}: {e}", path.display())))?;
        let json: JsonLayout = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::InvalidLayout(e.to_string()))?;
        Self::from_json_layout(json)
    }

    /// Load a layout from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let json: JsonLayout =
            serde_json::from_str(json).map_err(|e| Error::InvalidLayout(e.to_string()))?;
        Self::from_json_layout(json)
    }

    fn from_json_layout(json: JsonLayout) -> Result<Self> {
        let layout = Self {
            chip_grid: json.chip_grid.unwrap_or(CANONICAL_CHIP_GRID),
            routing: json.channel_routing.unwrap_or(CANONICAL_ROUTING),
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Check for duplicate chips, duplicate or out-of-range channels.
    ///
    /// A layout that passes maps the 9 x 49 (chip, routed channel) pairs
    /// one-to-one onto the 441 pixels.
    pub fn validate(&self) -> Result<()> {
        let mut seen_chips = [false; 256];
        for &chip in self.chip_grid.iter().flatten() {
            if std::mem::replace(&mut seen_chips[chip as usize], true) {
                return Err(Error::InvalidLayout(format!(
                    "chip {chip} appears more than once in the chip grid"
                )));
            }
        }

        let mut seen_channels = [false; CHANNELS_PER_CHIP as usize];
        for &channel in self.routing.iter().flatten() {
            if channel >= CHANNELS_PER_CHIP {
                return Err(Error::InvalidLayout(format!(
                    "channel {channel} is out of range (0..{CHANNELS_PER_CHIP})"
                )));
            }
            if std::mem::replace(&mut seen_channels[channel as usize], true) {
                return Err(Error::InvalidLayout(format!(
                    "channel {channel} is routed to more than one pixel"
                )));
            }
        }
        Ok(())
    }

    /// Channels wired to a pixel, in routing-table order.
    pub fn routed_channels(&self) -> impl Iterator<Item = u8> + '_ {
        self.routing.iter().flatten().copied()
    }

    /// Channels with no pixel, ascending.
    #[must_use]
    pub fn unrouted_channels(&self) -> Vec<u8> {
        let mut routed = [false; CHANNELS_PER_CHIP as usize];
        for channel in self.routed_channels() {
            routed[channel as usize] = true;
        }
        (0..CHANNELS_PER_CHIP)
            .filter(|&ch| !routed[ch as usize])
            .collect()
    }

    /// Chip identifiers in block row-major order.
    pub fn chip_ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.chip_grid.iter().flatten().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_is_valid() {
        assert!(AnodeLayout::canonical().validate().is_ok());
    }

    #[test]
    fn test_canonical_unrouted_channels() {
        assert_eq!(
            AnodeLayout::canonical().unrouted_channels(),
            vec![6, 7, 8, 9, 22, 23, 24, 25, 38, 39, 40, 54, 55, 56, 57]
        );
    }

    #[test]
    fn test_duplicate_chip_rejected() {
        let mut layout = AnodeLayout::canonical();
        layout.chip_grid[2][2] = 12;
        assert!(matches!(layout.validate(), Err(Error::InvalidLayout(_))));
    }

    #[test]
    fn test_duplicate_channel_rejected() {
        let mut layout = AnodeLayout::canonical();
        layout.routing[6][6] = 28;
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_out_of_range_channel_rejected() {
        let mut layout = AnodeLayout::canonical();
        layout.routing[0][0] = 64;
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_from_json_defaults() {
        let layout = AnodeLayout::from_json("{}").unwrap();
        assert_eq!(layout, AnodeLayout::canonical());
    }

    #[test]
    fn test_from_json_custom_chips() {
        let json = r#"{"chip_grid": [[1, 2, 3], [4, 5, 6], [7, 8, 9]]}"#;
        let layout = AnodeLayout::from_json(json).unwrap();
        assert_eq!(layout.chip_grid[1][1], 5);
        assert_eq!(layout.routing, CANONICAL_ROUTING);
    }

    #[test]
    fn test_from_json_rejects_duplicates() {
        let json = r#"{"chip_grid": [[1, 1, 3], [4, 5, 6], [7, 8, 9]]}"#;
        assert!(AnodeLayout::from_json(json).is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.json");
        std::fs::write(&path, r#"{"chip_grid": [[12, 13, 14], [22, 23, 24], [32, 33, 34]]}"#)
            .unwrap();
        let layout = AnodeLayout::from_file(&path).unwrap();
        assert_eq!(layout, AnodeLayout::canonical());
        assert!(AnodeLayout::from_file(dir.path().join("missing.json")).is_err());
    }
}
