//! Packet and hit types for pixel readout data.

#![allow(clippy::cast_possible_truncation)]

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Side length of the anode pixel grid.
pub const GRID_SIZE: usize = 21;

/// Number of pixels on the anode plane.
pub const PIXEL_COUNT: usize = GRID_SIZE * GRID_SIZE;

/// Side length of the pixel block read out by one chip.
pub const CHIP_BLOCK: usize = 7;

/// Physical channels per front-end chip (routed or not).
pub const CHANNELS_PER_CHIP: u8 = 64;

/// Front-end packet kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum PacketType {
    /// Digitized charge from one channel.
    Data = 0,
    /// Test pulse packet.
    Test = 1,
    /// Configuration write echo.
    ConfigWrite = 2,
    /// Configuration read-back.
    ConfigRead = 3,
    /// Timestamp packet from the readout board.
    Timestamp = 4,
    /// Free-form message packet.
    Message = 5,
    /// Clock sync packet.
    Sync = 6,
    /// External trigger packet.
    Trigger = 7,
}

impl PacketType {
    /// Creates a `PacketType` from its raw code.
    #[must_use]
    pub fn from_raw(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Data),
            1 => Some(Self::Test),
            2 => Some(Self::ConfigWrite),
            3 => Some(Self::ConfigRead),
            4 => Some(Self::Timestamp),
            5 => Some(Self::Message),
            6 => Some(Self::Sync),
            7 => Some(Self::Trigger),
            _ => None,
        }
    }
}

/// One decoded readout packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RawPacket {
    /// Chip identifier.
    pub chip_id: u8,
    /// Channel on the chip, `0..64`.
    pub channel_id: u8,
    /// Timestamp in clock ticks (0.1 us).
    pub timestamp: u64,
    /// Raw ADC amplitude.
    pub dataword: u16,
    /// Packet kind.
    pub packet_type: PacketType,
    /// Whether the parity check passed.
    pub parity_valid: bool,
}

impl RawPacket {
    /// Creates a valid data packet.
    #[inline]
    #[must_use]
    pub fn data(chip_id: u8, channel_id: u8, timestamp: u64, dataword: u16) -> Self {
        Self {
            chip_id,
            channel_id,
            timestamp,
            dataword,
            packet_type: PacketType::Data,
            parity_valid: true,
        }
    }

    /// Returns true for parity-valid data packets.
    #[inline]
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.packet_type == PacketType::Data && self.parity_valid
    }
}

/// Pixel coordinate on the anode grid.
///
/// `x` is the column and `y` the row; both are in `0..GRID_SIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PixelCoord {
    /// Column.
    pub x: u16,
    /// Row.
    pub y: u16,
}

impl PixelCoord {
    /// Creates a new pixel coordinate.
    #[inline]
    #[must_use]
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Creates a coordinate if it lies on the grid.
    #[must_use]
    pub fn checked(x: u16, y: u16) -> Option<Self> {
        let limit = GRID_SIZE as u16;
        (x < limit && y < limit).then_some(Self { x, y })
    }

    /// Row-major `[row, col]` index into a grid array.
    #[inline]
    #[must_use]
    pub fn index(&self) -> [usize; 2] {
        [self.y as usize, self.x as usize]
    }

    /// Flat row-major index in `0..PIXEL_COUNT`.
    #[inline]
    #[must_use]
    pub fn flat_index(&self) -> usize {
        self.y as usize * GRID_SIZE + self.x as usize
    }

    /// Iterates over every pixel in row-major order.
    pub fn all() -> impl Iterator<Item = PixelCoord> {
        (0..GRID_SIZE as u16).flat_map(|y| (0..GRID_SIZE as u16).map(move |x| Self { x, y }))
    }
}

/// A pedestal-subtracted hit on one pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Hit {
    /// Pixel coordinate.
    pub coord: PixelCoord,
    /// Time in ticks relative to the run origin.
    pub time: u64,
    /// Pedestal-subtracted amplitude.
    pub amplitude: f64,
}

impl Hit {
    /// Creates a new hit.
    #[inline]
    #[must_use]
    pub fn new(x: u16, y: u16, time: u64, amplitude: f64) -> Self {
        Self {
            coord: PixelCoord::new(x, y),
            time,
            amplitude,
        }
    }

    /// Returns the column.
    #[inline]
    #[must_use]
    pub fn x(&self) -> u16 {
        self.coord.x
    }

    /// Returns the row.
    #[inline]
    #[must_use]
    pub fn y(&self) -> u16 {
        self.coord.y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_type_from_raw() {
        assert_eq!(PacketType::from_raw(0), Some(PacketType::Data));
        assert_eq!(PacketType::from_raw(7), Some(PacketType::Trigger));
        assert_eq!(PacketType::from_raw(8), None);
    }

    #[test]
    fn test_packet_usable() {
        let packet = RawPacket::data(12, 3, 100, 80);
        assert!(packet.is_usable());

        let bad_parity = RawPacket {
            parity_valid: false,
            ..packet
        };
        assert!(!bad_parity.is_usable());

        let config = RawPacket {
            packet_type: PacketType::ConfigRead,
            ..packet
        };
        assert!(!config.is_usable());
    }

    #[test]
    fn test_pixel_coord_checked() {
        assert!(PixelCoord::checked(20, 20).is_some());
        assert!(PixelCoord::checked(21, 0).is_none());
        assert!(PixelCoord::checked(0, 21).is_none());
    }

    #[test]
    fn test_pixel_coord_indexing() {
        let coord = PixelCoord::new(3, 2);
        assert_eq!(coord.index(), [2, 3]);
        assert_eq!(coord.flat_index(), 2 * 21 + 3);
        assert_eq!(PixelCoord::all().count(), PIXEL_COUNT);
        assert_eq!(PixelCoord::all().nth(22), Some(PixelCoord::new(1, 1)));
    }

    #[test]
    fn test_hit_accessors() {
        let hit = Hit::new(10, 4, 1000, 42.5);
        assert_eq!(hit.x(), 10);
        assert_eq!(hit.y(), 4);
        assert_eq!(hit.time, 1000);
    }
}
