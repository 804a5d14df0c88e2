//! Electronics address to pixel coordinate mapping.

#![allow(clippy::cast_possible_truncation)]

use crate::layout::AnodeLayout;
use tinytpc_core::{Error, PixelCoord, Result, CHANNELS_PER_CHIP, CHIP_BLOCK, PIXEL_COUNT};

/// Maps `(chip_id, channel_id)` to pixel coordinates and back.
///
/// Built once from a validated [`AnodeLayout`] as a two-level lookup:
/// `x = 7 * block_col(chip) + routing_col(channel)` and
/// `y = 7 * block_row(chip) + routing_row(channel)`.
#[derive(Clone, Debug)]
pub struct AddressMapper {
    layout: AnodeLayout,
    /// Block `(row, col)` per chip id.
    chip_block: [Option<(u8, u8)>; 256],
    /// In-block `(row, col)` per channel.
    channel_cell: [Option<(u8, u8)>; CHANNELS_PER_CHIP as usize],
    /// `(chip, channel)` per flat pixel index.
    inverse: [(u8, u8); PIXEL_COUNT],
}

impl Default for AddressMapper {
    fn default() -> Self {
        Self::canonical()
    }
}

impl AddressMapper {
    /// Mapper for the canonical anode.
    #[must_use]
    pub fn canonical() -> Self {
        Self::build(AnodeLayout::canonical())
    }

    /// Mapper for a custom layout, validated first.
    pub fn new(layout: AnodeLayout) -> Result<Self> {
        layout.validate()?;
        Ok(Self::build(layout))
    }

    fn build(layout: AnodeLayout) -> Self {
        let mut chip_block = [None; 256];
        for (row, chips) in layout.chip_grid.iter().enumerate() {
            for (col, &chip) in chips.iter().enumerate() {
                chip_block[chip as usize] = Some((row as u8, col as u8));
            }
        }

        let mut channel_cell = [None; CHANNELS_PER_CHIP as usize];
        for (row, channels) in layout.routing.iter().enumerate() {
            for (col, &channel) in channels.iter().enumerate() {
                channel_cell[channel as usize] = Some((row as u8, col as u8));
            }
        }

        let mut inverse = [(0u8, 0u8); PIXEL_COUNT];
        for (block_row, chips) in layout.chip_grid.iter().enumerate() {
            for (block_col, &chip) in chips.iter().enumerate() {
                for (row, channels) in layout.routing.iter().enumerate() {
                    for (col, &channel) in channels.iter().enumerate() {
                        let coord = PixelCoord::new(
                            (block_col * CHIP_BLOCK + col) as u16,
                            (block_row * CHIP_BLOCK + row) as u16,
                        );
                        inverse[coord.flat_index()] = (chip, channel);
                    }
                }
            }
        }

        Self {
            layout,
            chip_block,
            channel_cell,
            inverse,
        }
    }

    /// Layout this mapper was built from.
    #[must_use]
    pub fn layout(&self) -> &AnodeLayout {
        &self.layout
    }

    /// Pixel wired to `(chip_id, channel_id)`.
    ///
    /// Unknown chips and unrouted channels are rejected with
    /// [`Error::UnknownAddress`].
    #[inline]
    pub fn map(&self, chip_id: u8, channel_id: u8) -> Result<PixelCoord> {
        let unknown = Error::UnknownAddress {
            chip_id,
            channel_id,
        };
        let (block_row, block_col) = self.chip_block[chip_id as usize].ok_or(unknown.clone())?;
        let (row, col) = self
            .channel_cell
            .get(channel_id as usize)
            .copied()
            .flatten()
            .ok_or(unknown)?;
        let block = CHIP_BLOCK as u16;
        Ok(PixelCoord::new(
            u16::from(block_col) * block + u16::from(col),
            u16::from(block_row) * block + u16::from(row),
        ))
    }

    /// Electronics address `(chip_id, channel_id)` of a pixel.
    pub fn address_of(&self, coord: PixelCoord) -> Result<(u8, u8)> {
        PixelCoord::checked(coord.x, coord.y)
            .map(|c| self.inverse[c.flat_index()])
            .ok_or(Error::InvalidCoordinate {
                x: coord.x,
                y: coord.y,
            })
    }

    /// Returns true if the chip is on the anode.
    #[must_use]
    pub fn has_chip(&self, chip_id: u8) -> bool {
        self.chip_block[chip_id as usize].is_some()
    }

    /// Channels wired to pixels.
    pub fn routed_channels(&self) -> impl Iterator<Item = u8> + '_ {
        self.layout.routed_channels()
    }

    /// Channels with no pixel.
    #[must_use]
    pub fn unrouted_channels(&self) -> Vec<u8> {
        self.layout.unrouted_channels()
    }

    /// Chips on the anode, block row-major.
    pub fn chip_ids(&self) -> impl Iterator<Item = u8> + '_ {
        self.layout.chip_ids()
    }

    /// The 49 pixels read out by a chip, row-major inside the block.
    pub fn pixels_of_chip(&self, chip_id: u8) -> Result<Vec<PixelCoord>> {
        let (block_row, block_col) =
            self.chip_block[chip_id as usize].ok_or(Error::UnknownAddress {
                chip_id,
                channel_id: 0,
            })?;
        let block = CHIP_BLOCK as u16;
        let x0 = u16::from(block_col) * block;
        let y0 = u16::from(block_row) * block;
        Ok((0..block)
            .flat_map(|dy| (0..block).map(move |dx| PixelCoord::new(x0 + dx, y0 + dy)))
            .collect())
    }
}
