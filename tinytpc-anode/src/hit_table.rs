//! Builds a run's time-ordered, pedestal-subtracted hit table.

use crate::channel_mask::ChannelMask;
use crate::mapping::AddressMapper;
use crate::pedestal::PedestalMap;
use log::{debug, warn};
use rayon::prelude::*;
use tinytpc_core::{Hit, RawPacket};

/// Counters collected while building a hit table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HitTableStats {
    /// Packets offered to the builder.
    pub packets_seen: usize,
    /// Non-data or parity-failed packets.
    pub invalid_discarded: usize,
    /// Data packets from unknown chips or unrouted channels.
    pub unknown_address_dropped: usize,
    /// Data packets from disabled channels.
    pub masked_dropped: usize,
    /// Kept hits on pixels without a pedestal.
    pub uncalibrated_hits: usize,
    /// Hits in the table.
    pub hits_kept: usize,
}

/// Hits of one run, ordered by time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitTable {
    /// Hits, stably sorted by time.
    pub hits: Vec<Hit>,
    /// Absolute tick that hit times are relative to.
    pub origin_tick: u64,
    /// Build counters.
    pub stats: HitTableStats,
}

impl HitTable {
    /// Number of hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if there are no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Relative time span `(first, last)`, if any hits.
    #[must_use]
    pub fn time_span(&self) -> Option<(u64, u64)> {
        Some((self.hits.first()?.time, self.hits.last()?.time))
    }
}

/// Turns raw packets into a [`HitTable`].
#[derive(Debug, Clone, Copy)]
pub struct HitTableBuilder<'a> {
    mapper: &'a AddressMapper,
    pedestal: &'a PedestalMap,
    mask: Option<&'a ChannelMask>,
}

impl<'a> HitTableBuilder<'a> {
    /// Creates a builder over a mapper and pedestal.
    #[must_use]
    pub fn new(mapper: &'a AddressMapper, pedestal: &'a PedestalMap) -> Self {
        Self {
            mapper,
            pedestal,
            mask: None,
        }
    }

    /// Drops packets from channels disabled in `mask`.
    #[must_use]
    pub fn with_mask(mut self, mask: &'a ChannelMask) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Filters, maps and pedestal-subtracts the packets.
    ///
    /// Dropped packets are counted, never fatal. Hits are not deduplicated.
    #[must_use]
    pub fn build(&self, packets: &[RawPacket]) -> HitTable {
        let mut stats = HitTableStats {
            packets_seen: packets.len(),
            ..HitTableStats::default()
        };

        let mut mapped = Vec::with_capacity(packets.len());
        for packet in packets {
            if !packet.is_usable() {
                stats.invalid_discarded += 1;
                continue;
            }
            let Ok(coord) = self.mapper.map(packet.chip_id, packet.channel_id) else {
                stats.unknown_address_dropped += 1;
                continue;
            };
            if self
                .mask
                .is_some_and(|m| m.is_masked(packet.chip_id, packet.channel_id))
            {
                stats.masked_dropped += 1;
                continue;
            }
            if !self.pedestal.is_calibrated(coord) {
                stats.uncalibrated_hits += 1;
            }
            let amplitude = self.pedestal.subtract(f64::from(packet.dataword), coord);
            mapped.push((coord, packet.timestamp, amplitude));
        }

        let origin_tick = mapped.iter().map(|&(_, t, _)| t).min().unwrap_or(0);
        let mut hits: Vec<Hit> = mapped
            .into_iter()
            .map(|(coord, t, amplitude)| Hit {
                coord,
                time: t - origin_tick,
                amplitude,
            })
            .collect();
        // Stable, so equal-time hits keep packet order
        hits.par_sort_by_key(|h| h.time);
        stats.hits_kept = hits.len();

        if stats.unknown_address_dropped > 0 {
            warn!(
                "Dropped {} packets with unknown addresses",
                stats.unknown_address_dropped
            );
        }
        if stats.uncalibrated_hits > 0 {
            warn!(
                "{} hits fall on pixels without a pedestal",
                stats.uncalibrated_hits
            );
        }
        debug!(
            "Hit table: {} of {} packets kept ({} invalid, {} masked)",
            stats.hits_kept, stats.packets_seen, stats.invalid_discarded, stats.masked_dropped
        );

        HitTable {
            hits,
            origin_tick,
            stats,
        }
    }
}
