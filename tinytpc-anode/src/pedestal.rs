//! Per-pixel pedestal baselines.

#![allow(clippy::cast_precision_loss)]

use crate::mapping::AddressMapper;
use log::{debug, warn};
use ndarray::Array2;
use tinytpc_core::{Error, PixelCoord, RawPacket, Result, GRID_SIZE};

/// Pedestal-run statistics of one pixel.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PixelStats {
    /// Number of hits seen.
    pub count: usize,
    /// Mean amplitude.
    pub mean: f64,
    /// Population standard deviation of the amplitude.
    pub std: f64,
}

/// Baseline amplitude per pixel, with a calibrated flag.
///
/// Pixels that never fired in the pedestal run carry baseline 0 and are
/// flagged uncalibrated; subtraction on them leaves the amplitude unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct PedestalMap {
    baselines: Array2<f64>,
    calibrated: Array2<bool>,
    stats: Option<Array2<PixelStats>>,
    live_time_ticks: Option<u64>,
}

impl PedestalMap {
    /// Load precomputed baselines, indexed `[row, col]`.
    ///
    /// An entry of exactly 0.0 marks a pixel that never fired and is
    /// flagged uncalibrated.
    pub fn load(baselines: Array2<f64>) -> Result<Self> {
        if baselines.dim() != (GRID_SIZE, GRID_SIZE) {
            return Err(Error::Config(format!(
                "pedestal table must be {GRID_SIZE}x{GRID_SIZE}, got {:?}",
                baselines.dim()
            )));
        }
        if let Some(bad) = baselines.iter().find(|v| !v.is_finite()) {
            return Err(Error::Config(format!("non-finite pedestal value {bad}")));
        }
        #[allow(clippy::float_cmp)]
        let calibrated = baselines.mapv(|v| v != 0.0);
        let map = Self {
            baselines,
            calibrated,
            stats: None,
            live_time_ticks: None,
        };
        let missing = map.uncalibrated_pixels().len();
        if missing > 0 {
            warn!("Pedestal table has {missing} uncalibrated pixels");
        }
        Ok(map)
    }

    /// Build baselines from a zero-signal run.
    ///
    /// Each pixel's baseline is the mean amplitude of its usable packets.
    /// Unusable packets and unknown addresses are skipped. A pixel whose mean
    /// is exactly 0 is flagged uncalibrated, as [`load`](Self::load) would
    /// read it back from a table.
    #[must_use]
    pub fn from_packets(packets: &[RawPacket], mapper: &AddressMapper) -> Self {
        let mut stats = Array2::from_elem((GRID_SIZE, GRID_SIZE), PixelStats::default());
        // Welford accumulators: running mean in `stats`, sum of squared deviations here
        let mut m2 = Array2::<f64>::zeros((GRID_SIZE, GRID_SIZE));
        let mut first_tick = u64::MAX;
        let mut last_tick = 0u64;
        let mut skipped = 0usize;

        for packet in packets.iter().filter(|p| p.is_usable()) {
            let Ok(coord) = mapper.map(packet.chip_id, packet.channel_id) else {
                skipped += 1;
                continue;
            };
            first_tick = first_tick.min(packet.timestamp);
            last_tick = last_tick.max(packet.timestamp);

            let idx = coord.index();
            let value = f64::from(packet.dataword);
            let s = &mut stats[idx];
            s.count += 1;
            let delta = value - s.mean;
            s.mean += delta / s.count as f64;
            m2[idx] += delta * (value - s.mean);
        }
        if skipped > 0 {
            debug!("Pedestal run: skipped {skipped} packets with unknown addresses");
        }

        for (s, &m) in stats.iter_mut().zip(m2.iter()) {
            if s.count > 0 {
                s.std = (m / s.count as f64).sqrt();
            }
        }

        let baselines = stats.mapv(|s| s.mean);
        #[allow(clippy::float_cmp)]
        let zero_mean = stats.iter().filter(|s| s.count > 0 && s.mean == 0.0).count();
        if zero_mean > 0 {
            warn!("{zero_mean} pixels fired with a zero pedestal and are treated as uncalibrated");
        }
        #[allow(clippy::float_cmp)]
        let calibrated = stats.mapv(|s| s.count > 0 && s.mean != 0.0);
        let live_time_ticks = (first_tick <= last_tick).then(|| last_tick - first_tick);

        let map = Self {
            baselines,
            calibrated,
            stats: Some(stats),
            live_time_ticks,
        };

        let missing = map.uncalibrated_pixels().len();
        if missing > 0 {
            let chips = map.fully_uncalibrated_chips(mapper);
            if chips.is_empty() {
                warn!("Pedestal run left {missing} pixels uncalibrated");
            } else {
                warn!(
                    "Pedestal run left {missing} pixels uncalibrated (chips with no data: {chips:?})"
                );
            }
        }
        map
    }

    /// Baseline of a pixel (0 when uncalibrated).
    #[inline]
    #[must_use]
    pub fn baseline(&self, coord: PixelCoord) -> f64 {
        self.baselines[coord.index()]
    }

    /// Full baseline table, indexed `[row, col]`.
    #[must_use]
    pub fn baselines(&self) -> &Array2<f64> {
        &self.baselines
    }

    /// Returns true if the pixel has a measured baseline.
    #[inline]
    #[must_use]
    pub fn is_calibrated(&self, coord: PixelCoord) -> bool {
        self.calibrated[coord.index()]
    }

    /// Amplitude minus the pixel's baseline.
    #[inline]
    #[must_use]
    pub fn subtract(&self, amplitude: f64, coord: PixelCoord) -> f64 {
        amplitude - self.baseline(coord)
    }

    /// Like [`subtract`](Self::subtract), but fails on uncalibrated pixels.
    pub fn subtract_checked(&self, amplitude: f64, coord: PixelCoord) -> Result<f64> {
        if self.is_calibrated(coord) {
            Ok(self.subtract(amplitude, coord))
        } else {
            Err(Error::UncalibratedPixel {
                x: coord.x,
                y: coord.y,
            })
        }
    }

    /// Uncalibrated pixels in row-major order.
    #[must_use]
    pub fn uncalibrated_pixels(&self) -> Vec<PixelCoord> {
        PixelCoord::all()
            .filter(|c| !self.is_calibrated(*c))
            .collect()
    }

    /// Chips whose every pixel is uncalibrated.
    #[must_use]
    pub fn fully_uncalibrated_chips(&self, mapper: &AddressMapper) -> Vec<u8> {
        mapper
            .chip_ids()
            .filter(|&chip| {
                mapper
                    .pixels_of_chip(chip)
                    .is_ok_and(|pixels| pixels.iter().all(|p| !self.is_calibrated(*p)))
            })
            .collect()
    }

    /// Pedestal-run statistics of a pixel, if built from packets.
    #[must_use]
    pub fn stats(&self, coord: PixelCoord) -> Option<PixelStats> {
        self.stats.as_ref().map(|s| s[coord.index()])
    }

    /// Span of the pedestal run in ticks, if built from packets.
    #[must_use]
    pub fn live_time_ticks(&self) -> Option<u64> {
        self.live_time_ticks
    }

    /// Trigger rate of a pixel in Hz, given the tick length in microseconds.
    #[must_use]
    pub fn rate_hz(&self, coord: PixelCoord, tick_us: f64) -> Option<f64> {
        let stats = self.stats(coord)?;
        let live_s = self.live_time_ticks? as f64 * tick_us * 1e-6;
        (live_s > 0.0).then(|| stats.count as f64 / live_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn zero_signal_run(mapper: &AddressMapper, skip_chip: Option<u8>) -> Vec<RawPacket> {
        let mut packets = Vec::new();
        let mut ts = 0u64;
        for chip in mapper.chip_ids().collect::<Vec<_>>() {
            if Some(chip) == skip_chip {
                continue;
            }
            for channel in mapper.routed_channels() {
                for dw in [70u16, 72, 74] {
                    packets.push(RawPacket::data(chip, channel, ts, dw + u16::from(chip % 3)));
                    ts += 1;
                }
            }
        }
        packets
    }

    #[test]
    fn test_from_packets_means() {
        let mapper = AddressMapper::canonical();
        let map = PedestalMap::from_packets(&zero_signal_run(&mapper, None), &mapper);
        assert!(map.uncalibrated_pixels().is_empty());

        let coord = mapper.map(12, 28).unwrap();
        assert_relative_eq!(map.baseline(coord), 72.0);
        let stats = map.stats(coord).unwrap();
        assert_eq!(stats.count, 3);
        assert_relative_eq!(stats.std, (8.0f64 / 3.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_idempotent_subtraction() {
        let mapper = AddressMapper::canonical();
        let map = PedestalMap::from_packets(&zero_signal_run(&mapper, None), &mapper);
        for coord in PixelCoord::all() {
            let mean = map.stats(coord).unwrap().mean;
            assert_relative_eq!(map.subtract(mean, coord), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_missing_chip_is_flagged() {
        let mapper = AddressMapper::canonical();
        let map = PedestalMap::from_packets(&zero_signal_run(&mapper, Some(13)), &mapper);
        let missing = map.uncalibrated_pixels();
        assert_eq!(missing.len(), 49);
        assert!(missing.iter().all(|p| (7..14).contains(&p.x) && p.y < 7));
        assert_eq!(map.fully_uncalibrated_chips(&mapper), vec![13]);

        let coord = PixelCoord::new(8, 2);
        assert_relative_eq!(map.baseline(coord), 0.0);
        assert_relative_eq!(map.subtract(90.0, coord), 90.0);
        assert_eq!(
            map.subtract_checked(90.0, coord),
            Err(Error::UncalibratedPixel { x: 8, y: 2 })
        );
    }

    #[test]
    fn test_invalid_packets_ignored() {
        let mapper = AddressMapper::canonical();
        let mut bad = RawPacket::data(12, 28, 0, 200);
        bad.parity_valid = false;
        let packets = vec![bad, RawPacket::data(12, 28, 10, 60), RawPacket::data(99, 1, 5, 7)];
        let map = PedestalMap::from_packets(&packets, &mapper);
        assert_relative_eq!(map.baseline(PixelCoord::new(0, 0)), 60.0);
        assert_eq!(map.live_time_ticks(), Some(0));
    }

    #[test]
    fn test_zero_mean_pixel_is_uncalibrated() {
        let mapper = AddressMapper::canonical();
        let packets = vec![
            RawPacket::data(12, 28, 0, 0),
            RawPacket::data(12, 28, 10, 0),
            RawPacket::data(12, 19, 20, 64),
        ];
        let map = PedestalMap::from_packets(&packets, &mapper);
        let dead = PixelCoord::new(0, 0);
        assert!(!map.is_calibrated(dead));
        assert_eq!(map.stats(dead).unwrap().count, 2);
        assert_relative_eq!(map.subtract(40.0, dead), 40.0);
        assert!(map.uncalibrated_pixels().contains(&dead));
        assert_eq!(map.uncalibrated_pixels().len(), GRID_SIZE * GRID_SIZE - 1);
    }

    #[test]
    fn test_rate() {
        let mapper = AddressMapper::canonical();
        let packets = vec![
            RawPacket::data(12, 28, 0, 60),
            RawPacket::data(12, 28, 5_000_000, 60),
            RawPacket::data(12, 19, 10_000_000, 60),
        ];
        let map = PedestalMap::from_packets(&packets, &mapper);
        // 10^7 ticks of 0.1 us is one second
        assert_relative_eq!(map.rate_hz(PixelCoord::new(0, 0), 0.1).unwrap(), 2.0);
    }

    #[test]
    fn test_load_zero_marks_uncalibrated() {
        let mut table = Array2::from_elem((GRID_SIZE, GRID_SIZE), 75.0);
        table[[3, 5]] = 0.0;
        let map = PedestalMap::load(table).unwrap();
        assert_eq!(map.uncalibrated_pixels(), vec![PixelCoord::new(5, 3)]);
        assert!(map.stats(PixelCoord::new(0, 0)).is_none());
    }

    #[test]
    fn test_load_rejects_bad_shape() {
        assert!(PedestalMap::load(Array2::zeros((20, 21))).is_err());
        let mut table = Array2::from_elem((GRID_SIZE, GRID_SIZE), 1.0);
        table[[0, 0]] = f64::NAN;
        assert!(PedestalMap::load(table).is_err());
    }
}
