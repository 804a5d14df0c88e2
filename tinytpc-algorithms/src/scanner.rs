//! Candidate window scanning over a run's time span.
//!
//! The span `[first, last + 1)` of hit times is cut into `bin_count`
//! integer bins with boundaries `b_i = first + ceil(i * L / bin_count)`,
//! `L = last - first + 1`. The bins partition the span exactly; a hit at
//! offset `o` from `first` lands in bin `floor(o * bin_count / L)`.

#![allow(clippy::cast_possible_truncation)]

use tinytpc_core::{CandidateWindow, Error, Hit, ReconstructionConfig, Result, TimeBin};

/// Scans hits for time bins dense enough to hold a track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowScanner {
    bin_count: usize,
    min_hits: usize,
    max_hits: Option<usize>,
}

impl WindowScanner {
    /// Create a scanner. `bin_count` must be at least 1.
    pub fn new(bin_count: usize, min_hits: usize, max_hits: Option<usize>) -> Result<Self> {
        if bin_count == 0 {
            return Err(Error::Config("bin_count must be at least 1".into()));
        }
        Ok(Self {
            bin_count,
            min_hits,
            max_hits,
        })
    }

    /// Create a scanner from the reconstruction settings.
    pub fn from_config(config: &ReconstructionConfig) -> Result<Self> {
        Self::new(config.bin_count, config.min_hits, config.max_hits)
    }

    /// Number of bins.
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// Returns true if a bin with `count` hits is a candidate.
    #[inline]
    #[must_use]
    pub fn accepts(&self, count: usize) -> bool {
        count > self.min_hits && self.max_hits.is_none_or(|max| count < max)
    }

    /// Every bin over the span of `hits`, including empty ones.
    #[must_use]
    pub fn bins(&self, hits: &[Hit]) -> Vec<TimeBin> {
        let Some(span) = Span::of(hits, self.bin_count) else {
            return Vec::new();
        };
        let mut bins: Vec<TimeBin> = (0..self.bin_count)
            .map(|i| TimeBin {
                index: i,
                start_tick: span.boundary(i),
                end_tick: span.boundary(i + 1),
                count: 0,
            })
            .collect();
        for hit in hits {
            bins[span.bin_of(hit.time)].count += 1;
        }
        bins
    }

    /// Candidate windows in time order.
    ///
    /// Each window holds the hits of its bin in input order.
    #[must_use]
    pub fn scan(&self, hits: &[Hit]) -> Vec<CandidateWindow> {
        let Some(span) = Span::of(hits, self.bin_count) else {
            return Vec::new();
        };
        let mut per_bin: Vec<Vec<Hit>> = vec![Vec::new(); self.bin_count];
        for hit in hits {
            per_bin[span.bin_of(hit.time)].push(*hit);
        }
        per_bin
            .into_iter()
            .enumerate()
            .filter(|(_, bin_hits)| self.accepts(bin_hits.len()))
            .map(|(i, bin_hits)| {
                CandidateWindow::new(i, span.boundary(i), span.boundary(i + 1), bin_hits)
            })
            .collect()
    }
}

/// Scan `hits` for candidate windows.
pub fn scan(
    hits: &[Hit],
    bin_count: usize,
    min_hits: usize,
    max_hits: Option<usize>,
) -> Result<Vec<CandidateWindow>> {
    Ok(WindowScanner::new(bin_count, min_hits, max_hits)?.scan(hits))
}

#[derive(Clone, Copy, Debug)]
struct Span {
    first: u64,
    length: u128,
    bins: u128,
}

impl Span {
    fn of(hits: &[Hit], bin_count: usize) -> Option<Self> {
        let first = hits.iter().map(|h| h.time).min()?;
        let last = hits.iter().map(|h| h.time).max()?;
        Some(Self {
            first,
            length: u128::from(last - first) + 1,
            bins: bin_count as u128,
        })
    }

    fn boundary(&self, i: usize) -> u64 {
        let scaled = i as u128 * self.length;
        self.first + scaled.div_ceil(self.bins) as u64
    }

    fn bin_of(&self, time: u64) -> usize {
        (u128::from(time - self.first) * self.bins / self.length) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hits_at(times: &[u64]) -> Vec<Hit> {
        times.iter().map(|&t| Hit::new(0, 0, t, 1.0)).collect()
    }

    #[test]
    fn test_zero_bins_rejected() {
        assert!(matches!(WindowScanner::new(0, 0, None), Err(Error::Config(_))));
        assert!(scan(&hits_at(&[1]), 0, 0, None).is_err());
    }

    #[test]
    fn test_empty_input() {
        let scanner = WindowScanner::new(10, 0, None).unwrap();
        assert!(scanner.scan(&[]).is_empty());
        assert!(scanner.bins(&[]).is_empty());
    }

    #[test]
    fn test_bins_partition_span() {
        let hits = hits_at(&[100, 101, 150, 203, 230]);
        let scanner = WindowScanner::new(7, 0, None).unwrap();
        let bins = scanner.bins(&hits);
        assert_eq!(bins.len(), 7);
        assert_eq!(bins[0].start_tick, 100);
        assert_eq!(bins[6].end_tick, 231);
        for pair in bins.windows(2) {
            assert_eq!(pair[0].end_tick, pair[1].start_tick);
        }
        assert_eq!(bins.iter().map(|b| b.count).sum::<usize>(), hits.len());
        for hit in &hits {
            let owners = bins.iter().filter(|b| b.contains(hit.time)).count();
            assert_eq!(owners, 1);
        }
        for bin in &bins {
            let inside = hits.iter().filter(|h| bin.contains(h.time)).count();
            assert_eq!(inside, bin.count);
        }
    }

    #[test]
    fn test_more_bins_than_ticks() {
        let hits = hits_at(&[5, 6, 7]);
        let bins = WindowScanner::new(10, 0, None).unwrap().bins(&hits);
        assert_eq!(bins.len(), 10);
        assert_eq!(bins[9].end_tick, 8);
        assert_eq!(bins.iter().filter(|b| b.count > 0).count(), 3);
        for bin in bins.iter().filter(|b| b.count > 0) {
            assert_eq!(bin.width(), 1);
        }
    }

    #[test]
    fn test_thresholds_are_strict() {
        // 3 hits in the first bin, 2 in the second, 1 in the third
        let hits = hits_at(&[0, 1, 2, 10, 11, 29]);
        let windows = scan(&hits, 3, 1, Some(3)).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].index, 1);
        assert_eq!(windows[0].start_tick, 10);
        assert_eq!(windows[0].end_tick, 20);
        assert_eq!(windows[0].len(), 2);

        let windows = scan(&hits, 3, 1, None).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].index, 0);
    }

    #[test]
    fn test_windows_cover_span_when_all_bins_populated() {
        let times: Vec<u64> = (0..40).map(|t| 1000 + t * 3).collect();
        let hits = hits_at(&times);
        let windows = scan(&hits, 8, 0, None).unwrap();
        assert_eq!(windows.len(), 8);
        assert_eq!(windows[0].start_tick, 1000);
        assert_eq!(windows[7].end_tick, 1000 + 39 * 3 + 1);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end_tick, pair[1].start_tick);
        }
        assert_eq!(windows.iter().map(CandidateWindow::len).sum::<usize>(), 40);
    }

    #[test]
    fn test_single_tick_run() {
        let hits = hits_at(&[42, 42, 42]);
        let windows = scan(&hits, 4, 2, None).unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_tick, 42);
        assert_eq!(windows[0].end_tick, 43);
    }
}
