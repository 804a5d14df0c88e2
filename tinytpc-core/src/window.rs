//! Time windows over a run's hit table.

use crate::Hit;

/// One time bin of a run, with its hit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBin {
    /// Bin index in `0..bin_count`.
    pub index: usize,
    /// First tick in the bin.
    pub start_tick: u64,
    /// One past the last tick in the bin.
    pub end_tick: u64,
    /// Number of hits that fell in the bin.
    pub count: usize,
}

impl TimeBin {
    /// Bin width in ticks.
    #[must_use]
    pub fn width(&self) -> u64 {
        self.end_tick - self.start_tick
    }

    /// Returns true if `tick` lies in `[start_tick, end_tick)`.
    #[must_use]
    pub fn contains(&self, tick: u64) -> bool {
        (self.start_tick..self.end_tick).contains(&tick)
    }
}

/// A time slice flagged as a possible track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateWindow {
    /// Index of the bin this window came from.
    pub index: usize,
    /// First tick in the window.
    pub start_tick: u64,
    /// One past the last tick in the window.
    pub end_tick: u64,
    /// Hits with `start_tick <= time < end_tick`, in run order.
    pub hits: Vec<Hit>,
}

impl CandidateWindow {
    /// Creates a window from a bin and its hits.
    #[must_use]
    pub fn new(index: usize, start_tick: u64, end_tick: u64, hits: Vec<Hit>) -> Self {
        Self {
            index,
            start_tick,
            end_tick,
            hits,
        }
    }

    /// Creates a window spanning exactly the given hits.
    #[must_use]
    pub fn from_hits(index: usize, hits: Vec<Hit>) -> Self {
        let start_tick = hits.iter().map(|h| h.time).min().unwrap_or(0);
        let end_tick = hits.iter().map(|h| h.time + 1).max().unwrap_or(0);
        Self::new(index, start_tick, end_tick, hits)
    }

    /// Number of hits in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if the window holds no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Earliest hit time in the window.
    #[must_use]
    pub fn first_hit_time(&self) -> Option<u64> {
        self.hits.iter().map(|h| h.time).min()
    }

    /// Identity of the window for downstream hand-off.
    #[must_use]
    pub fn id(&self) -> WindowId {
        WindowId {
            index: self.index,
            start_tick: self.start_tick,
            end_tick: self.end_tick,
        }
    }
}

/// Identity of a candidate window, without its hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId {
    /// Bin index.
    pub index: usize,
    /// First tick.
    pub start_tick: u64,
    /// One past the last tick.
    pub end_tick: u64,
}
