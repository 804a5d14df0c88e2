//! Run-level reconstruction: hit table, window scan and per-candidate fits.

use crate::dedx::{DedxEstimate, DedxEstimator};
use crate::line2d::LineDetector;
use crate::line3d::{drift_span, fit_line, hit_points};
use crate::projection::project;
use crate::scanner::WindowScanner;
use log::{debug, info, warn};
use rayon::prelude::*;
use tinytpc_anode::{AddressMapper, ChannelMask, HitTableBuilder, HitTableStats, PedestalMap};
use tinytpc_core::{
    CandidateWindow, Error, FittedLine2D, FittedLine3D, LineClass, RawPacket,
    ReconstructionConfig, Result, WindowId,
};

/// Outcome of one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateStatus {
    /// Line fitted and dE/dx computed.
    Fitted,
    /// Several lines; kept for display only.
    Ambiguous,
    /// No line, or a single line below the accuracy cutoff.
    NotTrackLike,
    /// Track-like in 2D but the 3D fit failed.
    FitFailed(Error),
}

impl CandidateStatus {
    /// Short lowercase name used in tables.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fitted => "fitted",
            Self::Ambiguous => "ambiguous",
            Self::NotTrackLike => "not_track_like",
            Self::FitFailed(Error::InsufficientPoints { .. }) => "insufficient_points",
            Self::FitFailed(Error::DegenerateFit) => "degenerate_fit",
            Self::FitFailed(_) => "fit_failed",
        }
    }
}

/// Reconstruction result of one candidate window.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateResult {
    /// Window identity.
    pub window: WindowId,
    /// Hits in the window.
    pub hit_count: usize,
    /// Occupied pixels in the window.
    pub occupied_pixels: usize,
    /// 2D line classification.
    pub line2d: FittedLine2D,
    /// 3D line, when fitted.
    pub line3d: Option<FittedLine3D>,
    /// dE/dx samples, empty unless fitted.
    pub dedx: DedxEstimate,
    /// Outcome.
    pub status: CandidateStatus,
}

/// Reconstruction of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReconstruction {
    /// Hit table build counters.
    pub hit_stats: HitTableStats,
    /// Absolute tick of relative time 0.
    pub origin_tick: u64,
    /// Candidate windows found before the cap.
    pub candidates_found: usize,
    /// Candidates dropped by the cap.
    pub candidates_dropped: usize,
    /// Results in window order.
    pub candidates: Vec<CandidateResult>,
}

impl RunReconstruction {
    /// Candidates that produced dE/dx samples.
    pub fn fitted(&self) -> impl Iterator<Item = &CandidateResult> {
        self.candidates
            .iter()
            .filter(|c| c.status == CandidateStatus::Fitted)
    }
}

/// Keep at most `cap` candidates, earliest first. Returns how many were dropped.
pub fn truncate_candidates(windows: &mut Vec<CandidateWindow>, cap: Option<usize>) -> usize {
    match cap {
        Some(cap) if windows.len() > cap => {
            let dropped = windows.len() - cap;
            warn!(
                "{} candidate windows exceed the cap of {cap}; keeping the earliest",
                windows.len()
            );
            windows.truncate(cap);
            dropped
        }
        _ => 0,
    }
}

/// Reconstructs runs against a fixed mapper, pedestal and configuration.
///
/// Holds only shared references, so one instance serves many runs in parallel.
#[derive(Debug, Clone)]
pub struct Reconstructor<'a> {
    mapper: &'a AddressMapper,
    pedestal: &'a PedestalMap,
    mask: Option<&'a ChannelMask>,
    config: ReconstructionConfig,
    scanner: WindowScanner,
    detector: LineDetector,
    dedx: DedxEstimator,
    mm_per_tick: f64,
}

impl<'a> Reconstructor<'a> {
    /// Validate `config` and prepare the stages.
    pub fn new(
        mapper: &'a AddressMapper,
        pedestal: &'a PedestalMap,
        config: ReconstructionConfig,
    ) -> Result<Self> {
        config.validate()?;
        let mm_per_tick = config.drift_velocity_mm_per_tick();
        debug!("Drift velocity {mm_per_tick:.6} mm/tick");
        Ok(Self {
            mapper,
            pedestal,
            mask: None,
            scanner: WindowScanner::from_config(&config)?,
            detector: LineDetector::new(&config.hough),
            dedx: DedxEstimator::new(config.pitch_mm, config.amplitude_statistic),
            mm_per_tick,
            config,
        })
    }

    /// Drop packets from channels disabled in `mask`.
    #[must_use]
    pub fn with_mask(mut self, mask: &'a ChannelMask) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// Reconstruct one run.
    ///
    /// Fails with [`Error::EmptyRun`] or [`Error::NoUsableHits`]; per-candidate
    /// failures are reported in each [`CandidateResult`].
    pub fn reconstruct_run(&self, packets: &[RawPacket]) -> Result<RunReconstruction> {
        if packets.is_empty() {
            return Err(Error::EmptyRun);
        }
        let mut builder = HitTableBuilder::new(self.mapper, self.pedestal);
        if let Some(mask) = self.mask {
            builder = builder.with_mask(mask);
        }
        let table = builder.build(packets);
        if table.is_empty() {
            return Err(Error::NoUsableHits {
                packets: packets.len(),
            });
        }

        let mut windows = self.scanner.scan(&table.hits);
        let candidates_found = windows.len();
        let candidates_dropped = truncate_candidates(&mut windows, self.config.max_candidates);

        let candidates: Vec<CandidateResult> = windows
            .par_iter()
            .map(|window| self.process_candidate(window))
            .collect();

        info!(
            "Run: {} hits, {} candidates, {} fitted",
            table.len(),
            candidates.len(),
            candidates
                .iter()
                .filter(|c| c.status == CandidateStatus::Fitted)
                .count()
        );

        Ok(RunReconstruction {
            hit_stats: table.stats,
            origin_tick: table.origin_tick,
            candidates_found,
            candidates_dropped,
            candidates,
        })
    }

    /// Reconstruct independent runs in parallel. One run's error never
    /// affects the others.
    pub fn reconstruct_runs<R>(&self, runs: &[R]) -> Vec<Result<RunReconstruction>>
    where
        R: AsRef<[RawPacket]> + Sync,
    {
        runs.par_iter()
            .map(|run| self.reconstruct_run(run.as_ref()))
            .collect()
    }

    /// Project, classify and, when track-like, fit one candidate.
    #[must_use]
    pub fn process_candidate(&self, window: &CandidateWindow) -> CandidateResult {
        let grid = project(window);
        let line2d = self.detector.detect(&grid);
        let mut result = CandidateResult {
            window: window.id(),
            hit_count: window.len(),
            occupied_pixels: grid.occupied_count(),
            line2d,
            line3d: None,
            dedx: DedxEstimate::default(),
            status: CandidateStatus::NotTrackLike,
        };

        if result.line2d.class == LineClass::Ambiguous {
            debug!(
                "Window {}: {}",
                window.index,
                Error::AmbiguousLine {
                    lines: result.line2d.lines_detected
                }
            );
            result.status = CandidateStatus::Ambiguous;
            return result;
        }
        if !result.line2d.is_track_like(self.config.hough.accuracy_cutoff) {
            return result;
        }

        let points = hit_points(window, self.config.pitch_mm, self.mm_per_tick);
        match fit_line(&points) {
            Ok(line) => {
                result.dedx = match drift_span(&points) {
                    Some(span) => self.dedx.estimate_within(&line, &grid, span),
                    None => self.dedx.estimate(&line, &grid),
                };
                result.line3d = Some(line);
                result.status = CandidateStatus::Fitted;
            }
            Err(e) => {
                debug!("Window {}: {e}", window.index);
                result.status = CandidateStatus::FitFailed(e);
            }
        }
        result
    }
}

/// Reconstruct one run with a fresh [`Reconstructor`].
pub fn reconstruct_run(
    packets: &[RawPacket],
    mapper: &AddressMapper,
    pedestal: &PedestalMap,
    config: &ReconstructionConfig,
) -> Result<RunReconstruction> {
    Reconstructor::new(mapper, pedestal, config.clone())?.reconstruct_run(packets)
}

/// Reconstruct independent runs in parallel.
pub fn reconstruct_runs<R>(
    runs: &[R],
    mapper: &AddressMapper,
    pedestal: &PedestalMap,
    config: &ReconstructionConfig,
) -> Result<Vec<Result<RunReconstruction>>>
where
    R: AsRef<[RawPacket]> + Sync,
{
    Ok(Reconstructor::new(mapper, pedestal, config.clone())?.reconstruct_runs(runs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_candidates() {
        let mut windows: Vec<_> = (0..25)
            .map(|i| CandidateWindow::new(i, 0, 1, Vec::new()))
            .collect();
        assert_eq!(truncate_candidates(&mut windows, Some(20)), 5);
        assert_eq!(windows.len(), 20);
        assert_eq!(windows[19].index, 19);

        assert_eq!(truncate_candidates(&mut windows, None), 0);
        assert_eq!(truncate_candidates(&mut windows, Some(30)), 0);
        assert_eq!(windows.len(), 20);
    }

    #[test]
    fn test_status_names() {
        assert_eq!(CandidateStatus::Fitted.as_str(), "fitted");
        assert_eq!(
            CandidateStatus::FitFailed(Error::InsufficientPoints { found: 2 }).as_str(),
            "insufficient_points"
        );
    }
}
