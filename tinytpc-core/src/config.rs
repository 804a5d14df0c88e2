//! Reconstruction configuration and the liquid-argon drift model.

use crate::{AmplitudeStatistic, Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Electron mobility parametrisation coefficients.
///
/// `mu(E) = (a0 + a1 E + a2 E^1.5 + a3 E^2.5) / (1 + (a1/a0) E + a4 E^2 + a5 E^3)`
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MobilityCoefficients {
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
    pub a3: f64,
    pub a4: f64,
    pub a5: f64,
}

impl Default for MobilityCoefficients {
    fn default() -> Self {
        Self {
            a0: 551.6,
            a1: 7158.3,
            a2: 4440.43,
            a3: 4.29,
            a4: 43.63,
            a5: 0.2053,
        }
    }
}

/// Drift field and temperature settings that fix the drift velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DriftModel {
    /// Cathode voltage (kV).
    pub voltage_kv: f64,
    /// Drift distance (cm).
    pub drift_distance_cm: f64,
    /// Argon temperature (K).
    pub temperature_k: f64,
    /// Reference temperature of the mobility parametrisation (K).
    pub reference_temperature_k: f64,
    /// Mobility coefficients.
    pub mobility: MobilityCoefficients,
    /// Clock tick (us).
    pub tick_us: f64,
}

impl Default for DriftModel {
    fn default() -> Self {
        Self {
            voltage_kv: 4.0,
            drift_distance_cm: 10.0,
            temperature_k: 90.0,
            reference_temperature_k: 89.0,
            mobility: MobilityCoefficients::default(),
            tick_us: 0.1,
        }
    }
}

impl DriftModel {
    /// Drift field (kV/cm).
    #[must_use]
    pub fn field_kv_per_cm(&self) -> f64 {
        self.voltage_kv / self.drift_distance_cm
    }

    /// Electron mobility (cm^2/V/s).
    #[must_use]
    pub fn mobility_cm2_per_vs(&self) -> f64 {
        let e = self.field_kv_per_cm();
        let c = &self.mobility;
        let num = c.a0 + c.a1 * e + c.a2 * e.powf(1.5) + c.a3 * e.powf(2.5);
        let den = 1.0 + (c.a1 / c.a0) * e + c.a4 * e.powi(2) + c.a5 * e.powi(3);
        num / den * (self.temperature_k / self.reference_temperature_k).powf(-1.5)
    }

    /// Drift velocity (cm/s).
    #[must_use]
    pub fn velocity_cm_per_s(&self) -> f64 {
        self.mobility_cm2_per_vs() * self.field_kv_per_cm() * 1000.0
    }

    /// Drift velocity in mm per clock tick.
    #[must_use]
    pub fn velocity_mm_per_tick(&self) -> f64 {
        self.velocity_cm_per_s() * 10.0 * self.tick_us * 1e-6
    }

    /// Ticks needed to drift the full distance.
    #[must_use]
    pub fn max_drift_ticks(&self) -> f64 {
        self.drift_distance_cm * 10.0 / self.velocity_mm_per_tick()
    }

    /// Checks that the model yields a finite positive velocity.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("voltage_kv", self.voltage_kv),
            ("drift_distance_cm", self.drift_distance_cm),
            ("temperature_k", self.temperature_k),
            ("reference_temperature_k", self.reference_temperature_k),
            ("tick_us", self.tick_us),
            ("mobility.a0", self.mobility.a0),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!(
                    "drift model {name} must be positive, got {value}"
                )));
            }
        }
        let v = self.velocity_mm_per_tick();
        if !(v.is_finite() && v > 0.0) {
            return Err(Error::Config(format!(
                "drift model yields invalid velocity {v} mm/tick"
            )));
        }
        Ok(())
    }
}

/// Probabilistic Hough transform and 2D line acceptance settings.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HoughConfig {
    /// Accumulator votes needed to accept a line.
    pub threshold: usize,
    /// Minimum accepted line length (pixels).
    pub line_length: usize,
    /// Maximum gap inside a line (pixels).
    pub line_gap: usize,
    /// Number of angles in `[-pi/2, pi/2)`.
    pub theta_steps: usize,
    /// Seed for the point visiting order.
    pub seed: u64,
    /// Minimum single-line accuracy for a candidate to be track-like.
    pub accuracy_cutoff: f64,
    /// Also try adjacent row pairs when no line is found.
    pub row_fallback: bool,
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            threshold: 10,
            line_length: 3,
            line_gap: 3,
            theta_steps: 180,
            seed: 0,
            accuracy_cutoff: 0.75,
            row_fallback: false,
        }
    }
}

impl HoughConfig {
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_line_length(mut self, line_length: usize) -> Self {
        self.line_length = line_length;
        self
    }

    #[must_use]
    pub fn with_line_gap(mut self, line_gap: usize) -> Self {
        self.line_gap = line_gap;
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_accuracy_cutoff(mut self, cutoff: f64) -> Self {
        self.accuracy_cutoff = cutoff;
        self
    }

    #[must_use]
    pub fn with_row_fallback(mut self, enabled: bool) -> Self {
        self.row_fallback = enabled;
        self
    }

    /// Checks ranges.
    pub fn validate(&self) -> Result<()> {
        if self.theta_steps == 0 {
            return Err(Error::Config("theta_steps must be at least 1".into()));
        }
        if self.threshold == 0 {
            return Err(Error::Config("hough threshold must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.accuracy_cutoff) {
            return Err(Error::Config(format!(
                "accuracy_cutoff must lie in [0, 1], got {}",
                self.accuracy_cutoff
            )));
        }
        Ok(())
    }
}

/// Configuration for reconstructing one run.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReconstructionConfig {
    /// Number of equal-width time bins over the run span.
    pub bin_count: usize,
    /// A bin needs strictly more hits than this to be a candidate.
    pub min_hits: usize,
    /// A bin needs strictly fewer hits than this, when set.
    pub max_hits: Option<usize>,
    /// Maximum candidates kept per run, earliest first.
    pub max_candidates: Option<usize>,
    /// Line search settings.
    pub hough: HoughConfig,
    /// Drift model.
    pub drift: DriftModel,
    /// Pixel pitch (mm).
    pub pitch_mm: f64,
    /// Per-pixel amplitude statistic for dE/dx.
    pub amplitude_statistic: AmplitudeStatistic,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            bin_count: 10_000,
            min_hits: 10,
            max_hits: None,
            max_candidates: Some(20),
            hough: HoughConfig::default(),
            drift: DriftModel::default(),
            pitch_mm: 100.0 / 21.0,
            amplitude_statistic: AmplitudeStatistic::Median,
        }
    }
}

impl ReconstructionConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_bin_count(mut self, bin_count: usize) -> Self {
        self.bin_count = bin_count;
        self
    }

    #[must_use]
    pub fn with_min_hits(mut self, min_hits: usize) -> Self {
        self.min_hits = min_hits;
        self
    }

    #[must_use]
    pub fn with_max_hits(mut self, max_hits: usize) -> Self {
        self.max_hits = Some(max_hits);
        self
    }

    #[must_use]
    pub fn with_max_candidates(mut self, max_candidates: Option<usize>) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    #[must_use]
    pub fn with_hough(mut self, hough: HoughConfig) -> Self {
        self.hough = hough;
        self
    }

    #[must_use]
    pub fn with_drift(mut self, drift: DriftModel) -> Self {
        self.drift = drift;
        self
    }

    #[must_use]
    pub fn with_pitch_mm(mut self, pitch_mm: f64) -> Self {
        self.pitch_mm = pitch_mm;
        self
    }

    #[must_use]
    pub fn with_amplitude_statistic(mut self, statistic: AmplitudeStatistic) -> Self {
        self.amplitude_statistic = statistic;
        self
    }

    /// Drift velocity in mm per tick.
    #[must_use]
    pub fn drift_velocity_mm_per_tick(&self) -> f64 {
        self.drift.velocity_mm_per_tick()
    }

    /// Validates every setting.
    ///
    /// Called when loading from JSON; call it before processing for
    /// programmatically built configs.
    pub fn validate(&self) -> Result<()> {
        if self.bin_count == 0 {
            return Err(Error::Config("bin_count must be at least 1".into()));
        }
        if let Some(max) = self.max_hits {
            if max <= self.min_hits {
                return Err(Error::Config(format!(
                    "max_hits ({max}) must exceed min_hits ({})",
                    self.min_hits
                )));
            }
        }
        if !(self.pitch_mm.is_finite() && self.pitch_mm > 0.0) {
            return Err(Error::Config(format!(
                "pitch_mm must be positive, got {}",
                self.pitch_mm
            )));
        }
        self.hough.validate()?;
        self.drift.validate()
    }
}

#[cfg(feature = "serde")]
impl ReconstructionConfig {
    /// Loads and validates a configuration from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration from a JSON file.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }
}
