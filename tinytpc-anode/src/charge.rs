//! Linear ADC to charge conversion.

use serde::{Deserialize, Serialize};
use tinytpc_core::DxDSample;

/// Front-end reference voltages and gain for converting ADC counts to charge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargeCalibration {
    /// Analog supply voltage (mV).
    pub vdda_mv: f64,
    /// Reference DAC setting (of 256).
    pub vref_dac: u8,
    /// Common-mode DAC setting (of 256).
    pub vcm_dac: u8,
    /// Front-end gain (mV per 1000 electrons).
    pub gain_mv_per_ke: f64,
}

impl Default for ChargeCalibration {
    fn default() -> Self {
        Self {
            vdda_mv: 1800.0,
            vref_dac: 185,
            vcm_dac: 41,
            gain_mv_per_ke: 4.0,
        }
    }
}

impl ChargeCalibration {
    /// Reference voltage (mV).
    #[must_use]
    pub fn vref_mv(&self) -> f64 {
        self.vdda_mv * f64::from(self.vref_dac) / 256.0
    }

    /// Common-mode voltage (mV).
    #[must_use]
    pub fn vcm_mv(&self) -> f64 {
        self.vdda_mv * f64::from(self.vcm_dac) / 256.0
    }

    /// Charge per ADC count (ke-).
    #[must_use]
    pub fn ke_per_adc(&self) -> f64 {
        (self.vref_mv() - self.vcm_mv()) / 256.0 / self.gain_mv_per_ke
    }

    /// Charge (ke-) for a pedestal-subtracted amplitude.
    #[inline]
    #[must_use]
    pub fn charge_ke(&self, adc: f64) -> f64 {
        adc * self.ke_per_adc()
    }

    /// dQ/dx (ke-/mm) of a sample.
    #[must_use]
    pub fn dq_dx(&self, sample: &DxDSample) -> f64 {
        self.charge_ke(sample.dadc_dx)
    }
}
