//! Gain estimation against a reference level

use super::level;
use crate::core::AudioBuffer;
use crate::error::{AudioError, AudioResult};
use serde::{Deserialize, Serialize};

/// Which level statistic is compared to the reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GainMode {
    /// Sample peak
    #[default]
    Peak,
    /// Whole-file RMS
    Rms,
}

/// Computes the dB adjustment that brings a recording to a reference level
#[derive(Debug, Clone)]
pub struct GainEstimator {
    mode: GainMode,
    reference_db: f32,
    tolerance_db: f32,
}

impl GainEstimator {
    /// Create an estimator targeting `reference_db` dBFS
    pub fn new(mode: GainMode, reference_db: f32, tolerance_db: f32) -> AudioResult<Self> {
        if !(-96.0..=0.0).contains(&reference_db) {
            return Err(AudioError::ConfigError(format!(
                "Reference level must be between -96 and 0 dBFS, got {}",
                reference_db
            )));
        }
        if !(tolerance_db >= 0.0) {
            return Err(AudioError::ConfigError(format!(
                "Gain tolerance must be non-negative, got {}",
                tolerance_db
            )));
        }

        Ok(GainEstimator {
            mode,
            reference_db,
            tolerance_db,
        })
    }

    /// Measured level of `buffer` in dBFS, `None` when there is nothing to measure
    pub fn measure(&self, buffer: &AudioBuffer) -> Option<f32> {
        let samples = buffer.samples();
        if samples.is_empty() || samples.iter().any(|s| !s.is_finite()) {
            return None;
        }

        let linear = match self.mode {
            GainMode::Peak => level::peak(samples),
            GainMode::Rms => level::rms(samples),
        };
        if linear <= 0.0 {
            return None;
        }
        Some(level::amplitude_to_db(linear))
    }

    /// Gain in dB needed to reach the reference level.
    ///
    /// `Some(0.0)` means the recording is already within tolerance. `None` means no
    /// estimate could be made (empty, silent or non-finite audio) and must not be
    /// replaced by a guess.
    pub fn estimate_gain(&self, buffer: &AudioBuffer) -> Option<f64> {
        let measured = self.measure(buffer)?;
        let delta = (self.reference_db - measured) as f64;

        if delta.abs() <= self.tolerance_db as f64 {
            Some(0.0)
        } else {
            Some(delta)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Channels;
    use crate::filter::{Filter, Gain};

    fn buffer_with_peak(peak: f32) -> AudioBuffer {
        let samples = (0..4410)
            .map(|i| (2.0 * std::f32::consts::PI * 441.0 * i as f32 / 44100.0).sin() * peak)
            .collect();
        AudioBuffer::new(samples, 44100, Channels::Mono).unwrap()
    }

    #[test]
    fn test_at_reference_returns_zero() {
        let estimator = GainEstimator::new(GainMode::Peak, -1.0, 0.5).unwrap();
        let buffer = buffer_with_peak(10f32.powf(-1.0 / 20.0));
        assert_eq!(estimator.estimate_gain(&buffer), Some(0.0));
    }

    #[test]
    fn test_attenuated_buffer_is_restored() {
        let estimator = GainEstimator::new(GainMode::Peak, -1.0, 0.5).unwrap();
        let buffer = buffer_with_peak(10f32.powf(-13.0 / 20.0));

        let gain = estimator.estimate_gain(&buffer).unwrap();
        assert!((gain - 12.0).abs() < 0.05);

        let amplified = Gain::db(gain).unwrap().process(&buffer).unwrap();
        assert_eq!(estimator.estimate_gain(&amplified), Some(0.0));
    }

    #[test]
    fn test_rms_mode() {
        let estimator = GainEstimator::new(GainMode::Rms, -20.0, 0.1).unwrap();
        // Constant 0.05 has an RMS of -26.02 dBFS
        let buffer = AudioBuffer::new(vec![0.05; 1000], 8000, Channels::Mono).unwrap();
        let gain = estimator.estimate_gain(&buffer).unwrap();
        assert!((gain - 6.02).abs() < 0.01);
    }

    #[test]
    fn test_silence_is_unknown() {
        let estimator = GainEstimator::new(GainMode::Peak, -1.0, 0.5).unwrap();
        let silent = AudioBuffer::new(vec![0.0; 100], 8000, Channels::Mono).unwrap();
        let empty = AudioBuffer::new(Vec::new(), 8000, Channels::Mono).unwrap();

        assert_eq!(estimator.estimate_gain(&silent), None);
        assert_eq!(estimator.estimate_gain(&empty), None);
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(GainEstimator::new(GainMode::Peak, 3.0, 0.5).is_err());
        assert!(GainEstimator::new(GainMode::Peak, -1.0, -0.5).is_err());
    }
}
