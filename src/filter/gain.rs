use crate::core::AudioBuffer;
use crate::error::{AudioError, AudioResult};

/// Fixed gain in decibels, the in-process counterpart of `sox gain`
#[derive(Clone, Debug)]
pub struct Gain {
    gain_db: f64,
}

impl Gain {
    /// Create a gain stage of `gain_db` decibels
    pub fn db(gain_db: f64) -> AudioResult<Self> {
        if !gain_db.is_finite() || gain_db.abs() > 96.0 {
            return Err(AudioError::ConfigError(format!(
                "Gain must be within ±96 dB, got {}",
                gain_db
            )));
        }
        Ok(Gain { gain_db })
    }

    /// Linear multiplier for this gain
    pub fn multiplier(&self) -> f32 {
        10f64.powf(self.gain_db / 20.0) as f32
    }

    /// Apply gain to all samples
    fn apply_gain(samples: &[f32], gain: f32) -> Vec<f32> {
        samples.iter().map(|&s| (s * gain).clamp(-1.0, 1.0)).collect()
    }
}

impl super::Filter for Gain {
    fn process(&mut self, buffer: &AudioBuffer) -> AudioResult<AudioBuffer> {
        if self.gain_db == 0.0 || buffer.is_empty() {
            return Ok(buffer.clone());
        }

        AudioBuffer::new(
            Self::apply_gain(buffer.samples(), self.multiplier()),
            buffer.sample_rate(),
            buffer.channels(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Channels;
    use crate::filter::Filter;

    #[test]
    fn test_six_db_doubles() {
        let buffer = AudioBuffer::new(vec![0.1, -0.2, 0.25], 44100, Channels::Mono).unwrap();
        let out = Gain::db(6.0206).unwrap().process(&buffer).unwrap();

        assert!((out.samples()[0] - 0.2).abs() < 0.001);
        assert!((out.samples()[1] + 0.4).abs() < 0.001);
        assert!((out.samples()[2] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_clips_at_full_scale() {
        let buffer = AudioBuffer::new(vec![0.9, -0.9], 44100, Channels::Mono).unwrap();
        let out = Gain::db(12.0).unwrap().process(&buffer).unwrap();
        assert_eq!(out.samples(), &[1.0, -1.0]);
    }

    #[test]
    fn test_rejects_absurd_gain() {
        assert!(Gain::db(200.0).is_err());
        assert!(Gain::db(f64::INFINITY).is_err());
    }
}
