use crate::core::{AudioBuffer, Channels};
use crate::error::AudioResult;

/// Fold any channel layout down to mono by averaging, used for level analysis
pub struct Downmix;

impl Downmix {
    /// Average each interleaved frame into one sample
    pub fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
        if channels <= 1 {
            return samples.to_vec();
        }
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    }
}

impl super::Filter for Downmix {
    fn process(&mut self, buffer: &AudioBuffer) -> AudioResult<AudioBuffer> {
        if buffer.channels() == Channels::Mono {
            return Ok(buffer.clone());
        }

        let mono = Self::to_mono(buffer.samples(), buffer.channels().count() as usize);
        AudioBuffer::new(mono, buffer.sample_rate(), Channels::Mono)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;

    #[test]
    fn test_stereo_to_mono() {
        // [L1, R1, L2, R2]
        let output = Downmix::to_mono(&[0.0, 1.0, 0.5, 0.5], 2);
        assert_eq!(output.len(), 2);
        assert!((output[0] - 0.5).abs() < 0.001);
        assert!((output[1] - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_quad_to_mono() {
        let buffer = AudioBuffer::new(vec![0.4, 0.4, 0.0, 0.0], 8000, Channels::Quad).unwrap();
        let out = Downmix.process(&buffer).unwrap();
        assert_eq!(out.channels(), Channels::Mono);
        assert!((out.samples()[0] - 0.2).abs() < 0.001);
    }
}
