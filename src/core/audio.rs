use crate::error::{AudioError, AudioResult};
use std::time::Duration;

/// Channel configuration for audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    /// Mono (1 channel)
    Mono = 1,
    /// Stereo (2 channels)
    Stereo = 2,
    /// Quad (4 channels)
    Quad = 4,
    /// 5.1 surround sound
    SurroundFivePointOne = 6,
    /// 7.1 surround sound
    SurroundSevenPointOne = 8,
}

impl Channels {
    /// Create Channels from channel count
    pub fn from_count(count: u32) -> AudioResult<Self> {
        match count {
            1 => Ok(Channels::Mono),
            2 => Ok(Channels::Stereo),
            4 => Ok(Channels::Quad),
            6 => Ok(Channels::SurroundFivePointOne),
            8 => Ok(Channels::SurroundSevenPointOne),
            n => Err(AudioError::InvalidChannels {
                expected: 1,
                got: n,
            }),
        }
    }

    /// Get the number of channels
    pub fn count(&self) -> u32 {
        *self as u32
    }

    /// Get channel layout name
    pub fn name(&self) -> &'static str {
        match self {
            Channels::Mono => "Mono",
            Channels::Stereo => "Stereo",
            Channels::Quad => "Quad",
            Channels::SurroundFivePointOne => "5.1 Surround",
            Channels::SurroundSevenPointOne => "7.1 Surround",
        }
    }
}

/// Bit depth used when writing samples to disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BitDepth {
    /// 16-bit signed (-32768 to 32767)
    #[default]
    I16,
    /// 24-bit signed
    I24,
    /// 32-bit floating point (internal standard)
    F32,
}

impl BitDepth {
    /// Get bytes per sample
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            BitDepth::I16 => 2,
            BitDepth::I24 => 3,
            BitDepth::F32 => 4,
        }
    }

    /// Bits per sample as stored in a WAV header
    pub fn bits(&self) -> u16 {
        (self.bytes_per_sample() * 8) as u16
    }
}

/// A decoded recording held in memory.
///
/// Samples are interleaved f32 in `-1.0..=1.0`. A buffer is never mutated after
/// construction; filters and slicing produce new buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: Channels,
}

impl AudioBuffer {
    /// Create a new audio buffer
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: Channels) -> AudioResult<Self> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidSampleRate { rate: sample_rate });
        }

        if samples.len() % channels.count() as usize != 0 {
            return Err(AudioError::BufferError(
                "Sample count not divisible by channel count".to_string(),
            ));
        }

        Ok(AudioBuffer {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Get reference to the samples
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Get owned samples (consumes buffer)
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Get sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get channel configuration
    pub fn channels(&self) -> Channels {
        self.channels
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.count() as usize
    }

    /// Get duration of the recording
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Convert a duration in milliseconds to a frame count at this buffer's rate
    pub fn ms_to_frames(&self, ms: u32) -> usize {
        (ms as u64 * self.sample_rate as u64 / 1000) as usize
    }

    /// Copy frames `start..end` into a new buffer
    pub fn slice_frames(&self, start: usize, end: usize) -> AudioResult<AudioBuffer> {
        if start > end || end > self.frames() {
            return Err(AudioError::BufferError(format!(
                "Frame range {}..{} outside buffer of {} frames",
                start,
                end,
                self.frames()
            )));
        }

        let width = self.channels.count() as usize;
        AudioBuffer::new(
            self.samples[start * width..end * width].to_vec(),
            self.sample_rate,
            self.channels,
        )
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_from_count() {
        assert_eq!(Channels::from_count(1).unwrap(), Channels::Mono);
        assert_eq!(Channels::from_count(2).unwrap(), Channels::Stereo);
        assert!(Channels::from_count(0).is_err());
        assert!(Channels::from_count(3).is_err());
    }

    #[test]
    fn test_buffer_creation() {
        let samples = vec![0.1, 0.2, 0.3, 0.4];
        let buffer = AudioBuffer::new(samples, 44100, Channels::Stereo).unwrap();

        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.channels(), Channels::Stereo);
        assert_eq!(buffer.frames(), 2);
    }

    #[test]
    fn test_buffer_invalid_samples() {
        // Odd number of samples for stereo should fail
        let result = AudioBuffer::new(vec![0.1, 0.2, 0.3], 44100, Channels::Stereo);
        assert!(result.is_err());
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = AudioBuffer::new(vec![0.0; 88200], 44100, Channels::Stereo).unwrap();
        assert_eq!(buffer.duration(), Duration::from_secs(1));
        assert_eq!(buffer.ms_to_frames(500), 22050);
    }

    #[test]
    fn test_slice_frames_leaves_source_intact() {
        let buffer = AudioBuffer::new(vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0], 8000, Channels::Stereo).unwrap();
        let slice = buffer.slice_frames(1, 3).unwrap();

        assert_eq!(slice.samples(), &[2.0, 3.0, 4.0, 5.0]);
        assert_eq!(buffer.frames(), 3);
        assert!(buffer.slice_frames(2, 4).is_err());
    }

    #[test]
    fn test_bit_depth_bits() {
        assert_eq!(BitDepth::I16.bits(), 16);
        assert_eq!(BitDepth::I24.bits(), 24);
        assert_eq!(BitDepth::F32.bits(), 32);
    }
}
