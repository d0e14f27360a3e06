use crate::core::{AudioBuffer, BitDepth, Channels};
use crate::error::{AudioError, AudioResult};
use hound::{WavSpec, WavWriter};
use std::path::Path;

const I16_SCALE: f32 = 32767.0;
const I24_SCALE: f32 = 8_388_607.0;

/// WAV audio encoder
pub struct WavEncoder {
    writer: Option<WavWriter<std::io::BufWriter<std::fs::File>>>,
    sample_rate: u32,
    channels: Channels,
    bit_depth: BitDepth,
}

impl WavEncoder {
    /// Create a new WAV encoder to file
    pub fn new<P: AsRef<Path>>(
        path: P,
        sample_rate: u32,
        channels: Channels,
        bit_depth: BitDepth,
    ) -> AudioResult<Self> {
        let sample_format = match bit_depth {
            BitDepth::F32 => hound::SampleFormat::Float,
            BitDepth::I16 | BitDepth::I24 => hound::SampleFormat::Int,
        };
        let spec = WavSpec {
            channels: channels.count() as u16,
            sample_rate,
            bits_per_sample: bit_depth.bits(),
            sample_format,
        };

        let writer = WavWriter::create(path, spec)
            .map_err(|e| AudioError::EncodeError(e.to_string()))?;

        Ok(WavEncoder {
            writer: Some(writer),
            sample_rate,
            channels,
            bit_depth,
        })
    }

    /// Get the number of samples written
    pub fn samples_written(&self) -> u32 {
        self.writer.as_ref().map(|w| w.len()).unwrap_or(0)
    }
}

impl super::Encoder for WavEncoder {
    fn encode(&mut self, buffer: &AudioBuffer) -> AudioResult<()> {
        if buffer.sample_rate() != self.sample_rate {
            return Err(AudioError::InvalidSampleRate {
                rate: buffer.sample_rate(),
            });
        }

        if buffer.channels() != self.channels {
            return Err(AudioError::InvalidChannels {
                expected: self.channels.count(),
                got: buffer.channels().count(),
            });
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| AudioError::ProcessingError("Encoder already finalized".to_string()))?;

        for &sample in buffer.samples() {
            let clamped = sample.clamp(-1.0, 1.0);
            match self.bit_depth {
                BitDepth::I16 => writer.write_sample((clamped * I16_SCALE).round() as i16),
                BitDepth::I24 => writer.write_sample((clamped * I24_SCALE).round() as i32),
                BitDepth::F32 => writer.write_sample(clamped),
            }
            .map_err(|e| AudioError::EncodeError(e.to_string()))?;
        }

        Ok(())
    }

    fn finalize(&mut self) -> AudioResult<()> {
        if let Some(writer) = self.writer.take() {
            writer
                .finalize()
                .map_err(|e| AudioError::EncodeError(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::Encoder;
    use tempfile::NamedTempFile;

    #[test]
    fn test_wav_encoder_write() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut encoder =
            WavEncoder::new(temp_file.path(), 44100, Channels::Mono, BitDepth::I16).unwrap();

        let buffer = AudioBuffer::new(vec![0.0, 0.5, -0.5, 1.0], 44100, Channels::Mono).unwrap();
        encoder.encode(&buffer).unwrap();
        assert_eq!(encoder.samples_written(), 4);
        encoder.finalize().unwrap();

        let mut reader = hound::WavReader::open(temp_file.path()).unwrap();
        assert_eq!(reader.spec().bits_per_sample, 16);
        let written: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(written, vec![0, 16384, -16384, 32767]);
    }

    #[test]
    fn test_wav_encoder_float() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut encoder =
            WavEncoder::new(temp_file.path(), 8000, Channels::Mono, BitDepth::F32).unwrap();
        let buffer = AudioBuffer::new(vec![0.25, -0.25], 8000, Channels::Mono).unwrap();
        encoder.encode(&buffer).unwrap();
        encoder.finalize().unwrap();

        let mut reader = hound::WavReader::open(temp_file.path()).unwrap();
        let written: Vec<f32> = reader.samples::<f32>().map(|s| s.unwrap()).collect();
        assert_eq!(written, vec![0.25, -0.25]);
    }

    #[test]
    fn test_wav_encoder_invalid_sample_rate() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut encoder =
            WavEncoder::new(temp_file.path(), 44100, Channels::Mono, BitDepth::I16).unwrap();

        let buffer = AudioBuffer::new(vec![0.0, 0.1], 48000, Channels::Mono).unwrap();
        assert!(encoder.encode(&buffer).is_err());
    }

    #[test]
    fn test_wav_encoder_invalid_channels() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut encoder =
            WavEncoder::new(temp_file.path(), 44100, Channels::Mono, BitDepth::I16).unwrap();

        let buffer = AudioBuffer::new(vec![0.0, 0.1, 0.2, 0.3], 44100, Channels::Stereo).unwrap();
        assert!(encoder.encode(&buffer).is_err());
    }
}
