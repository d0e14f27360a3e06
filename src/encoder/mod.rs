//! Audio encoder implementations

pub mod wav;

pub use wav::WavEncoder;

use crate::core::{AudioBuffer, BitDepth};
use crate::error::AudioResult;
use std::path::Path;

/// Trait for audio encoders
pub trait Encoder {
    /// Encode a buffer to output
    fn encode(&mut self, buffer: &AudioBuffer) -> AudioResult<()>;

    /// Finalize encoding (flush any remaining data)
    fn finalize(&mut self) -> AudioResult<()> {
        Ok(())
    }
}

/// Write a whole buffer to a WAV file at `path`
pub fn write_wav<P: AsRef<Path>>(path: P, buffer: &AudioBuffer, bit_depth: BitDepth) -> AudioResult<()> {
    let mut encoder = WavEncoder::new(path, buffer.sample_rate(), buffer.channels(), bit_depth)?;
    encoder.encode(buffer)?;
    encoder.finalize()
}
