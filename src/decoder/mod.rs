//! Audio decoder implementations

pub mod symphonia;

pub use symphonia::SymphoniaDecoder;

use crate::core::{AudioBuffer, Channels};
use crate::error::AudioResult;
use log::debug;
use std::path::Path;

/// Trait for audio decoders
pub trait Decoder: Send {
    /// Sample rate of the decoded stream
    fn sample_rate(&self) -> u32;

    /// Channel layout of the decoded stream
    fn channels(&self) -> Channels;

    /// Get the next packet of interleaved samples, `None` at end of stream
    fn decode_packet(&mut self) -> AudioResult<Option<Vec<f32>>>;

    /// Check if decoder is finished
    fn is_finished(&self) -> bool;
}

/// Create a decoder from a file path
pub fn from_file<P: AsRef<Path>>(path: P) -> AudioResult<Box<dyn Decoder>> {
    let path = path.as_ref();
    SymphoniaDecoder::from_file(path).map(|d| Box::new(d) as Box<dyn Decoder>)
}

/// Decode a whole file into one immutable buffer
pub fn decode_file<P: AsRef<Path>>(path: P) -> AudioResult<AudioBuffer> {
    let path = path.as_ref();
    let mut decoder = from_file(path)?;

    let mut samples = Vec::new();
    while let Some(packet) = decoder.decode_packet()? {
        samples.extend_from_slice(&packet);
    }

    let buffer = AudioBuffer::new(samples, decoder.sample_rate(), decoder.channels())?;
    debug!(
        "Decoded {}: {} frames, {} Hz, {}",
        path.display(),
        buffer.frames(),
        buffer.sample_rate(),
        buffer.channels().name()
    );
    Ok(buffer)
}
