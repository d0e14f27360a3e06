//! Audio filter implementations

pub mod downmix;
pub mod gain;
pub mod speed;

pub use downmix::Downmix;
pub use gain::Gain;
pub use speed::SpeedShift;

use crate::core::AudioBuffer;
use crate::error::AudioResult;

/// Trait for audio filters.
///
/// Filters never modify their input; each call yields a new buffer.
pub trait Filter {
    /// Process a buffer through this filter
    fn process(&mut self, buffer: &AudioBuffer) -> AudioResult<AudioBuffer>;
}
