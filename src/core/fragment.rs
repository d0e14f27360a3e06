use crate::error::{AudioError, AudioResult};
use std::fmt;
use std::time::Duration;

/// Bytes per sample assumed when estimating fragment size (16-bit PCM capture)
pub const ESTIMATE_BYTES_PER_SAMPLE: u64 = 2;

/// Loudness floor in dBFS below which a window counts as silence
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct SilenceThreshold(f32);

impl SilenceThreshold {
    /// Quietest threshold accepted
    pub const MIN_DB: f32 = -120.0;
    /// Loudest threshold accepted (full scale)
    pub const MAX_DB: f32 = 0.0;

    /// Create a threshold, rejecting values outside `MIN_DB..=MAX_DB` or NaN
    pub fn new(db: f32) -> AudioResult<Self> {
        if !(Self::MIN_DB..=Self::MAX_DB).contains(&db) {
            return Err(AudioError::ConfigError(format!(
                "Silence threshold must be between {} and {} dBFS, got {}",
                Self::MIN_DB,
                Self::MAX_DB,
                db
            )));
        }
        Ok(SilenceThreshold(db))
    }

    /// Threshold value in dBFS
    pub fn db(&self) -> f32 {
        self.0
    }
}

impl fmt::Display for SilenceThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} dBFS", self.0)
    }
}

/// A contiguous non-silent span of a buffer, padding included.
///
/// `start_frame..end_frame` is half-open and expressed in frames of the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    /// First frame (inclusive)
    pub start_frame: usize,
    /// Last frame (exclusive)
    pub end_frame: usize,
    sample_rate: u32,
    channels: u32,
}

impl Fragment {
    /// Create a fragment over `start_frame..end_frame`
    pub fn new(start_frame: usize, end_frame: usize, sample_rate: u32, channels: u32) -> Self {
        Fragment {
            start_frame,
            end_frame: end_frame.max(start_frame),
            sample_rate,
            channels,
        }
    }

    /// Number of frames covered
    pub fn frames(&self) -> usize {
        self.end_frame - self.start_frame
    }

    /// Approximate size of the fragment once written as 16-bit PCM
    pub fn estimated_bytes(&self) -> u64 {
        self.frames() as u64 * self.channels as u64 * ESTIMATE_BYTES_PER_SAMPLE
    }

    /// Start position in the source recording
    pub fn start(&self) -> Duration {
        Duration::from_secs_f64(self.start_frame as f64 / self.sample_rate as f64)
    }

    /// Length of the fragment
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_range() {
        assert!(SilenceThreshold::new(-45.0).is_ok());
        assert!(SilenceThreshold::new(0.0).is_ok());
        assert!(SilenceThreshold::new(3.0).is_err());
        assert!(SilenceThreshold::new(-130.0).is_err());
        assert!(SilenceThreshold::new(f32::NAN).is_err());
    }

    #[test]
    fn test_fragment_size_estimate() {
        // One second of stereo at 44.1 kHz is 176400 bytes of 16-bit PCM
        let fragment = Fragment::new(44100, 88200, 44100, 2);
        assert_eq!(fragment.frames(), 44100);
        assert_eq!(fragment.estimated_bytes(), 176_400);
        assert_eq!(fragment.start(), Duration::from_secs(1));
        assert_eq!(fragment.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_fragment_never_inverted() {
        let fragment = Fragment::new(10, 5, 8000, 1);
        assert_eq!(fragment.frames(), 0);
    }
}
