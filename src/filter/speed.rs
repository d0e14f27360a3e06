use crate::core::AudioBuffer;
use crate::error::{AudioError, AudioResult};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

const CHUNK_SIZE: usize = 1024;

/// Playback speed change, the in-process counterpart of `sox speed`.
///
/// Tempo and pitch move together: the samples are resampled by `1 / (1 + percent / 100)`
/// while the declared sample rate stays the same, so a positive percentage shortens
/// the recording and a negative one lengthens it.
pub struct SpeedShift {
    percent: f64,
}

impl SpeedShift {
    /// Create a speed shift of `percent` (e.g. `-25.93` for 45 → 33⅓ RPM)
    pub fn new(percent: f64) -> AudioResult<Self> {
        if !percent.is_finite() || percent <= -50.0 || percent >= 100.0 {
            return Err(AudioError::ConfigError(format!(
                "Speed shift must be within (-50%, +100%), got {}%",
                percent
            )));
        }
        Ok(SpeedShift { percent })
    }

    /// Playback speed factor (`1.35` for +35%)
    pub fn factor(&self) -> f64 {
        1.0 + self.percent / 100.0
    }

    /// Output frames produced per input frame
    pub fn ratio(&self) -> f64 {
        1.0 / self.factor()
    }

    fn params() -> SincInterpolationParameters {
        SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        }
    }

    /// Deinterleave samples from [L, R, L, R, ...] to [[L, L, ...], [R, R, ...]]
    fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
        let frames = samples.len() / channels;
        let mut waves = vec![Vec::with_capacity(frames); channels];
        for frame in samples.chunks_exact(channels) {
            for (ch, &sample) in frame.iter().enumerate() {
                waves[ch].push(sample);
            }
        }
        waves
    }

    fn interleave(waves: &[Vec<f32>], frames: usize) -> Vec<f32> {
        let mut samples = Vec::with_capacity(frames * waves.len());
        for i in 0..frames {
            for wave in waves {
                samples.push(wave[i].clamp(-1.0, 1.0));
            }
        }
        samples
    }

    fn resample(&self, waves: &[Vec<f32>], frames: usize) -> AudioResult<Vec<Vec<f32>>> {
        let channels = waves.len();
        let ratio = self.ratio();
        let expected = (frames as f64 * ratio).round() as usize;

        let mut resampler = SincFixedIn::<f32>::new(ratio, 1.1, Self::params(), CHUNK_SIZE, channels)?;
        let delay = resampler.output_delay();
        let mut out = vec![Vec::with_capacity(expected + delay); channels];

        let mut pos = 0;
        while pos < frames {
            let needed = resampler.input_frames_next();
            let end = (pos + needed).min(frames);
            let chunk: Vec<&[f32]> = waves.iter().map(|w| &w[pos..end]).collect();

            let produced = if end - pos == needed {
                resampler.process(&chunk[..], None)?
            } else {
                resampler.process_partial(Some(&chunk[..]), None)?
            };
            for (dst, src) in out.iter_mut().zip(produced) {
                dst.extend(src);
            }
            pos = end;
        }

        // Drain the filter tail until the delayed output covers the whole input
        while out[0].len() < expected + delay {
            let produced = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
            if produced[0].is_empty() {
                break;
            }
            for (dst, src) in out.iter_mut().zip(produced) {
                dst.extend(src);
            }
        }

        for wave in out.iter_mut() {
            wave.drain(..delay.min(wave.len()));
            wave.resize(expected, 0.0);
        }

        Ok(out)
    }
}

impl super::Filter for SpeedShift {
    fn process(&mut self, buffer: &AudioBuffer) -> AudioResult<AudioBuffer> {
        if self.percent == 0.0 || buffer.is_empty() {
            return Ok(buffer.clone());
        }

        let channels = buffer.channels().count() as usize;
        let waves = Self::deinterleave(buffer.samples(), channels);
        let shifted = self.resample(&waves, buffer.frames())?;
        let frames = shifted.first().map(Vec::len).unwrap_or(0);

        AudioBuffer::new(
            Self::interleave(&shifted, frames),
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

    fn sine(frames: usize, rate: u32, channels: Channels) -> AudioBuffer {
        let width = channels.count() as usize;
        let samples = (0..frames)
            .flat_map(|i| {
                let v = (2.0 * std::f32::consts::PI * 220.0 * i as f32 / rate as f32).sin() * 0.5;
                std::iter::repeat(v).take(width)
            })
            .collect();
        AudioBuffer::new(samples, rate, channels).unwrap()
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(SpeedShift::new(-60.0).is_err());
        assert!(SpeedShift::new(150.0).is_err());
        assert!(SpeedShift::new(f64::NAN).is_err());
        assert!(SpeedShift::new(35.0).is_ok());
    }

    #[test]
    fn test_slowing_down_lengthens() {
        let buffer = sine(8000, 8000, Channels::Stereo);
        let mut slow = SpeedShift::new(-25.93).unwrap();
        let out = slow.process(&buffer).unwrap();

        assert_eq!(out.sample_rate(), 8000);
        assert_eq!(out.channels(), Channels::Stereo);
        let expected = (8000.0 / 0.7407) as f64;
        assert!((out.frames() as f64 - expected).abs() < 2.0);
    }

    #[test]
    fn test_round_trip_duration() {
        let buffer = sine(16000, 8000, Channels::Mono);
        let slowed = SpeedShift::new(-25.93).unwrap().process(&buffer).unwrap();
        let restored = SpeedShift::new(35.0).unwrap().process(&slowed).unwrap();

        let original = buffer.duration().as_secs_f64();
        let round_trip = restored.duration().as_secs_f64();
        // -25.93% and +35% are rounded figures, so the trip is not exact
        assert!((round_trip - original).abs() / original < 0.002);
    }

    #[test]
    fn test_zero_shift_is_identity() {
        let buffer = sine(100, 8000, Channels::Mono);
        let out = SpeedShift::new(0.0).unwrap().process(&buffer).unwrap();
        assert_eq!(out, buffer);
    }
}
