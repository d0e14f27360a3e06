//! Signal level measurements in dBFS

/// Level reported for digital silence
pub const FLOOR_DB: f32 = -120.0;

/// Convert a linear amplitude to dBFS, clamped to [`FLOOR_DB`]
pub fn amplitude_to_db(amplitude: f32) -> f32 {
    if amplitude <= 0.0 {
        return FLOOR_DB;
    }
    (20.0 * amplitude.log10()).max(FLOOR_DB)
}

/// Calculate peak level of audio samples
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().map(|&s| s.abs()).fold(0.0f32, |a, b| a.max(b))
}

/// Calculate RMS of audio samples
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squared: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    (sum_squared / samples.len() as f64).sqrt() as f32
}

/// RMS level in dBFS for consecutive windows of `window` samples.
///
/// The last window may be shorter than `window`.
pub fn window_levels(mono: &[f32], window: usize) -> Vec<f32> {
    let window = window.max(1);
    mono.chunks(window).map(|w| amplitude_to_db(rms(w))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amplitude_to_db() {
        assert!((amplitude_to_db(1.0)).abs() < 1e-6);
        assert!((amplitude_to_db(0.5) + 6.0206).abs() < 0.001);
        assert_eq!(amplitude_to_db(0.0), FLOOR_DB);
    }

    #[test]
    fn test_peak_and_rms() {
        let samples = [0.0, 0.25, 0.5, -0.3];
        assert!((peak(&samples) - 0.5).abs() < 1e-6);
        assert!((rms(&[0.5, -0.5]) - 0.5).abs() < 1e-6);
        assert_eq!(rms(&[]), 0.0);
    }

    #[test]
    fn test_window_levels() {
        let mut mono = vec![0.5f32; 100];
        mono.extend(vec![0.0; 100]);
        mono.extend(vec![0.5; 50]);

        let levels = window_levels(&mono, 100);
        assert_eq!(levels.len(), 3);
        assert!((levels[0] + 6.0206).abs() < 0.01);
        assert_eq!(levels[1], FLOOR_DB);
        assert!((levels[2] + 6.0206).abs() < 0.01);
    }
}
