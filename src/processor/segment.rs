use crate::analysis::level;
use crate::core::{AudioBuffer, Fragment, SilenceThreshold};
use crate::error::{AudioError, AudioResult};
use crate::filter::Downmix;
use log::debug;

/// Default analysis window
pub const DEFAULT_WINDOW_MS: u32 = 50;
/// Default silence kept on each side of a fragment
pub const DEFAULT_PADDING_MS: u32 = 500;

/// Silence-based segmentation parameters that stay fixed across thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentParams {
    /// Shortest silence that separates two fragments
    pub min_silence_ms: u32,
    /// RMS analysis window length
    pub window_ms: u32,
    /// Silence retained before and after each fragment
    pub padding_ms: u32,
    /// Fragments estimated smaller than this are dropped
    pub min_fragment_bytes: u64,
}

impl Default for SegmentParams {
    fn default() -> Self {
        SegmentParams {
            min_silence_ms: 1500,
            window_ms: DEFAULT_WINDOW_MS,
            padding_ms: DEFAULT_PADDING_MS,
            min_fragment_bytes: 1024 * 1024,
        }
    }
}

/// Per-window RMS levels of a buffer, computed once and reused for every threshold
#[derive(Debug, Clone)]
pub struct LevelProfile {
    levels: Vec<f32>,
    window_frames: usize,
    total_frames: usize,
    sample_rate: u32,
    channels: u32,
}

impl LevelProfile {
    /// Number of analysis windows
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True when the buffer had no frames
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    fn window_span(&self, first: usize, last: usize) -> (usize, usize) {
        let start = first * self.window_frames;
        let end = ((last + 1) * self.window_frames).min(self.total_frames);
        (start, end)
    }
}

/// Silence-based segmenter.
///
/// Pure: no I/O, and the same buffer and threshold always give the same fragments.
#[derive(Debug, Clone)]
pub struct Segmenter {
    params: SegmentParams,
}

impl Segmenter {
    /// Create a new segmenter
    pub fn new(params: SegmentParams) -> AudioResult<Self> {
        if params.window_ms == 0 {
            return Err(AudioError::ConfigError(
                "Analysis window must be at least 1 ms".to_string(),
            ));
        }
        if params.min_silence_ms < params.window_ms {
            return Err(AudioError::ConfigError(format!(
                "Minimum silence ({} ms) is shorter than the analysis window ({} ms)",
                params.min_silence_ms, params.window_ms
            )));
        }
        Ok(Segmenter { params })
    }

    /// Segmentation parameters
    pub fn params(&self) -> &SegmentParams {
        &self.params
    }

    /// Measure the level envelope of `buffer`
    pub fn profile(&self, buffer: &AudioBuffer) -> LevelProfile {
        let mono = Downmix::to_mono(buffer.samples(), buffer.channels().count() as usize);
        let window_frames = buffer.ms_to_frames(self.params.window_ms).max(1);

        LevelProfile {
            levels: level::window_levels(&mono, window_frames),
            window_frames,
            total_frames: buffer.frames(),
            sample_rate: buffer.sample_rate(),
            channels: buffer.channels().count(),
        }
    }

    /// Split `buffer` into fragments separated by silence at `threshold`
    pub fn segment(&self, buffer: &AudioBuffer, threshold: SilenceThreshold) -> Vec<Fragment> {
        self.segment_profile(&self.profile(buffer), threshold)
    }

    /// Segment a precomputed level profile
    pub fn segment_profile(&self, profile: &LevelProfile, threshold: SilenceThreshold) -> Vec<Fragment> {
        let silences = self.silent_spans(profile, threshold);
        let padding = (self.params.padding_ms as u64 * profile.sample_rate as u64 / 1000) as usize;

        // Complement of the silent spans, each bounded by silence midpoints for padding
        let mut candidates = Vec::with_capacity(silences.len() + 1);
        let mut cursor = 0usize;
        let mut left_limit = 0usize;
        for &(silence_start, silence_end) in &silences {
            if silence_start > cursor {
                let midpoint = silence_start + (silence_end - silence_start) / 2;
                let start = cursor.saturating_sub(padding).max(left_limit);
                let end = (silence_start + padding).min(midpoint);
                candidates.push((start, end));
            }
            cursor = silence_end;
            left_limit = silence_start + (silence_end - silence_start) / 2;
        }
        if cursor < profile.total_frames {
            let start = cursor.saturating_sub(padding).max(left_limit);
            candidates.push((start, profile.total_frames));
        }

        let fragments: Vec<Fragment> = candidates
            .into_iter()
            .map(|(start, end)| Fragment::new(start, end, profile.sample_rate, profile.channels))
            .filter(|f| f.estimated_bytes() >= self.params.min_fragment_bytes)
            .collect();

        debug!(
            "Segmented at {}: {} silences, {} fragments",
            threshold,
            silences.len(),
            fragments.len()
        );
        fragments
    }

    /// Frame ranges of silence runs lasting at least `min_silence_ms`
    fn silent_spans(&self, profile: &LevelProfile, threshold: SilenceThreshold) -> Vec<(usize, usize)> {
        let min_frames =
            (self.params.min_silence_ms as u64 * profile.sample_rate as u64 / 1000) as usize;
        let mut spans = Vec::new();
        let mut run_start: Option<usize> = None;

        for (i, &db) in profile.levels.iter().enumerate() {
            let silent = db <= threshold.db();
            match (silent, run_start) {
                (true, None) => run_start = Some(i),
                (false, Some(first)) => {
                    let (start, end) = profile.window_span(first, i - 1);
                    if end - start >= min_frames {
                        spans.push((start, end));
                    }
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(first) = run_start {
            let (start, end) = profile.window_span(first, profile.len() - 1);
            if end - start >= min_frames {
                spans.push((start, end));
            }
        }

        spans
    }
}

/// Segment `buffer` with default window and padding
pub fn segment(
    buffer: &AudioBuffer,
    threshold: SilenceThreshold,
    min_silence_ms: u32,
    min_fragment_bytes: u64,
) -> AudioResult<Vec<Fragment>> {
    let segmenter = Segmenter::new(SegmentParams {
        min_silence_ms,
        min_fragment_bytes,
        ..SegmentParams::default()
    })?;
    Ok(segmenter.segment(buffer, threshold))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::Channels;

    pub(crate) const RATE: u32 = 8000;

    /// Mono capture of `tracks` tones of `track_secs` separated by gaps of the given
    /// noise floors (linear amplitude), with one second of lead-in and lead-out.
    pub(crate) fn capture(track_secs: f32, gap_floors: &[f32]) -> AudioBuffer {
        let track = (track_secs * RATE as f32) as usize;
        let gap = 2 * RATE as usize;
        let tone = |i: usize| (2.0 * std::f32::consts::PI * 330.0 * i as f32 / RATE as f32).sin() * 0.5;

        let mut samples = vec![0.0f32; RATE as usize];
        for i in 0..track {
            samples.push(tone(i));
        }
        for &floor in gap_floors {
            samples.extend((0..gap).map(|i| if i % 2 == 0 { floor } else { -floor }));
            for i in 0..track {
                samples.push(tone(i));
            }
        }
        samples.extend(vec![0.0f32; RATE as usize]);
        AudioBuffer::new(samples, RATE, Channels::Mono).unwrap()
    }

    fn segmenter() -> Segmenter {
        Segmenter::new(SegmentParams {
            min_silence_ms: 1000,
            window_ms: 50,
            padding_ms: 200,
            min_fragment_bytes: 16_000,
        })
        .unwrap()
    }

    fn threshold(db: f32) -> SilenceThreshold {
        SilenceThreshold::new(db).unwrap()
    }

    #[test]
    fn test_finds_tracks_in_order() {
        // Gaps at -60 dBFS and -40 dBFS
        let buffer = capture(3.0, &[0.001, 0.01]);
        let fragments = segmenter().segment(&buffer, threshold(-35.0));

        assert_eq!(fragments.len(), 3);
        assert!(fragments.windows(2).all(|w| w[0].end_frame <= w[1].start_frame));
        // Padding keeps some lead-in silence
        assert_eq!(fragments[0].start_frame, RATE as usize - 1600);
    }

    #[test]
    fn test_stricter_threshold_merges_tracks() {
        let buffer = capture(3.0, &[0.001, 0.01]);
        // -50 dBFS sits between the two gap floors: only the quiet gap splits
        assert_eq!(segmenter().segment(&buffer, threshold(-50.0)).len(), 2);
        assert_eq!(segmenter().segment(&buffer, threshold(-70.0)).len(), 1);
    }

    #[test]
    fn test_short_blips_are_dropped() {
        // A 0.5 s tone plus padding is 14400 bytes, below the 16000 byte filter
        let buffer = capture(0.5, &[0.0]);
        let fragments = segmenter().segment(&buffer, threshold(-35.0));
        assert!(fragments.is_empty());
    }

    #[test]
    fn test_deterministic() {
        let buffer = capture(3.0, &[0.001, 0.01]);
        let s = segmenter();
        for db in [-55.0, -45.0, -35.0] {
            assert_eq!(s.segment(&buffer, threshold(db)), s.segment(&buffer, threshold(db)));
        }
    }

    #[test]
    fn test_all_silence_yields_nothing() {
        let buffer = AudioBuffer::new(vec![0.0; 5 * RATE as usize], RATE, Channels::Mono).unwrap();
        assert!(segmenter().segment(&buffer, threshold(-40.0)).is_empty());
    }

    #[test]
    fn test_padding_stops_at_silence_midpoint() {
        let params = SegmentParams {
            min_silence_ms: 1000,
            window_ms: 50,
            padding_ms: 5000,
            min_fragment_bytes: 0,
        };
        let buffer = capture(3.0, &[0.0]);
        let fragments = Segmenter::new(params).unwrap().segment(&buffer, threshold(-40.0));

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].end_frame, fragments[1].start_frame);
    }

    #[test]
    fn test_invalid_params() {
        let params = SegmentParams {
            min_silence_ms: 10,
            window_ms: 50,
            ..SegmentParams::default()
        };
        assert!(Segmenter::new(params).is_err());
    }

    #[test]
    fn test_free_function() {
        let buffer = capture(3.0, &[0.0]);
        let fragments = segment(&buffer, threshold(-40.0), 1000, 16_000).unwrap();
        assert_eq!(fragments.len(), 2);
    }
}
