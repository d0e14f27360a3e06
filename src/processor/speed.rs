//! Speed correction for sides captured at the wrong turntable speed.
//!
//! Every side is captured at the workflow's capture speed (45 RPM). A side whose
//! record actually runs at 33⅓ is slowed down after capture; anything else is left as is.

use super::external::{Operation, OutputMode, SignalProcessor};
use super::ProcessingResult;
use crate::config::SpeedConfig;
use crate::metadata::ReleaseMetadata;
use crate::naming;
use log::info;
use std::path::Path;

/// Speed marker for records that need correcting
pub const SLOW_MARKER: &str = "33";

/// Percentage passed to a speed tool to go from `from_rpm` to `to_rpm`.
///
/// Negative when slowing down, rounded to two decimals. The two directions are not
/// inverses: 45 → 33⅓ is -25.93% while 33⅓ → 45 is +35.00%.
pub fn speed_shift_percent(from_rpm: f64, to_rpm: f64) -> f64 {
    let percent = (to_rpm - from_rpm) / from_rpm * 100.0;
    (percent * 100.0).round() / 100.0
}

/// Where the recorded speed was learned from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeedSource {
    /// Explicit `NNrpm` marker in the file name
    Filename(String),
    /// Release media description mentions 33 RPM
    Media,
    /// No indication, assume the capture speed is right
    Unknown,
}

/// Whether a side needs correcting
#[derive(Debug, Clone, PartialEq)]
pub enum SpeedDecision {
    /// Apply a speed shift of `percent`
    NeedsCorrection {
        /// Rate change for the speed tool
        percent: f64,
        /// Evidence for the decision
        source: SpeedSource,
    },
    /// Leave the side alone
    NoActionNeeded {
        /// Evidence for the decision
        source: SpeedSource,
    },
}

/// Recorded speed marker for `file`: the filename wins, then the media description
pub fn detect_speed(file: &Path, release: &ReleaseMetadata) -> SpeedSource {
    if let Some(marker) = naming::speed_marker(file) {
        return SpeedSource::Filename(marker);
    }
    let media = release.media.to_lowercase();
    if media.contains(SLOW_MARKER) && media.contains("rpm") {
        return SpeedSource::Media;
    }
    SpeedSource::Unknown
}

/// Speed correction stage
#[derive(Debug, Clone)]
pub struct SpeedCorrector {
    capture_rpm: f64,
    slow_rpm: f64,
}

impl SpeedCorrector {
    /// Create from configuration
    pub fn new(config: &SpeedConfig) -> Self {
        SpeedCorrector {
            capture_rpm: config.capture_rpm,
            slow_rpm: config.slow_rpm,
        }
    }

    /// Decide whether `file` needs slowing down
    pub fn decide(&self, file: &Path, release: &ReleaseMetadata) -> SpeedDecision {
        let source = detect_speed(file, release);
        let slow = match &source {
            SpeedSource::Filename(marker) => marker == SLOW_MARKER,
            SpeedSource::Media => true,
            SpeedSource::Unknown => false,
        };

        if slow {
            SpeedDecision::NeedsCorrection {
                percent: speed_shift_percent(self.capture_rpm, self.slow_rpm),
                source,
            }
        } else {
            SpeedDecision::NoActionNeeded { source }
        }
    }

    /// Correct `file` in place when its release runs slower than the capture speed
    pub fn correct_speed(
        &self,
        file: &Path,
        release: &ReleaseMetadata,
        processor: &dyn SignalProcessor,
    ) -> ProcessingResult {
        self.correct_with(file, self.decide(file, release), processor)
    }

    /// Carry out an earlier `decision` on `file`, which may be a working copy of the
    /// capture the decision was made for
    pub fn correct_with(
        &self,
        file: &Path,
        decision: SpeedDecision,
        processor: &dyn SignalProcessor,
    ) -> ProcessingResult {
        match decision {
            SpeedDecision::NoActionNeeded { source } => {
                info!("No speed correction for {} ({:?})", file.display(), source);
                ProcessingResult::ok(Some(file.to_path_buf()), "speed correction not needed")
            }
            SpeedDecision::NeedsCorrection { percent, source } => {
                info!(
                    "Correcting speed of {} by {:+.2}% ({:?})",
                    file.display(),
                    percent,
                    source
                );
                processor.apply(file, &Operation::SpeedShift { percent }, &OutputMode::ReplaceInPlace)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AudioResult;
    use std::cell::RefCell;

    struct Recorder(RefCell<Vec<Operation>>);

    impl SignalProcessor for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn render(&self, _source: &Path, _target: &Path, operation: &Operation) -> AudioResult<()> {
            self.0.borrow_mut().push(*operation);
            Ok(())
        }

        fn apply(&self, source: &Path, operation: &Operation, _mode: &OutputMode) -> ProcessingResult {
            self.0.borrow_mut().push(*operation);
            ProcessingResult::ok(Some(source.to_path_buf()), "recorded")
        }
    }

    fn release(media: &str) -> ReleaseMetadata {
        ReleaseMetadata {
            release_id: "12345678".to_string(),
            media: media.to_string(),
            ..ReleaseMetadata::default()
        }
    }

    fn corrector() -> SpeedCorrector {
        SpeedCorrector::new(&SpeedConfig::default())
    }

    #[test]
    fn test_shift_percentages_are_asymmetric() {
        assert_eq!(speed_shift_percent(45.0, 100.0 / 3.0), -25.93);
        assert_eq!(speed_shift_percent(100.0 / 3.0, 45.0), 35.0);
        assert_eq!(speed_shift_percent(45.0, 45.0), 0.0);
    }

    #[test]
    fn test_media_triggers_correction() {
        let decision = corrector().decide(Path::new("/rips/side r12345678.wav"), &release("Vinyl (33 1/3 RPM)"));
        assert_eq!(
            decision,
            SpeedDecision::NeedsCorrection {
                percent: -25.93,
                source: SpeedSource::Media
            }
        );
    }

    #[test]
    fn test_filename_marker_wins() {
        let decision = corrector().decide(
            Path::new("/rips/side 45rpm r12345678.wav"),
            &release("Vinyl (33 1/3 RPM)"),
        );
        assert!(matches!(decision, SpeedDecision::NoActionNeeded { source: SpeedSource::Filename(m) } if m == "45"));

        let decision = corrector().decide(Path::new("/rips/side_33rpm.wav"), &release("Vinyl, 7\""));
        assert!(matches!(decision, SpeedDecision::NeedsCorrection { .. }));
    }

    #[test]
    fn test_media_without_rpm_is_ignored() {
        let decision = corrector().decide(Path::new("/rips/side.wav"), &release("Vinyl, 33 cm"));
        assert_eq!(decision, SpeedDecision::NoActionNeeded { source: SpeedSource::Unknown });
    }

    #[test]
    fn test_correct_speed_invokes_processor_once() {
        let recorder = Recorder(RefCell::new(Vec::new()));
        let result = corrector().correct_speed(
            Path::new("/rips/side.wav"),
            &release("Vinyl, LP, 33 ⅓ rpm"),
            &recorder,
        );
        assert!(result.success);
        assert_eq!(
            recorder.0.borrow().as_slice(),
            &[Operation::SpeedShift { percent: -25.93 }]
        );
    }

    #[test]
    fn test_decision_applies_to_working_copy() {
        let recorder = Recorder(RefCell::new(Vec::new()));
        let corrector = corrector();
        let decision = corrector.decide(Path::new("/rips/side_33rpm.wav"), &release(""));

        // The copy's temporary name carries no marker; the decision still holds
        let result = corrector.correct_with(Path::new("/rips/.vinyl-split-work-1.wav"), decision, &recorder);
        assert!(result.success);
        assert_eq!(result.path.as_deref(), Some(Path::new("/rips/.vinyl-split-work-1.wav")));
        assert_eq!(
            recorder.0.borrow().as_slice(),
            &[Operation::SpeedShift { percent: -25.93 }]
        );
    }

    #[test]
    fn test_no_op_does_not_invoke_processor() {
        let recorder = Recorder(RefCell::new(Vec::new()));
        let result = corrector().correct_speed(Path::new("/rips/side_45rpm.wav"), &release("Vinyl (33 1/3 RPM)"), &recorder);
        assert!(result.success);
        assert!(recorder.0.borrow().is_empty());
    }
}
