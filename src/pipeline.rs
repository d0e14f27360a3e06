//! Per-file orchestration: speed correction, gain normalization, adaptive split,
//! track writing and tagging.
//!
//! Each file runs to completion before the next one starts. A failing stage ends
//! that file's run and the batch moves on. Speed and gain rewrite a working copy
//! beside the capture, so the capture itself is never modified and a rerun starts
//! from the same audio.

use crate::config::PipelineConfig;
use crate::core::{AudioBuffer, Fragment, SilenceThreshold};
use crate::decoder;
use crate::encoder;
use crate::error::AudioResult;
use crate::metadata::{MetadataLookup, ReleaseMetadata};
use crate::naming;
use crate::processor::external::write_via_temp;
use crate::processor::speed::{SpeedCorrector, SpeedDecision};
use crate::processor::{
    AdaptiveSplitter, Operation, OutputMode, ProcessingResult, SignalProcessor, SplitOutcome,
};
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::{Builder, NamedTempFile};

/// Shared flag that stops processing at the next stage boundary
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// New, not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Writes per-track tags and final names once a capture is split
pub trait TrackTagger {
    /// Tag `tracks` (in order, track 1 first) using `release`
    fn tag_tracks(&self, tracks: &[PathBuf], release: &ReleaseMetadata) -> AudioResult<()>;
}

/// Tagger that only logs what it was given
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTagging;

impl TrackTagger for NoTagging {
    fn tag_tracks(&self, tracks: &[PathBuf], release: &ReleaseMetadata) -> AudioResult<()> {
        info!(
            "{} tracks of release {} ready for tagging",
            tracks.len(),
            release.release_id
        );
        Ok(())
    }
}

/// Tags and cover art captured before a rewrite
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSnapshot {
    /// Text frames by canonical name
    pub fields: BTreeMap<String, String>,
    /// Embedded cover art
    pub cover_art: Option<Vec<u8>>,
}

/// Preserves embedded metadata across rewrites by tools that drop it
pub trait TagStore {
    /// Read the tags currently embedded in `path`
    fn snapshot(&self, path: &Path) -> AudioResult<TagSnapshot>;

    /// Write `snapshot` back into `path`
    fn restore(&self, path: &Path, snapshot: &TagSnapshot) -> AudioResult<()>;
}

/// Tag store for captures that carry no tags
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTags;

impl TagStore for NoTags {
    fn snapshot(&self, _path: &Path) -> AudioResult<TagSnapshot> {
        Ok(TagSnapshot::default())
    }

    fn restore(&self, _path: &Path, _snapshot: &TagSnapshot) -> AudioResult<()> {
        Ok(())
    }
}

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Path normalization and release id extraction
    Naming,
    /// Release lookup
    Metadata,
    /// Speed correction
    Speed,
    /// Gain normalization
    Gain,
    /// Adaptive split
    Split,
    /// Writing track files
    Tracks,
    /// Handing tracks to the tagger
    Tagging,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Naming => "naming",
            Stage::Metadata => "metadata",
            Stage::Speed => "speed",
            Stage::Gain => "gain",
            Stage::Split => "split",
            Stage::Tracks => "tracks",
            Stage::Tagging => "tagging",
        };
        f.write_str(name)
    }
}

/// Final state of one file's run
#[derive(Debug, Clone, PartialEq)]
pub enum FileOutcome {
    /// All stages succeeded
    Completed {
        /// Track files in order
        tracks: Vec<PathBuf>,
    },
    /// Input problem, nothing was attempted
    Skipped {
        /// Why
        reason: String,
    },
    /// A stage failed
    Failed {
        /// The failing stage
        stage: Stage,
        /// Diagnostic
        reason: String,
    },
    /// Cancellation was requested before the run finished
    Cancelled,
}

/// Everything that happened to one input file
#[derive(Debug, Clone)]
pub struct FileReport {
    /// Input path as given
    pub path: PathBuf,
    /// Results of the stages that ran
    pub stages: Vec<(Stage, ProcessingResult)>,
    /// Final state
    pub outcome: FileOutcome,
}

impl FileReport {
    /// Track paths when completed
    pub fn tracks(&self) -> Option<&[PathBuf]> {
        match &self.outcome {
            FileOutcome::Completed { tracks } => Some(tracks),
            _ => None,
        }
    }
}

/// Reports for a batch run
#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    /// One report per input, in input order
    pub reports: Vec<FileReport>,
}

impl BatchSummary {
    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.reports.iter().filter(|r| pred(&r.outcome)).count()
    }

    /// Files split and tagged
    pub fn completed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Completed { .. }))
    }

    /// Files skipped for input errors
    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped { .. }))
    }

    /// Files where a stage failed
    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    /// Files not finished because of cancellation
    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Cancelled))
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} completed, {} skipped, {} failed, {} cancelled",
            self.completed(),
            self.skipped(),
            self.failed(),
            self.cancelled()
        )?;
        for report in &self.reports {
            match &report.outcome {
                FileOutcome::Completed { tracks } => {
                    writeln!(f, "  ok      {} ({} tracks)", report.path.display(), tracks.len())?
                }
                FileOutcome::Skipped { reason } => {
                    writeln!(f, "  skipped {}: {}", report.path.display(), reason)?
                }
                FileOutcome::Failed { stage, reason } => {
                    writeln!(f, "  failed  {} [{}]: {}", report.path.display(), stage, reason)?
                }
                FileOutcome::Cancelled => writeln!(f, "  cancelled {}", report.path.display())?,
            }
        }
        Ok(())
    }
}

/// Per-run working state
struct Run {
    report: FileReport,
}

impl Run {
    fn new(path: &Path) -> Self {
        Run {
            report: FileReport {
                path: path.to_path_buf(),
                stages: Vec::new(),
                outcome: FileOutcome::Cancelled,
            },
        }
    }

    /// Keep `result`, ending the run when it failed
    fn record(&mut self, stage: Stage, result: ProcessingResult) -> Result<ProcessingResult, StageExit> {
        if result.success {
            self.report.stages.push((stage, result.clone()));
            Ok(result)
        } else {
            Err(self.fail(stage, result))
        }
    }

    fn fail(&mut self, stage: Stage, result: ProcessingResult) -> StageExit {
        self.report.outcome = FileOutcome::Failed {
            stage,
            reason: result.message.clone(),
        };
        self.report.stages.push((stage, result));
        StageExit::Failed
    }

    fn skip(mut self, reason: impl Into<String>) -> FileReport {
        let reason = reason.into();
        warn!("Skipping {}: {}", self.report.path.display(), reason);
        self.report.outcome = FileOutcome::Skipped { reason };
        self.report
    }
}

/// Pipeline orchestrator
pub struct Pipeline<'a> {
    config: &'a PipelineConfig,
    lookup: &'a dyn MetadataLookup,
    processor: &'a dyn SignalProcessor,
    tagger: &'a dyn TrackTagger,
    tags: &'a dyn TagStore,
    cancel: CancelFlag,
}

impl<'a> Pipeline<'a> {
    /// Create a pipeline without tagging or tag preservation
    pub fn new(
        config: &'a PipelineConfig,
        lookup: &'a dyn MetadataLookup,
        processor: &'a dyn SignalProcessor,
    ) -> Self {
        Pipeline {
            config,
            lookup,
            processor,
            tagger: &NoTagging,
            tags: &NoTags,
            cancel: CancelFlag::new(),
        }
    }

    /// Hand finished tracks to `tagger`
    pub fn with_tagger(mut self, tagger: &'a dyn TrackTagger) -> Self {
        self.tagger = tagger;
        self
    }

    /// Preserve tags around rewrites with `tags`
    pub fn with_tag_store(mut self, tags: &'a dyn TagStore) -> Self {
        self.tags = tags;
        self
    }

    /// Observe `cancel` between stages
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Process every file; one failure never stops the batch
    pub fn process_batch(&self, files: &[PathBuf]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for file in files {
            let report = if self.cancel.is_cancelled() {
                Run::new(file).report
            } else {
                self.process_file(file)
            };
            summary.reports.push(report);
        }
        info!(
            "Batch finished: {} completed, {} skipped, {} failed, {} cancelled",
            summary.completed(),
            summary.skipped(),
            summary.failed(),
            summary.cancelled()
        );
        summary
    }

    /// Run every stage for one capture
    pub fn process_file(&self, file: &Path) -> FileReport {
        let mut run = Run::new(file);
        info!("Processing {}", file.display());

        let path = match naming::normalize_path(file) {
            Ok(path) => path,
            Err(e) => return run.skip(e.to_string()),
        };
        if !naming::is_wav(&path) {
            return run.skip("not a .wav capture");
        }
        if !path.is_file() {
            return run.skip("file not found");
        }
        let Some(release_id) = naming::release_id(&path) else {
            return run.skip("no release id in file name");
        };
        run.report.stages.push((
            Stage::Naming,
            ProcessingResult::ok(Some(path.clone()), format!("release {}", release_id)),
        ));

        let release = match self.lookup.get_release(&release_id) {
            Ok(Some(release)) => release,
            Ok(None) => return run.skip(format!("release {} not found", release_id)),
            Err(e) => {
                run.fail(Stage::Metadata, ProcessingResult::from_error("lookup", &e));
                error!("Release lookup failed for {}: {}", path.display(), e);
                return run.report;
            }
        };
        run.report.stages.push((
            Stage::Metadata,
            ProcessingResult::ok(
                None,
                format!("release {}, {:?} tracks, media {:?}", release.release_id, release.track_count, release.media),
            ),
        ));

        match self.run_stages(&mut run, &path, &release) {
            Ok(tracks) => {
                info!("{}: {} tracks written", path.display(), tracks.len());
                run.report.outcome = FileOutcome::Completed { tracks };
            }
            Err(StageExit::Cancelled) => {
                warn!("{}: cancelled", path.display());
                run.report.outcome = FileOutcome::Cancelled;
            }
            Err(StageExit::Failed) => {
                if let FileOutcome::Failed { stage, reason } = &run.report.outcome {
                    error!("{}: {} stage failed: {}", path.display(), stage, reason);
                }
            }
        }
        run.report
    }

    fn checkpoint(&self) -> Result<(), StageExit> {
        if self.cancel.is_cancelled() {
            Err(StageExit::Cancelled)
        } else {
            Ok(())
        }
    }

    fn run_stages(
        &self,
        run: &mut Run,
        path: &Path,
        release: &ReleaseMetadata,
    ) -> Result<Vec<PathBuf>, StageExit> {
        self.checkpoint()?;
        let work = working_copy(path)
            .map_err(|e| run.fail(Stage::Speed, ProcessingResult::from_error("working copy", &e)))?;
        let work_path = work.path();

        let result = self.speed_stage(path, work_path, release);
        run.record(Stage::Speed, result)?;

        self.checkpoint()?;
        let (result, buffer) = self.gain_stage(path, work_path);
        run.record(Stage::Gain, result)?;

        self.checkpoint()?;
        let buffer = match buffer {
            Some(buffer) => buffer,
            None => decoder::decode_file(work_path)
                .map_err(|e| run.fail(Stage::Split, ProcessingResult::from_error("decode", &e)))?,
        };
        let fragments = self
            .split_stage(&buffer, release)
            .map_err(|message| run.fail(Stage::Split, ProcessingResult::failed(message)))?;
        run.record(
            Stage::Split,
            ProcessingResult::ok(None, format!("{} fragments", fragments.len())),
        )?;

        self.checkpoint()?;
        let tracks = self
            .write_tracks(path, &buffer, &fragments)
            .map_err(|e| run.fail(Stage::Tracks, ProcessingResult::from_error("write", &e)))?;
        run.record(
            Stage::Tracks,
            ProcessingResult::ok(None, format!("{} tracks written", tracks.len())),
        )?;

        let result = match self.tagger.tag_tracks(&tracks, release) {
            Ok(()) => ProcessingResult::ok(None, "tracks handed to tagger"),
            Err(e) => ProcessingResult::from_error("tagging", &e),
        };
        run.record(Stage::Tagging, result)?;

        if let Err(e) = work.close() {
            warn!("Could not remove working copy of {}: {}", path.display(), e);
        }
        Ok(tracks)
    }

    /// Rewrite `work`, carrying the capture's tags across
    fn rewrite_preserving_tags(
        &self,
        capture: &Path,
        work: &Path,
        rewrite: impl FnOnce() -> ProcessingResult,
    ) -> ProcessingResult {
        let snapshot = match self.tags.snapshot(capture) {
            Ok(snapshot) => snapshot,
            Err(e) => return ProcessingResult::from_error("tag snapshot", &e),
        };
        let result = rewrite();
        if result.success {
            if let Err(e) = self.tags.restore(work, &snapshot) {
                return ProcessingResult::from_error("tag restore", &e);
            }
        }
        result
    }

    fn speed_stage(&self, capture: &Path, work: &Path, release: &ReleaseMetadata) -> ProcessingResult {
        let corrector = SpeedCorrector::new(&self.config.speed);
        let decision = corrector.decide(capture, release);
        if matches!(decision, SpeedDecision::NoActionNeeded { .. }) {
            return corrector.correct_with(work, decision, self.processor);
        }
        self.rewrite_preserving_tags(capture, work, || {
            corrector.correct_with(work, decision, self.processor)
        })
    }

    /// Returns the decoded working copy when it was not rewritten, to spare a second decode
    fn gain_stage(&self, capture: &Path, work: &Path) -> (ProcessingResult, Option<AudioBuffer>) {
        let estimator = match self.config.gain_estimator() {
            Ok(estimator) => estimator,
            Err(e) => return (ProcessingResult::from_error("gain", &e), None),
        };
        let buffer = match decoder::decode_file(work) {
            Ok(buffer) => buffer,
            Err(e) => return (ProcessingResult::from_error("decode", &e), None),
        };

        match estimator.estimate_gain(&buffer) {
            None => (
                ProcessingResult::failed("gain could not be estimated (silent or malformed audio)"),
                None,
            ),
            Some(gain_db) if gain_db == 0.0 => (
                ProcessingResult::ok(Some(work.to_path_buf()), "level within tolerance"),
                Some(buffer),
            ),
            Some(gain_db) => {
                info!("{}: amplifying by {:+.2} dB", capture.display(), gain_db);
                let result = self.rewrite_preserving_tags(capture, work, || {
                    self.processor
                        .apply(work, &Operation::Amplify { gain_db }, &OutputMode::ReplaceInPlace)
                });
                (result, None)
            }
        }
    }

    fn split_stage(&self, buffer: &AudioBuffer, release: &ReleaseMetadata) -> Result<Vec<Fragment>, String> {
        let splitter: AdaptiveSplitter = self.config.splitter().map_err(|e| e.to_string())?;

        let outcome = match release.track_count {
            Some(expected) => splitter.split(buffer, expected),
            None => {
                let threshold = SilenceThreshold::new(self.config.split.default_threshold_db)
                    .map_err(|e| e.to_string())?;
                splitter.split_unchecked(buffer, threshold)
            }
        };

        match outcome {
            SplitOutcome::Matched { fragments, .. } if fragments.is_empty() => {
                Err("no tracks found".to_string())
            }
            SplitOutcome::Matched { fragments, .. } => Ok(fragments),
            other => Err(other.to_string()),
        }
    }

    /// Write each fragment to `name_N.wav`; on failure remove the ones already written
    fn write_tracks(&self, source: &Path, buffer: &AudioBuffer, fragments: &[Fragment]) -> AudioResult<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(fragments.len());
        for (index, fragment) in fragments.iter().enumerate() {
            let result = naming::track_path(source, index + 1).and_then(|target| {
                let track = buffer.slice_frames(fragment.start_frame, fragment.end_frame)?;
                write_via_temp(&target, source, |temp| {
                    encoder::write_wav(temp, &track, self.config.output.bit_depth)
                })?;
                Ok(target)
            });

            match result {
                Ok(target) => written.push(target),
                Err(e) => {
                    for track in &written {
                        if let Err(remove_err) = fs::remove_file(track) {
                            warn!("Could not remove {}: {}", track.display(), remove_err);
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(written)
    }
}

enum StageExit {
    Failed,
    Cancelled,
}

/// Copy of `capture` beside it for speed and gain to rewrite; removed when dropped
fn working_copy(capture: &Path) -> AudioResult<NamedTempFile> {
    let dir = match capture.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let work = Builder::new()
        .prefix(".vinyl-split-work-")
        .suffix(".wav")
        .tempfile_in(dir)?;
    fs::copy(capture, work.path())?;
    Ok(work)
}
