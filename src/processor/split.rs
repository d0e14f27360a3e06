//! Adaptive split: binary search over the silence threshold until the segmenter
//! agrees with the catalogued track count.
//!
//! # Monotonicity assumption
//!
//! Raising the threshold classifies more windows as silence, which is assumed to
//! yield at least as many fragments. When the count is too low the search moves the
//! lower bound up, when it is too high it moves the upper bound down. Real records
//! can break the assumption (a quiet passage turns into silence and swallows a track),
//! so every attempt is checked against the ones before it and a violation is reported
//! as [`SplitOutcome::NonConvergent`] rather than a plain count mismatch.

use crate::core::{AudioBuffer, Fragment, SilenceThreshold};
use crate::error::{AudioError, AudioResult};
use crate::processor::segment::{LevelProfile, Segmenter};
use log::{debug, info, warn};
use std::fmt;

/// Narrowest threshold interval still worth searching
pub const MIN_INTERVAL_DB: f32 = 0.01;

/// Search interval and attempt budget
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitBounds {
    /// Lower (more negative) threshold in dBFS
    pub low_db: f32,
    /// Upper threshold in dBFS
    pub high_db: f32,
    /// Segmentation attempts before giving up
    pub max_attempts: u32,
}

impl Default for SplitBounds {
    fn default() -> Self {
        SplitBounds {
            low_db: -55.0,
            high_db: -35.0,
            max_attempts: 8,
        }
    }
}

impl SplitBounds {
    /// Check the interval is ordered, within threshold range, and has a budget
    pub fn validate(&self) -> AudioResult<()> {
        SilenceThreshold::new(self.low_db)?;
        SilenceThreshold::new(self.high_db)?;
        if self.low_db >= self.high_db {
            return Err(AudioError::ConfigError(format!(
                "Split bounds must satisfy low < high, got {} .. {}",
                self.low_db, self.high_db
            )));
        }
        if self.max_attempts == 0 {
            return Err(AudioError::ConfigError(
                "Split needs at least one attempt".to_string(),
            ));
        }
        Ok(())
    }
}

/// One segmentation run during the search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attempt {
    /// Threshold tried
    pub threshold: SilenceThreshold,
    /// Fragments found at that threshold
    pub fragments: usize,
}

/// Terminal state of an adaptive split
#[derive(Debug, Clone, PartialEq)]
pub enum SplitOutcome {
    /// A threshold produced exactly the expected count
    Matched {
        /// Fragments in time order
        fragments: Vec<Fragment>,
        /// Every attempt made, the last one being the match
        trace: Vec<Attempt>,
    },
    /// The attempt budget ran out without an exact match
    Exhausted {
        /// Expected track count
        expected: usize,
        /// Every attempt made
        trace: Vec<Attempt>,
    },
    /// The search could not make progress or its premise was violated
    NonConvergent {
        /// Expected track count
        expected: usize,
        /// Every attempt made
        trace: Vec<Attempt>,
        /// What went wrong
        reason: String,
    },
}

impl SplitOutcome {
    /// Attempt history regardless of outcome
    pub fn trace(&self) -> &[Attempt] {
        match self {
            SplitOutcome::Matched { trace, .. }
            | SplitOutcome::Exhausted { trace, .. }
            | SplitOutcome::NonConvergent { trace, .. } => trace,
        }
    }

    /// Fragments when matched
    pub fn into_fragments(self) -> Option<Vec<Fragment>> {
        match self {
            SplitOutcome::Matched { fragments, .. } => Some(fragments),
            _ => None,
        }
    }

    /// Render the trace as `-45.00 dBFS→4, -40.00 dBFS→5`
    pub fn describe_trace(&self) -> String {
        self.trace()
            .iter()
            .map(|a| format!("{}→{}", a.threshold, a.fragments))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for SplitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitOutcome::Matched { fragments, trace } => write!(
                f,
                "matched {} tracks after {} attempts",
                fragments.len(),
                trace.len()
            ),
            SplitOutcome::Exhausted { expected, trace } => write!(
                f,
                "expected {} tracks, never matched in {} attempts [{}]",
                expected,
                trace.len(),
                self.describe_trace()
            ),
            SplitOutcome::NonConvergent {
                expected, reason, ..
            } => write!(
                f,
                "expected {} tracks, search did not converge ({}) [{}]",
                expected,
                reason,
                self.describe_trace()
            ),
        }
    }
}

enum SearchState {
    Searching {
        low: f32,
        high: f32,
        trace: Vec<Attempt>,
        violation: Option<String>,
    },
    Done(SplitOutcome),
}

/// Drives the [`Segmenter`] through a bounded binary search over the threshold
#[derive(Debug, Clone)]
pub struct AdaptiveSplitter {
    segmenter: Segmenter,
    bounds: SplitBounds,
}

impl AdaptiveSplitter {
    /// Create a splitter
    pub fn new(segmenter: Segmenter, bounds: SplitBounds) -> AudioResult<Self> {
        bounds.validate()?;
        Ok(AdaptiveSplitter { segmenter, bounds })
    }

    /// Search configuration
    pub fn bounds(&self) -> SplitBounds {
        self.bounds
    }

    /// Search for a threshold that yields exactly `expected` fragments
    pub fn split(&self, buffer: &AudioBuffer, expected: usize) -> SplitOutcome {
        let profile = self.segmenter.profile(buffer);
        let mut state = SearchState::Searching {
            low: self.bounds.low_db,
            high: self.bounds.high_db,
            trace: Vec::with_capacity(self.bounds.max_attempts as usize),
            violation: None,
        };

        loop {
            state = match state {
                SearchState::Done(outcome) => {
                    match &outcome {
                        SplitOutcome::Matched { .. } => info!("Split {}", outcome),
                        _ => warn!("Split failed: {}", outcome),
                    }
                    return outcome;
                }
                SearchState::Searching {
                    low,
                    high,
                    trace,
                    violation,
                } => self.step(&profile, expected, low, high, trace, violation),
            };
        }
    }

    /// Accept whatever a single segmentation finds, used when the track count is unknown
    pub fn split_unchecked(&self, buffer: &AudioBuffer, threshold: SilenceThreshold) -> SplitOutcome {
        let fragments = self.segmenter.segment(buffer, threshold);
        info!(
            "Track count unknown, accepting {} fragments at {}",
            fragments.len(),
            threshold
        );
        let trace = vec![Attempt {
            threshold,
            fragments: fragments.len(),
        }];
        SplitOutcome::Matched { fragments, trace }
    }

    fn step(
        &self,
        profile: &LevelProfile,
        expected: usize,
        low: f32,
        high: f32,
        mut trace: Vec<Attempt>,
        mut violation: Option<String>,
    ) -> SearchState {
        let mid = (low + high) / 2.0;
        let threshold = match SilenceThreshold::new(mid) {
            Ok(t) => t,
            Err(e) => {
                return SearchState::Done(SplitOutcome::NonConvergent {
                    expected,
                    trace,
                    reason: e.to_string(),
                })
            }
        };

        let fragments = self.segmenter.segment_profile(profile, threshold);
        let attempt = Attempt {
            threshold,
            fragments: fragments.len(),
        };
        debug!(
            "Split attempt {}/{}: {} → {} fragments (want {})",
            trace.len() + 1,
            self.bounds.max_attempts,
            threshold,
            attempt.fragments,
            expected
        );

        if violation.is_none() {
            violation = trace
                .iter()
                .find(|prev| {
                    (prev.threshold.db() < mid && prev.fragments > attempt.fragments)
                        || (prev.threshold.db() > mid && prev.fragments < attempt.fragments)
                })
                .map(|prev| {
                    format!(
                        "{} gave {} fragments but {} gave {}",
                        prev.threshold, prev.fragments, threshold, attempt.fragments
                    )
                });
        }
        trace.push(attempt);

        if attempt.fragments == expected {
            return SearchState::Done(SplitOutcome::Matched { fragments, trace });
        }

        if trace.len() >= self.bounds.max_attempts as usize {
            return SearchState::Done(match violation {
                Some(reason) => SplitOutcome::NonConvergent {
                    expected,
                    trace,
                    reason: format!("fragment count not monotonic: {}", reason),
                },
                None => SplitOutcome::Exhausted { expected, trace },
            });
        }

        let (low, high) = if attempt.fragments < expected {
            (mid, high)
        } else {
            (low, mid)
        };

        if high - low < MIN_INTERVAL_DB {
            return SearchState::Done(SplitOutcome::NonConvergent {
                expected,
                trace,
                reason: format!("threshold interval collapsed to {:.4} dB", high - low),
            });
        }

        SearchState::Searching {
            low,
            high,
            trace,
            violation,
        }
    }
}
