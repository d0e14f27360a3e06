//! Processing stages for a single capture

pub mod external;
pub mod native;
pub mod segment;
pub mod speed;
pub mod split;

pub use external::{ExternalProcessor, Operation, OutputMode, SignalProcessor};
pub use native::NativeProcessor;
pub use segment::{SegmentParams, Segmenter};
pub use split::{AdaptiveSplitter, SplitBounds, SplitOutcome};

use crate::config::{Backend, PipelineConfig};
use crate::error::AudioError;
use std::path::PathBuf;
use std::time::Duration;

/// Signal processor selected by the `tools` section of the configuration
pub fn from_config(config: &PipelineConfig) -> Box<dyn SignalProcessor> {
    match config.tools.backend {
        Backend::Native => Box::new(NativeProcessor::new(config.output.bit_depth)),
        Backend::External => Box::new(ExternalProcessor::new(
            config.tools.speed_command.clone(),
            config.tools.gain_command.clone(),
            Duration::from_secs(config.tools.timeout_secs),
        )),
    }
}

/// Outcome of one pipeline stage.
///
/// Stages report through this value instead of returning errors, so the caller
/// decides whether to continue with the next stage or skip the file.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingResult {
    /// Whether the stage succeeded
    pub success: bool,
    /// File produced or rewritten by the stage
    pub path: Option<PathBuf>,
    /// Human readable diagnostic
    pub message: String,
}

impl ProcessingResult {
    /// Successful stage
    pub fn ok(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        ProcessingResult {
            success: true,
            path,
            message: message.into(),
        }
    }

    /// Failed stage
    pub fn failed(message: impl Into<String>) -> Self {
        ProcessingResult {
            success: false,
            path: None,
            message: message.into(),
        }
    }

    /// Failed stage described by an error
    pub fn from_error(context: &str, err: &AudioError) -> Self {
        Self::failed(format!("{}: {}", context, err))
    }
}
