//! Pipeline configuration, built once at startup and passed by reference

use crate::analysis::{GainEstimator, GainMode};
use crate::core::BitDepth;
use crate::error::{AudioError, AudioResult};
use crate::processor::segment::{SegmentParams, Segmenter};
use crate::processor::split::{AdaptiveSplitter, SplitBounds};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Adaptive split search
    pub split: SplitConfig,
    /// Silence detection
    pub segment: SegmentConfig,
    /// Gain normalization
    pub gain: GainConfig,
    /// Turntable speeds
    pub speed: SpeedConfig,
    /// Signal processor backend
    pub tools: ToolsConfig,
    /// Written tracks
    pub output: OutputConfig,
}

/// Threshold search configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    /// Lower end of the search interval in dBFS
    pub low_bound_db: f32,
    /// Upper end of the search interval in dBFS
    pub high_bound_db: f32,
    /// Segmentation attempts before giving up
    pub max_attempts: u32,
    /// Threshold used once when the release has no track count
    pub default_threshold_db: f32,
}

/// Silence detection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentConfig {
    /// Shortest gap between tracks
    pub min_silence_ms: u32,
    /// RMS window
    pub window_ms: u32,
    /// Silence kept around each track
    pub padding_ms: u32,
    /// Small filter that only removes noise blips
    pub noise_fragment_bytes: u64,
    /// Large filter for anything that should count as a track
    pub min_track_bytes: u64,
}

/// Gain normalization configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GainConfig {
    /// Peak or RMS measurement
    pub mode: GainMode,
    /// Target level in dBFS
    pub reference_db: f32,
    /// Deviation from the target that is left alone
    pub tolerance_db: f32,
}

/// Turntable speeds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SpeedConfig {
    /// Speed every side is captured at
    pub capture_rpm: f64,
    /// Speed of records that need correcting
    pub slow_rpm: f64,
}

/// Which signal processor rewrites files
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process filters
    #[default]
    Native,
    /// External command line tools
    External,
}

/// External tool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ToolsConfig {
    /// Backend used for speed and gain rewrites
    pub backend: Backend,
    /// Argument template for speed changes
    pub speed_command: Vec<String>,
    /// Argument template for gain changes
    pub gain_command: Vec<String>,
    /// Wall clock limit for one tool invocation
    pub timeout_secs: u64,
}

/// Written track format
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Sample format of written files
    pub bit_depth: BitDepth,
}

/// Which minimum-size filter a segmentation applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentFilter {
    /// Drop only noise blips
    Noise,
    /// Drop anything too short to be a track
    Track,
}

impl Default for SplitConfig {
    fn default() -> Self {
        let bounds = SplitBounds::default();
        Self {
            low_bound_db: bounds.low_db,
            high_bound_db: bounds.high_db,
            max_attempts: bounds.max_attempts,
            default_threshold_db: -45.0,
        }
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        let params = SegmentParams::default();
        Self {
            min_silence_ms: params.min_silence_ms,
            window_ms: params.window_ms,
            padding_ms: params.padding_ms,
            noise_fragment_bytes: 1024 * 1024,
            min_track_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Default for GainConfig {
    fn default() -> Self {
        Self {
            mode: GainMode::Peak,
            reference_db: -1.0,
            tolerance_db: 0.5,
        }
    }
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            capture_rpm: 45.0,
            slow_rpm: 100.0 / 3.0,
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        let template = |args: &[&str]| args.iter().map(|s| s.to_string()).collect();
        Self {
            backend: Backend::Native,
            speed_command: template(&["sox", "{source}", "{target}", "speed", "{factor}"]),
            gain_command: template(&["sox", "{source}", "{target}", "gain", "{gain_db}"]),
            timeout_secs: 300,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file
    ///
    /// Missing fields use default values.
    pub fn load(path: &Path) -> AudioResult<Self> {
        let contents = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, or return defaults if the file does not exist
    pub fn load_or_default(path: &Path) -> AudioResult<Self> {
        match Self::load(path) {
            Err(AudioError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            other => other,
        }
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> AudioResult<()> {
        self.split_bounds().validate()?;
        Segmenter::new(self.segment_params(FragmentFilter::Track))?;
        self.gain_estimator()?;

        if self.speed.capture_rpm <= 0.0 || self.speed.slow_rpm <= 0.0 {
            return Err(AudioError::ConfigError(
                "Turntable speeds must be positive".to_string(),
            ));
        }
        if self.tools.backend == Backend::External
            && (self.tools.speed_command.is_empty() || self.tools.gain_command.is_empty())
        {
            return Err(AudioError::ConfigError(
                "External backend needs speed and gain command templates".to_string(),
            ));
        }
        if self.tools.timeout_secs == 0 {
            return Err(AudioError::ConfigError(
                "Tool timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Threshold search interval
    pub fn split_bounds(&self) -> SplitBounds {
        SplitBounds {
            low_db: self.split.low_bound_db,
            high_db: self.split.high_bound_db,
            max_attempts: self.split.max_attempts,
        }
    }

    /// Segmentation parameters with the chosen size filter
    pub fn segment_params(&self, filter: FragmentFilter) -> SegmentParams {
        SegmentParams {
            min_silence_ms: self.segment.min_silence_ms,
            window_ms: self.segment.window_ms,
            padding_ms: self.segment.padding_ms,
            min_fragment_bytes: match filter {
                FragmentFilter::Noise => self.segment.noise_fragment_bytes,
                FragmentFilter::Track => self.segment.min_track_bytes,
            },
        }
    }

    /// Splitter counting fragments that pass the track filter
    pub fn splitter(&self) -> AudioResult<AdaptiveSplitter> {
        let segmenter = Segmenter::new(self.segment_params(FragmentFilter::Track))?;
        AdaptiveSplitter::new(segmenter, self.split_bounds())
    }

    /// Gain estimator for the configured reference
    pub fn gain_estimator(&self) -> AudioResult<GainEstimator> {
        GainEstimator::new(self.gain.mode, self.gain.reference_db, self.gain.tolerance_db)
    }
}
