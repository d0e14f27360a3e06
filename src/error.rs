use std::io;
use thiserror::Error;

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;

/// Error types for the capture pipeline
#[derive(Error, Debug)]
pub enum AudioError {
    /// IO error (file operations, disk access)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Unsupported audio format
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Invalid audio metadata
    #[error("Invalid audio metadata: {0}")]
    InvalidMetadata(String),

    /// Decoding failed
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Encoding failed
    #[error("Encode error: {0}")]
    EncodeError(String),

    /// Resampling operation failed
    #[error("Resampling error: {0}")]
    ResamplingError(String),

    /// Invalid channel configuration
    #[error("Invalid channel configuration: expected {expected}, got {got}")]
    InvalidChannels {
        /// Expected number of channels
        expected: u32,
        /// Got number of channels
        got: u32,
    },

    /// Invalid sample rate
    #[error("Invalid sample rate: {rate}")]
    InvalidSampleRate {
        /// The invalid sample rate
        rate: u32,
    },

    /// Buffer-related error
    #[error("Buffer error: {0}")]
    BufferError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Filename did not follow the capture naming conventions
    #[error("Naming error: {0}")]
    Naming(String),

    /// Release metadata missing or malformed
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// External tool exited unsuccessfully
    #[error("{tool} exited with {code:?}: {stderr}")]
    ExternalTool {
        /// Program name
        tool: String,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// External tool exceeded its time limit and was killed
    #[error("{tool} timed out after {seconds:.1}s")]
    Timeout {
        /// Program name
        tool: String,
        /// Configured limit
        seconds: f64,
    },

    /// Audio processing error
    #[error("Processing error: {0}")]
    ProcessingError(String),
}

impl From<symphonia::core::errors::Error> for AudioError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        AudioError::DecodeError(err.to_string())
    }
}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        match err {
            hound::Error::IoError(e) => AudioError::Io(e),
            e => AudioError::EncodeError(e.to_string()),
        }
    }
}

impl From<rubato::ResamplerConstructionError> for AudioError {
    fn from(err: rubato::ResamplerConstructionError) -> Self {
        AudioError::ResamplingError(err.to_string())
    }
}

impl From<rubato::ResampleError> for AudioError {
    fn from(err: rubato::ResampleError) -> Self {
        AudioError::ResamplingError(err.to_string())
    }
}

impl From<tempfile::PersistError> for AudioError {
    fn from(err: tempfile::PersistError) -> Self {
        AudioError::Io(err.error)
    }
}

impl From<serde_json::Error> for AudioError {
    fn from(err: serde_json::Error) -> Self {
        AudioError::Metadata(err.to_string())
    }
}

impl From<toml::de::Error> for AudioError {
    fn from(err: toml::de::Error) -> Self {
        AudioError::ConfigError(err.to_string())
    }
}
