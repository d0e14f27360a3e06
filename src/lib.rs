#![warn(missing_docs)]

//! # vinyl-split: turning raw vinyl side captures into track files
//!
//! Each capture is one WAV recording of a whole record side, named after its
//! catalogue release id. The pipeline looks the release up, corrects the turntable
//! speed when a 33⅓ record was captured at 45, normalizes the level, then searches
//! for the silence threshold that cuts the side into exactly the expected number
//! of tracks.
//!
//! ## Quick Start
//!
//! ```ignore
//! use vinyl_split::{Pipeline, PipelineConfig, ReleaseCatalog, processor};
//!
//! let config = PipelineConfig::load_or_default("vinyl-split.toml".as_ref())?;
//! let catalog = ReleaseCatalog::load("releases.json")?;
//! let backend = processor::from_config(&config);
//!
//! let summary = Pipeline::new(&config, &catalog, backend.as_ref())
//!     .process_batch(&["side_a r1234567.wav".into()]);
//! println!("{}", summary);
//! ```

/// Level measurement and gain estimation
pub mod analysis;
/// Pipeline configuration
pub mod config;
/// Core audio types and structures
pub mod core;
/// Audio decoder implementations
pub mod decoder;
/// Audio encoder implementations
pub mod encoder;
/// Error types for audio operations
pub mod error;
/// Audio filter implementations
pub mod filter;
/// Release metadata and catalogue lookup
pub mod metadata;
/// File name conventions
pub mod naming;
/// Per-file orchestration
pub mod pipeline;
/// Processing stages and signal processor backends
pub mod processor;

pub use config::PipelineConfig;
pub use core::{AudioBuffer, BitDepth, Channels, Fragment, SilenceThreshold};
pub use error::{AudioError, AudioResult};
pub use metadata::{MetadataLookup, ReleaseCatalog, ReleaseMetadata};
pub use pipeline::{BatchSummary, CancelFlag, FileOutcome, FileReport, Pipeline};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
