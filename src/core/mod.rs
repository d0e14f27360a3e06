//! Core audio types and structures

/// Audio buffer and channel types
pub mod audio;
/// Fragments and silence thresholds produced by segmentation
pub mod fragment;

pub use audio::{AudioBuffer, BitDepth, Channels};
pub use fragment::{Fragment, SilenceThreshold};
