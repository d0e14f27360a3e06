//! Signal analysis: level measurement and gain estimation

pub mod gain;
pub mod level;

pub use gain::{GainEstimator, GainMode};
