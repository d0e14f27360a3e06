use super::external::{Operation, SignalProcessor};
use crate::core::BitDepth;
use crate::decoder;
use crate::encoder;
use crate::error::AudioResult;
use crate::filter::{Filter, Gain, SpeedShift};
use std::path::Path;

/// In-process signal processor: decode, filter, encode as WAV
#[derive(Debug, Clone)]
pub struct NativeProcessor {
    bit_depth: BitDepth,
}

impl NativeProcessor {
    /// Create a processor writing samples at `bit_depth`
    pub fn new(bit_depth: BitDepth) -> Self {
        NativeProcessor { bit_depth }
    }
}

impl SignalProcessor for NativeProcessor {
    fn name(&self) -> &str {
        "native"
    }

    fn render(&self, source: &Path, target: &Path, operation: &Operation) -> AudioResult<()> {
        let input = decoder::decode_file(source)?;
        let output = match *operation {
            Operation::SpeedShift { percent } => SpeedShift::new(percent)?.process(&input)?,
            Operation::Amplify { gain_db } => Gain::db(gain_db)?.process(&input)?,
        };
        encoder::write_wav(target, &output, self.bit_depth)
    }
}
