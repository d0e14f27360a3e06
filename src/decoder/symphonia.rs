use crate::core::{AudioBuffer, Channels};
use crate::error::{AudioError, AudioResult};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Symphonia-based audio decoder
pub struct SymphoniaDecoder {
    /// Current reader for the audio source
    reader: Box<dyn symphonia::core::formats::FormatReader>,
    /// Track information
    track_id: u32,
    /// Sample rate
    sample_rate: u32,
    /// Number of channels
    channels: Channels,
    /// Whether decoding is finished
    finished: bool,
    /// Current decoder state
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    /// Reusable interleaving buffer, sized on the first packet
    sample_buf: Option<SampleBuffer<f32>>,
}

impl SymphoniaDecoder {
    /// Create decoder from file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> AudioResult<Self> {
        let path = path.as_ref();

        let file = Box::new(File::open(path)?);
        let mss = MediaSourceStream::new(file, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions::default();
        let metadata_opts = MetadataOptions::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &metadata_opts)
            .map_err(|e| AudioError::UnsupportedFormat(e.to_string()))?;

        let reader = probed.format;

        // Find the first audio track
        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::InvalidMetadata("No audio track found".to_string()))?
            .clone();

        let track_id = track.id;
        let codec_params = &track.codec_params;

        let sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| AudioError::InvalidMetadata("Unknown sample rate".to_string()))?;

        let channels = match codec_params.channels {
            Some(channels) => Channels::from_count(channels.count() as u32)?,
            None => {
                return Err(AudioError::InvalidMetadata(
                    "Unknown channel count".to_string(),
                ))
            }
        };

        let decoder = symphonia::default::get_codecs()
            .make(codec_params, &Default::default())
            .map_err(|e| AudioError::DecodeError(e.to_string()))?;

        Ok(SymphoniaDecoder {
            reader,
            track_id,
            sample_rate,
            channels,
            finished: false,
            decoder,
            sample_buf: None,
        })
    }
}

impl super::Decoder for SymphoniaDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> Channels {
        self.channels
    }

    fn decode_packet(&mut self) -> AudioResult<Option<Vec<f32>>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let packet = match self.reader.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    self.finished = true;
                    return Ok(None);
                }
                Err(e) => return Err(AudioError::DecodeError(e.to_string())),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(symphonia::core::errors::Error::DecodeError(msg)) => {
                    log::warn!("Skipping corrupt packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(AudioError::DecodeError(e.to_string())),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let needs_alloc = self
                .sample_buf
                .as_ref()
                .map(|buf| buf.capacity() < decoded.capacity() * self.channels.count() as usize)
                .unwrap_or(true);
            if needs_alloc {
                let spec = *decoded.spec();
                self.sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }

            let buf = self
                .sample_buf
                .as_mut()
                .ok_or_else(|| AudioError::BufferError("Sample buffer missing".to_string()))?;
            buf.copy_interleaved_ref(decoded);

            return Ok(Some(buf.samples().to_vec()));
        }
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
