// Audio decoding using Symphonia

use pitch_core::{PlaybackError, Result};
use pitch_demux_symphonia::Demuxer;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::Packet;

/// Audio decoder producing interleaved f32 PCM
pub struct AudioDecoder {
    decoder: Box<dyn Decoder>,
    sample_rate: u32,
    channels: u16,
}

impl AudioDecoder {
    /// Create decoder for the demuxer's selected track
    pub fn from_demuxer(demuxer: &Demuxer) -> Result<Self> {
        let track_info = demuxer.track_info()?;
        let track = demuxer
            .format_reader()
            .tracks()
            .iter()
            .find(|t| t.id == demuxer.track_id())
            .ok_or_else(|| PlaybackError::Output("track not found".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| PlaybackError::Output(format!("failed to create decoder: {}", e)))?;

        Ok(Self {
            decoder,
            sample_rate: track_info.sample_rate,
            channels: track_info.channels,
        })
    }

    /// Decode a packet into interleaved samples.
    ///
    /// A corrupt packet yields an empty vector; the stream carries on.
    pub fn decode(&mut self, packet: &Packet) -> Result<Vec<f32>> {
        let decoded = match self.decoder.decode(packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                log::warn!("Skipping undecodable packet: {}", msg);
                return Ok(Vec::new());
            }
            Err(e) => return Err(PlaybackError::Output(format!("decoding failed: {}", e))),
        };

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);
        Ok(buffer.samples().to_vec())
    }

    /// Forget decoder state after a seek
    pub fn reset(&mut self) {
        self.decoder.reset();
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }
}
