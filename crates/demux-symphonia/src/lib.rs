// Demuxing audio formats using Symphonia

use pitch_core::{PlaybackError, Result};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;

/// Audio demuxer wrapper
pub struct Demuxer {
    format_reader: Box<dyn FormatReader>,
    track_id: u32,
}

impl Demuxer {
    /// Probe a media source and select its default track.
    ///
    /// Any probe failure is reported as `ResourceUnavailable` for `uri`.
    pub fn from_media_source(uri: &str, media_source: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let media_source_stream = MediaSourceStream::new(media_source, Default::default());

        let probe_result = symphonia::default::get_probe()
            .format(
                &hint,
                media_source_stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| PlaybackError::unavailable(uri, format!("failed to probe media: {}", e)))?;

        let format_reader = probe_result.format;
        let track_id = format_reader
            .default_track()
            .map(|track| track.id)
            .ok_or_else(|| PlaybackError::unavailable(uri, "no default track found"))?;

        log::debug!(
            "Probed {}: {} track(s), default track {}",
            uri,
            format_reader.tracks().len(),
            track_id
        );

        Ok(Self {
            format_reader,
            track_id,
        })
    }

    /// Create a hint from the extension of a path or URL
    pub fn hint_for(uri: &str) -> Hint {
        let mut hint = Hint::new();
        let path = uri.split(|c: char| c == '?' || c == '#').next().unwrap_or(uri);
        if let Some(extension) = std::path::Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
        {
            hint.with_extension(extension);
        }
        hint
    }

    /// Next packet of the selected track; `None` at end of stream
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            let packet = match self.format_reader.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(e) => {
                    return Err(PlaybackError::Output(format!("failed to read packet: {}", e)));
                }
            };

            // Only return packets for our track
            if packet.track_id() == self.track_id {
                return Ok(Some(packet));
            }
            log::trace!("Skipping packet of track {}", packet.track_id());
        }
    }

    /// Seek to a position in seconds
    pub fn seek(&mut self, position_seconds: f64) -> Result<()> {
        let position = position_seconds.max(0.0);
        let time = Time::new(position.trunc() as u64, position.fract());
        self.format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| {
                log::warn!("Seek to {:.3}s failed: {}", position, e);
                PlaybackError::Output(format!("seek failed: {}", e))
            })?;
        log::debug!("Seeked to {:.3}s", position);
        Ok(())
    }

    /// Get track information
    pub fn track_info(&self) -> Result<TrackInfo> {
        let track = self
            .format_reader
            .tracks()
            .iter()
            .find(|t| t.id == self.track_id)
            .ok_or_else(|| PlaybackError::Output("track not found".to_string()))?;

        let params = &track.codec_params;
        let sample_rate = params
            .sample_rate
            .ok_or_else(|| PlaybackError::Output("sample rate not specified".to_string()))?;

        let duration_seconds = match (params.time_base, params.n_frames) {
            (Some(tb), Some(n_frames)) => {
                let time = tb.calc_time(n_frames);
                time.seconds as f64 + time.frac
            }
            (None, Some(n_frames)) => n_frames as f64 / sample_rate as f64,
            _ => 0.0,
        };

        Ok(TrackInfo {
            sample_rate,
            channels: params.channels.map(|c| c.count() as u16).unwrap_or(2),
            duration_seconds,
        })
    }

    pub fn format_reader(&self) -> &dyn FormatReader {
        &*self.format_reader
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }
}

/// Track information
#[derive(Debug, Clone, PartialEq)]
pub struct TrackInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// 0 when the container does not state the length
    pub duration_seconds: f64,
}
