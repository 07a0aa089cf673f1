// Playback session state

use crate::error::PlaybackError;
use crate::output::BindingId;
use crate::time::progress_ratio;

/// Session status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// No source bound
    Unloaded,
    /// Source bound, waiting for metadata
    Loading,
    /// Metadata resolved, not started yet
    Ready,
    /// Audio is currently playing
    Playing,
    /// Audio is paused
    Paused,
    /// Playback reached the end, position was reset to 0
    Ended,
    /// Loading or output failed
    Failed,
}

impl PlaybackStatus {
    /// Whether `self -> to` is an edge of the playback state machine.
    ///
    /// Teardown (`Unloaded`) and failure (`Failed`) are reachable from anywhere.
    pub fn can_transition_to(self, to: PlaybackStatus) -> bool {
        use PlaybackStatus::*;

        match (self, to) {
            (_, Unloaded) | (_, Failed) => true,

            (Unloaded, Loading) => true,

            (Loading, Ready) => true,

            (Ready, Playing) => true,
            (Ready, Paused) => true, // play rejected by policy

            (Playing, Paused) => true,
            (Playing, Ended) => true,

            (Paused, Playing) => true,

            (Ended, Playing) => true,
            (Ended, Paused) => true, // seek after end, or play rejected by policy

            _ => false,
        }
    }

    /// Whether the transport buttons should be enabled
    pub fn accepts_transport(self) -> bool {
        matches!(
            self,
            PlaybackStatus::Ready
                | PlaybackStatus::Playing
                | PlaybackStatus::Paused
                | PlaybackStatus::Ended
        )
    }
}

/// The single session owned by a controller
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub source_uri: String,
    pub binding: BindingId,
    pub status: PlaybackStatus,
    pub duration_seconds: Option<f64>,
    pub position_seconds: f64,
    pub last_error: Option<PlaybackError>,
}

impl PlaybackSession {
    pub fn new(source_uri: impl Into<String>, binding: BindingId) -> Self {
        Self {
            source_uri: source_uri.into(),
            binding,
            status: PlaybackStatus::Unloaded,
            duration_seconds: None,
            position_seconds: 0.0,
            last_error: None,
        }
    }

    /// Clamp a target into `[0, duration]`; an unknown duration clamps to 0
    pub fn clamp_position(&self, target_seconds: f64) -> f64 {
        let upper = self.duration_seconds.unwrap_or(0.0);
        target_seconds.max(0.0).min(upper)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot {
            status: self.status,
            position_seconds: self.position_seconds,
            duration_seconds: self.duration_seconds,
            last_error: self.last_error.clone(),
        }
    }
}

/// Read-only view handed to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSnapshot {
    pub status: PlaybackStatus,
    pub position_seconds: f64,
    pub duration_seconds: Option<f64>,
    pub last_error: Option<PlaybackError>,
}

impl PlaybackSnapshot {
    pub fn unloaded() -> Self {
        Self {
            status: PlaybackStatus::Unloaded,
            position_seconds: 0.0,
            duration_seconds: None,
            last_error: None,
        }
    }

    /// `position / duration`, with 1 substituted for a zero/unknown duration
    pub fn progress(&self) -> f64 {
        progress_ratio(self.position_seconds, self.duration_seconds)
    }

    pub fn is_loading(&self) -> bool {
        self.status == PlaybackStatus::Loading
    }

    pub fn is_playing(&self) -> bool {
        self.status == PlaybackStatus::Playing
    }
}
