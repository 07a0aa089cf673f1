// Error handling for audio playback

/// User-facing message for a source that cannot be loaded or decoded
pub const UNAVAILABLE_MESSAGE: &str = "Audio content is not available at the moment";

/// User-facing message for a play request rejected by an interaction policy
pub const BLOCKED_MESSAGE: &str = "Playback was blocked. Please interact with the page first.";

/// User-facing message for an unexpected output failure
pub const OUTPUT_MESSAGE: &str = "There was a problem initializing the audio player";

/// Playback error types
///
/// Every variant is surfaced to the presentation layer through the session's
/// `last_error`; none of them is retried automatically.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    /// The source could not be fetched, probed or decoded
    #[error("resource unavailable: {uri}: {reason}")]
    ResourceUnavailable { uri: String, reason: String },

    /// The output facility refused to start without a prior user interaction
    #[error("playback blocked: {0}")]
    PlaybackBlocked(String),

    /// Fatal platform/output error
    #[error("output error: {0}")]
    Output(String),
}

/// Discriminant of [`PlaybackError`], handy for FFI codes and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ResourceUnavailable,
    PlaybackBlocked,
    Output,
}

impl PlaybackError {
    pub fn unavailable(uri: impl Into<String>, reason: impl Into<String>) -> Self {
        PlaybackError::ResourceUnavailable {
            uri: uri.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PlaybackError::ResourceUnavailable { .. } => ErrorKind::ResourceUnavailable,
            PlaybackError::PlaybackBlocked(_) => ErrorKind::PlaybackBlocked,
            PlaybackError::Output(_) => ErrorKind::Output,
        }
    }

    /// Blocked playback only needs an explicit user gesture before `play()` is retried
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PlaybackError::PlaybackBlocked(_))
    }

    /// Message suitable for display next to the player
    pub fn user_message(&self) -> &'static str {
        match self {
            PlaybackError::ResourceUnavailable { .. } => UNAVAILABLE_MESSAGE,
            PlaybackError::PlaybackBlocked(_) => BLOCKED_MESSAGE,
            PlaybackError::Output(_) => OUTPUT_MESSAGE,
        }
    }

    /// Whether the presentation layer should offer the alternate contact path
    pub fn suggests_contact_fallback(&self) -> bool {
        !self.is_recoverable()
    }
}

/// Result type alias for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_is_the_only_recoverable_kind() {
        assert!(PlaybackError::PlaybackBlocked("policy".into()).is_recoverable());
        assert!(!PlaybackError::unavailable("a.mp3", "missing").is_recoverable());
        assert!(!PlaybackError::Output("device gone".into()).is_recoverable());
    }

    #[test]
    fn test_user_messages() {
        let err = PlaybackError::unavailable("missing.mp3", "No such file");
        assert_eq!(err.kind(), ErrorKind::ResourceUnavailable);
        assert_eq!(err.user_message(), UNAVAILABLE_MESSAGE);
        assert!(err.suggests_contact_fallback());
        assert_eq!(err.to_string(), "resource unavailable: missing.mp3: No such file");

        let blocked = PlaybackError::PlaybackBlocked("NotAllowedError".into());
        assert_eq!(blocked.user_message(), BLOCKED_MESSAGE);
        assert!(!blocked.suggests_contact_fallback());
    }
}
