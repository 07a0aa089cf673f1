// Controller configuration

/// Default distance covered by the skip buttons (seconds)
pub const DEFAULT_SKIP_STEP_SECONDS: f64 = 10.0;

/// Source the elevator-pitch page binds when none is given
pub const DEFAULT_SOURCE: &str = "/elevator-pitch.mp3";

/// Where to send visitors when the audio cannot be played
pub const DEFAULT_CONTACT_FALLBACK: &str = "/#contact";

/// Per-instance controller settings
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// Step used by `skip_forward` / `skip_backward`
    pub skip_step_seconds: f64,
    /// Source bound by `bind_default`
    pub default_source: String,
    /// Alternate contact path recommended for unrecoverable errors
    pub contact_fallback: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            skip_step_seconds: DEFAULT_SKIP_STEP_SECONDS,
            default_source: DEFAULT_SOURCE.to_string(),
            contact_fallback: DEFAULT_CONTACT_FALLBACK.to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn with_skip_step(mut self, seconds: f64) -> Self {
        if seconds.is_finite() && seconds > 0.0 {
            self.skip_step_seconds = seconds;
        } else {
            log::warn!("Ignoring invalid skip step: {}", seconds);
        }
        self
    }

    pub fn with_default_source(mut self, source: impl Into<String>) -> Self {
        self.default_source = source.into();
        self
    }

    pub fn with_contact_fallback(mut self, path: impl Into<String>) -> Self {
        self.contact_fallback = path.into();
        self
    }
}
