// Engine configuration

use pitch_core::Result;
use pitch_renderer::{AudioRenderer, AudioSpec, ClockRendererFactory, RenderCallback, RendererFactory};
use pitch_renderer_cpal::{device_output_available, CpalRendererFactory};
use std::path::PathBuf;
use std::time::Duration;

/// Seconds of decoded audio kept ahead of the renderer
pub const DEFAULT_BUFFER_SECONDS: u32 = 5;

/// Headless renderer callback period
pub const DEFAULT_CLOCK_PERIOD_MS: u64 = 10;

/// Decoder pauses above this ring fill level
pub const BUFFER_HIGH_WATER: f32 = 0.9;

/// Which renderer drives playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RendererChoice {
    /// Device output when this build has it, otherwise headless
    #[default]
    Auto,
    /// Device output only
    Device,
    /// Real-time clock without sound
    Headless,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory that site-absolute paths (`/x.mp3`) resolve against
    pub asset_root: Option<PathBuf>,
    pub buffer_seconds: u32,
    /// Refuse `start` until a user gesture was reported
    pub require_user_interaction: bool,
    pub renderer: RendererChoice,
    pub clock_period_ms: u64,
    pub http_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            asset_root: None,
            buffer_seconds: DEFAULT_BUFFER_SECONDS,
            require_user_interaction: false,
            renderer: RendererChoice::Auto,
            clock_period_ms: DEFAULT_CLOCK_PERIOD_MS,
            http_retries: 3,
        }
    }
}

impl EngineConfig {
    pub fn with_asset_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.asset_root = Some(root.into());
        self
    }

    pub fn with_interaction_gate(mut self, required: bool) -> Self {
        self.require_user_interaction = required;
        self
    }

    pub fn with_renderer(mut self, renderer: RendererChoice) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_clock_period(mut self, period: Duration) -> Self {
        self.clock_period_ms = period.as_millis().max(1) as u64;
        self
    }

    /// Renderer factory for the configured choice
    pub fn renderer_factory(&self) -> Box<dyn RendererFactory> {
        let clock = ClockRendererFactory {
            period: Duration::from_millis(self.clock_period_ms.max(1)),
        };

        match self.renderer {
            RendererChoice::Device => Box::new(CpalRendererFactory),
            RendererChoice::Headless => Box::new(clock),
            RendererChoice::Auto if device_output_available() => Box::new(FallbackRendererFactory {
                primary: CpalRendererFactory,
                fallback: clock,
            }),
            RendererChoice::Auto => {
                log::debug!("[engine] No device backend compiled in, using headless renderer");
                Box::new(clock)
            }
        }
    }
}

/// Device output, or the headless clock when no device can be opened
struct FallbackRendererFactory {
    primary: CpalRendererFactory,
    fallback: ClockRendererFactory,
}

impl RendererFactory for FallbackRendererFactory {
    fn name(&self) -> &'static str {
        "auto"
    }

    fn create_renderer(&self, spec: AudioSpec, callback: RenderCallback) -> Result<Box<dyn AudioRenderer>> {
        // The callback is consumed by a failed attempt, so open the device with a no-op first
        match self.primary.create_renderer(spec, Box::new(|buffer: &mut [f32]| buffer.fill(0.0))) {
            Ok(mut device) => {
                device.release()?;
                self.primary.create_renderer(spec, callback)
            }
            Err(e) => {
                log::warn!("[engine] Device output unavailable ({}), using headless renderer", e);
                self.fallback.create_renderer(spec, callback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.buffer_seconds, 5);
        assert_eq!(config.clock_period_ms, 10);
        assert_eq!(config.http_retries, 3);
        assert!(!config.require_user_interaction);
        assert_eq!(config.renderer, RendererChoice::Auto);
    }

    #[test]
    fn test_headless_factory() {
        let config = EngineConfig::default().with_renderer(RendererChoice::Headless);
        assert_eq!(config.renderer_factory().name(), "clock");
    }

    #[test]
    fn test_clock_period_has_floor() {
        let config = EngineConfig::default().with_clock_period(Duration::from_micros(10));
        assert_eq!(config.clock_period_ms, 1);
    }
}
