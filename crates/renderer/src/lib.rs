// Audio renderer abstraction layer

mod clock;

pub use clock::{ClockRenderer, ClockRendererFactory};

use pitch_core::Result;

/// Callback that fills an interleaved f32 buffer; runs on the renderer's thread
pub type RenderCallback = Box<dyn FnMut(&mut [f32]) + Send + 'static>;

/// Audio renderer trait
/// Implementations pull PCM through the callback given at creation
pub trait AudioRenderer: Send {
    /// Start or resume pulling audio
    fn start(&mut self) -> Result<()>;

    /// Stop pulling audio, keeping the stream alive
    fn pause(&mut self) -> Result<()>;

    /// Whether the callback is currently being driven
    fn is_running(&self) -> bool;

    /// Format actually used by the renderer
    fn spec(&self) -> AudioSpec;

    /// Release all audio resources; the callback is dropped
    fn release(&mut self) -> Result<()>;
}

/// Audio format specification for the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioSpec {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
        }
    }

    /// Samples needed to hold `seconds` of audio
    pub fn samples_for(&self, seconds: u32) -> usize {
        self.sample_rate as usize * self.channels as usize * seconds as usize
    }
}

impl Default for AudioSpec {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
        }
    }
}

/// Audio renderer factory trait
pub trait RendererFactory: Send + Sync {
    /// Human readable name for logs
    fn name(&self) -> &'static str;

    /// Create a renderer for `spec`, driven by `callback`
    fn create_renderer(&self, spec: AudioSpec, callback: RenderCallback) -> Result<Box<dyn AudioRenderer>>;
}
