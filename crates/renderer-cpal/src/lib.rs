// Device audio renderer using cpal

#[cfg(feature = "cpal")]
mod cpal_renderer;

#[cfg(feature = "cpal")]
pub use cpal_renderer::CpalRenderer;

use pitch_core::Result;
use pitch_renderer::{AudioRenderer, AudioSpec, RenderCallback, RendererFactory};

/// Factory for the default output device
#[derive(Debug, Clone, Copy, Default)]
pub struct CpalRendererFactory;

impl RendererFactory for CpalRendererFactory {
    fn name(&self) -> &'static str {
        "cpal"
    }

    #[cfg(feature = "cpal")]
    fn create_renderer(&self, spec: AudioSpec, callback: RenderCallback) -> Result<Box<dyn AudioRenderer>> {
        Ok(Box::new(CpalRenderer::new(spec, callback)?))
    }

    #[cfg(not(feature = "cpal"))]
    fn create_renderer(&self, _spec: AudioSpec, _callback: RenderCallback) -> Result<Box<dyn AudioRenderer>> {
        Err(pitch_core::PlaybackError::Output(
            "device output is not available: built without the `cpal` feature".to_string(),
        ))
    }
}

/// Whether this build can open an output device
pub fn device_output_available() -> bool {
    cfg!(feature = "cpal")
}
