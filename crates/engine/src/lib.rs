// Playback engine: the platform media facility behind the controller

pub mod config;
pub mod output;
pub mod source;

pub use config::{EngineConfig, RendererChoice};
pub use output::SymphoniaOutput;
pub use source::{locate, open_source, SourceLocation};

use pitch_core::{AudioPlaybackController, ControllerConfig};

/// Controller wired to a [`SymphoniaOutput`]
pub fn create_controller(config: ControllerConfig, engine: EngineConfig) -> AudioPlaybackController {
    AudioPlaybackController::new(Box::new(SymphoniaOutput::new(engine)), config)
}
