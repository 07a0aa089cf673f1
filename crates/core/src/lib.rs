// Core types and traits for the elevator-pitch audio player

pub mod callback;
pub mod config;
pub mod controller;
pub mod error;
pub mod output;
pub mod state;
pub mod time;

// Re-export commonly used types
pub use callback::{ControllerEvent, ObserverRegistry, PlaybackObserver, SubscriptionId};
pub use config::ControllerConfig;
pub use controller::AudioPlaybackController;
pub use error::{ErrorKind, PlaybackError, Result};
pub use output::{BindingId, EventSink, MediaOutput, OutputEvent};
pub use state::{PlaybackSession, PlaybackSnapshot, PlaybackStatus};
pub use time::{format_time, progress_ratio};
