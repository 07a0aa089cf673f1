// Seam between the controller and the platform media facility

use crate::error::Result;
use std::fmt;
use std::sync::mpsc::Sender;

/// Generation number of a resource binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BindingId(pub u64);

impl BindingId {
    pub fn next(self) -> Self {
        BindingId(self.0 + 1)
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Events delivered by the media facility
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    /// Source probed, duration known (0 when the container does not say)
    MetadataResolved { duration_seconds: f64 },

    /// Position update at the facility's native tick rate
    Tick { position_seconds: f64 },

    /// Output ran out of audio
    Ended,

    /// Source could not be fetched or decoded
    LoadFailed(String),

    /// A start request was refused by an interaction policy
    PlayRejected(String),

    /// Unrecoverable output failure
    Fatal(String),
}

/// Sending half handed to the facility on `bind`.
///
/// Events are tagged with the binding they belong to; once the controller
/// tears the binding down the receiving half is gone and `send` returns false.
#[derive(Clone)]
pub struct EventSink {
    binding: BindingId,
    tx: Sender<(BindingId, OutputEvent)>,
}

impl EventSink {
    pub fn new(binding: BindingId, tx: Sender<(BindingId, OutputEvent)>) -> Self {
        Self { binding, tx }
    }

    pub fn binding(&self) -> BindingId {
        self.binding
    }

    /// Deliver an event; returns false when the session is gone
    pub fn send(&self, event: OutputEvent) -> bool {
        self.tx.send((self.binding, event)).is_ok()
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("EventSink").field("binding", &self.binding).finish()
    }
}

/// Platform media facility.
///
/// `bind` and `start` are requests; their outcomes arrive later through the
/// [`EventSink`]. Implementations must stop using the sink once `release`
/// returns.
pub trait MediaOutput: Send {
    /// Begin fetching/decoding `uri`
    fn bind(&mut self, binding: BindingId, uri: &str, sink: EventSink) -> Result<()>;

    /// Start or resume output. May reject with `PlaybackError::PlaybackBlocked`.
    fn start(&mut self) -> Result<()>;

    /// Stop output, keeping the position
    fn pause(&mut self) -> Result<()>;

    /// Move the output position (already clamped by the caller)
    fn seek(&mut self, position_seconds: f64) -> Result<()>;

    /// An explicit user gesture happened (unlocks interaction policies)
    fn user_interacted(&mut self) {}

    /// Detach callbacks and release the binding; synchronous
    fn release(&mut self) -> Result<()>;
}
