// Audio playback controller: one session, one transition function

use crate::callback::{ControllerEvent, ObserverRegistry, PlaybackObserver, SubscriptionId};
use crate::config::ControllerConfig;
use crate::error::{PlaybackError, Result};
use crate::output::{BindingId, EventSink, MediaOutput, OutputEvent};
use crate::state::{PlaybackSession, PlaybackSnapshot, PlaybackStatus};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

/// Inputs of the state machine: user commands and facility events
#[derive(Debug, Clone, PartialEq)]
enum Input {
    Bind(String),
    Unbind,
    Play,
    Pause,
    Seek(f64),
    Output(OutputEvent),
}

/// Owns the lifecycle of one audio resource and exposes transport controls.
///
/// The controller is driven from a single thread. Commands never block on
/// loading; facility outcomes are queued on a per-binding channel and applied
/// by [`pump`](Self::pump) (or handed over directly with
/// [`handle_output_event`](Self::handle_output_event)).
pub struct AudioPlaybackController {
    output: Box<dyn MediaOutput>,
    config: ControllerConfig,
    session: Option<PlaybackSession>,
    events: Option<Receiver<(BindingId, OutputEvent)>>,
    observers: ObserverRegistry,
    last_binding: BindingId,
}

impl AudioPlaybackController {
    pub fn new(output: Box<dyn MediaOutput>, config: ControllerConfig) -> Self {
        Self {
            output,
            config,
            session: None,
            events: None,
            observers: ObserverRegistry::new(),
            last_binding: BindingId::default(),
        }
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Bind a source. Rebinding the current source is a no-op unless it failed.
    pub fn bind(&mut self, source_uri: &str) -> Result<()> {
        self.transition(Input::Bind(source_uri.to_string()))
    }

    /// Bind the configured default source
    pub fn bind_default(&mut self) -> Result<()> {
        let source = self.config.default_source.clone();
        self.bind(&source)
    }

    /// Release the resource binding and return to `Unloaded`
    pub fn unbind(&mut self) {
        // Teardown cannot fail; errors from the facility are logged
        let _ = self.transition(Input::Unbind);
    }

    pub fn play(&mut self) -> Result<()> {
        self.transition(Input::Play)
    }

    pub fn pause(&mut self) -> Result<()> {
        self.transition(Input::Pause)
    }

    /// Play/pause button
    pub fn toggle(&mut self) -> Result<()> {
        if self.status() == PlaybackStatus::Playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Seek to `target_seconds`, silently clamped to `[0, duration]`
    pub fn seek(&mut self, target_seconds: f64) -> Result<()> {
        self.transition(Input::Seek(target_seconds))
    }

    /// Seek relative to the current position, same clamping as `seek`
    pub fn skip_by(&mut self, delta_seconds: f64) -> Result<()> {
        let current = self.position_seconds();
        self.seek(current + delta_seconds)
    }

    pub fn skip_forward(&mut self) -> Result<()> {
        self.skip_by(self.config.skip_step_seconds)
    }

    pub fn skip_backward(&mut self) -> Result<()> {
        self.skip_by(-self.config.skip_step_seconds)
    }

    /// Forward an explicit user gesture to the facility
    pub fn notify_user_interaction(&mut self) {
        log::debug!("User interaction noted");
        self.output.user_interacted();
    }

    // ---------------------------------------------------------------------
    // Facility events
    // ---------------------------------------------------------------------

    /// Apply every queued facility event; returns how many were handled
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let next = match &self.events {
                Some(rx) => rx.try_recv(),
                None => break,
            };
            match next {
                Ok((binding, event)) => {
                    self.handle_output_event(binding, event);
                    handled += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        handled
    }

    /// Wait up to `timeout` for one event, then drain the rest
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        let first = match &self.events {
            Some(rx) => rx.recv_timeout(timeout),
            None => return 0,
        };
        match first {
            Ok((binding, event)) => {
                self.handle_output_event(binding, event);
                1 + self.pump()
            }
            Err(_) => 0,
        }
    }

    /// Apply one facility event; events of other bindings are discarded
    pub fn handle_output_event(&mut self, binding: BindingId, event: OutputEvent) {
        let current = self.session.as_ref().map(|s| s.binding);
        if current != Some(binding) {
            log::debug!("Discarding {:?} from stale binding {}", event, binding);
            return;
        }
        if let Err(err) = self.transition(Input::Output(event)) {
            log::debug!("Facility event resulted in error: {}", err);
        }
    }

    // ---------------------------------------------------------------------
    // Observers and read-only state
    // ---------------------------------------------------------------------

    pub fn subscribe(&mut self, observer: Arc<dyn PlaybackObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.session
            .as_ref()
            .map(PlaybackSession::snapshot)
            .unwrap_or_else(PlaybackSnapshot::unloaded)
    }

    pub fn status(&self) -> PlaybackStatus {
        self.session
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(PlaybackStatus::Unloaded)
    }

    pub fn position_seconds(&self) -> f64 {
        self.session.as_ref().map(|s| s.position_seconds).unwrap_or(0.0)
    }

    pub fn duration_seconds(&self) -> Option<f64> {
        self.session.as_ref().and_then(|s| s.duration_seconds)
    }

    pub fn last_error(&self) -> Option<&PlaybackError> {
        self.session.as_ref().and_then(|s| s.last_error.as_ref())
    }

    pub fn source_uri(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.source_uri.as_str())
    }

    pub fn binding(&self) -> Option<BindingId> {
        self.session.as_ref().map(|s| s.binding)
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Alternate contact path to offer while the last error is unrecoverable
    pub fn fallback_hint(&self) -> Option<&str> {
        self.last_error()
            .filter(|err| err.suggests_contact_fallback())
            .map(|_| self.config.contact_fallback.as_str())
    }

    /// Transport buttons are disabled until metadata is known and after failures
    pub fn controls_enabled(&self) -> bool {
        self.status().accepts_transport()
    }

    /// The progress slider additionally needs a non-zero duration
    pub fn seek_enabled(&self) -> bool {
        self.controls_enabled() && self.duration_seconds().map_or(false, |d| d > 0.0)
    }

    // ---------------------------------------------------------------------
    // State machine
    // ---------------------------------------------------------------------

    fn transition(&mut self, input: Input) -> Result<()> {
        use PlaybackStatus::*;

        let status = self.status();
        match (status, input) {
            (_, Input::Unbind) => {
                self.teardown();
                Ok(())
            }
            (_, Input::Bind(uri)) => self.begin_binding(uri),

            (Loading, Input::Output(OutputEvent::MetadataResolved { duration_seconds })) => {
                let duration = if duration_seconds.is_finite() && duration_seconds > 0.0 {
                    duration_seconds
                } else {
                    0.0
                };
                if let Some(session) = self.session.as_mut() {
                    session.duration_seconds = Some(duration);
                    session.position_seconds = 0.0;
                }
                log::info!("Metadata resolved: duration {:.2}s", duration);
                self.set_status(Ready);
                self.notify_position();
                Ok(())
            }

            (Playing, Input::Play) => {
                log::debug!("play() ignored: already playing");
                Ok(())
            }
            (Ready | Paused | Ended, Input::Play) => self.start_output(status),

            (Playing, Input::Pause) => {
                if let Err(err) = self.output.pause() {
                    self.fail(err.clone());
                    return Err(err);
                }
                self.set_status(Paused);
                Ok(())
            }

            (Ready | Playing | Paused | Ended, Input::Seek(target)) => self.seek_to(status, target),

            (Playing, Input::Output(OutputEvent::Tick { position_seconds })) => {
                self.advance(position_seconds)
            }
            (Playing, Input::Output(OutputEvent::Ended)) => self.finish(),

            (Ready | Playing | Paused | Ended, Input::Output(OutputEvent::PlayRejected(reason))) => {
                self.block(PlaybackError::PlaybackBlocked(reason));
                Ok(())
            }

            (Loading | Ready | Playing | Paused | Ended, Input::Output(OutputEvent::LoadFailed(reason))) => {
                let uri = self.source_uri().unwrap_or_default().to_string();
                self.fail(PlaybackError::unavailable(uri, reason));
                Ok(())
            }
            (Loading | Ready | Playing | Paused | Ended, Input::Output(OutputEvent::Fatal(reason))) => {
                self.fail(PlaybackError::Output(reason));
                Ok(())
            }

            (status, input) => {
                log::debug!("Ignoring {:?} while {:?}", input, status);
                Ok(())
            }
        }
    }

    fn begin_binding(&mut self, uri: String) -> Result<()> {
        if let Some(session) = &self.session {
            if session.source_uri == uri && session.status != PlaybackStatus::Failed {
                log::debug!("Source already bound: {}", uri);
                return Ok(());
            }
        }

        self.teardown();

        let binding = self.last_binding.next();
        self.last_binding = binding;
        let (tx, rx) = mpsc::channel();
        self.events = Some(rx);
        self.session = Some(PlaybackSession::new(uri.clone(), binding));
        self.set_status(PlaybackStatus::Loading);

        log::info!("Binding {} to source: {}", binding, uri);

        let result = if uri.trim().is_empty() {
            Err(PlaybackError::unavailable(&uri, "empty source"))
        } else {
            self.output.bind(binding, &uri, EventSink::new(binding, tx))
        };

        if let Err(err) = result {
            let err = match err {
                PlaybackError::ResourceUnavailable { .. } => err,
                other => PlaybackError::unavailable(&uri, other.to_string()),
            };
            self.fail(err.clone());
            return Err(err);
        }
        Ok(())
    }

    fn start_output(&mut self, from: PlaybackStatus) -> Result<()> {
        if from == PlaybackStatus::Ended {
            if let Err(err) = self.output.seek(0.0) {
                self.fail(err.clone());
                return Err(err);
            }
            if let Some(session) = self.session.as_mut() {
                session.position_seconds = 0.0;
            }
        }

        match self.output.start() {
            Ok(()) => {
                if let Some(session) = self.session.as_mut() {
                    session.last_error = None;
                }
                self.set_status(PlaybackStatus::Playing);
                Ok(())
            }
            Err(err @ PlaybackError::PlaybackBlocked(_)) => {
                self.block(err.clone());
                Err(err)
            }
            Err(err) => {
                self.fail(err.clone());
                Err(err)
            }
        }
    }

    fn seek_to(&mut self, status: PlaybackStatus, target_seconds: f64) -> Result<()> {
        if target_seconds.is_nan() {
            log::debug!("Ignoring seek to NaN");
            return Ok(());
        }

        let target = match &self.session {
            Some(session) => session.clamp_position(target_seconds),
            None => return Ok(()),
        };

        if let Err(err) = self.output.seek(target) {
            self.fail(err.clone());
            return Err(err);
        }

        if let Some(session) = self.session.as_mut() {
            session.position_seconds = target;
        }
        if status == PlaybackStatus::Ended {
            self.set_status(PlaybackStatus::Paused);
        }
        self.notify_position();
        Ok(())
    }

    fn advance(&mut self, position_seconds: f64) -> Result<()> {
        if position_seconds.is_nan() {
            return Ok(());
        }

        let (position, duration) = match self.session.as_mut() {
            Some(session) => {
                // Without a known duration the tick position is shown as-is
                session.position_seconds = match session.duration_seconds {
                    Some(duration) if duration > 0.0 => session.clamp_position(position_seconds),
                    _ => position_seconds.max(0.0),
                };
                (session.position_seconds, session.duration_seconds.unwrap_or(0.0))
            }
            None => return Ok(()),
        };
        self.notify_position();

        if duration > 0.0 && position >= duration {
            return self.finish();
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        log::info!("Playback completed");

        let stopped = self.output.pause().and_then(|_| self.output.seek(0.0));
        if let Err(err) = stopped {
            self.fail(err.clone());
            return Err(err);
        }

        if let Some(session) = self.session.as_mut() {
            session.position_seconds = 0.0;
        }
        self.set_status(PlaybackStatus::Ended);
        self.notify_position();
        Ok(())
    }

    fn block(&mut self, err: PlaybackError) {
        log::warn!("Playback blocked: {}", err);
        if let Some(session) = self.session.as_mut() {
            session.last_error = Some(err.clone());
        }
        self.set_status(PlaybackStatus::Paused);
        self.observers.dispatch(&ControllerEvent::Error(err));
    }

    fn fail(&mut self, err: PlaybackError) {
        log::error!("Playback failed: {}", err);

        if self.status() == PlaybackStatus::Playing {
            if let Err(pause_err) = self.output.pause() {
                log::warn!("Failed to stop output after error: {}", pause_err);
            }
        }

        if let Some(session) = self.session.as_mut() {
            session.last_error = Some(err.clone());
        }
        self.set_status(PlaybackStatus::Failed);
        self.observers.dispatch(&ControllerEvent::Error(err));
    }

    /// Detach facility callbacks, then release the binding
    fn teardown(&mut self) {
        self.events = None;

        if let Some(session) = self.session.take() {
            log::info!("Releasing binding {} ({})", session.binding, session.source_uri);
            if let Err(err) = self.output.release() {
                log::warn!("Error while releasing binding {}: {}", session.binding, err);
            }
            if session.status != PlaybackStatus::Unloaded {
                self.observers.dispatch(&ControllerEvent::StatusChanged {
                    old_status: session.status,
                    new_status: PlaybackStatus::Unloaded,
                });
            }
        }
    }

    fn set_status(&mut self, new_status: PlaybackStatus) {
        let old_status = match self.session.as_mut() {
            Some(session) => {
                let old = session.status;
                if old == new_status {
                    return;
                }
                if !old.can_transition_to(new_status) {
                    log::warn!("Unexpected transition {:?} -> {:?}", old, new_status);
                }
                session.status = new_status;
                old
            }
            None => return,
        };

        log::debug!("Playback status changed: {:?} -> {:?}", old_status, new_status);
        self.observers.dispatch(&ControllerEvent::StatusChanged {
            old_status,
            new_status,
        });
    }

    fn notify_position(&self) {
        if let Some(session) = &self.session {
            self.observers.dispatch(&ControllerEvent::PositionChanged {
                position_seconds: session.position_seconds,
                duration_seconds: session.duration_seconds,
            });
        }
    }
}

impl Drop for AudioPlaybackController {
    fn drop(&mut self) {
        self.teardown();
        self.observers.clear();
    }
}
