// Observer mechanism for controller events

use crate::error::PlaybackError;
use crate::state::PlaybackStatus;
use std::sync::Arc;

/// Controller event types
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    /// Session status changed
    StatusChanged {
        old_status: PlaybackStatus,
        new_status: PlaybackStatus,
    },

    /// Playback position updated
    PositionChanged {
        position_seconds: f64,
        duration_seconds: Option<f64>,
    },

    /// An error was recorded as `last_error`
    Error(PlaybackError),
}

/// Observer trait
/// Implementations should be lightweight; they run on the controller's thread
pub trait PlaybackObserver: Send + Sync {
    fn on_event(&self, event: &ControllerEvent);
}

/// Handle returned by [`ObserverRegistry::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registry of observers, dispatched in subscription order.
///
/// Position updates are forwarded as they arrive; pacing is left to the
/// media facility.
#[derive(Default)]
pub struct ObserverRegistry {
    observers: Vec<(SubscriptionId, Arc<dyn PlaybackObserver>)>,
    next_id: u64,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: Arc<dyn PlaybackObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// Returns false when `id` was not subscribed
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sub, _)| *sub != id);
        self.observers.len() != before
    }

    pub fn clear(&mut self) {
        self.observers.clear();
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    pub fn dispatch(&self, event: &ControllerEvent) {
        for (_, observer) in &self.observers {
            observer.on_event(event);
        }
    }
}

/// Recording observer for tests
#[cfg(test)]
pub(crate) struct TestObserver {
    events: parking_lot::Mutex<Vec<ControllerEvent>>,
}

#[cfg(test)]
impl TestObserver {
    pub fn new() -> Self {
        Self {
            events: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<ControllerEvent> {
        self.events.lock().clone()
    }

    pub fn statuses(&self) -> Vec<PlaybackStatus> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ControllerEvent::StatusChanged { new_status, .. } => Some(*new_status),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
impl PlaybackObserver for TestObserver {
    fn on_event(&self, event: &ControllerEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_reaches_every_observer() {
        let mut registry = ObserverRegistry::new();
        let first = Arc::new(TestObserver::new());
        let second = Arc::new(TestObserver::new());
        registry.subscribe(first.clone());
        registry.subscribe(second.clone());

        // Position updates are not throttled
        for i in 0..10 {
            registry.dispatch(&ControllerEvent::PositionChanged {
                position_seconds: i as f64 * 0.01,
                duration_seconds: Some(1.0),
            });
        }

        assert_eq!(first.events().len(), 10);
        assert_eq!(second.events().len(), 10);
    }

    #[test]
    fn test_unsubscribe() {
        let mut registry = ObserverRegistry::new();
        let observer = Arc::new(TestObserver::new());
        let id = registry.subscribe(observer.clone());

        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));
        assert!(registry.is_empty());

        registry.dispatch(&ControllerEvent::StatusChanged {
            old_status: PlaybackStatus::Unloaded,
            new_status: PlaybackStatus::Loading,
        });
        assert!(observer.events().is_empty());
    }
}
