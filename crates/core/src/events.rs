use crate::model::{AlarmConfig, AlarmTime, PlaybackMode};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrightnessDirection {
    Up,
    Down,
}

/// Semantic action bound to one key identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    SelectChannel(usize),
    AlarmToggle,
    PowerOff,
    VolumeUp,
    VolumeDown,
    PlayPause,
    Next,
    Previous,
    /// Relative seek in seconds, negative rewinds.
    Seek(i32),
    Brightness(BrightnessDirection),
    AlarmTimeUp,
    AlarmTimeDown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TvEvent {
    UserInteraction,
    NonPowerOffInteraction,
    Action(Action),
    AlarmTriggered { time: AlarmTime },
    AlarmChanged(AlarmConfig),
    ChannelChanged { id: String },
    ModeChanged(PlaybackMode),
    PowerChanged { on: bool },
    BrightnessChanged(f64),
}

/// Fan-out publish/subscribe. Subscribers whose receiver was dropped are
/// pruned on the next publish.
pub struct EventBus<E> {
    subscribers: Arc<Mutex<Vec<UnboundedSender<E>>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<E> {
        let (tx, rx) = unbounded_channel();
        self.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: E) {
        self.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UnboundedSender<E>>> {
        // A poisoned list is still a valid list of senders.
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::{Action, EventBus, TvEvent};

    #[tokio::test]
    async fn every_subscriber_sees_each_event() {
        let bus = EventBus::new();
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        bus.publish(TvEvent::Action(Action::PlayPause));
        bus.publish(TvEvent::UserInteraction);

        assert_eq!(a.recv().await, Some(TvEvent::Action(Action::PlayPause)));
        assert_eq!(a.recv().await, Some(TvEvent::UserInteraction));
        assert_eq!(b.recv().await, Some(TvEvent::Action(Action::PlayPause)));
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus: EventBus<TvEvent> = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(TvEvent::UserInteraction);
        assert_eq!(bus.subscriber_count(), 1);
        drop(keep);
    }
}
