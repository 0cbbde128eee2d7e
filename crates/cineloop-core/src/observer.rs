// crates/cineloop-core/src/observer.rs
//
// Explicit observer registration. Each subscriber gets its own unbounded
// channel; a subscriber whose receiver has been dropped is pruned on the
// next notify. Used by PositionSync (SyncEvent) and LogService (LogRecord).

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::state::{LoopMarkers, SessionPhase};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

pub struct Notifier<T: Clone> {
    next_id:     u64,
    subscribers: Vec<(SubscriberId, Sender<T>)>,
}

impl<T: Clone> Default for Notifier<T> {
    fn default() -> Self {
        Self { next_id: 0, subscribers: Vec::new() }
    }
}

impl<T: Clone> Notifier<T> {
    pub fn new() -> Self { Self::default() }

    pub fn subscribe(&mut self) -> (SubscriberId, Receiver<T>) {
        let (tx, rx) = unbounded();
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, tx));
        (id, rx)
    }

    /// Returns false if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sid, _)| *sid != id);
        self.subscribers.len() != before
    }

    pub fn notify(&mut self, event: &T) {
        self.subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// State-change notifications emitted by the position-sync controller.
#[derive(Clone, Debug, PartialEq)]
pub enum SyncEvent {
    /// Displayed position or duration changed.
    Position { displayed_ms: u64, duration_ms: u64 },
    Phase(SessionPhase),
    Dragging(bool),
    Markers(LoopMarkers),
    Seeked { target_ms: u64 },
    LoopWrapped { to_ms: u64 },
    /// Timeline interaction is disabled for the rest of the session.
    SeekabilityLost,
    /// The engine's parse finished; metadata is available.
    Described,
    /// Non-fatal engine failure to surface as a notification.
    EngineFault(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives() {
        let mut n = Notifier::<u32>::new();
        let (_, a) = n.subscribe();
        let (_, b) = n.subscribe();
        n.notify(&7);
        assert_eq!(a.try_recv(), Ok(7));
        assert_eq!(b.try_recv(), Ok(7));
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut n = Notifier::<u32>::new();
        let (id, rx) = n.subscribe();
        assert!(n.unsubscribe(id));
        assert!(!n.unsubscribe(id));
        n.notify(&1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut n = Notifier::<u32>::new();
        let (_, rx) = n.subscribe();
        let (_, keep) = n.subscribe();
        drop(rx);
        n.notify(&3);
        assert_eq!(n.subscriber_count(), 1);
        assert_eq!(keep.try_recv(), Ok(3));
    }
}
