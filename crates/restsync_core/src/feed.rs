//! Ordered delivery of state transitions to observers.
//!
//! A subscriber either watches the whole store or a single resource. A
//! resource watcher only receives changes whose event addressed that
//! resource, so a view over `Posts` is not woken by `Comments` traffic.

use crate::event::Event;
use crate::state::StoreState;
use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// One applied event and the state it produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    /// Position of the event in the store's history, starting at 1.
    pub sequence: u64,
    /// The applied event.
    pub event: Event,
    /// The state after the event.
    pub state: Arc<StoreState>,
}

impl StateChange {
    /// Returns true if the event addressed `resource`.
    pub fn touches(&self, resource: &str) -> bool {
        self.event.resource == resource
    }
}

struct Watcher {
    resource: Option<String>,
    tx: Sender<StateChange>,
}

impl Watcher {
    fn wants(&self, change: &StateChange) -> bool {
        self.resource
            .as_deref()
            .map_or(true, |resource| change.touches(resource))
    }
}

/// Fans state changes out to subscribers in the order they are published.
///
/// Nothing is retained: a subscriber sees the changes published after it
/// subscribed, and the current state is always available from the store.
#[derive(Default)]
pub struct StateFeed {
    watchers: Mutex<Vec<Watcher>>,
}

impl StateFeed {
    /// Creates a feed with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to every change.
    pub fn subscribe(&self) -> Receiver<StateChange> {
        self.watch(None)
    }

    /// Subscribes to the changes of one resource.
    pub fn subscribe_to(&self, resource: impl Into<String>) -> Receiver<StateChange> {
        self.watch(Some(resource.into()))
    }

    fn watch(&self, resource: Option<String>) -> Receiver<StateChange> {
        let (tx, rx) = mpsc::channel();
        self.watchers.lock().push(Watcher { resource, tx });
        rx
    }

    /// Delivers a change. Subscribers whose receiver was dropped are removed.
    pub fn publish(&self, change: StateChange) {
        self.watchers
            .lock()
            .retain(|w| !w.wants(&change) || w.tx.send(change.clone()).is_ok());
    }

    /// Returns the number of live subscribers, as of the last publish.
    pub fn subscriber_count(&self) -> usize {
        self.watchers.lock().len()
    }
}
