//! In-memory state container.

use crate::config::Config;
use crate::error::CoreResult;
use crate::event::Event;
use crate::feed::{StateChange, StateFeed};
use crate::reducer::Reconciler;
use crate::state::StoreState;
use parking_lot::RwLock;
use std::sync::mpsc::Receiver;
use std::sync::Arc;

/// Host-owned holder of the store state.
///
/// The dispatcher reads snapshots from it and feeds events into it; it never
/// holds entity state itself.
pub trait StateContainer: Send + Sync {
    /// Returns the current state.
    fn snapshot(&self) -> Arc<StoreState>;

    /// Applies an event.
    fn dispatch(&self, event: Event);
}

struct Current {
    state: Arc<StoreState>,
    sequence: u64,
}

/// A [`StateContainer`] that reduces events in memory and publishes every
/// transition on a [`StateFeed`].
pub struct Store {
    reconciler: Reconciler,
    current: RwLock<Current>,
    feed: StateFeed,
}

impl Store {
    /// Creates a store seeded from `config`.
    pub fn new(config: Config) -> CoreResult<Self> {
        config.validate()?;
        let reconciler = Reconciler::new(config);
        let state = Arc::new(reconciler.initial_state());
        Ok(Self {
            reconciler,
            current: RwLock::new(Current { state, sequence: 0 }),
            feed: StateFeed::new(),
        })
    }

    /// Returns the configuration the store reduces with.
    pub fn config(&self) -> &Arc<Config> {
        self.reconciler.config()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> Receiver<StateChange> {
        self.feed.subscribe()
    }

    /// Subscribes to the changes of one resource.
    pub fn subscribe_to(&self, resource: impl Into<String>) -> Receiver<StateChange> {
        self.feed.subscribe_to(resource)
    }

    /// Returns the number of events applied so far.
    pub fn sequence(&self) -> u64 {
        self.current.read().sequence
    }
}

impl StateContainer for Store {
    fn snapshot(&self) -> Arc<StoreState> {
        Arc::clone(&self.current.read().state)
    }

    fn dispatch(&self, event: Event) {
        let mut current = self.current.write();
        let next = Arc::new(self.reconciler.reduce(&current.state, &event));
        current.state = Arc::clone(&next);
        current.sequence += 1;
        // Emitting under the lock keeps feed order equal to reduction order.
        self.feed.publish(StateChange {
            sequence: current.sequence,
            event,
            state: next,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceConfig;
    use crate::error::CoreError;

    fn config() -> Config {
        Config::new().with_resource("Posts", ResourceConfig::plural("/posts"))
    }

    #[test]
    fn dispatch_updates_snapshot() {
        let store = Store::new(config()).unwrap();
        let before = store.snapshot();

        store.dispatch(Event::index("Posts"));

        assert!(store.snapshot().collection("Posts").unwrap().loading);
        assert!(!before.collection("Posts").unwrap().loading);
        assert_eq!(store.sequence(), 1);
    }

    #[test]
    fn subscribers_see_every_event_in_order() {
        let store = Store::new(config()).unwrap();
        let rx = store.subscribe();

        store.dispatch(Event::index("Posts"));
        store.dispatch(Event::custom("Posts", "NOOP", serde_json::Value::Null));

        let changes: Vec<StateChange> = rx.try_iter().collect();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].sequence, 1);
        assert_eq!(changes[0].event, Event::index("Posts"));
        assert_eq!(changes[1].sequence, 2);
        assert!(Arc::ptr_eq(&changes[1].state, &store.snapshot()));
    }

    #[test]
    fn resource_subscription_skips_other_resources() {
        let config = config().with_resource("Tags", ResourceConfig::plural("/tags"));
        let store = Store::new(config).unwrap();
        let tags = store.subscribe_to("Tags");

        store.dispatch(Event::index("Posts"));
        store.dispatch(Event::index("Tags"));

        let changes: Vec<StateChange> = tags.try_iter().collect();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].sequence, 2);
        assert!(changes[0].state.collection("Tags").unwrap().loading);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = Config::new().with_resource(
            "Posts",
            ResourceConfig::plural("/posts").with_id_attribute(""),
        );
        assert!(matches!(
            Store::new(config),
            Err(CoreError::InvalidResource { .. })
        ));
    }
}
