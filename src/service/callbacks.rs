//! Subscriber list
//!
//! Observers are held weakly. A subscriber that goes away without
//! unregistering (closed connection, dropped handle) is pruned on the next
//! broadcast.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

use super::error::CallbackError;
use crate::host::DisplayId;

/// Asynchronous notification delivered to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServiceEvent {
    /// A display appeared
    DisplayAdded {
        /// Display id
        display_id: DisplayId,
    },
    /// A display went away
    DisplayRemoved {
        /// Display id
        display_id: DisplayId,
    },
    /// A display changed
    DisplayChanged {
        /// Display id
        display_id: DisplayId,
    },
}

/// Subscriber for service events
pub trait ActionCallback: Send + Sync {
    /// Deliver one event
    fn on_event(&self, event: &ServiceEvent) -> Result<(), CallbackError>;
}

/// Weakly-held subscriber list
#[derive(Default)]
pub struct CallbackList {
    entries: Mutex<Vec<Weak<dyn ActionCallback>>>,
}

impl CallbackList {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber; false if it is already registered
    pub fn register(&self, callback: &Arc<dyn ActionCallback>) -> bool {
        let weak = Arc::downgrade(callback);
        let mut entries = self.entries.lock();
        entries.retain(|e| e.strong_count() > 0);
        if entries.iter().any(|e| Weak::ptr_eq(e, &weak)) {
            return false;
        }
        entries.push(weak);
        debug!(subscribers = entries.len(), "Callback registered");
        true
    }

    /// Remove a subscriber; false if it was not registered
    pub fn unregister(&self, callback: &Arc<dyn ActionCallback>) -> bool {
        let weak = Arc::downgrade(callback);
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.strong_count() > 0 && !Weak::ptr_eq(e, &weak));
        let removed = entries.len() < before;
        if removed {
            debug!(subscribers = entries.len(), "Callback unregistered");
        }
        removed
    }

    /// Live subscriber count
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.strong_count() > 0)
            .count()
    }

    /// True if no live subscriber remains
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notify every live subscriber, returning how many accepted the event
    ///
    /// One subscriber failing never stops delivery to the rest.
    pub fn broadcast(&self, event: &ServiceEvent) -> usize {
        let live: Vec<Arc<dyn ActionCallback>> = {
            let mut entries = self.entries.lock();
            entries.retain(|e| e.strong_count() > 0);
            entries.iter().filter_map(Weak::upgrade).collect()
        };

        let mut delivered = 0;
        for callback in live {
            match callback.on_event(event) {
                Ok(()) => delivered += 1,
                Err(e) => warn!(?event, "Failed to notify subscriber: {}", e),
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Collector {
        events: Mutex<Vec<ServiceEvent>>,
    }

    impl ActionCallback for Collector {
        fn on_event(&self, event: &ServiceEvent) -> Result<(), CallbackError> {
            self.events.lock().push(*event);
            Ok(())
        }
    }

    struct Failing;

    impl ActionCallback for Failing {
        fn on_event(&self, _event: &ServiceEvent) -> Result<(), CallbackError> {
            Err(CallbackError::Rejected("queue full".to_string()))
        }
    }

    const EVENT: ServiceEvent = ServiceEvent::DisplayAdded {
        display_id: DisplayId(2),
    };

    #[test]
    fn test_register_is_idempotent() {
        let list = CallbackList::new();
        let cb: Arc<dyn ActionCallback> = Arc::new(Collector::default());

        assert!(list.register(&cb));
        assert!(!list.register(&cb));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let list = CallbackList::new();
        let cb: Arc<dyn ActionCallback> = Arc::new(Collector::default());

        assert!(!list.unregister(&cb));
        list.register(&cb);
        assert!(list.unregister(&cb));
        assert!(list.is_empty());
        assert_eq!(list.broadcast(&EVENT), 0);
    }

    #[test]
    fn test_failing_subscriber_does_not_block_others() {
        let list = CallbackList::new();
        let failing: Arc<dyn ActionCallback> = Arc::new(Failing);
        let collector = Arc::new(Collector::default());
        let collector_dyn: Arc<dyn ActionCallback> = collector.clone();

        list.register(&failing);
        list.register(&collector_dyn);

        assert_eq!(list.broadcast(&EVENT), 1);
        assert_eq!(*collector.events.lock(), vec![EVENT]);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let list = CallbackList::new();
        let kept: Arc<dyn ActionCallback> = Arc::new(Collector::default());
        {
            let dropped: Arc<dyn ActionCallback> = Arc::new(Collector::default());
            list.register(&dropped);
        }
        list.register(&kept);

        assert_eq!(list.len(), 1);
        assert_eq!(list.broadcast(&EVENT), 1);
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(EVENT).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "display_added", "display_id": 2 })
        );
    }
}
