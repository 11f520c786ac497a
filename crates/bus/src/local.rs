//! In-process synchronous bus.
//!
//! Delivery happens on the publishing thread. Handlers are snapshotted
//! under the read lock and invoked after it is released, so a handler may
//! subscribe, unsubscribe, or publish again without deadlocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use relive_core::RawNotification;
use tracing::debug;

use crate::traits::{EventBus, NotificationHandler, SubscriptionId};

struct Subscription {
    id: SubscriptionId,
    event_name: String,
    handler: Arc<dyn NotificationHandler>,
}

/// Thread-safe in-process [`EventBus`].
pub struct LocalBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl LocalBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of live subscriptions across all event names.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for LocalBus {
    fn subscribe(
        &self,
        event_name: &str,
        handler: Arc<dyn NotificationHandler>,
    ) -> SubscriptionId {
        let mut subs = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let existing = subs.iter().find(|s| {
            s.event_name == event_name
                && std::ptr::addr_eq(Arc::as_ptr(&s.handler), Arc::as_ptr(&handler))
        });
        if let Some(sub) = existing {
            debug!(event_name, id = %sub.id, "handler already subscribed");
            return sub.id;
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        subs.push(Subscription {
            id,
            event_name: event_name.to_string(),
            handler,
        });
        debug!(event_name, id = %id, "subscribed");
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subs.len();
        subs.retain(|s| s.id != id);
        let removed = subs.len() != before;
        if removed {
            debug!(id = %id, "unsubscribed");
        }
        removed
    }

    fn publish(&self, notification: RawNotification) -> usize {
        let handlers: Vec<Arc<dyn NotificationHandler>> = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.event_name == notification.name)
            .map(|s| Arc::clone(&s.handler))
            .collect();

        if handlers.is_empty() {
            debug!(name = %notification.name, "no subscribers for notification");
            return 0;
        }

        for handler in &handlers {
            handler.handle(&notification);
        }
        handlers.len()
    }
}
