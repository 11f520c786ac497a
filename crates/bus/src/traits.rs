use std::fmt;
use std::sync::Arc;

use relive_core::RawNotification;

/// Identifier returned by [`EventBus::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Receives notifications delivered by a bus.
pub trait NotificationHandler: Send + Sync {
    fn handle(&self, notification: &RawNotification);
}

impl<F> NotificationHandler for F
where
    F: Fn(&RawNotification) + Send + Sync,
{
    fn handle(&self, notification: &RawNotification) {
        self(notification)
    }
}

/// Named publish/subscribe channel for reload notifications.
///
/// Handlers are compared by `Arc` identity. Subscribing the same
/// `(event_name, handler)` pair twice is a no-op that returns the existing
/// id; distinct handlers on one name are additive.
pub trait EventBus: Send + Sync {
    fn subscribe(&self, event_name: &str, handler: Arc<dyn NotificationHandler>)
        -> SubscriptionId;

    /// Remove a subscription. Unknown ids are ignored; returns whether one
    /// was removed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Deliver to every handler subscribed to `notification.name`.
    /// Returns the number of handlers reached.
    fn publish(&self, notification: RawNotification) -> usize;
}

/// Blanket implementation so `Arc<dyn EventBus>` can be used directly.
impl<T: EventBus + ?Sized> EventBus for Arc<T> {
    fn subscribe(
        &self,
        event_name: &str,
        handler: Arc<dyn NotificationHandler>,
    ) -> SubscriptionId {
        (**self).subscribe(event_name, handler)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        (**self).unsubscribe(id)
    }

    fn publish(&self, notification: RawNotification) -> usize {
        (**self).publish(notification)
    }
}
