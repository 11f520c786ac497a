//! Host-facing registration API.
//!
//! [`ReloadRouter`] ties a [`Registry`], a [`Dispatcher`], and optionally
//! an [`EventBus`] together. Hosts opt in with
//! [`ReloadRouter::register_for_reload`] and keep the returned
//! [`ReloadGuard`] for as long as they want reloads; dropping it
//! deregisters.

use std::any::Any;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use relive_bus::{normalize, EventBus, NotificationHandler, SubscriptionId};
use relive_core::{ClassId, HostRef, RawNotification, ReloadError, ReloadEvent, RouterConfig};
use tracing::{debug, info};

use crate::candidate::{Candidate, ChildRef, ReloadToken};
use crate::dispatcher::{DispatchReport, Dispatcher};
use crate::registry::Registry;

/// Opt-in hook for hosts that describe their own reload behavior.
///
/// A base type's constructor can call [`ReloadRouter::auto_register`]
/// instead of wiring a closure by hand.
pub trait AutoRegister: Any + Send + Sync {
    fn reload_class(&self) -> ClassId {
        ClassId::of::<Self>()
    }

    /// Direct children at registration time.
    fn reload_children(&self) -> Vec<ChildRef> {
        Vec::new()
    }

    fn on_reload(&self) -> Result<(), ReloadError>;
}

struct RouterInner {
    config: RouterConfig,
    registry: Arc<Registry>,
    dispatcher: Dispatcher,
    attachment: Mutex<Option<(Arc<dyn EventBus>, SubscriptionId)>>,
}

impl RouterInner {
    fn dispatch(&self, event: &ReloadEvent) -> DispatchReport {
        if !self.config.enabled {
            debug!("router disabled; ignoring reload event");
            return DispatchReport {
                generation: self.dispatcher.generation(),
                ..DispatchReport::default()
            };
        }
        self.dispatcher.dispatch(event)
    }
}

impl Drop for RouterInner {
    fn drop(&mut self) {
        let attachment = self
            .attachment
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((bus, id)) = attachment {
            bus.unsubscribe(id);
        }
    }
}

/// Bus handler that forwards notifications to a router without owning it.
struct BusHandler {
    router: Weak<RouterInner>,
}

impl NotificationHandler for BusHandler {
    fn handle(&self, notification: &RawNotification) {
        if let Some(inner) = self.router.upgrade() {
            inner.dispatch(&normalize(notification));
        }
    }
}

/// Cheaply cloneable handle to a reload router.
#[derive(Clone)]
pub struct ReloadRouter {
    inner: Arc<RouterInner>,
}

impl ReloadRouter {
    pub fn new(config: RouterConfig) -> Self {
        let registry = Arc::new(Registry::new());
        let dispatcher = Dispatcher::from_config(Arc::clone(&registry), &config);
        Self {
            inner: Arc::new(RouterInner {
                config,
                registry,
                dispatcher,
                attachment: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// Reload counter, incremented once per dispatched event.
    pub fn generation(&self) -> u64 {
        self.inner.dispatcher.generation()
    }

    /// Register `host` under its Rust type's class identity.
    pub fn register_for_reload<T, F>(&self, host: &Arc<T>, callback: F) -> ReloadGuard
    where
        T: Any + Send + Sync,
        F: Fn() -> Result<(), ReloadError> + Send + Sync + 'static,
    {
        self.register_for_reload_as(host, ClassId::of::<T>(), callback)
    }

    /// Register `host` under an explicit class identity.
    pub fn register_for_reload_as<T, F>(
        &self,
        host: &Arc<T>,
        class: ClassId,
        callback: F,
    ) -> ReloadGuard
    where
        T: Any + Send + Sync,
        F: Fn() -> Result<(), ReloadError> + Send + Sync + 'static,
    {
        let token = ReloadToken::new();
        self.inner
            .registry
            .register(token, Candidate::new(HostRef::new(host), class, callback));
        ReloadGuard::new(token, &self.inner.registry)
    }

    /// Register a host through its [`AutoRegister`] implementation. The
    /// stored callback holds only a weak handle to the host.
    pub fn auto_register<T: AutoRegister>(&self, host: &Arc<T>) -> ReloadGuard {
        let weak = Arc::downgrade(host);
        let token = ReloadToken::new();
        let candidate = Candidate::new(HostRef::new(host), host.reload_class(), move || {
            match weak.upgrade() {
                Some(host) => host.on_reload(),
                None => Ok(()),
            }
        })
        .with_children(host.reload_children());
        self.inner.registry.register(token, candidate);
        ReloadGuard::new(token, &self.inner.registry)
    }

    pub fn set_children(&self, token: ReloadToken, children: Vec<ChildRef>) -> bool {
        self.inner.registry.set_children(token, children)
    }

    pub fn deregister(&self, token: ReloadToken) -> bool {
        self.inner.registry.deregister(token)
    }

    pub fn dispatch(&self, event: &ReloadEvent) -> DispatchReport {
        self.inner.dispatch(event)
    }

    /// Normalize a raw notification and dispatch it.
    pub fn handle(&self, notification: &RawNotification) -> DispatchReport {
        self.inner.dispatch(&normalize(notification))
    }

    /// Subscribe to the configured notification name on `bus`, replacing
    /// any previous attachment.
    pub fn attach(&self, bus: Arc<dyn EventBus>) -> SubscriptionId {
        let handler: Arc<dyn NotificationHandler> = Arc::new(BusHandler {
            router: Arc::downgrade(&self.inner),
        });
        let name = &self.inner.config.notification_name;
        let id = bus.subscribe(name, handler);

        let previous = self
            .inner
            .attachment
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace((bus, id));
        if let Some((old_bus, old_id)) = previous {
            old_bus.unsubscribe(old_id);
        }

        info!(notification = %name, subscription = %id, "reload router attached to bus");
        id
    }

    /// Unsubscribe from the attached bus, if any.
    pub fn detach(&self) -> bool {
        let previous = self
            .inner
            .attachment
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match previous {
            Some((bus, id)) => {
                info!(subscription = %id, "reload router detached from bus");
                bus.unsubscribe(id)
            }
            None => false,
        }
    }
}

impl Default for ReloadRouter {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}

/// Keeps a registration alive. Dropping the guard deregisters.
#[must_use = "dropping a ReloadGuard immediately deregisters the host"]
pub struct ReloadGuard {
    token: ReloadToken,
    registry: Weak<Registry>,
    armed: bool,
}

impl ReloadGuard {
    fn new(token: ReloadToken, registry: &Arc<Registry>) -> Self {
        Self {
            token,
            registry: Arc::downgrade(registry),
            armed: true,
        }
    }

    pub fn token(&self) -> ReloadToken {
        self.token
    }

    pub fn set_children(&self, children: Vec<ChildRef>) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.set_children(self.token, children))
    }

    /// Deregister now.
    pub fn deregister(mut self) -> bool {
        self.armed = false;
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.deregister(self.token))
    }

    /// Give up automatic deregistration and return the raw token. The host
    /// must call [`ReloadRouter::deregister`] itself.
    pub fn detach(mut self) -> ReloadToken {
        self.armed = false;
        self.token
    }
}

impl Drop for ReloadGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.deregister(self.token);
        }
    }
}
