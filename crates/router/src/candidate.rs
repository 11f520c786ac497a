use std::any::Any;
use std::fmt;
use std::sync::Arc;

use relive_core::{ClassId, HostRef, ReloadError};
use uuid::Uuid;

/// Host-supplied reload callback. Takes no arguments; may run many times.
pub type ReloadCallback = Arc<dyn Fn() -> Result<(), ReloadError> + Send + Sync>;

/// Opaque registration token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReloadToken(Uuid);

impl ReloadToken {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ReloadToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReloadToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A child a hierarchical candidate contains. Not owned by the candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub class: ClassId,
    pub host: Option<HostRef>,
}

impl ChildRef {
    pub fn of<T: Any + Send + Sync>(child: &Arc<T>) -> Self {
        Self::with_class(child, ClassId::of::<T>())
    }

    pub fn with_class<T: Any + Send + Sync>(child: &Arc<T>, class: ClassId) -> Self {
        Self {
            class,
            host: Some(HostRef::new(child)),
        }
    }

    pub fn class_only(class: impl Into<ClassId>) -> Self {
        Self {
            class: class.into(),
            host: None,
        }
    }
}

/// A registered live object eligible to react to reload events.
#[derive(Clone)]
pub struct Candidate {
    host: HostRef,
    class: ClassId,
    children: Vec<ChildRef>,
    callback: ReloadCallback,
}

impl Candidate {
    pub fn new<F>(host: HostRef, class: ClassId, callback: F) -> Self
    where
        F: Fn() -> Result<(), ReloadError> + Send + Sync + 'static,
    {
        Self {
            host,
            class,
            children: Vec::new(),
            callback: Arc::new(callback),
        }
    }

    pub fn with_children(mut self, children: Vec<ChildRef>) -> Self {
        self.children = children;
        self
    }

    pub fn host(&self) -> &HostRef {
        &self.host
    }

    pub fn class(&self) -> &ClassId {
        &self.class
    }

    pub fn children(&self) -> &[ChildRef] {
        &self.children
    }

    pub fn is_alive(&self) -> bool {
        self.host.is_alive()
    }

    pub(crate) fn invoke(&self) -> Result<(), ReloadError> {
        (self.callback)()
    }
}

impl fmt::Debug for Candidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Candidate")
            .field("host", &self.host)
            .field("class", &self.class)
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}
