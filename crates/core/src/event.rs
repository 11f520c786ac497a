//! Notification and event records.
//!
//! A [`RawNotification`] is what an injection agent hands to the bus. It is
//! normalized once into a [`ReloadEvent`], which the resolver reads and
//! which is dropped after dispatch.

use std::any::Any;
use std::sync::Arc;

use crate::class::ClassId;
use crate::host::HostRef;

/// One reloaded thing named by a payload: a class, optionally with the
/// specific instance the agent touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    pub class: ClassId,
    pub instance: Option<HostRef>,
}

impl Subject {
    /// Subject for a live instance, classed by its Rust type.
    pub fn of<T: Any + Send + Sync>(instance: &Arc<T>) -> Self {
        Self::instance(instance, ClassId::of::<T>())
    }

    pub fn instance<T: Any + Send + Sync>(instance: &Arc<T>, class: ClassId) -> Self {
        Self {
            class,
            instance: Some(HostRef::new(instance)),
        }
    }

    pub fn class_only(class: impl Into<ClassId>) -> Self {
        Self {
            class: class.into(),
            instance: None,
        }
    }
}

/// Opaque payload of an external "class reloaded" notification.
#[derive(Debug, Clone, Default)]
pub enum Payload {
    /// Nothing usable.
    #[default]
    Empty,
    Instance(Subject),
    /// Ordered collection; only the first element is used.
    Collection(Vec<Subject>),
    Class(ClassId),
}

/// A named notification as delivered by the host's event mechanism.
#[derive(Debug, Clone)]
pub struct RawNotification {
    pub name: String,
    pub payload: Payload,
}

impl RawNotification {
    pub fn new(name: impl Into<String>, payload: Payload) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// Normalized, immutable record of one reload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadEvent {
    subject_class: Option<ClassId>,
    subject: Option<Subject>,
}

impl ReloadEvent {
    /// An event that names nothing and therefore matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn for_subject(subject: Subject) -> Self {
        Self {
            subject_class: Some(subject.class.clone()),
            subject: Some(subject),
        }
    }

    pub fn for_class(class: impl Into<ClassId>) -> Self {
        Self {
            subject_class: Some(class.into()),
            subject: None,
        }
    }

    pub fn subject(&self) -> Option<&Subject> {
        self.subject.as_ref()
    }

    pub fn subject_class(&self) -> Option<&ClassId> {
        self.subject_class.as_ref()
    }

    /// The embedded instance, if the payload carried one.
    pub fn subject_instance(&self) -> Option<&HostRef> {
        self.subject.as_ref()?.instance.as_ref()
    }

    /// Class of the resolved subject, falling back to the event's class.
    pub fn resolved_class(&self) -> Option<&ClassId> {
        self.subject
            .as_ref()
            .map(|s| &s.class)
            .or(self.subject_class.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.subject.is_none() && self.subject_class.is_none()
    }
}
