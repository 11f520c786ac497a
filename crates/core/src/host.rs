use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Non-owning handle to a live host object.
///
/// Holding a `HostRef` never keeps the host alive. Two handles are equal
/// iff they point at the same allocation; the pointee's value is never
/// inspected.
#[derive(Clone)]
pub struct HostRef(Weak<dyn Any + Send + Sync>);

impl HostRef {
    pub fn new<T: Any + Send + Sync>(host: &Arc<T>) -> Self {
        let weak: Weak<T> = Arc::downgrade(host);
        Self(weak)
    }

    /// Whether the host is still alive.
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }

    pub fn upgrade(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.0.upgrade()
    }

    /// Upgrade and downcast to the concrete host type.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.upgrade()?.downcast::<T>().ok()
    }

    /// Whether this handle points at `host`.
    pub fn points_to<T: Any + Send + Sync>(&self, host: &Arc<T>) -> bool {
        std::ptr::addr_eq(self.0.as_ptr(), Arc::as_ptr(host))
    }

    pub fn ptr_eq(&self, other: &HostRef) -> bool {
        std::ptr::addr_eq(self.0.as_ptr(), other.0.as_ptr())
    }
}

impl PartialEq for HostRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for HostRef {}

impl fmt::Debug for HostRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostRef({:p})", self.0.as_ptr() as *const ())
    }
}
