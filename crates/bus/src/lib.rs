//! Event bus adapter for reload notifications.
//!
//! This crate provides:
//! - `EventBus` trait, the injectable stand-in for a process-wide notification center
//! - `LocalBus`, an in-process synchronous implementation
//! - `normalize`, which turns a raw notification payload into a `ReloadEvent`

pub mod local;
pub mod normalize;
pub mod traits;

pub use local::LocalBus;
pub use normalize::normalize;
pub use traits::{EventBus, NotificationHandler, SubscriptionId};
