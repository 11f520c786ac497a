//! Bridge between an out-of-process injection agent and an in-process bus.
//!
//! The agent publishes [`ClassReloaded`] payloads over ZeroMQ PUB/SUB; the
//! bridge turns each one into a [`relive_core::RawNotification`] and
//! publishes it on an [`relive_bus::EventBus`].

pub mod bridge;
pub mod config;
pub mod error;
pub mod message;
pub mod socket;

pub use bridge::{run_bridge, to_notification, AgentSource};
pub use config::BridgeConfig;
pub use error::BridgeError;
pub use message::{topics, BridgeMessage, ClassReloaded};
pub use socket::{AgentPublisher, AgentSubscriber};
