pub mod class;
pub mod config;
pub mod error;
pub mod event;
pub mod host;

pub use class::ClassId;
pub use config::RouterConfig;
pub use error::*;
pub use event::{Payload, RawNotification, ReloadEvent, Subject};
pub use host::HostRef;
