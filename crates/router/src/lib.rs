//! Hot-reload notification routing.
//!
//! This crate provides:
//! - `Registry` of reload-aware candidates held through weak host handles
//! - `TargetResolver`, the pure decision of whether a candidate reacts to an event
//! - `Dispatcher`, which invokes matching callbacks with per-candidate failure isolation
//! - `ReloadRouter`, the host-facing registration API and bus attachment

pub mod candidate;
pub mod dispatcher;
pub mod registry;
pub mod resolver;
pub mod router;

pub use candidate::{Candidate, ChildRef, ReloadCallback, ReloadToken};
pub use dispatcher::{CallbackFailure, DispatchReport, Dispatcher, InvokedTarget};
pub use registry::{Registry, RegistryEntry, Snapshot};
pub use resolver::{is_target, MatchReason, TargetResolver};
pub use router::{AutoRegister, ReloadGuard, ReloadRouter};
