//! Decides whether a registered candidate reacts to a reload event.
//!
//! Rules, first match wins:
//! 1. the event's instance is the candidate's host (identity, not class);
//! 2. the resolved class equals the candidate's class;
//! 3. a direct child of the candidate has the resolved class.
//!
//! Escalation looks at direct children only; grandchildren never match.

use relive_core::{ReloadEvent, RouterConfig};
use serde::Serialize;

use crate::candidate::Candidate;

/// Which rule made a candidate a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    Identity,
    Class,
    Child,
}

/// Pure resolution of `(event, candidate)` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetResolver {
    escalate_to_parents: bool,
}

impl TargetResolver {
    pub fn new(escalate_to_parents: bool) -> Self {
        Self {
            escalate_to_parents,
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(config.escalate_to_parents)
    }

    pub fn resolve(&self, event: &ReloadEvent, candidate: &Candidate) -> Option<MatchReason> {
        if event
            .subject_instance()
            .is_some_and(|instance| instance == candidate.host())
        {
            return Some(MatchReason::Identity);
        }

        let class = event.resolved_class()?;
        if class == candidate.class() {
            return Some(MatchReason::Class);
        }

        if self.escalate_to_parents && candidate.children().iter().any(|c| &c.class == class) {
            return Some(MatchReason::Child);
        }

        None
    }

    pub fn is_target(&self, event: &ReloadEvent, candidate: &Candidate) -> bool {
        self.resolve(event, candidate).is_some()
    }
}

impl Default for TargetResolver {
    fn default() -> Self {
        Self::new(true)
    }
}

/// [`TargetResolver::is_target`] with escalation enabled.
pub fn is_target(event: &ReloadEvent, candidate: &Candidate) -> bool {
    TargetResolver::default().is_target(event, candidate)
}
