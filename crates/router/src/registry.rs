//! In-memory set of reload-aware candidates.
//!
//! All mutation goes through a single `RwLock`. Readers get an immutable
//! [`Snapshot`], so later registrations never disturb an in-flight
//! dispatch. Entries hold only weak handles to their hosts.
//!
//! Removed candidates are dropped only after the lock is released: a
//! callback may own a [`crate::ReloadGuard`] whose drop deregisters again.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use tracing::debug;

use crate::candidate::{Candidate, ChildRef, ReloadToken};

/// A candidate together with the token it was registered under.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub token: ReloadToken,
    pub candidate: Arc<Candidate>,
}

/// Copy of the registry taken at one point in time, in insertion order.
pub type Snapshot = Arc<[RegistryEntry]>;

/// Token → candidate map.
#[derive(Default)]
pub struct Registry {
    entries: RwLock<IndexMap<ReloadToken, Arc<Candidate>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<ReloadToken, Arc<Candidate>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<ReloadToken, Arc<Candidate>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a candidate. A second registration under the same token
    /// replaces the first; returns whether a previous entry existed.
    pub fn register(&self, token: ReloadToken, candidate: Candidate) -> bool {
        let class = candidate.class().clone();
        let previous = self.write().insert(token, Arc::new(candidate));
        let replaced = previous.is_some();
        drop(previous);
        if replaced {
            debug!(token = %token, class = %class, "replaced existing registration");
        } else {
            debug!(token = %token, class = %class, "registered candidate");
        }
        replaced
    }

    /// Remove a registration. Unknown tokens are ignored.
    pub fn deregister(&self, token: ReloadToken) -> bool {
        let removed = self.write().shift_remove(&token);
        let existed = removed.is_some();
        drop(removed);
        if existed {
            debug!(token = %token, "deregistered candidate");
        }
        existed
    }

    /// Replace the children of a registered candidate. Snapshots taken
    /// before the call keep the old children.
    pub fn set_children(&self, token: ReloadToken, children: Vec<ChildRef>) -> bool {
        let previous = {
            let mut entries = self.write();
            let Some(slot) = entries.get_mut(&token) else {
                return false;
            };
            let updated = (**slot).clone().with_children(children);
            std::mem::replace(slot, Arc::new(updated))
        };
        drop(previous);
        true
    }

    pub fn all_candidates(&self) -> Snapshot {
        self.read()
            .iter()
            .map(|(token, candidate)| RegistryEntry {
                token: *token,
                candidate: Arc::clone(candidate),
            })
            .collect()
    }

    pub fn get(&self, token: ReloadToken) -> Option<Arc<Candidate>> {
        self.read().get(&token).cloned()
    }

    pub fn contains(&self, token: ReloadToken) -> bool {
        self.read().contains_key(&token)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop every candidate whose host is gone. Returns how many were removed.
    pub fn prune_dead(&self) -> usize {
        let removed: Vec<Arc<Candidate>> = {
            let mut entries = self.write();
            let dead: Vec<ReloadToken> = entries
                .iter()
                .filter(|(_, candidate)| !candidate.is_alive())
                .map(|(token, _)| *token)
                .collect();
            dead.iter()
                .filter_map(|token| entries.shift_remove(token))
                .collect()
        };
        let pruned = removed.len();
        drop(removed);
        if pruned > 0 {
            debug!(pruned, "pruned candidates with dead hosts");
        }
        pruned
    }

    /// Remove the given tokens, but only while their host is still dead. A
    /// token re-registered for a live host in the meantime is kept.
    pub(crate) fn remove_dead(&self, tokens: &[ReloadToken]) -> usize {
        let removed: Vec<Arc<Candidate>> = {
            let mut entries = self.write();
            let still_dead: Vec<ReloadToken> = tokens
                .iter()
                .filter(|token| entries.get(*token).is_some_and(|c| !c.is_alive()))
                .copied()
                .collect();
            still_dead
                .iter()
                .filter_map(|token| entries.shift_remove(token))
                .collect()
        };
        removed.len()
    }
}
