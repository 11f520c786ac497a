//! Routes a reload event to the callbacks of every matching candidate.
//!
//! Each dispatch works on one registry snapshot. Individual callback
//! failures (errors or panics) are logged and collected; they never stop
//! the pass.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use relive_core::{ClassId, ReloadError, ReloadEvent, RouterConfig};
use tracing::{debug, warn};

use crate::candidate::ReloadToken;
use crate::registry::Registry;
use crate::resolver::{MatchReason, TargetResolver};

/// A callback that was invoked during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokedTarget {
    pub token: ReloadToken,
    pub class: ClassId,
    pub reason: MatchReason,
}

/// A callback that returned an error or panicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFailure {
    pub token: ReloadToken,
    pub class: ClassId,
    pub error: ReloadError,
}

/// Outcome of one dispatch pass.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    /// Reload counter after this pass. Unchanged when nothing was evaluated.
    pub generation: u64,
    /// Candidates in the snapshot that were checked against the event.
    pub evaluated: usize,
    /// Candidates skipped because their host is gone.
    pub skipped_dead: usize,
    /// Every callback invoked, failed ones included.
    pub invoked: Vec<InvokedTarget>,
    pub failures: Vec<CallbackFailure>,
}

impl DispatchReport {
    pub fn invoked_count(&self) -> usize {
        self.invoked.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn was_invoked(&self, token: ReloadToken) -> bool {
        self.invoked.iter().any(|t| t.token == token)
    }
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    resolver: TargetResolver,
    prune_dead_hosts: bool,
    generation: AtomicU64,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, resolver: TargetResolver) -> Self {
        Self {
            registry,
            resolver,
            prune_dead_hosts: false,
            generation: AtomicU64::new(0),
        }
    }

    pub fn from_config(registry: Arc<Registry>, config: &RouterConfig) -> Self {
        Self {
            prune_dead_hosts: config.prune_dead_hosts,
            ..Self::new(registry, TargetResolver::from_config(config))
        }
    }

    pub fn with_pruning(mut self, prune_dead_hosts: bool) -> Self {
        self.prune_dead_hosts = prune_dead_hosts;
        self
    }

    pub fn resolver(&self) -> &TargetResolver {
        &self.resolver
    }

    /// Number of dispatch passes run for non-empty events.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Invoke the callback of every candidate the event targets, once
    /// each, in snapshot order.
    pub fn dispatch(&self, event: &ReloadEvent) -> DispatchReport {
        if event.is_empty() {
            debug!("reload event names no subject; nothing to dispatch");
            return DispatchReport {
                generation: self.generation(),
                ..DispatchReport::default()
            };
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = self.registry.all_candidates();
        let mut report = DispatchReport {
            generation,
            ..DispatchReport::default()
        };
        let mut dead = Vec::new();

        for entry in snapshot.iter() {
            let candidate = &entry.candidate;
            if !candidate.is_alive() {
                report.skipped_dead += 1;
                dead.push(entry.token);
                continue;
            }
            report.evaluated += 1;

            let Some(reason) = self.resolver.resolve(event, candidate) else {
                continue;
            };

            debug!(
                token = %entry.token,
                class = %candidate.class(),
                ?reason,
                generation,
                "invoking reload callback"
            );
            report.invoked.push(InvokedTarget {
                token: entry.token,
                class: candidate.class().clone(),
                reason,
            });

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| candidate.invoke()))
                .unwrap_or_else(|payload| Err(ReloadError::Panicked(panic_message(&*payload))));

            if let Err(error) = outcome {
                warn!(
                    token = %entry.token,
                    class = %candidate.class(),
                    error = %error,
                    "reload callback failed"
                );
                report.failures.push(CallbackFailure {
                    token: entry.token,
                    class: candidate.class().clone(),
                    error,
                });
            }
        }

        if self.prune_dead_hosts && !dead.is_empty() {
            self.registry.remove_dead(&dead);
        }

        debug!(
            generation,
            evaluated = report.evaluated,
            invoked = report.invoked.len(),
            failed = report.failures.len(),
            skipped_dead = report.skipped_dead,
            "dispatch complete"
        );
        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use relive_core::{HostRef, Subject};

    use super::*;
    use crate::candidate::{Candidate, ChildRef};

    struct Host;

    fn counting(
        registry: &Registry,
        host: &Arc<Host>,
        class: &str,
        count: &Arc<AtomicUsize>,
    ) -> ReloadToken {
        let token = ReloadToken::new();
        let count = Arc::clone(count);
        registry.register(
            token,
            Candidate::new(HostRef::new(host), ClassId::new(class), move || {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        token
    }

    fn dispatcher(registry: &Arc<Registry>) -> Dispatcher {
        Dispatcher::new(Arc::clone(registry), TargetResolver::default())
    }

    #[test]
    fn only_matching_candidates_fire_once() {
        let registry = Arc::new(Registry::new());
        let host = Arc::new(Host);
        let hits = Arc::new(AtomicUsize::new(0));
        let misses = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            counting(&registry, &host, "Foo", &hits);
        }
        for _ in 0..5 {
            counting(&registry, &host, "Bar", &misses);
        }

        let report = dispatcher(&registry).dispatch(&ReloadEvent::for_class("Foo"));
        assert_eq!(report.invoked_count(), 3);
        assert_eq!(report.evaluated, 8);
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(misses.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failing_callback_does_not_block_others() {
        let registry = Arc::new(Registry::new());
        let host = Arc::new(Host);
        let after = Arc::new(AtomicUsize::new(0));

        let failing = ReloadToken::new();
        registry.register(
            failing,
            Candidate::new(HostRef::new(&host), ClassId::new("Foo"), || {
                Err(ReloadError::callback("boom"))
            }),
        );
        counting(&registry, &host, "Foo", &after);

        let report = dispatcher(&registry).dispatch(&ReloadEvent::for_class("Foo"));
        assert_eq!(report.invoked_count(), 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].token, failing);
        assert_eq!(after.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_callback_is_isolated() {
        let registry = Arc::new(Registry::new());
        let host = Arc::new(Host);
        let after = Arc::new(AtomicUsize::new(0));

        registry.register(
            ReloadToken::new(),
            Candidate::new(HostRef::new(&host), ClassId::new("Foo"), || {
                panic!("callback exploded")
            }),
        );
        counting(&registry, &host, "Foo", &after);

        let report = dispatcher(&registry).dispatch(&ReloadEvent::for_class("Foo"));
        assert_eq!(after.load(Ordering::SeqCst), 1);
        assert_eq!(
            report.failures[0].error,
            ReloadError::Panicked("callback exploded".to_string())
        );
    }

    #[test]
    fn empty_event_does_not_advance_generation() {
        let registry = Arc::new(Registry::new());
        let host = Arc::new(Host);
        let count = Arc::new(AtomicUsize::new(0));
        counting(&registry, &host, "Foo", &count);
        let dispatcher = dispatcher(&registry);

        let report = dispatcher.dispatch(&ReloadEvent::empty());
        assert_eq!(report.invoked_count(), 0);
        assert_eq!(dispatcher.generation(), 0);

        dispatcher.dispatch(&ReloadEvent::for_class("Foo"));
        dispatcher.dispatch(&ReloadEvent::for_class("Foo"));
        assert_eq!(dispatcher.generation(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dead_hosts_are_skipped_and_pruned() {
        let registry = Arc::new(Registry::new());
        let live = Arc::new(Host);
        let doomed = Arc::new(Host);
        let count = Arc::new(AtomicUsize::new(0));
        counting(&registry, &live, "Foo", &count);
        counting(&registry, &doomed, "Foo", &count);
        drop(doomed);

        let report = dispatcher(&registry)
            .with_pruning(true)
            .dispatch(&ReloadEvent::for_class("Foo"));
        assert_eq!(report.skipped_dead, 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn dead_hosts_kept_without_pruning() {
        let registry = Arc::new(Registry::new());
        let doomed = Arc::new(Host);
        let count = Arc::new(AtomicUsize::new(0));
        counting(&registry, &doomed, "Foo", &count);
        drop(doomed);

        let report = dispatcher(&registry).dispatch(&ReloadEvent::for_class("Foo"));
        assert_eq!(report.skipped_dead, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn report_records_match_reason() {
        let registry = Arc::new(Registry::new());
        let subject = Arc::new(Host);
        let parent = Arc::new(Host);
        let count = Arc::new(AtomicUsize::new(0));

        let direct = counting(&registry, &subject, "Foo", &count);
        let escalated = counting(&registry, &parent, "Bar", &count);
        registry.set_children(escalated, vec![ChildRef::with_class(&subject, ClassId::new("Foo"))]);

        let event = ReloadEvent::for_subject(Subject::instance(&subject, ClassId::new("Foo")));
        let report = dispatcher(&registry).dispatch(&event);

        let reason_of = |token| {
            report
                .invoked
                .iter()
                .find(|t| t.token == token)
                .map(|t| t.reason)
        };
        assert_eq!(reason_of(direct), Some(MatchReason::Identity));
        assert_eq!(reason_of(escalated), Some(MatchReason::Child));
        assert!(report.is_clean());
    }
}
