//! End-to-end routing through bus, registry, resolver, and dispatcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use relive_bus::{EventBus, LocalBus};
use relive_core::{
    ClassId, HostRef, Payload, RawNotification, ReloadError, ReloadEvent, RouterConfig, Subject,
};
use relive_router::{Candidate, ChildRef, ReloadGuard, ReloadRouter, ReloadToken};

const TIMEOUT: Duration = Duration::from_secs(5);

struct View {
    name: &'static str,
}

fn view(name: &'static str) -> Arc<View> {
    Arc::new(View { name })
}

/// Registers `host` and records its name in `log` on every reload.
fn register_logging(
    router: &ReloadRouter,
    host: &Arc<View>,
    class: &str,
    log: &Arc<Mutex<Vec<&'static str>>>,
) -> ReloadGuard {
    let log = Arc::clone(log);
    let name = host.name;
    router.register_for_reload_as(host, ClassId::new(class), move || {
        log.lock().unwrap().push(name);
        Ok(())
    })
}

fn attached_router() -> (Arc<LocalBus>, ReloadRouter) {
    let bus = Arc::new(LocalBus::new());
    let router = ReloadRouter::new(RouterConfig::default());
    router.attach(bus.clone());
    (bus, router)
}

fn publish(bus: &LocalBus, router: &ReloadRouter, payload: Payload) {
    bus.publish(RawNotification::new(
        router.config().notification_name.clone(),
        payload,
    ));
}

#[test]
fn parent_escalates_when_child_class_reloads() {
    let (bus, router) = attached_router();
    let log = Arc::new(Mutex::new(Vec::new()));

    let a = view("A");
    let b = view("B");
    let a_child = view("A-as-child");
    let _ga = register_logging(&router, &a, "Foo", &log);
    let gb = register_logging(&router, &b, "Bar", &log);
    gb.set_children(vec![ChildRef::with_class(&a_child, ClassId::new("Foo"))]);

    publish(
        &bus,
        &router,
        Payload::Instance(Subject::instance(&a, ClassId::new("Foo"))),
    );

    let mut fired = log.lock().unwrap().clone();
    fired.sort();
    assert_eq!(fired, vec!["A", "B"]);
}

#[test]
fn exactly_matching_candidates_fire() {
    let (bus, router) = attached_router();
    let count = Arc::new(AtomicUsize::new(0));
    let hosts: Vec<Arc<View>> = (0..10).map(|_| view("v")).collect();

    let guards: Vec<ReloadGuard> = hosts
        .iter()
        .enumerate()
        .map(|(i, host)| {
            let class = if i % 3 == 0 { "Target" } else { "Other" };
            let count = Arc::clone(&count);
            router.register_for_reload_as(host, ClassId::new(class), move || {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        })
        .collect();
    assert_eq!(guards.len(), 10);

    publish(&bus, &router, Payload::Class(ClassId::new("Target")));
    // Indices 0, 3, 6, 9.
    assert_eq!(count.load(Ordering::SeqCst), 4);
}

#[test]
fn failure_in_one_callback_is_isolated() {
    let router = ReloadRouter::default();
    let first = view("first");
    let second = view("second");
    let reached = Arc::new(AtomicUsize::new(0));

    let _g1 = router.register_for_reload_as(&first, ClassId::new("Foo"), || {
        Err(ReloadError::callback("state restore failed"))
    });
    let reached_in_cb = Arc::clone(&reached);
    let _g2 = router.register_for_reload_as(&second, ClassId::new("Foo"), move || {
        reached_in_cb.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    let report = router.handle(&RawNotification::new(
        "ignored-name",
        Payload::Class(ClassId::new("Foo")),
    ));
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.invoked_count(), 2);
    assert_eq!(reached.load(Ordering::SeqCst), 1);
}

#[test]
fn collection_payload_uses_first_subject() {
    let (bus, router) = attached_router();
    let log = Arc::new(Mutex::new(Vec::new()));
    let first = view("first");
    let second = view("second");
    let _g1 = register_logging(&router, &first, "First", &log);
    let _g2 = register_logging(&router, &second, "Second", &log);

    publish(
        &bus,
        &router,
        Payload::Collection(vec![
            Subject::instance(&first, ClassId::new("First")),
            Subject::instance(&second, ClassId::new("Second")),
        ]),
    );
    assert_eq!(*log.lock().unwrap(), vec!["first"]);
}

#[test]
fn malformed_payload_fires_nothing() {
    let (bus, router) = attached_router();
    let log = Arc::new(Mutex::new(Vec::new()));
    let host = view("host");
    let _g = register_logging(&router, &host, "Foo", &log);

    publish(&bus, &router, Payload::Empty);
    publish(&bus, &router, Payload::Collection(Vec::new()));
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(router.generation(), 0);
}

#[test]
fn reentrant_registration_is_safe() {
    let router = ReloadRouter::default();
    let host = view("host");
    let late_host = view("late");
    let late_calls = Arc::new(AtomicUsize::new(0));
    let late_guards: Arc<Mutex<Vec<ReloadGuard>>> = Arc::new(Mutex::new(Vec::new()));

    let router_in_cb = router.clone();
    let late_host_in_cb = Arc::clone(&late_host);
    let late_calls_in_cb = Arc::clone(&late_calls);
    let guards_in_cb = Arc::clone(&late_guards);
    let _g = router.register_for_reload_as(&host, ClassId::new("Foo"), move || {
        let late_calls = Arc::clone(&late_calls_in_cb);
        let guard = router_in_cb.register_for_reload_as(
            &late_host_in_cb,
            ClassId::new("Foo"),
            move || {
                late_calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
        );
        guards_in_cb.lock().unwrap().push(guard);
        Ok(())
    });

    let report = router.dispatch(&ReloadEvent::for_class("Foo"));
    // The in-flight snapshot did not include the late registration.
    assert_eq!(report.invoked_count(), 1);
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);
    assert_eq!(router.registry().len(), 2);

    router.dispatch(&ReloadEvent::for_class("Foo"));
    assert_eq!(late_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn stale_and_double_deregistration_are_noops() {
    let router = ReloadRouter::default();
    let host = view("host");
    let token = router
        .register_for_reload_as(&host, ClassId::new("Foo"), || Ok(()))
        .detach();

    assert_eq!(router.registry().len(), 1);
    assert!(router.deregister(token));
    assert!(!router.deregister(token));
    assert_eq!(router.registry().len(), 0);
}

#[test]
fn concurrent_registration_from_threads() {
    let router = ReloadRouter::default();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let router = router.clone();
            std::thread::spawn(move || {
                let host = view("t");
                let token = router
                    .register_for_reload_as(&host, ClassId::new("Foo"), || Ok(()))
                    .detach();
                router.dispatch(&ReloadEvent::for_class("Foo"));
                router.deregister(token);
                host
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(router.registry().is_empty());
}

/// Holds another registration alive for as long as a callback owns it.
struct Owner {
    _guard: ReloadGuard,
}

fn owner_of(router: &ReloadRouter, host: &Arc<View>) -> Owner {
    Owner {
        _guard: router.register_for_reload_as(host, ClassId::new("Inner"), || Ok(())),
    }
}

/// Run `f` on a worker thread; fail if it does not return within TIMEOUT.
fn returns_in_time<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.recv_timeout(TIMEOUT)
        .expect("registry call did not return in time")
}

#[test]
fn deregister_drops_callback_that_owns_a_guard() {
    let router = ReloadRouter::default();
    let inner = view("inner");
    let outer = view("outer");
    let owner = owner_of(&router, &inner);
    let token = router
        .register_for_reload_as(&outer, ClassId::new("Outer"), move || {
            let _owned = &owner;
            Ok(())
        })
        .detach();
    assert_eq!(router.registry().len(), 2);

    let worker = router.clone();
    assert!(returns_in_time(move || worker.deregister(token)));
    // Dropping the callback released the inner guard too.
    assert!(router.registry().is_empty());
}

#[test]
fn replacing_callback_that_owns_a_guard() {
    let router = ReloadRouter::default();
    let inner = view("inner");
    let outer = view("outer");
    let owner = owner_of(&router, &inner);
    let token = ReloadToken::new();
    router.registry().register(
        token,
        Candidate::new(HostRef::new(&outer), ClassId::new("Outer"), move || {
            let _owned = &owner;
            Ok(())
        }),
    );

    let registry = Arc::clone(router.registry());
    let replaced = returns_in_time(move || {
        registry.register(
            token,
            Candidate::new(HostRef::new(&outer), ClassId::new("Outer"), || Ok(())),
        )
    });
    assert!(replaced);
    assert_eq!(router.registry().len(), 1);
    assert!(router.registry().contains(token));
}

#[test]
fn pruning_callback_that_owns_a_guard() {
    let router = ReloadRouter::default();
    let inner = view("inner");
    let outer = view("outer");
    let owner = owner_of(&router, &inner);
    let _g = router.register_for_reload_as(&outer, ClassId::new("Outer"), move || {
        let _owned = &owner;
        Ok(())
    });
    drop(outer);

    let registry = Arc::clone(router.registry());
    assert_eq!(returns_in_time(move || registry.prune_dead()), 1);
    assert!(router.registry().is_empty());
}

#[test]
fn dispatch_pruning_callback_that_owns_a_guard() {
    let router = ReloadRouter::new(RouterConfig {
        prune_dead_hosts: true,
        ..RouterConfig::default()
    });
    let inner = view("inner");
    let outer = view("outer");
    let owner = owner_of(&router, &inner);
    let _g = router.register_for_reload_as(&outer, ClassId::new("Outer"), move || {
        let _owned = &owner;
        Ok(())
    });
    drop(outer);

    let worker = router.clone();
    let skipped = returns_in_time(move || {
        worker
            .dispatch(&ReloadEvent::for_class("Outer"))
            .skipped_dead
    });
    assert_eq!(skipped, 1);
    assert!(router.registry().is_empty());
}
