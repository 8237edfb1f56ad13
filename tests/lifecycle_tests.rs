//! Lifecycle hook tests
//!
//! Hooks fire exactly once per transition, ordering is observable, and a
//! module can resolve its dependencies from inside `on_start`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serial_test::serial;

use modkit::{Module, ModuleIdentity, ModuleRegistry};

mod common;

/// Counts hook invocations through shared atomics captured by the factory.
struct HookCounter {
    started: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
}

impl Module for HookCounter {
    fn on_start(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }
    fn on_stop(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Appends lifecycle events to a shared log.
struct Recorder {
    label: &'static str,
    log: Arc<Mutex<Vec<String>>>,
}

impl Module for Recorder {
    fn on_start(&self) {
        self.log.lock().unwrap().push(format!("start {}", self.label));
    }
    fn on_stop(&self) {
        self.log.lock().unwrap().push(format!("stop {}", self.label));
    }
}

#[test]
fn test_hooks_fire_exactly_once_per_transition() {
    common::init_diagnostics();
    let registry = ModuleRegistry::new();
    let started = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));

    let (s, t) = (Arc::clone(&started), Arc::clone(&stopped));
    registry
        .register(
            ModuleIdentity::of::<HookCounter>(),
            Arc::new(move || {
                Arc::new(HookCounter {
                    started: Arc::clone(&s),
                    stopped: Arc::clone(&t),
                }) as Arc<dyn Module>
            }),
        )
        .unwrap();
    let identity = ModuleIdentity::of::<HookCounter>();

    registry.load(&identity).unwrap();
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(stopped.load(Ordering::SeqCst), 0);

    registry.unload(&identity).unwrap();
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(stopped.load(Ordering::SeqCst), 1);

    // A fresh load constructs and starts a fresh instance.
    registry.load(&identity).unwrap();
    registry.teardown();
    assert_eq!(started.load(Ordering::SeqCst), 2);
    assert_eq!(stopped.load(Ordering::SeqCst), 2);
}

#[test]
fn test_get_does_not_restart_loaded_module() {
    let registry = ModuleRegistry::new();
    let started = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));

    let (s, t) = (Arc::clone(&started), Arc::clone(&stopped));
    registry
        .register(
            ModuleIdentity::of::<HookCounter>(),
            Arc::new(move || {
                Arc::new(HookCounter {
                    started: Arc::clone(&s),
                    stopped: Arc::clone(&t),
                }) as Arc<dyn Module>
            }),
        )
        .unwrap();
    let identity = ModuleIdentity::of::<HookCounter>();

    registry.get(&identity).unwrap();
    registry.get(&identity).unwrap();
    registry.get(&identity).unwrap();
    assert_eq!(started.load(Ordering::SeqCst), 1);
}

struct TeardownA(Recorder);
impl Module for TeardownA {
    fn on_start(&self) {
        self.0.on_start()
    }
    fn on_stop(&self) {
        self.0.on_stop()
    }
}

struct TeardownB(Recorder);
impl Module for TeardownB {
    fn on_start(&self) {
        self.0.on_start()
    }
    fn on_stop(&self) {
        self.0.on_stop()
    }
}

#[test]
fn test_teardown_stops_in_reverse_load_order() {
    let registry = ModuleRegistry::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let l = Arc::clone(&log);
    registry
        .register(
            ModuleIdentity::of::<TeardownA>(),
            Arc::new(move || {
                Arc::new(TeardownA(Recorder {
                    label: "A",
                    log: Arc::clone(&l),
                })) as Arc<dyn Module>
            }),
        )
        .unwrap();
    let l = Arc::clone(&log);
    registry
        .register(
            ModuleIdentity::of::<TeardownB>(),
            Arc::new(move || {
                Arc::new(TeardownB(Recorder {
                    label: "B",
                    log: Arc::clone(&l),
                })) as Arc<dyn Module>
            }),
        )
        .unwrap();

    registry.load(&ModuleIdentity::of::<TeardownA>()).unwrap();
    registry.load(&ModuleIdentity::of::<TeardownB>()).unwrap();
    registry.teardown();

    let events = log.lock().unwrap().clone();
    let events: Vec<&str> = events.iter().map(String::as_str).collect();
    assert_eq!(events, vec!["start A", "start B", "stop B", "stop A"]);
}

struct FaultyStop;
impl Module for FaultyStop {
    fn on_stop(&self) {
        panic!("deliberate stop failure");
    }
}

#[test]
fn test_panicking_stop_does_not_abort_teardown() {
    let registry = ModuleRegistry::new();
    let started = Arc::new(AtomicUsize::new(0));
    let stopped = Arc::new(AtomicUsize::new(0));

    let (s, t) = (Arc::clone(&started), Arc::clone(&stopped));
    registry
        .register(
            ModuleIdentity::of::<HookCounter>(),
            Arc::new(move || {
                Arc::new(HookCounter {
                    started: Arc::clone(&s),
                    stopped: Arc::clone(&t),
                }) as Arc<dyn Module>
            }),
        )
        .unwrap();
    registry
        .register(
            ModuleIdentity::of::<FaultyStop>(),
            Arc::new(|| Arc::new(FaultyStop) as Arc<dyn Module>),
        )
        .unwrap();

    // HookCounter loads first, so FaultyStop panics first during reverse-order
    // teardown and HookCounter must still be stopped afterwards.
    registry.load(&ModuleIdentity::of::<HookCounter>()).unwrap();
    registry.load(&ModuleIdentity::of::<FaultyStop>()).unwrap();

    registry.teardown();
    assert_eq!(registry.loaded_count(), 0);
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
}

#[derive(Default)]
struct GlobalDep;
impl Module for GlobalDep {}

/// Resolves its dependency from inside `on_start` through the process-wide
/// registry, the pattern the recovery path exists to support.
#[derive(Default)]
struct GlobalConsumer;
impl Module for GlobalConsumer {
    fn on_start(&self) {
        modkit::global().require::<GlobalDep>().unwrap();
        let dep = modkit::global().handle_of::<GlobalDep>().unwrap();
        assert!(dep.is_alive());
    }
}

#[test]
#[serial]
fn test_dependency_resolution_from_on_start() {
    let registry = modkit::global();
    registry.register_type::<GlobalDep>().unwrap();
    registry.register_type::<GlobalConsumer>().unwrap();

    registry.load(&ModuleIdentity::of::<GlobalConsumer>()).unwrap();

    // The dependency was loaded transitively, before the consumer's
    // on_start returned.
    assert!(registry.is_loaded(&ModuleIdentity::of::<GlobalDep>()));
    assert!(registry.is_loaded(&ModuleIdentity::of::<GlobalConsumer>()));

    registry.teardown();
    assert_eq!(registry.loaded_count(), 0);
}

/// Starts successfully only after the first attempt has panicked.
struct FlakyStart {
    attempts: Arc<AtomicUsize>,
}

impl Module for FlakyStart {
    fn on_start(&self) {
        if self.attempts.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("transient startup failure");
        }
    }
}

#[test]
fn test_panicking_start_releases_identity_for_retry() {
    common::init_diagnostics();
    let registry = ModuleRegistry::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let a = Arc::clone(&attempts);
    registry
        .register(
            ModuleIdentity::of::<FlakyStart>(),
            Arc::new(move || {
                Arc::new(FlakyStart {
                    attempts: Arc::clone(&a),
                }) as Arc<dyn Module>
            }),
        )
        .unwrap();
    let identity = ModuleIdentity::of::<FlakyStart>();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| registry.load(&identity)));
    assert!(outcome.is_err());
    assert!(!registry.is_loaded(&identity));

    // The aborted load must not leave the identity claimed.
    registry.load(&identity).unwrap();
    assert!(registry.is_loaded(&identity));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

struct LateBloomer;
impl Module for LateBloomer {}

#[test]
fn test_panicking_factory_leaves_registry_loadable() {
    common::init_diagnostics();
    let registry = ModuleRegistry::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&calls);
    registry
        .register(
            ModuleIdentity::of::<LateBloomer>(),
            Arc::new(move || {
                if c.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("construction failure");
                }
                Arc::new(LateBloomer) as Arc<dyn Module>
            }),
        )
        .unwrap();
    let identity = ModuleIdentity::of::<LateBloomer>();

    assert!(panic::catch_unwind(AssertUnwindSafe(|| registry.load(&identity))).is_err());
    assert!(!registry.is_loaded(&identity));
    assert_eq!(registry.loaded_count(), 0);

    // Recovery on lookup works once the fault has cleared.
    assert!(registry.get(&identity).is_some());
    assert!(registry.is_loaded(&identity));
}
