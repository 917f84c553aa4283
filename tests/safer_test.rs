use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use threadward::safer::{Class, ClassBuilder, Invocation, MethodState, Monitor, Synchronizable};
use threadward::{DefinitionError, MethodError};

#[derive(Default)]
struct Ledger {
    balance: AtomicU64,
    entries: AtomicUsize,
    monitor: Monitor,
}

impl Synchronizable for Ledger {
    fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

/// The singleton side of `Ledger`: shared bookkeeping for every ledger.
struct LedgerClass {
    opened: AtomicUsize,
    monitor: Monitor,
}

impl Synchronizable for LedgerClass {
    fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

static LEDGER_CLASS: LedgerClass = LedgerClass {
    opened: AtomicUsize::new(0),
    monitor: Monitor::new(),
};

fn deposit(ledger: &Ledger, _: &Invocation, amount: u64) -> u64 {
    let seen = ledger.balance.load(Ordering::Relaxed);
    thread::yield_now();
    ledger.balance.store(seen + amount, Ordering::Relaxed);
    ledger.entries.fetch_add(1, Ordering::Relaxed);
    seen + amount
}

fn ledger_methods() -> &'static Class<Ledger> {
    static METHODS: OnceLock<Class<Ledger>> = OnceLock::new();
    METHODS.get_or_init(|| {
        ClassBuilder::new("Ledger")
            .make_thread_safe(["deposit", "balance"])
            .define("deposit", deposit)
            .define("balance", |ledger: &Ledger, _, (): ()| {
                ledger.balance.load(Ordering::Relaxed)
            })
            .define("peek", |ledger: &Ledger, call, (): ()| {
                (ledger.monitor.current_method(), call.synchronized_method())
            })
            .build()
            .unwrap_or_else(|err| panic!("{err}"))
    })
}

fn class_methods() -> &'static Class<LedgerClass> {
    static METHODS: OnceLock<Class<LedgerClass>> = OnceLock::new();
    METHODS.get_or_init(|| {
        ClassBuilder::new("Ledger.class")
            .define("open", |class: &LedgerClass, _, (): ()| {
                let seen = class.opened.load(Ordering::Relaxed);
                thread::yield_now();
                class.opened.store(seen + 1, Ordering::Relaxed);
            })
            .make_thread_safe(["open"])
            .build()
            .unwrap_or_else(|err| panic!("{err}"))
    })
}

#[test]
fn test_deferred_method_is_guarded() {
    let ledger = Arc::new(Ledger::default());
    let deposit = ledger_methods().method::<u64, u64>("deposit").unwrap();
    assert!(deposit.is_synchronized());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let deposit = deposit.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    deposit.call(&ledger, 1);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(ledger.balance.load(Ordering::Relaxed), 800);
    assert_eq!(ledger.entries.load(Ordering::Relaxed), 800);
}

#[test]
fn test_unsynchronized_method_has_no_marker() {
    let ledger = Ledger::default();
    let methods = ledger_methods();
    assert_eq!(methods.state("peek"), MethodState::Unregistered);
    assert_eq!(
        methods.invoke::<(), (Option<&str>, Option<&str>)>(&ledger, "peek", ()),
        Ok((None, None))
    );
}

#[test]
fn test_invoking_undefined_method_fails() {
    let builder = ClassBuilder::<Ledger>::new("Ledger").make_thread_safe(["audit"]);
    assert_eq!(builder.state("audit"), MethodState::Pending);
    assert!(!builder.is_defined("audit"));
    assert!(matches!(
        builder.build(),
        Err(DefinitionError::PendingMethods { ref methods, .. }) if methods == &["audit"]
    ));

    let ledger = Ledger::default();
    let err = ledger_methods()
        .invoke::<(), ()>(&ledger, "audit", ())
        .unwrap_err();
    assert_eq!(err.to_string(), "undefined method `audit` for class `Ledger`");
    assert!(matches!(err, MethodError::Undefined { .. }));
}

#[test]
fn test_singleton_level_is_independent() {
    let methods = class_methods();
    assert!(methods.is_synchronized("open"));
    assert!(!methods.is_synchronized("deposit"));
    assert!(ledger_methods().is_synchronized("deposit"));

    let ledger = Ledger::default();
    // Holding an instance's monitor does not block the singleton's.
    let _held = ledger.monitor.enter("deposit");
    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                for _ in 0..50 {
                    methods.invoke::<(), ()>(&LEDGER_CLASS, "open", ()).unwrap();
                }
            });
        }
    });
    assert!(LEDGER_CLASS.opened.load(Ordering::Relaxed) >= 200);
    assert_eq!(LEDGER_CLASS.monitor.current_method(), None);
}

#[test]
fn test_class_is_debuggable() {
    let rendered = format!("{:?}", ledger_methods());
    assert!(rendered.contains("Ledger"));
    assert_eq!(ledger_methods().method_names(), ["balance", "deposit", "peek"]);
}
