use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use threadward::glue::{
    run_with_cleanup, spawn_with_cleanup, RequestContext, RequestGlobals, RequestTable,
};
use threadward::local::{ThreadLocalHost, ThreadScopedStore};
use threadward::{request_global, ScopeError};

#[derive(Default)]
struct Request {
    path: String,
    globals: RequestTable,
}

impl RequestContext for Request {
    fn globals(&self) -> &RequestTable {
        &self.globals
    }
}

request_global! {
    pub user_id, set_user_id as "user": u64;
    pub trace_tag, set_trace_tag: String;
}

#[test]
fn test_strict_write_outside_scope_fails() {
    assert_eq!(set_user_id(1), Err(ScopeError::NoActiveScope("user")));
    assert_eq!(user_id(), None);
    assert!(!RequestGlobals::is_active());
    assert!(!RequestGlobals::remove("user"));
}

#[test]
fn test_scope_lifecycle() {
    let request = Arc::new(Request {
        path: "/orders".to_owned(),
        ..Request::default()
    });
    {
        let _scope = RequestGlobals::enter(&request);
        assert!(RequestGlobals::is_active());
        let current = RequestGlobals::request::<Request>().unwrap();
        assert_eq!(current.path, "/orders");

        set_user_id(42).unwrap();
        set_trace_tag("abc".to_owned()).unwrap();
        assert_eq!(user_id(), Some(42));
        assert_eq!(request.globals().len(), 2);
        assert!(RequestGlobals::remove("trace_tag"));
        assert_eq!(trace_tag(), None);
    }
    assert!(!RequestGlobals::is_active());
    assert!(request.globals().is_empty());
    assert_eq!(user_id(), None);
}

#[test]
fn test_scope_resets_on_panic() {
    let request = Arc::new(Request::default());
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _scope = RequestGlobals::enter(&request);
        set_user_id(7).unwrap();
        panic!("handler failed");
    }));
    assert!(result.is_err());
    assert!(!RequestGlobals::is_active());
    assert!(request.globals().is_empty());
}

#[test]
fn test_scope_does_not_keep_request_alive() {
    let request = Arc::new(Request::default());
    let _scope = RequestGlobals::enter(&request);
    assert_eq!(Arc::strong_count(&request), 1);
    drop(request);
    assert!(RequestGlobals::request::<Request>().is_none());
    assert_eq!(set_user_id(1), Err(ScopeError::NoActiveScope("user")));
}

#[test]
fn test_scopes_are_per_thread() {
    let request = Arc::new(Request::default());
    let _scope = RequestGlobals::enter(&request);
    set_user_id(1).unwrap();
    thread::spawn(|| {
        assert_eq!(user_id(), None);
        assert!(set_user_id(2).is_err());
    })
    .join()
    .unwrap();
    assert_eq!(user_id(), Some(1));
}

#[derive(Default)]
struct Connection {
    locals: ThreadScopedStore,
}

impl ThreadLocalHost for Connection {
    fn thread_locals(&self) -> &ThreadScopedStore {
        &self.locals
    }
}

#[test]
fn test_worker_cleanup_releases_thread_state() {
    let connection = Arc::new(Connection::default());
    let released = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let work = Arc::clone(&connection);
            let cleanup = Arc::clone(&connection);
            let released = Arc::clone(&released);
            spawn_with_cleanup(
                move || {
                    work.locals.set("session", i);
                    if i == 1 {
                        panic!("worker {i} failed");
                    }
                },
                move || {
                    cleanup.locals.clear_current_thread();
                    released.fetch_add(1, Ordering::SeqCst);
                },
            )
        })
        .collect();
    let failures = handles
        .into_iter()
        .map(thread::JoinHandle::join)
        .filter(Result::is_err)
        .count();
    assert_eq!(failures, 1);
    assert_eq!(released.load(Ordering::SeqCst), 3);
    assert_eq!(connection.locals.thread_count(), 0);
}

#[test]
fn test_run_with_cleanup_returns_action_value() {
    let cleaned = AtomicUsize::new(0);
    let out = run_with_cleanup(|| "done", || {
        cleaned.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(out, "done");
    assert_eq!(cleaned.load(Ordering::SeqCst), 1);
}
