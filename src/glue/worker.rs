//! Worker threads that always run a cleanup action when their work ends.
//!
//! The cleanup runs after the action on every exit path, including unwinding, and
//! on the worker's own thread, so it can release that thread's thread-local state
//! (for example with [`ThreadScopedStore::clear_current_thread`]).
//!
//! [`ThreadScopedStore::clear_current_thread`]: crate::local::ThreadScopedStore::clear_current_thread

use std::io;
use std::thread::{self, JoinHandle, Scope, ScopedJoinHandle};

/// Runs `cleanup` when dropped.
struct Cleanup<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Drop for Cleanup<F> {
    fn drop(&mut self) {
        if let Some(cleanup) = self.0.take() {
            crate::trace!(thread = ?thread::current().id(), "worker cleanup");
            cleanup();
        }
    }
}

/// Runs `action`, then `cleanup`, on the calling thread.
///
/// A panic in `action` is propagated after `cleanup` has run.
#[inline]
pub fn run_with_cleanup<T, A, C>(action: A, cleanup: C) -> T
where
    A: FnOnce() -> T,
    C: FnOnce(),
{
    let _cleanup = Cleanup(Some(cleanup));
    action()
}

/// Spawns a thread running `action` followed by `cleanup`.
#[inline]
pub fn spawn_with_cleanup<T, A, C>(action: A, cleanup: C) -> JoinHandle<T>
where
    T: Send + 'static,
    A: FnOnce() -> T + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    thread::spawn(move || run_with_cleanup(action, cleanup))
}

/// Like [`spawn_with_cleanup`], through a configured [`thread::Builder`].
///
/// # Errors
///
/// Returns the OS error if the thread could not be created. Neither `action`
/// nor `cleanup` runs in that case.
#[inline]
pub fn spawn_named_with_cleanup<T, A, C>(
    builder: thread::Builder,
    action: A,
    cleanup: C,
) -> io::Result<JoinHandle<T>>
where
    T: Send + 'static,
    A: FnOnce() -> T + Send + 'static,
    C: FnOnce() + Send + 'static,
{
    builder.spawn(move || run_with_cleanup(action, cleanup))
}

/// Spawns a scoped thread running `action` followed by `cleanup`.
#[inline]
pub fn spawn_scoped_with_cleanup<'scope, 'env, T, A, C>(
    scope: &'scope Scope<'scope, 'env>,
    action: A,
    cleanup: C,
) -> ScopedJoinHandle<'scope, T>
where
    T: Send + 'scope,
    A: FnOnce() -> T + Send + 'scope,
    C: FnOnce() + Send + 'scope,
{
    scope.spawn(move || run_with_cleanup(action, cleanup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_cleanup_after_action() {
        let order = std::cell::RefCell::new(Vec::new());
        let out = run_with_cleanup(
            || {
                order.borrow_mut().push("action");
                7
            },
            || order.borrow_mut().push("cleanup"),
        );
        assert_eq!(out, 7);
        assert_eq!(*order.borrow(), ["action", "cleanup"]);
    }

    #[test]
    fn test_cleanup_after_panic() {
        let cleaned = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&cleaned);
        let handle = spawn_with_cleanup(
            || panic!("worker failed"),
            move || {
                seen.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert!(handle.join().is_err());
        assert_eq!(cleaned.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_named_and_scoped() {
        let cleaned = AtomicUsize::new(0);
        let name = spawn_named_with_cleanup(
            thread::Builder::new().name("worker-1".into()),
            || thread::current().name().map(str::to_owned),
            || {},
        )
        .unwrap()
        .join()
        .unwrap();
        assert_eq!(name.as_deref(), Some("worker-1"));

        thread::scope(|s| {
            for _ in 0..3 {
                spawn_scoped_with_cleanup(s, || (), || {
                    cleaned.fetch_add(1, Ordering::SeqCst);
                });
            }
        });
        assert_eq!(cleaned.load(Ordering::SeqCst), 3);
    }
}
