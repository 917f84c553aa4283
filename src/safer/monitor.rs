//! Per-instance synchronization state: a lazily created lock and the marker of
//! the synchronized method currently running.

use crate::sync::{Lock, LockGuard};
use crossbeam_utils::atomic::AtomicCell;
use std::fmt;
use std::sync::OnceLock;

/// Context handed to every method body registered with a
/// [`Class`](super::Class).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    method: &'static str,
    synchronized: bool,
}

impl Invocation {
    pub(crate) const fn plain(method: &'static str) -> Self {
        Self {
            method,
            synchronized: false,
        }
    }

    pub(crate) const fn synchronized(method: &'static str) -> Self {
        Self {
            method,
            synchronized: true,
        }
    }

    /// Name the body was invoked under.
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// `Some(name)` when the body runs under its instance's lock.
    pub fn synchronized_method(&self) -> Option<&'static str> {
        self.synchronized.then_some(self.method)
    }

    /// Returns `true` when the body runs under its instance's lock.
    pub fn is_synchronized(&self) -> bool {
        self.synchronized
    }
}

/// A host whose synchronized methods serialize on a per-instance [`Monitor`].
pub trait Synchronizable {
    /// The instance's monitor.
    fn monitor(&self) -> &Monitor;
}

/// Per-instance lock plus the in-flight synchronized method marker.
///
/// The lock is created on first acquisition. It is **not reentrant**: a
/// synchronized method that calls another synchronized method on the same
/// instance deadlocks. Call the unsynchronized body directly instead.
///
/// The marker is set while a synchronized body runs and cleared when it returns,
/// including by unwinding.
pub struct Monitor {
    lock: OnceLock<Lock>,
    marker: AtomicCell<Option<&'static str>>,
}

impl Monitor {
    /// A monitor whose lock is not created yet.
    pub const fn new() -> Self {
        Self {
            lock: OnceLock::new(),
            marker: AtomicCell::new(None),
        }
    }

    /// The instance lock, created on first use.
    pub fn lock(&self) -> &Lock {
        self.lock.get_or_init(Lock::new)
    }

    /// Returns `true` once the lock has been created.
    pub fn is_initialized(&self) -> bool {
        self.lock.get().is_some()
    }

    /// Returns `true` while some thread holds the lock. Never creates the lock.
    pub fn is_locked(&self) -> bool {
        self.lock.get().is_some_and(Lock::is_locked)
    }

    /// The synchronized method currently running on this instance, if any.
    pub fn current_method(&self) -> Option<&'static str> {
        self.marker.load()
    }

    /// Takes the lock and marks `method` as in flight until the guard drops.
    pub fn enter(&self, method: &'static str) -> MonitorGuard<'_> {
        let lock = self.lock().lock();
        self.marker.store(Some(method));
        MonitorGuard {
            monitor: self,
            _lock: lock,
        }
    }

    /// Runs `body` as the synchronized method `method`.
    ///
    /// This is the call-site form of what [`ClassBuilder::make_thread_safe`]
    /// installs.
    ///
    /// [`ClassBuilder::make_thread_safe`]: super::ClassBuilder::make_thread_safe
    pub fn run<R>(&self, method: &'static str, body: impl FnOnce(&Invocation) -> R) -> R {
        let _entered = self.enter(method);
        body(&Invocation::synchronized(method))
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Monitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("initialized", &self.is_initialized())
            .field("current_method", &self.current_method())
            .finish()
    }
}

impl Synchronizable for Monitor {
    fn monitor(&self) -> &Monitor {
        self
    }
}

/// Held while a synchronized body runs. Clears the marker, then releases the lock.
#[must_use = "if unused the monitor will immediately be released"]
pub struct MonitorGuard<'a> {
    monitor: &'a Monitor,
    _lock: LockGuard<'a>,
}

impl Drop for MonitorGuard<'_> {
    fn drop(&mut self) {
        // Runs before `_lock` is dropped, so the next holder never sees our marker.
        self.monitor.marker.store(None);
    }
}

impl fmt::Debug for MonitorGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MonitorGuard")
            .field("method", &self.monitor.current_method())
            .finish()
    }
}
