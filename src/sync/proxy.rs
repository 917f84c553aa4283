//! `Synchronized<T>`: a proxy that serializes every call made through it.
//!
//! The proxy owns its target (which may itself be a shared handle such as
//! `Arc<U>` or `&U`) together with an [`Arc<Lock>`](Lock). Every call routed
//! through the proxy takes the lock first and releases it on every exit path,
//! including unwinding.
//!
//! Several proxies can be built over the *same* lock ([`Synchronized::with_lock`],
//! [`Synchronized::share_lock`]) to get mutual exclusion across different objects.
//!
//! # Limitation
//!
//! The guarantee only covers access routed through the proxy. When the target is
//! a shared handle, any code that reaches the underlying value through another
//! clone of that handle bypasses the lock entirely.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use threadward::Synchronized;
//!
//! // `Cell` is not `Sync`, the proxy makes it shareable.
//! let hits = Synchronized::new(Cell::new(0_u32));
//! std::thread::scope(|s| {
//!     for _ in 0..4 {
//!         s.spawn(|| hits.call(|c| c.set(c.get() + 1)));
//!     }
//! });
//! assert_eq!(hits.into_inner().get(), 4);
//! ```

use super::lock::{Lock, LockGuard};
use core::cell::UnsafeCell;
use core::fmt;
use core::ops::{Deref, DerefMut};
use std::sync::Arc;

/// A value whose every access is serialized by a (possibly shared) [`Lock`].
pub struct Synchronized<T: ?Sized> {
    lock: Arc<Lock>,
    target: UnsafeCell<T>,
}

// SAFETY: the target is only reachable through `&mut self` or while holding
// `lock`, exactly like `std::sync::Mutex<T>`.
unsafe impl<T: ?Sized + Send> Send for Synchronized<T> {}
unsafe impl<T: ?Sized + Send> Sync for Synchronized<T> {}

impl<T> Synchronized<T> {
    /// Wraps `target` behind a fresh lock owned by this proxy.
    pub fn new(target: T) -> Self {
        Self::with_lock(target, Arc::new(Lock::new()))
    }

    /// Wraps `target` behind an externally supplied lock.
    ///
    /// Every proxy built over the same lock is mutually exclusive with the others.
    pub fn with_lock(target: T, lock: Arc<Lock>) -> Self {
        Self {
            lock,
            target: UnsafeCell::new(target),
        }
    }

    /// Consumes the proxy and returns the target.
    pub fn into_inner(self) -> T {
        self.target.into_inner()
    }
}

impl<T: ?Sized> Synchronized<T> {
    /// Builds a second proxy around `other` that shares this proxy's lock.
    pub fn share_lock<U>(&self, other: U) -> Synchronized<U> {
        Synchronized::with_lock(other, Arc::clone(&self.lock))
    }

    /// The lock guarding this proxy, for sharing with other proxies.
    pub fn shared_lock(&self) -> &Arc<Lock> {
        &self.lock
    }

    /// Returns `true` if `other` is guarded by the same lock.
    pub fn shares_lock_with<U: ?Sized>(&self, other: &Synchronized<U>) -> bool {
        Arc::ptr_eq(&self.lock, &other.lock)
    }

    /// Forwards one call to the target while holding the lock.
    #[inline]
    pub fn call<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.lock_target();
        f(&*guard)
    }

    /// Forwards one mutating call to the target while holding the lock.
    #[inline]
    pub fn call_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock_target();
        f(&mut *guard)
    }

    /// Runs arbitrary caller code while holding the proxy's lock.
    ///
    /// The lock is not reentrant: calling back into this proxy (or into any proxy
    /// sharing its lock) from inside `block` deadlocks. Use
    /// [`lock_target`](Self::lock_target) to perform several steps on the target
    /// atomically.
    #[inline]
    pub fn synchronize<R>(&self, block: impl FnOnce() -> R) -> R {
        self.lock.with(block)
    }

    /// Takes the lock and returns a guard that dereferences to the target.
    pub fn lock_target(&self) -> SynchronizedGuard<'_, T> {
        let guard = self.lock.lock();
        SynchronizedGuard {
            target: self.target.get(),
            _guard: guard,
        }
    }

    /// Like [`lock_target`](Self::lock_target), but returns `None` instead of blocking.
    pub fn try_lock_target(&self) -> Option<SynchronizedGuard<'_, T>> {
        self.lock.try_lock().map(|guard| SynchronizedGuard {
            target: self.target.get(),
            _guard: guard,
        })
    }

    /// Mutable access without locking; `&mut self` already proves exclusivity.
    pub fn get_mut(&mut self) -> &mut T {
        self.target.get_mut()
    }
}

impl<T: Default> Default for Synchronized<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Synchronized<T> {
    fn from(target: T) -> Self {
        Self::new(target)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Synchronized<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Synchronized");
        match self.try_lock_target() {
            Some(guard) => d.field("target", &&*guard),
            None => d.field("target", &format_args!("<locked>")),
        };
        d.finish_non_exhaustive()
    }
}

/// Access to a [`Synchronized`] target for as long as the guard lives.
#[must_use = "if unused the lock will immediately unlock"]
pub struct SynchronizedGuard<'a, T: ?Sized> {
    target: *mut T,
    _guard: LockGuard<'a>,
}

impl<T: ?Sized> Deref for SynchronizedGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: we hold the proxy's lock for the guard's lifetime.
        unsafe { &*self.target }
    }
}

impl<T: ?Sized> DerefMut for SynchronizedGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: we hold the proxy's lock for the guard's lifetime.
        unsafe { &mut *self.target }
    }
}

// SAFETY: sharing the guard only hands out `&T`, as `MutexGuard` does.
unsafe impl<T: ?Sized + Sync> Sync for SynchronizedGuard<'_, T> {}
