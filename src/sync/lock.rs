//! A non-reentrant, non-poisoning blocking mutex.

use super::{wait_on_u32, wake_one_u32};
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

const UNLOCKED: u32 = 0;
const LOCKED: u32 = 1;
const CONTENDED: u32 = 2;

/// A blocking mutual-exclusion lock that protects no data of its own.
///
/// `Lock` is the primitive behind [`Synchronized`](super::Synchronized) proxies and
/// synchronized methods. It is deliberately **not reentrant**: a thread that calls
/// [`lock`](Self::lock) while already holding the lock deadlocks. Callers that
/// compose several guarded operations should take the lock once and work through
/// the guard.
///
/// A panic that unwinds while a [`LockGuard`] is alive releases the lock; there is
/// no poisoning.
pub struct Lock {
    /// 0: unlocked, 1: locked, 2: locked & contended
    state: AtomicU32,
}

impl Lock {
    /// Creates a new unlocked lock.
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(UNLOCKED),
        }
    }

    /// Acquires the lock, blocking the current thread until it is able to do so.
    pub fn lock(&self) -> LockGuard<'_> {
        if self
            .state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            self.lock_slow();
        }
        LockGuard { lock: self }
    }

    /// Attempts to acquire the lock without blocking.
    pub fn try_lock(&self) -> Option<LockGuard<'_>> {
        self.state
            .compare_exchange(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| LockGuard { lock: self })
    }

    /// Returns `true` if some thread currently holds the lock.
    ///
    /// The answer may be stale by the time the caller looks at it.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.state.load(Ordering::Relaxed) != UNLOCKED
    }

    /// Runs `f` while holding the lock.
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.lock();
        f()
    }

    #[cold]
    fn lock_slow(&self) {
        let mut spins = 0;
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state == UNLOCKED {
                if self
                    .state
                    .compare_exchange_weak(UNLOCKED, LOCKED, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return;
                }
                continue;
            }
            if state == LOCKED && spins < 40 {
                spins += 1;
                core::hint::spin_loop();
                continue;
            }
            break;
        }

        // Once contended we must acquire as CONTENDED so the eventual unlock
        // wakes whoever is still parked behind us.
        while self.state.swap(CONTENDED, Ordering::Acquire) != UNLOCKED {
            wait_on_u32(&self.state, CONTENDED);
        }
    }

    fn unlock(&self) {
        if self.state.swap(UNLOCKED, Ordering::Release) == CONTENDED {
            wake_one_u32(&self.state);
        }
    }
}

impl Default for Lock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lock").field("locked", &self.is_locked()).finish()
    }
}

/// RAII guard for a held [`Lock`]. Dropping it releases the lock.
#[must_use = "if unused the Lock will immediately unlock"]
pub struct LockGuard<'a> {
    lock: &'a Lock,
}

impl<'a> LockGuard<'a> {
    /// The lock this guard holds.
    pub fn lock(&self) -> &'a Lock {
        self.lock
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

impl fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").finish_non_exhaustive()
    }
}
