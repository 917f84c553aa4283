//! `ThreadScopedStore` - per-host storage whose entries are private to each thread.

use super::slot::{self, Registration, SubTable};
use crossbeam_utils::CachePadded;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

static NEXT_HOST_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`ThreadScopedStore`]. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostId(u64);

impl HostId {
    /// The raw id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host#{}", self.0)
    }
}

/// Bookkeeping snapshot of a [`ThreadScopedStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    /// The store's id, if any thread ever wrote to it.
    pub host: Option<HostId>,
    /// Threads holding a per-thread record.
    pub threads: usize,
    /// Of those, threads that have already terminated.
    pub exited_threads: usize,
}

/// Storage for attributes whose values are private to the calling thread.
///
/// One store belongs to one host (an object, or a type's class-level singleton).
/// Each thread that writes gets its own sub-table; other threads never see it.
///
/// - Reads never create bookkeeping. A thread that has only read has no record.
/// - The first write from a thread registers it with the store. That insertion is
///   the only operation that takes the store's internal lock; later reads and
///   writes from the same thread touch thread-local memory only.
/// - Records are never removed automatically. Call [`prune`](Self::prune) or
///   [`prune_exited`](Self::prune_exited) periodically on long-lived hosts that see
///   many threads, or the records accumulate.
///
/// `new` is `const`, so a store can live in a `static` for class-level attributes.
///
/// # Example
///
/// ```rust
/// use threadward::ThreadScopedStore;
///
/// let store = ThreadScopedStore::new();
/// store.set("count", 5_i32);
/// assert_eq!(store.get::<i32>("count"), Some(5));
///
/// std::thread::scope(|s| {
///     s.spawn(|| assert_eq!(store.get::<i32>("count"), None));
/// });
/// assert_eq!(store.thread_count(), 1);
/// ```
pub struct ThreadScopedStore {
    /// 0 until the first write assigns an id.
    id: AtomicU64,
    registry: CachePadded<Mutex<Vec<Arc<Registration>>>>,
}

impl ThreadScopedStore {
    /// Creates an empty store.
    pub const fn new() -> Self {
        Self {
            id: AtomicU64::new(0),
            registry: CachePadded::new(Mutex::new(Vec::new())),
        }
    }

    /// The store's id, assigning one if needed.
    pub fn id(&self) -> HostId {
        let id = self.id.load(Ordering::Acquire);
        if id != 0 {
            return HostId(id);
        }
        let fresh = NEXT_HOST_ID.fetch_add(1, Ordering::Relaxed);
        match self
            .id
            .compare_exchange(0, fresh, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => HostId(fresh),
            Err(existing) => HostId(existing),
        }
    }

    fn assigned_id(&self) -> Option<HostId> {
        match self.id.load(Ordering::Acquire) {
            0 => None,
            id => Some(HostId(id)),
        }
    }

    fn registry(&self) -> MutexGuard<'_, Vec<Arc<Registration>>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a clone of the calling thread's value for `key`.
    ///
    /// `None` if this thread never set `key`, or if the stored value is not a `T`.
    /// `T::clone` runs after the thread's storage is released, so a `Clone` impl
    /// may itself read or write thread-scoped stores.
    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        self.with(key, T::clone)
    }

    /// Runs `f` on the calling thread's value for `key`, if there is one of type `T`.
    ///
    /// `f` runs outside the thread's storage borrow and may write to any store,
    /// including this key. It keeps seeing the value it was handed.
    pub fn with<T: 'static, R>(&self, key: &str, f: impl FnOnce(&T) -> R) -> Option<R> {
        let host = self.assigned_id()?;
        let value = slot::lookup(host, key)?;
        let typed = (*value).downcast_ref::<T>();
        if typed.is_none() {
            crate::trace!(%host, key, "thread-scoped value has a different type");
        }
        typed.map(f)
    }

    /// Returns `true` if the calling thread has a value for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.assigned_id()
            .and_then(|host| slot::lookup(host, key))
            .is_some()
    }

    /// Sets the calling thread's value for `key`, registering the thread with this
    /// store on its first write.
    ///
    /// A write made while the thread's storage is being torn down is discarded.
    pub fn set<T: 'static>(&self, key: &'static str, value: T) {
        let host = self.id();
        let stored = slot::with_slot_mut(|slot, evicted| {
            if let Some(table) = slot.live_mut(host) {
                evicted.value(table.insert(key, Rc::new(value)));
                return;
            }

            let registration = self.register_current_thread();
            let mut table = SubTable::new(&registration);
            table.insert(key, Rc::new(value));
            slot.register(host, table, evicted);
        });
        if stored.is_none() {
            crate::trace!(%host, key, "discarded write during thread teardown");
        }
    }

    /// Removes the calling thread's value for `key`. The thread stays registered.
    pub fn remove(&self, key: &str) -> bool {
        let Some(host) = self.assigned_id() else {
            return false;
        };
        slot::with_slot_mut(|slot, evicted| {
            let removed = slot.live_mut(host).and_then(|t| t.remove(key));
            let found = removed.is_some();
            evicted.value(removed);
            found
        })
        .unwrap_or(false)
    }

    /// Drops the calling thread's whole sub-table and its record on this store.
    pub fn clear_current_thread(&self) -> bool {
        let Some(host) = self.assigned_id() else {
            return false;
        };
        let me = thread::current().id();
        let had_record = {
            let mut registry = self.registry();
            let before = registry.len();
            registry.retain(|r| r.thread != me);
            registry.len() != before
        };
        slot::with_slot_mut(|slot, evicted| evicted.table(slot.remove(host)));
        had_record
    }

    /// Critical section: the only mutation shared by all threads using this store.
    fn register_current_thread(&self) -> Arc<Registration> {
        let registration = Arc::new(Registration::for_current_thread());
        let mut registry = self.registry();
        registry.retain(|r| r.thread != registration.thread);
        registry.push(Arc::clone(&registration));
        crate::trace!(host = ?self.assigned_id(), threads = registry.len(), "registered thread");
        registration
    }

    /// Removes the record of every thread not in `live`.
    ///
    /// Returns how many records were removed. A removed thread that is still
    /// running loses its values for this store and starts fresh on its next write.
    pub fn prune<I>(&self, live: I) -> usize
    where
        I: IntoIterator<Item = ThreadId>,
    {
        let live: HashSet<ThreadId> = live.into_iter().collect();
        let removed = self.retain_records(|r| live.contains(&r.thread));
        crate::debug!(host = ?self.assigned_id(), removed, "pruned thread-scoped records");
        removed
    }

    /// Removes the record of every thread that has terminated.
    pub fn prune_exited(&self) -> usize {
        let removed = self.retain_records(|r| !r.thread_exited());
        crate::debug!(host = ?self.assigned_id(), removed, "pruned exited thread records");
        removed
    }

    fn retain_records(&self, keep: impl Fn(&Registration) -> bool) -> usize {
        let mut registry = self.registry();
        let before = registry.len();
        registry.retain(|r| keep(&**r));
        before - registry.len()
    }

    /// Number of threads holding a record on this store.
    pub fn thread_count(&self) -> usize {
        self.registry().len()
    }

    /// Returns `true` if `thread` holds a record on this store.
    pub fn has_thread_record(&self, thread: ThreadId) -> bool {
        self.registry().iter().any(|r| r.thread == thread)
    }

    /// Threads holding a record, in registration order.
    pub fn thread_ids(&self) -> Vec<ThreadId> {
        self.registry().iter().map(|r| r.thread).collect()
    }

    /// A bookkeeping snapshot.
    pub fn stats(&self) -> StoreStats {
        let registry = self.registry();
        StoreStats {
            host: self.assigned_id(),
            threads: registry.len(),
            exited_threads: registry.iter().filter(|r| r.thread_exited()).count(),
        }
    }
}

impl Default for ThreadScopedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ThreadScopedStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadScopedStore")
            .field("host", &self.assigned_id())
            .field("threads", &self.thread_count())
            .finish()
    }
}
