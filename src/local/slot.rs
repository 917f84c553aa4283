//! The per-thread side of thread-scoped storage.
//!
//! Every thread owns one slot: a map from [`HostId`] to that thread's sub-table
//! for the host. A sub-table is only valid while the host still holds the
//! matching [`Registration`]; the slot keeps a `Weak` to it, so pruning a thread
//! on the host (or dropping the host) invalidates the sub-table immediately.
//! Invalid sub-tables are reclaimed lazily by the owning thread, or when it exits.
//!
//! Values never leave their thread, so they don't need to be `Send`. They are
//! reference-counted handles: readers clone the handle under a short borrow and
//! run user code (`Clone`, closures, `Drop`) only after the slot's `RefCell`
//! borrow is released, so that code may touch thread-scoped storage again.
//!
//! Stale sub-tables are swept when a new one is added, but only once the slot has
//! doubled in size since the previous sweep. A thread that writes to many live
//! hosts therefore pays amortized constant time per registration.

use super::store::HostId;
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, Weak};
use std::thread::ThreadId;

/// Host-side record of one thread's sub-table.
#[derive(Debug)]
pub(crate) struct Registration {
    pub(crate) thread: ThreadId,
    /// Dies with the registering thread.
    pub(crate) alive: Weak<()>,
}

impl Registration {
    pub(crate) fn for_current_thread() -> Self {
        let alive = ALIVE.try_with(Arc::downgrade).unwrap_or_default();
        Self {
            thread: std::thread::current().id(),
            alive,
        }
    }

    #[inline]
    pub(crate) fn thread_exited(&self) -> bool {
        self.alive.strong_count() == 0
    }
}

pub(crate) type Value = Rc<dyn Any>;

pub(crate) struct SubTable {
    registration: Weak<Registration>,
    values: HashMap<&'static str, Value>,
}

impl SubTable {
    pub(crate) fn new(registration: &Arc<Registration>) -> Self {
        Self {
            registration: Arc::downgrade(registration),
            values: HashMap::new(),
        }
    }

    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        self.registration.strong_count() > 0
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub(crate) fn insert(&mut self, key: &'static str, value: Value) -> Option<Value> {
        self.values.insert(key, value)
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }
}

/// Values evicted while the slot was borrowed, dropped once the borrow ends.
#[derive(Default)]
pub(crate) struct Evicted {
    values: Vec<Value>,
    tables: Vec<SubTable>,
}

impl Evicted {
    pub(crate) fn value(&mut self, value: Option<Value>) {
        self.values.extend(value);
    }

    pub(crate) fn table(&mut self, table: Option<SubTable>) {
        self.tables.extend(table);
    }
}

/// Slot size below which stale sub-tables are left for later.
pub(crate) const SWEEP_FLOOR: usize = 32;

/// The calling thread's sub-tables, keyed by host.
#[derive(Default)]
pub(crate) struct Slot {
    tables: HashMap<HostId, SubTable>,
    /// Table count right after the last sweep.
    swept_len: usize,
}

impl Slot {
    /// The live sub-table for `host`.
    pub(crate) fn live(&self, host: HostId) -> Option<&SubTable> {
        self.tables.get(&host).filter(|t| t.is_live())
    }

    pub(crate) fn live_mut(&mut self, host: HostId) -> Option<&mut SubTable> {
        self.tables.get_mut(&host).filter(|t| t.is_live())
    }

    pub(crate) fn remove(&mut self, host: HostId) -> Option<SubTable> {
        self.tables.remove(&host)
    }

    /// Installs a fresh sub-table for `host`, replacing any stale one.
    pub(crate) fn register(&mut self, host: HostId, table: SubTable, evicted: &mut Evicted) {
        evicted.table(self.tables.insert(host, table));
        if self.tables.len() >= (self.swept_len * 2).max(SWEEP_FLOOR) {
            self.sweep(evicted);
        }
    }

    /// Removes every sub-table whose host registration is gone.
    fn sweep(&mut self, evicted: &mut Evicted) {
        let stale: Vec<HostId> = self
            .tables
            .iter()
            .filter(|(_, t)| !t.is_live())
            .map(|(id, _)| *id)
            .collect();
        for id in stale {
            evicted.table(self.tables.remove(&id));
        }
        self.swept_len = self.tables.len();
        crate::trace!(live = self.swept_len, "swept thread-scoped slot");
    }
}

thread_local! {
    static SLOT: RefCell<Slot> = RefCell::new(Slot::default());
    static ALIVE: Arc<()> = Arc::new(());
}

/// Clones the handle to the calling thread's value for `key` on `host`.
///
/// Returns `None` when the slot is gone (thread teardown), when the thread never
/// wrote to `host`, or when its registration was pruned. No user code runs while
/// the slot is borrowed.
pub(crate) fn lookup(host: HostId, key: &str) -> Option<Value> {
    SLOT.try_with(|slot| slot.borrow().live(host)?.get(key).cloned())
        .ok()
        .flatten()
}

/// Mutable access to the whole slot. `f` returns what it evicted; those values
/// are dropped after the borrow is released.
///
/// Returns `None` if the slot has already been destroyed.
pub(crate) fn with_slot_mut<R>(f: impl FnOnce(&mut Slot, &mut Evicted) -> R) -> Option<R> {
    let mut evicted = Evicted::default();
    let result = SLOT
        .try_with(|slot| f(&mut *slot.borrow_mut(), &mut evicted))
        .ok();
    drop(evicted);
    result
}
