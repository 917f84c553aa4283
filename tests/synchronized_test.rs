use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::{Arc, Barrier};
use std::thread;
use threadward::{forward_synchronized, Lock, Synchronized};

/// A plain, single-threaded key/value cache.
pub trait Cache {
    fn insert(&self, key: u32, value: String) -> Option<String>;
    fn get(&self, key: u32) -> Option<String>;
    fn len(&self) -> usize;
    fn clear(&mut self);
}

#[derive(Default)]
struct LocalCache(RefCell<HashMap<u32, String>>);

impl Cache for LocalCache {
    fn insert(&self, key: u32, value: String) -> Option<String> {
        self.0.borrow_mut().insert(key, value)
    }

    fn get(&self, key: u32) -> Option<String> {
        self.0.borrow().get(&key).cloned()
    }

    fn len(&self) -> usize {
        self.0.borrow().len()
    }

    fn clear(&mut self) {
        self.0.get_mut().clear();
    }
}

forward_synchronized! {
    impl Cache {
        fn insert(&self, key: u32, value: String) -> Option<String>;
        fn get(&self, key: u32) -> Option<String>;
        fn len(&self) -> usize;
        fn clear(&mut self);
    }
}

fn fill(cache: &(impl Cache + Sync), base: u32) {
    for i in 0..100 {
        cache.insert(base + i, format!("v{}", base + i));
    }
}

#[test]
fn test_forwarded_cache_from_many_threads() {
    let mut cache = Synchronized::new(LocalCache::default());
    thread::scope(|s| {
        for t in 0..8 {
            let cache = &cache;
            s.spawn(move || fill(cache, t * 100));
        }
    });
    assert_eq!(cache.len(), 800);
    assert_eq!(cache.get(742).as_deref(), Some("v742"));
    cache.clear();
    assert_eq!(cache.len(), 0);
}

#[test]
fn test_results_and_panics_pass_through() {
    let cache = Synchronized::new(LocalCache::default());
    assert_eq!(cache.insert(1, "a".into()), None);
    assert_eq!(cache.insert(1, "b".into()), Some("a".into()));

    let panicked = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        cache.call(|_| panic!("inside"));
    }));
    assert!(panicked.is_err());
    assert_eq!(cache.get(1).as_deref(), Some("b"));
}

#[test]
fn test_multi_step_sequence_is_atomic() {
    let cache = Synchronized::new(LocalCache::default());
    let barrier = Barrier::new(4);
    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                barrier.wait();
                for _ in 0..50 {
                    // Read-then-write as one unit.
                    let guard = cache.lock_target();
                    let next = guard.len() as u32;
                    guard.insert(next, String::new());
                }
            });
        }
    });
    assert_eq!(cache.len(), 200);
}

#[test]
fn test_external_lock_shared_by_two_objects() {
    let lock = Arc::new(Lock::new());
    let left = Synchronized::with_lock(LocalCache::default(), Arc::clone(&lock));
    let right = Synchronized::with_lock(LocalCache::default(), Arc::clone(&lock));
    assert!(left.shares_lock_with(&right));

    let held = lock.lock();
    thread::scope(|s| {
        let pending = s.spawn(|| right.insert(1, "r".into()));
        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!pending.is_finished());
        drop(held);
        assert_eq!(pending.join().unwrap(), None);
    });
    assert_eq!(left.len(), 0);
    assert_eq!(right.len(), 1);
}
