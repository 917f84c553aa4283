use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::thread;
use threadward::safer::{ClassBuilder, Monitor, Synchronizable};
use threadward::{Lock, Synchronized, ThreadScopedStore};

const THREADS: usize = 4;
const ITEMS: usize = 1000;

fn bench_locks(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended_lock");

    group.bench_function("std_mutex", |b| {
        let m = Mutex::new(0_u64);
        b.iter(|| {
            *m.lock().unwrap() += 1;
        });
    });

    group.bench_function("lock", |b| {
        let lock = Lock::new();
        let n = Cell::new(0_u64);
        b.iter(|| lock.with(|| n.set(n.get() + 1)));
        black_box(n.get());
    });

    group.bench_function("synchronized_call", |b| {
        let proxy = Synchronized::new(Cell::new(0_u64));
        b.iter(|| proxy.call(|n| n.set(n.get() + 1)));
    });

    group.finish();
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_increment");

    group.bench_function("std_mutex", |b| {
        b.iter(|| {
            let m = Mutex::new(0_usize);
            thread::scope(|s| {
                for _ in 0..THREADS {
                    s.spawn(|| {
                        for _ in 0..ITEMS {
                            *m.lock().unwrap() += 1;
                        }
                    });
                }
            });
            black_box(m.into_inner().unwrap());
        });
    });

    group.bench_function("synchronized", |b| {
        b.iter(|| {
            let proxy = Synchronized::new(Cell::new(0_usize));
            thread::scope(|s| {
                for _ in 0..THREADS {
                    s.spawn(|| {
                        for _ in 0..ITEMS {
                            proxy.call(|n| n.set(n.get() + 1));
                        }
                    });
                }
            });
            black_box(proxy.into_inner().get());
        });
    });

    group.finish();
}

#[derive(Default)]
struct Counter {
    n: AtomicU64,
    monitor: Monitor,
}

impl Synchronizable for Counter {
    fn monitor(&self) -> &Monitor {
        &self.monitor
    }
}

fn bench_methods(c: &mut Criterion) {
    let mut group = c.benchmark_group("method_call");
    let class = ClassBuilder::<Counter>::new("Counter")
        .define("plain", |c: &Counter, _, by: u64| c.n.fetch_add(by, Ordering::Relaxed))
        .define("guarded", |c: &Counter, _, by: u64| c.n.fetch_add(by, Ordering::Relaxed))
        .make_thread_safe(["guarded"])
        .build()
        .unwrap();
    let counter = Counter::default();

    for name in ["plain", "guarded"] {
        let method = class.method::<u64, u64>(name).unwrap();
        group.bench_function(format!("{name}_handle"), |b| {
            b.iter(|| method.call(&counter, black_box(1)));
        });
        group.bench_function(format!("{name}_invoke"), |b| {
            b.iter(|| class.invoke::<u64, u64>(&counter, name, black_box(1)).unwrap());
        });
    }

    group.finish();
}

fn bench_thread_locals(c: &mut Criterion) {
    let mut group = c.benchmark_group("thread_scoped_store");
    let store = ThreadScopedStore::new();
    store.set("hit", 1_u64);

    group.bench_function("get_hit", |b| {
        b.iter(|| black_box(store.get::<u64>(black_box("hit"))));
    });
    group.bench_function("get_miss", |b| {
        b.iter(|| black_box(store.get::<u64>(black_box("miss"))));
    });
    group.bench_function("set_existing", |b| {
        let mut i = 0_u64;
        b.iter(|| {
            i += 1;
            store.set("hit", i);
        });
    });
    group.bench_function("first_write_per_host", |b| {
        b.iter(|| {
            let fresh = ThreadScopedStore::new();
            fresh.set("k", 1_u8);
            black_box(fresh.thread_count())
        });
    });
    group.bench_function("first_write_many_live_hosts", |b| {
        b.iter(|| {
            let hosts: Vec<_> = (0..ITEMS * 10).map(|_| ThreadScopedStore::new()).collect();
            for host in &hosts {
                host.set("k", 1_u8);
            }
            black_box(hosts.len())
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_locks,
    bench_contended,
    bench_methods,
    bench_thread_locals
);
criterion_main!(benches);
