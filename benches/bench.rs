use criterion::{black_box, criterion_group, criterion_main, Criterion};
use crossbeam_utils::thread;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use ttl_lockpool::LockPool;

const TTL: Duration = Duration::from_secs(60);
const CLEAN_INTERVAL: Duration = Duration::from_secs(1);

pub fn single_thread_lock_unlock(c: &mut Criterion) {
    let mut g = c.benchmark_group("single thread lock unlock");
    g.bench_function("std Mutex", |b| {
        let mutex = Mutex::new(());
        b.iter(|| {
            let _g = mutex.lock().unwrap();
        })
    });
    g.bench_function("LockPool (same key)", |b| {
        let pool = LockPool::new(TTL, CLEAN_INTERVAL);
        b.iter(|| {
            let _g = pool.lock(black_box(3));
        })
    });
    g.bench_function("LockPool (different key)", |b| {
        let pool = LockPool::new(TTL, CLEAN_INTERVAL);
        let mut i: usize = 0;
        b.iter(|| {
            i += 1;
            let _g = pool.lock(black_box(i));
        })
    });
    g.bench_function("LockPool (different key, reaping)", |b| {
        // Every lock is idle right after its release, so the reaper keeps shrinking the pool
        let pool = LockPool::new(Duration::ZERO, Duration::from_millis(1));
        let mut i: usize = 0;
        b.iter(|| {
            i += 1;
            let _g = pool.lock(black_box(i));
        })
    });
    g.finish();
}

fn spawn_threads(num: usize, func: impl Fn(usize) + Send + Sync) {
    thread::scope(|s| {
        for thread_index in 0..num {
            let func = &func;
            s.spawn(move |_| func(thread_index));
        }
    })
    .unwrap();
}

pub fn multi_thread_lock_unlock(c: &mut Criterion) {
    const NUM_THREADS: usize = 500;
    const NUM_LOCKS_PER_THREAD: usize = 1000;

    let mut g = c.benchmark_group("multi thread lock unlock");
    g.bench_function("std Mutex", |b| {
        let mutex = Arc::new(Mutex::new(()));
        b.iter(move || {
            spawn_threads(NUM_THREADS, |_| {
                for _ in 0..NUM_LOCKS_PER_THREAD {
                    let _g = mutex.lock().unwrap();
                }
            });
        })
    });
    g.bench_function("LockPool (same key)", |b| {
        let pool = LockPool::new(TTL, CLEAN_INTERVAL);
        b.iter(|| {
            spawn_threads(NUM_THREADS, |_| {
                for _ in 0..NUM_LOCKS_PER_THREAD {
                    let _g = pool.lock(black_box(3));
                }
            });
        })
    });
    g.bench_function("LockPool (different key)", |b| {
        let pool = LockPool::new(TTL, CLEAN_INTERVAL);
        b.iter(|| {
            spawn_threads(NUM_THREADS, |thread_index| {
                for _ in 0..NUM_LOCKS_PER_THREAD {
                    let _g = pool.lock(black_box(thread_index));
                }
            });
        })
    });
    g.finish();
}

criterion_group!(benches, single_thread_lock_unlock, multi_thread_lock_unlock,);
criterion_main!(benches);
