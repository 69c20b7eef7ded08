//! Like the `simple` demo, but pauses the idle reaper so the locks outlive their TTL,
//! then resumes it and watches them disappear.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;
use ttl_lockpool::LockPool;

fn increment_key(
    pool: &LockPool<&'static str>,
    db: &Mutex<HashMap<&'static str, u32>>,
    key: &'static str,
    id: usize,
) {
    let _guard = pool.lock(key);
    info!(id, key, "acquired lock");
    *db.lock().unwrap().entry(key).or_insert(0) += 1;
    thread::sleep(Duration::from_secs(3));
    info!(id, key, "releasing lock");
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let pool = Arc::new(LockPool::new(Duration::from_secs(5), Duration::from_secs(1)));
    let db = Arc::new(Mutex::new(HashMap::new()));

    let workers: Vec<_> = (1..5)
        .map(|id| (id, "key1"))
        .chain((10..15).map(|id| (id, "key2")))
        .map(|(id, key)| {
            let pool = Arc::clone(&pool);
            let db = Arc::clone(&db);
            thread::spawn(move || increment_key(&pool, &db, key, id))
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Already running, only logs
    pool.start();
    pool.stop();
    info!(len = pool.len(), "reaper stopped");

    thread::sleep(Duration::from_secs(10));
    info!(len = pool.len(), "locks are expired but nobody removed them");
    info!(db = ?db.lock().unwrap(), "final counters");

    pool.start();
    thread::sleep(Duration::from_secs(2));
    info!(len = pool.len(), "reaper restarted");
}
