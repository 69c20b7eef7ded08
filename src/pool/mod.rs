use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tracing::debug;

use crate::config::LockPoolConfig;
use crate::entity::LockEntity;
use crate::error::{ConfigError, TryLockError, UnlockError};
use crate::guard::Guard;
use reaper::Reaper;

/// State shared between the [LockPool] handle and its reaper thread.
struct Shared<K>
where
    K: Eq + PartialEq + Hash + Clone + Debug,
{
    entities: DashMap<K, Arc<LockEntity>>,
    // Kept in step with `entities`: raised under the same shard lock that inserts,
    // lowered under the same shard lock that removes.
    len: AtomicUsize,
    ttl_nanos: AtomicU64,
    // Held for a whole scan, so manual and background scans never overlap
    scan: Mutex<()>,
}

impl<K> Shared<K>
where
    K: Eq + PartialEq + Hash + Clone + Debug,
{
    fn ttl(&self) -> Duration {
        Duration::from_nanos(self.ttl_nanos.load(Ordering::SeqCst))
    }

    fn set_ttl(&self, ttl: Duration) {
        let nanos = u64::try_from(ttl.as_nanos()).unwrap_or(u64::MAX);
        self.ttl_nanos.store(nanos, Ordering::SeqCst);
    }

    /// Get or create the entity for `key` and count the caller as one of its users.
    ///
    /// Both happen while the map shard for `key` is locked. The reaper decides and removes under
    /// that same lock, so it either removed the entity before we came (and we create a fresh one)
    /// or it sees our count and leaves the entity alone.
    fn _enter_entity_for_key(&self, key: &K) -> Arc<LockEntity> {
        match self.entities.entry(key.clone()) {
            Entry::Occupied(entry) => {
                let entity = entry.get();
                entity.enter();
                Arc::clone(entity)
            }
            Entry::Vacant(entry) => {
                let entity = Arc::new(LockEntity::new());
                entity.enter();
                self.len.fetch_add(1, Ordering::SeqCst);
                entry.insert(Arc::clone(&entity));
                entity
            }
        }
    }

    fn reap_idle(&self) -> usize {
        let _scan = self
            .scan
            .lock()
            .expect("The scan lock of the lock pool is poisoned. A scan panicked while holding it");
        let ttl = self.ttl();
        let mut removed = 0;
        self.entities.retain(|key, entity| {
            if entity.is_reapable(ttl) {
                debug!(?key, "removing idle lock");
                self.len.fetch_sub(1, Ordering::SeqCst);
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }
}

/// A pool of locks where individual locks can be locked/unlocked by key.
/// It initially considers all keys as "unlocked", but they can be locked
/// and if a second thread tries to acquire a lock for the same key, they will have to wait.
///
/// The lock for a key is created the first time somebody locks that key. It stays in the pool
/// after being unlocked, and a background reaper thread removes it once nobody has held or waited
/// for it for longer than the configured time-to-live (TTL). The reaper is started when the pool
/// is created and can be paused and resumed with [LockPool::stop] and [LockPool::start].
///
/// ```
/// use std::time::Duration;
/// use ttl_lockpool::LockPool;
///
/// let pool = LockPool::new(Duration::from_secs(5), Duration::from_secs(1));
/// let guard1 = pool.lock(4);
/// let guard2 = pool.lock(5);
///
/// // This next line would deadlock because `4` is already locked on this thread
/// // let guard3 = pool.lock(4);
///
/// // After dropping the corresponding guard, we can lock it again
/// std::mem::drop(guard1);
/// let guard3 = pool.lock(4);
/// assert_eq!(2, pool.len());
/// ```
///
/// You can use an arbitrary type to index locks by, as long as that type implements [PartialEq] + [Eq] + [Hash] + [Clone] + [Debug]
/// and can be shared with the reaper thread.
///
/// ```
/// use ttl_lockpool::LockPool;
///
/// #[derive(PartialEq, Eq, Hash, Clone, Debug)]
/// struct CustomLockKey(u32);
///
/// let pool = LockPool::default();
/// let guard = pool.lock(CustomLockKey(4));
/// ```
///
/// Under the hood, a [LockPool] is a [DashMap] of per-key locks. Each of them counts the callers
/// holding or waiting for it, and only locks with a count of zero are ever removed.
pub struct LockPool<K>
where
    K: Eq + PartialEq + Hash + Clone + Debug + Send + Sync + 'static,
{
    shared: Arc<Shared<K>>,
    clean_interval: Duration,
    reaper: Reaper,
}

impl<K> LockPool<K>
where
    K: Eq + PartialEq + Hash + Clone + Debug + Send + Sync + 'static,
{
    /// Create a new lock pool where no lock is locked and start its idle reaper.
    ///
    /// Locks that nobody holds or waits for are removed once they have been idle for longer than `ttl`.
    /// The reaper checks for them every `clean_interval`.
    ///
    /// Panics
    /// -----
    /// If `clean_interval` is zero. A zero interval is rejected rather than read as "never clean",
    /// use [LockPool::stop] for a pool without a reaper. Use [LockPool::with_config] to get an
    /// error instead of a panic.
    pub fn new(ttl: Duration, clean_interval: Duration) -> Self {
        match Self::with_config(LockPoolConfig::new(ttl, clean_interval)) {
            Ok(pool) => pool,
            Err(err) => panic!("Invalid lock pool config: {}", err),
        }
    }

    /// Create a new lock pool from a [LockPoolConfig] and start its idle reaper.
    ///
    /// Errors
    /// -----
    /// - Returns [ConfigError::ZeroCleanInterval] if the config has a zero `clean_interval`
    pub fn with_config(config: LockPoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let shared = Arc::new(Shared {
            entities: DashMap::new(),
            len: AtomicUsize::new(0),
            ttl_nanos: AtomicU64::new(0),
            scan: Mutex::new(()),
        });
        shared.set_ttl(config.ttl);
        let pool = Self {
            shared,
            clean_interval: config.clean_interval,
            reaper: Reaper::new(),
        };
        pool.start();
        Ok(pool)
    }

    /// Return the number of locks currently in the pool, whether locked or idle.
    ///
    /// This is a snapshot. Concurrent calls to [LockPool::lock] and the reaper can change it right after.
    #[inline]
    pub fn len(&self) -> usize {
        self.shared.len.load(Ordering::SeqCst)
    }

    /// Return true if there are no locks in the pool
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return true if the pool currently has a lock for `key`, whether locked or idle
    pub fn contains_key(&self, key: &K) -> bool {
        self.shared.entities.contains_key(key)
    }

    /// The time-to-live currently used by the reaper
    #[inline]
    pub fn ttl(&self) -> Duration {
        self.shared.ttl()
    }

    /// Replace the time-to-live. The next scan of the reaper uses the new value.
    pub fn set_ttl(&self, ttl: Duration) {
        self.shared.set_ttl(ttl);
    }

    /// The period of the idle reaper
    #[inline]
    pub fn clean_interval(&self) -> Duration {
        self.clean_interval
    }

    /// Lock a lock by key.
    ///
    /// If the lock with this key is currently locked by a different thread, then the current thread blocks until it becomes available.
    /// Upon returning, the thread is the only thread with the lock held. A RAII guard is returned to allow scoped unlock
    /// of the lock. When the guard goes out of scope, the lock will be unlocked.
    ///
    /// Locking a key that is already locked by the current thread deadlocks.
    ///
    /// This blocks the thread, so don't call it from `async` code. With the `tokio` feature enabled,
    /// use `LockPool::lock_async` there.
    ///
    /// Examples
    /// -----
    /// ```
    /// use ttl_lockpool::LockPool;
    ///
    /// let pool = LockPool::default();
    /// let guard = pool.lock("user-42".to_string());
    /// // ... exclusive access to everything guarded by "user-42" ...
    /// std::mem::drop(guard);
    /// ```
    pub fn lock(&self, key: K) -> Guard<K> {
        let entity = self.shared._enter_entity_for_key(&key);
        // The map shard is unlocked again, other threads can use the map while we wait.
        entity.lock_entered();
        Guard::new(key, entity)
    }

    /// Attempts to acquire the lock with the given key.
    ///
    /// If the lock could not be acquired at this time, then [Err] is returned. Otherwise, a RAII guard is returned.
    /// The lock will be unlocked when the guard is dropped.
    ///
    /// This function does not block.
    ///
    /// Errors
    /// -----
    /// - If the lock could not be acquired because it is already locked, then this call will return [TryLockError::WouldBlock].
    ///
    /// Examples
    /// -----
    /// ```
    /// use ttl_lockpool::{LockPool, TryLockError};
    ///
    /// let pool = LockPool::default();
    /// let guard1 = pool.lock(4);
    /// assert_eq!(TryLockError::WouldBlock, pool.try_lock(4).unwrap_err());
    ///
    /// std::mem::drop(guard1);
    /// let guard2 = pool.try_lock(4).unwrap();
    /// ```
    pub fn try_lock(&self, key: K) -> Result<Guard<K>, TryLockError> {
        let entity = self.shared._enter_entity_for_key(&key);
        if entity.try_lock_entered() {
            Ok(Guard::new(key, entity))
        } else {
            entity.leave();
            Err(TryLockError::WouldBlock)
        }
    }

    /// Release the lock for `key` without going through its guard.
    ///
    /// This is meant for locks whose guard was given up with [Guard::detach]. Calling it for a lock
    /// whose guard is still alive releases the lock from under that guard, don't do that.
    ///
    /// If the pool has no lock for `key`, there is nothing to unlock and this returns `Ok(())`.
    ///
    /// Errors
    /// -----
    /// - Returns [UnlockError::NotLocked] if the pool has a lock for `key` but it isn't locked.
    ///
    /// Examples
    /// -----
    /// ```
    /// use ttl_lockpool::{LockPool, UnlockError};
    ///
    /// let pool = LockPool::default();
    /// let key = pool.lock(4).detach();
    /// assert!(pool.try_lock(4).is_err());
    ///
    /// pool.unlock(&key).unwrap();
    /// assert_eq!(UnlockError::NotLocked, pool.unlock(&key).unwrap_err());
    /// ```
    pub fn unlock(&self, key: &K) -> Result<(), UnlockError> {
        let Some(entity) = self
            .shared
            .entities
            .get(key)
            .map(|entry| Arc::clone(entry.value()))
        else {
            return Ok(());
        };
        if entity.release() {
            Ok(())
        } else {
            Err(UnlockError::NotLocked)
        }
    }

    /// Run one scan of the idle reaper on the current thread and return how many locks it removed.
    ///
    /// This works whether the background reaper is running or not.
    pub fn reap_idle(&self) -> usize {
        self.shared.reap_idle()
    }

    /// Start the idle reaper. Does nothing (except logging) if it is already running.
    pub fn start(&self) {
        let shared: Weak<Shared<K>> = Arc::downgrade(&self.shared);
        self.reaper.start(self.clean_interval, move || {
            shared.upgrade().map(|shared| shared.reap_idle())
        });
    }

    /// Stop the idle reaper. Locks stay in the pool until it is started again.
    ///
    /// This doesn't wait for the reaper thread to exit. A scan that is already in progress still finishes.
    pub fn stop(&self) {
        self.reaper.stop();
    }

    /// Return true if the idle reaper is running
    pub fn is_running(&self) -> bool {
        self.reaper.is_running()
    }
}

impl<K> Default for LockPool<K>
where
    K: Eq + PartialEq + Hash + Clone + Debug + Send + Sync + 'static,
{
    /// Create a lock pool with [LockPoolConfig::default] settings
    fn default() -> Self {
        match Self::with_config(LockPoolConfig::default()) {
            Ok(pool) => pool,
            Err(err) => panic!("Invalid default lock pool config: {}", err),
        }
    }
}

impl<K> Debug for LockPool<K>
where
    K: Eq + PartialEq + Hash + Clone + Debug + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockPool")
            .field("len", &self.len())
            .field("ttl", &self.ttl())
            .field("clean_interval", &self.clean_interval)
            .field("running", &self.is_running())
            .finish()
    }
}


#[cfg(feature = "tokio")]
mod pool_async;
mod reaper;
