use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use super::LockPool;
use crate::entity::LockEntity;
use crate::guard::Guard;

// Gives the count back if a pending `lock_async` future is dropped before it got the lock.
struct PendingLock {
    entity: Option<Arc<LockEntity>>,
}

impl PendingLock {
    fn acquired(mut self) -> Arc<LockEntity> {
        self.entity
            .take()
            .expect("The entity is only taken once, when the lock was acquired")
    }
}

impl Drop for PendingLock {
    fn drop(&mut self) {
        if let Some(entity) = self.entity.take() {
            entity.leave();
        }
    }
}

impl<K> LockPool<K>
where
    K: Eq + PartialEq + Hash + Clone + Debug + Send + Sync + 'static,
{
    /// Lock a lock by key from `async` code.
    ///
    /// This is the asynchronous version of [LockPool::lock]. Instead of blocking the thread, it
    /// suspends the task until the lock is available. Async and blocking callers of the same key
    /// exclude each other.
    ///
    /// The returned guard can be held across `await` points. Dropping the future before it
    /// completes is safe, the pool then treats the caller as gone.
    ///
    /// This function is only available if the `tokio` crate feature is enabled.
    ///
    /// Examples
    /// -----
    /// ```
    /// use ttl_lockpool::LockPool;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let pool = LockPool::default();
    /// let guard = pool.lock_async(4).await;
    /// tokio::task::yield_now().await;
    /// std::mem::drop(guard);
    /// # }
    /// ```
    pub async fn lock_async(&self, key: K) -> Guard<K> {
        let pending = PendingLock {
            entity: Some(self.shared._enter_entity_for_key(&key)),
        };
        if let Some(entity) = &pending.entity {
            entity.lock_entered_async().await;
        }
        Guard::new(key, pending.acquired())
    }
}
