use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::Arc;

use crate::entity::LockEntity;

/// A RAII implementation of a scoped lock for locks from a [LockPool](crate::LockPool). When this instance is dropped (falls out of scope), the lock will be unlocked.
///
/// The guard owns a reference to the lock it holds, so it is `'static` and can be moved to other threads.
#[must_use = "if unused the lock will immediately unlock"]
pub struct Guard<K>
where
    K: Eq + PartialEq + Hash + Clone + Debug,
{
    key: K,
    entity: Option<Arc<LockEntity>>,
}

impl<K> Guard<K>
where
    K: Eq + PartialEq + Hash + Clone + Debug,
{
    pub(crate) fn new(key: K, entity: Arc<LockEntity>) -> Self {
        Self {
            key,
            entity: Some(entity),
        }
    }

    /// The key this guard holds the lock for
    #[inline]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Release the lock now. This is the same as dropping the guard.
    #[inline]
    pub fn unlock(self) {}

    /// Consume the guard without releasing the lock.
    ///
    /// The lock stays held until somebody calls [LockPool::unlock](crate::LockPool::unlock) with the returned key.
    /// Until then, the pool will not remove it, and every other attempt to lock the key will wait.
    pub fn detach(mut self) -> K {
        self.entity = None;
        self.key.clone()
    }
}

impl<K> Drop for Guard<K>
where
    K: Eq + PartialEq + Hash + Clone + Debug,
{
    fn drop(&mut self) {
        if let Some(entity) = self.entity.take() {
            if !entity.release() {
                tracing::warn!(key = ?self.key, "lock was already released through LockPool::unlock while its guard was alive");
            }
        }
    }
}

impl<K> Debug for Guard<K>
where
    K: Eq + PartialEq + Hash + Clone + Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Guard({:?})", self.key)
    }
}
