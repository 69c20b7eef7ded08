use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

struct State {
    held: bool,
    // None until the first release. An entity that was never released is never reapable.
    last_release: Option<Instant>,
}

/// The lock behind a single key of a [LockPool](crate::LockPool).
///
/// Besides the exclusive lock itself, it counts the callers that are either holding it or
/// waiting for it. That count is raised before a caller starts waiting and lowered only
/// after the lock was released, so the reaper never sees zero while anybody still needs
/// the entity.
pub(crate) struct LockEntity {
    state: Mutex<State>,
    available: Condvar,
    active: AtomicUsize,
    #[cfg(feature = "tokio")]
    available_async: tokio::sync::Notify,
}

impl LockEntity {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                held: false,
                last_release: None,
            }),
            available: Condvar::new(),
            active: AtomicUsize::new(0),
            #[cfg(feature = "tokio")]
            available_async: tokio::sync::Notify::new(),
        }
    }

    fn _state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .expect("The mutex protecting a lock entity is poisoned. This shouldn't happen since no user code runs while it is held")
    }

    /// Count and block until the lock is held by the caller.
    #[cfg(test)]
    pub fn acquire(&self) {
        self.enter();
        self.lock_entered();
    }

    /// Register the caller as a user of this entity. Must be followed by
    /// [LockEntity::lock_entered], [LockEntity::try_lock_entered] or [LockEntity::leave].
    #[inline]
    pub fn enter(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    /// Undo an [LockEntity::enter] for a caller that gave up without getting the lock.
    #[inline]
    pub fn leave(&self) {
        let previous = self.active.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "Left a lock entity that nobody entered");
    }

    pub fn lock_entered(&self) {
        let mut state = self._state();
        while state.held {
            state = self
                .available
                .wait(state)
                .expect("The mutex protecting a lock entity is poisoned. This shouldn't happen since no user code runs while it is held");
        }
        state.held = true;
    }

    pub fn try_lock_entered(&self) -> bool {
        let mut state = self._state();
        if state.held {
            false
        } else {
            state.held = true;
            true
        }
    }

    #[cfg(feature = "tokio")]
    pub async fn lock_entered_async(&self) {
        loop {
            // Register for a wakeup before checking so a release in between isn't missed
            let mut notified = std::pin::pin!(self.available_async.notified());
            notified.as_mut().enable();
            if self.try_lock_entered() {
                return;
            }
            notified.await;
        }
    }

    /// Record the release time, unlock and then drop the caller's count.
    ///
    /// Returns false without touching anything if the lock wasn't held.
    pub fn release(&self) -> bool {
        {
            let mut state = self._state();
            if !state.held {
                return false;
            }
            state.last_release = Some(Instant::now());
            state.held = false;
        }
        self.available.notify_one();
        #[cfg(feature = "tokio")]
        self.available_async.notify_one();
        self.leave();
        true
    }

    /// True iff nobody holds or waits for this entity and it was last released more than `ttl` ago.
    pub fn is_reapable(&self, ttl: Duration) -> bool {
        if self.active.load(Ordering::SeqCst) != 0 {
            return false;
        }
        let state = self._state();
        !state.held
            && state
                .last_release
                .map_or(false, |last_release| last_release.elapsed() > ttl)
    }

    #[cfg(test)]
    pub fn num_active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::LockEntity;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_new_entity_is_never_reapable() {
        let entity = LockEntity::new();
        assert_eq!(0, entity.num_active());
        assert!(!entity.is_reapable(Duration::ZERO));
    }

    #[test]
    fn test_acquire_release() {
        let entity = LockEntity::new();
        entity.acquire();
        assert_eq!(1, entity.num_active());
        assert!(!entity.is_reapable(Duration::ZERO));

        assert!(entity.release());
        assert_eq!(0, entity.num_active());
        thread::sleep(Duration::from_millis(5));
        assert!(entity.is_reapable(Duration::ZERO));
    }

    #[test]
    fn test_not_reapable_before_ttl() {
        let entity = LockEntity::new();
        entity.acquire();
        entity.release();
        assert!(!entity.is_reapable(Duration::from_secs(60)));
    }

    #[test]
    fn test_entered_but_not_locked_is_not_reapable() {
        let entity = LockEntity::new();
        entity.acquire();
        entity.release();
        thread::sleep(Duration::from_millis(5));

        entity.enter();
        assert!(!entity.is_reapable(Duration::ZERO));
        entity.leave();
        assert!(entity.is_reapable(Duration::ZERO));
    }

    #[test]
    fn test_release_without_acquire_is_refused() {
        let entity = LockEntity::new();
        assert!(!entity.release());
        assert_eq!(0, entity.num_active());

        entity.acquire();
        assert!(entity.release());
        assert!(!entity.release());
        assert_eq!(0, entity.num_active());
    }

    #[test]
    fn test_try_lock_entered() {
        let entity = LockEntity::new();
        entity.acquire();

        entity.enter();
        assert!(!entity.try_lock_entered());
        entity.leave();

        entity.release();
        entity.enter();
        assert!(entity.try_lock_entered());
        entity.release();
    }

    #[test]
    fn test_acquire_blocks_while_held() {
        let entity = Arc::new(LockEntity::new());
        entity.acquire();

        let counter = Arc::new(AtomicU32::new(0));
        let child = {
            let entity = Arc::clone(&entity);
            let counter = Arc::clone(&counter);
            thread::spawn(move || {
                entity.acquire();
                counter.fetch_add(1, Ordering::SeqCst);
                entity.release();
            })
        };

        // Check that even if we wait, the child thread won't get the lock
        thread::sleep(Duration::from_millis(100));
        assert_eq!(0, counter.load(Ordering::SeqCst));
        assert_eq!(2, entity.num_active());

        entity.release();
        child.join().unwrap();
        assert_eq!(1, counter.load(Ordering::SeqCst));
        assert_eq!(0, entity.num_active());
    }
}
