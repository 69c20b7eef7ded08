//! This library offers a pool of locks where individual locks can be locked/unlocked by key.
//! It initially considers all keys as "unlocked", but they can be locked
//! and if a second thread tries to acquire a lock for the same key, they will have to wait.
//! Threads locking different keys never wait for each other.
//!
//! ```
//! use std::time::Duration;
//! use ttl_lockpool::LockPool;
//!
//! let pool = LockPool::new(Duration::from_secs(5), Duration::from_secs(1));
//! let guard1 = pool.lock(4);
//! let guard2 = pool.lock(5);
//!
//! // This next line would cause a deadlock because `4` is already locked on this thread
//! // let guard3 = pool.lock(4);
//!
//! // After dropping the corresponding guard, we can lock it again
//! std::mem::drop(guard1);
//! let guard3 = pool.lock(4);
//! ```
//!
//! The pool doesn't grow without bounds. A background reaper thread wakes up every `clean_interval`
//! and removes the locks that nobody holds or waits for and that were last released more than
//! `ttl` ago. The reaper starts with the pool and can be paused with [LockPool::stop] and resumed
//! with [LockPool::start].
//!
//! ```
//! use std::time::Duration;
//! use ttl_lockpool::LockPool;
//!
//! let pool = LockPool::new(Duration::from_millis(10), Duration::from_millis(10));
//! {
//!     let _guard = pool.lock("user-42");
//! }
//! assert_eq!(1, pool.len());
//!
//! std::thread::sleep(Duration::from_millis(200));
//! assert_eq!(0, pool.len());
//! ```
//!
//! You can use an arbitrary type to index locks by, as long as that type implements [PartialEq] + [Eq] + [Hash](std::hash::Hash) + [Clone] + [Debug](std::fmt::Debug)
//! and can be sent to the reaper thread.
//!
//! The reaper reports what it does through [tracing] events: a redundant start, its
//! cancellation, and the number of locks removed by a scan. Install a subscriber to see them.
//!
//! If the `tokio` feature is enabled, then [LockPool] also offers `lock_async`, which waits for a lock without blocking the thread.

#![deny(missing_docs)]

mod config;
mod entity;
mod error;
mod guard;
mod pool;

pub use config::{LockPoolConfig, DEFAULT_CLEAN_INTERVAL, DEFAULT_TTL};
pub use error::{ConfigError, TryLockError, UnlockError};
pub use guard::Guard;
pub use pool::LockPool;
