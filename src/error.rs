use thiserror::Error;

/// Errors that can happen when calling [LockPool::try_lock](crate::LockPool::try_lock).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TryLockError {
    /// The lock could not be acquired at this time because the operation would otherwise block
    #[error("The lock could not be acquired at this time because the operation would otherwise block")]
    WouldBlock,
}

/// Errors that can happen when calling [LockPool::unlock](crate::LockPool::unlock).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UnlockError {
    /// There is a lock for this key in the pool but nobody is holding it.
    /// Releasing it would corrupt the bookkeeping of the lock, so the call was refused.
    #[error("Tried to unlock a key that isn't currently locked")]
    NotLocked,
}

/// Errors that can happen when building a [LockPool](crate::LockPool) from a [LockPoolConfig](crate::LockPoolConfig).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// The idle reaper would spin without ever sleeping
    #[error("The clean interval must be greater than zero")]
    ZeroCleanInterval,
}
