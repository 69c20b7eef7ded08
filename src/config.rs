use std::time::Duration;

use crate::error::ConfigError;

/// Default time a lock has to be idle before the reaper removes it
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Default period between two scans of the idle reaper
pub const DEFAULT_CLEAN_INTERVAL: Duration = Duration::from_secs(1);

/// Settings for a [LockPool](crate::LockPool).
///
/// ```
/// use std::time::Duration;
/// use ttl_lockpool::{LockPool, LockPoolConfig};
///
/// let config = LockPoolConfig {
///     ttl: Duration::from_secs(5),
///     ..LockPoolConfig::default()
/// };
/// let pool = LockPool::<u32>::with_config(config).unwrap();
/// assert_eq!(Duration::from_secs(5), pool.ttl());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPoolConfig {
    /// A lock that nobody holds or waits for is removed once it has been idle for longer than this.
    pub ttl: Duration,

    /// How often the idle reaper wakes up to scan the pool.
    pub clean_interval: Duration,
}

impl LockPoolConfig {
    /// Create a config with the given time-to-live and reaper period
    #[inline]
    pub fn new(ttl: Duration, clean_interval: Duration) -> Self {
        Self {
            ttl,
            clean_interval,
        }
    }

    /// Check that a [LockPool](crate::LockPool) can be built from this config.
    ///
    /// Errors
    /// -----
    /// - Returns [ConfigError::ZeroCleanInterval] if `clean_interval` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clean_interval.is_zero() {
            return Err(ConfigError::ZeroCleanInterval);
        }
        Ok(())
    }
}

impl Default for LockPoolConfig {
    #[inline]
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CLEAN_INTERVAL)
    }
}
