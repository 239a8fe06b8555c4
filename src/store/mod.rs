//! Counter store is the key-value collaborator all coordination is expressed
//! through: coupon records, expiring per user counters and redemption locks.

pub mod memory;
pub mod redis;

use std::time::Duration;

use failure::Error as FailureError;

pub use self::memory::{MemoryConnection, MemoryConnectionManager};

pub type StoreResult<T> = Result<T, FailureError>;

/// Contract the redemption core requires from the key-value store. Absence
/// of a key is a normal result for `get` and `delete`, not a failure.
pub trait CounterStore: Send + 'static {
    /// Returns the raw value stored under `key`.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Unconditionally overwrites `key` with `value`.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Removes `key`; a no-op when it does not exist.
    fn delete(&self, key: &str) -> StoreResult<()>;

    /// Atomically sets `key` only if it is absent, expiring after `ttl`.
    /// Returns whether the key was set.
    fn try_acquire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Atomically increments the integer under `key` (creating it at zero)
    /// and resets its expiry to `ttl` in one transaction. Returns the new
    /// value.
    fn increment_and_expire(&self, key: &str, ttl: Duration) -> StoreResult<i64>;
}
