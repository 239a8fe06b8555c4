//! In process backend of the counter store with real expiry semantics,
//! handed out through an `r2d2` manager the same way the Redis backend is.
//! Used by the test suites and by wiring that runs without a Redis server.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use r2d2;

use super::{CounterStore, StoreResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => deadline <= now,
            None => false,
        }
    }
}

/// Connection to a shared in memory key space.
#[derive(Clone)]
pub struct MemoryConnection {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        MemoryConnection {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Removes `key` if its expiry already passed, then hands the map to `f`.
    fn with_live_entries<T, F>(&self, key: &str, f: F) -> T
    where
        F: FnOnce(&mut HashMap<String, Entry>) -> T,
    {
        let mut entries = self.entries.lock().expect("Counter store mutex is poisoned");
        let expired = entries.get(key).map(|entry| entry.is_expired(Instant::now())).unwrap_or(false);
        if expired {
            entries.remove(key);
        }
        f(&mut *entries)
    }
}

impl CounterStore for MemoryConnection {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.with_live_entries(key, |entries| entries.get(key).map(|entry| entry.value.clone())))
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.with_live_entries(key, |entries| {
            entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    expires_at: None,
                },
            );
        });
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.with_live_entries(key, |entries| {
            entries.remove(key);
        });
        Ok(())
    }

    fn try_acquire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        Ok(self.with_live_entries(key, |entries| {
            if entries.contains_key(key) {
                false
            } else {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: "1".to_string(),
                        expires_at: Some(Instant::now() + ttl),
                    },
                );
                true
            }
        }))
    }

    fn increment_and_expire(&self, key: &str, ttl: Duration) -> StoreResult<i64> {
        self.with_live_entries(key, |entries| {
            let current = match entries.get(key) {
                Some(entry) => entry
                    .value
                    .parse::<i64>()
                    .map_err(|e| format_err!("Value under key {} is not an integer: {}", key, e))?,
                None => 0,
            };
            let next = current + 1;
            entries.insert(
                key.to_string(),
                Entry {
                    value: next.to_string(),
                    expires_at: Some(Instant::now() + ttl),
                },
            );
            Ok(next)
        })
    }
}

/// Hands out connections sharing one key space, mirroring how the pooled
/// Redis connections share one server.
pub struct MemoryConnectionManager {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryConnectionManager {
    pub fn new() -> Self {
        MemoryConnectionManager {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// A connection outside the pool, for inspecting the key space directly.
    pub fn connection(&self) -> MemoryConnection {
        MemoryConnection {
            entries: self.entries.clone(),
        }
    }
}

#[derive(Debug)]
pub struct MemoryStoreError;

impl fmt::Display for MemoryStoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "In memory store error")
    }
}

impl StdError for MemoryStoreError {
    fn description(&self) -> &str {
        "In memory store error"
    }
}

impl r2d2::ManageConnection for MemoryConnectionManager {
    type Connection = MemoryConnection;
    type Error = MemoryStoreError;

    fn connect(&self) -> Result<MemoryConnection, MemoryStoreError> {
        Ok(MemoryConnection {
            entries: self.entries.clone(),
        })
    }

    fn is_valid(&self, _conn: &mut MemoryConnection) -> Result<(), MemoryStoreError> {
        Ok(())
    }

    fn has_broken(&self, _conn: &mut MemoryConnection) -> bool {
        false
    }
}
