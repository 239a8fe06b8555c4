//! Redis backend of the counter store.
//!
//! Locks rely on `SET .. PX .. NX`, counters on a `MULTI`/`EXEC` pair of
//! `INCR` and `EXPIRE`. Every failed round trip is tagged `StoreUnavailable`.

use std::time::Duration;

use failure::Fail;
use redis::{cmd, pipe, Connection, Value};

use super::{CounterStore, StoreResult};
use errors::Error;

static LOCK_SENTINEL: &'static str = "1";

fn millis(ttl: Duration) -> u64 {
    ttl.as_secs() * 1000 + u64::from(ttl.subsec_millis())
}

impl CounterStore for Connection {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        cmd("GET")
            .arg(key)
            .query(self)
            .map_err(|e| e.context(Error::StoreUnavailable).into())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        cmd("SET")
            .arg(key)
            .arg(value)
            .query(self)
            .map_err(|e| e.context(Error::StoreUnavailable).into())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        cmd("DEL")
            .arg(key)
            .query(self)
            .map_err(|e| e.context(Error::StoreUnavailable).into())
    }

    fn try_acquire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let reply = cmd("SET")
            .arg(key)
            .arg(LOCK_SENTINEL)
            .arg("PX")
            .arg(millis(ttl))
            .arg("NX")
            .query::<Value>(self)
            .map_err(|e| -> ::failure::Error { e.context(Error::StoreUnavailable).into() })?;

        Ok(reply != Value::Nil)
    }

    fn increment_and_expire(&self, key: &str, ttl: Duration) -> StoreResult<i64> {
        let (value,): (i64,) = pipe()
            .atomic()
            .cmd("INCR")
            .arg(key)
            .cmd("EXPIRE")
            .arg(key)
            .arg(ttl.as_secs())
            .ignore()
            .query(self)
            .map_err(|e| -> ::failure::Error { e.context(Error::StoreUnavailable).into() })?;

        Ok(value)
    }
}
