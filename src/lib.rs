//! Coupons is a microservice core responsible for issuing and redeeming promotional
//! coupons whose usage is bounded by consumption counters.
//! The layered structure of the app is
//!
//! `Service -> Repo + CounterStore`
//!
//! Each layer can throw Error with context or cover occurred error with
//! Error in the context. Business-rule failures carry a kind from `errors::Error`
//! somewhere in the failure chain so that the calling shell can map them.

extern crate chrono;
extern crate config as config_crate;
#[macro_use]
extern crate failure;
extern crate futures;
extern crate futures_cpupool;
#[macro_use]
extern crate log;
extern crate r2d2;
extern crate r2d2_redis;
extern crate redis;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate serde_json;
#[cfg(test)]
extern crate tokio_core;
extern crate validator;
#[macro_use]
extern crate validator_derive;

pub mod config;
pub mod errors;
pub mod models;
pub mod repos;
pub mod services;
pub mod store;

use std::sync::Arc;

use futures_cpupool::CpuPool;
use r2d2_redis::RedisConnectionManager;

use config::Config;
use repos::repo_factory::ReposFactoryImpl;
use services::StaticContext;

/// Prepares the static context shared by all request services, backed by the
/// Redis counter store from provided `Config`.
pub fn create_static_context(config: Config) -> StaticContext<RedisConnectionManager, ReposFactoryImpl> {
    let redis_url: String = config.server.redis.parse().expect("Redis URL must be set in configuration");
    let redis_manager = RedisConnectionManager::new(redis_url.as_ref()).expect("Failed to create Redis connection manager");
    let store_pool = r2d2::Pool::builder()
        .build(redis_manager)
        .expect("Failed to create Redis connection pool");

    let cpu_pool = CpuPool::new(config.server.thread_count);

    StaticContext::new(store_pool, cpu_pool, Arc::new(config), ReposFactoryImpl::default())
}
