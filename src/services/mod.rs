//! Services is a core layer for the app business logic: eligibility checks,
//! the redemption critical section and coupon administration.

pub mod coupons;
pub mod types;

pub use self::coupons::*;
pub use self::types::*;

use std::sync::Arc;

use failure::{Error as FailureError, Fail};
use futures_cpupool::CpuPool;
use r2d2::{ManageConnection, Pool, PooledConnection};

use config::Config;
use errors::Error;
use models::UserId;
use repos::repo_factory::ReposFactory;
use store::CounterStore;

/// Static context for services, shared between requests
pub struct StaticContext<M, F>
where
    M: ManageConnection,
    M::Connection: CounterStore,
    F: ReposFactory<M::Connection>,
{
    pub store_pool: Pool<M>,
    pub cpu_pool: CpuPool,
    pub config: Arc<Config>,
    pub repo_factory: F,
}

impl<M, F> StaticContext<M, F>
where
    M: ManageConnection,
    M::Connection: CounterStore,
    F: ReposFactory<M::Connection>,
{
    pub fn new(store_pool: Pool<M>, cpu_pool: CpuPool, config: Arc<Config>, repo_factory: F) -> Self {
        Self {
            store_pool,
            cpu_pool,
            config,
            repo_factory,
        }
    }
}

impl<M, F> Clone for StaticContext<M, F>
where
    M: ManageConnection,
    M::Connection: CounterStore,
    F: ReposFactory<M::Connection>,
{
    fn clone(&self) -> Self {
        Self {
            store_pool: self.store_pool.clone(),
            cpu_pool: self.cpu_pool.clone(),
            config: self.config.clone(),
            repo_factory: self.repo_factory.clone(),
        }
    }
}

/// Dynamic context for services, bound to a single request
#[derive(Clone, Debug, Default)]
pub struct DynamicContext {
    pub user_id: Option<UserId>,
}

impl DynamicContext {
    pub fn new(user_id: Option<UserId>) -> Self {
        Self { user_id }
    }
}

pub struct Service<M, F>
where
    M: ManageConnection,
    M::Connection: CounterStore,
    F: ReposFactory<M::Connection>,
{
    pub static_context: StaticContext<M, F>,
    pub dynamic_context: DynamicContext,
}

impl<M, F> Service<M, F>
where
    M: ManageConnection,
    M::Connection: CounterStore,
    F: ReposFactory<M::Connection>,
{
    /// Create service
    pub fn new(static_context: StaticContext<M, F>, dynamic_context: DynamicContext) -> Self {
        Self {
            static_context,
            dynamic_context,
        }
    }

    /// Spawns a blocking store interaction on the CPU pool.
    pub fn spawn_on_pool<T, Func>(&self, f: Func) -> types::ServiceFuture<T>
    where
        T: Send + 'static,
        Func: FnOnce(PooledConnection<M>) -> Result<T, FailureError> + Send + 'static,
    {
        let store_pool = self.static_context.store_pool.clone();
        let cpu_pool = self.static_context.cpu_pool.clone();

        Box::new(cpu_pool.spawn_fn(move || {
            store_pool
                .get()
                .map_err(|e| e.context(Error::StoreUnavailable).into())
                .and_then(f)
        }))
    }
}
