use repos::coupon_locks::{CouponLocksRepo, CouponLocksRepoImpl};
use repos::coupons::{CouponsRepo, CouponsRepoImpl};
use store::CounterStore;

/// Creates the repos of one request over a borrowed store connection.
pub trait ReposFactory<C: CounterStore + 'static>: Clone + Send + 'static {
    fn create_coupons_repo<'a>(&self, store_conn: &'a C) -> Box<CouponsRepo + 'a>;
    fn create_coupon_locks_repo<'a>(&self, store_conn: &'a C) -> Box<CouponLocksRepo + 'a>;
}

#[derive(Default, Copy, Clone)]
pub struct ReposFactoryImpl;

impl<C: CounterStore + 'static> ReposFactory<C> for ReposFactoryImpl {
    fn create_coupons_repo<'a>(&self, store_conn: &'a C) -> Box<CouponsRepo + 'a> {
        Box::new(CouponsRepoImpl::new(store_conn)) as Box<CouponsRepo>
    }

    fn create_coupon_locks_repo<'a>(&self, store_conn: &'a C) -> Box<CouponLocksRepo + 'a> {
        Box::new(CouponLocksRepoImpl::new(store_conn)) as Box<CouponLocksRepo>
    }
}

#[cfg(test)]
pub mod tests {
    use std::sync::Arc;

    use futures_cpupool::CpuPool;
    use r2d2;

    use config::{Config, Redemption, Server};
    use models::UserId;
    use repos::repo_factory::ReposFactoryImpl;
    use services::{DynamicContext, Service, StaticContext};
    use store::MemoryConnectionManager;

    pub const MOCK_COUPON_CODE: &'static str = "SAVE10";
    pub const MOCK_USER_ID: &'static str = "user-1";

    pub fn create_service(user_id: Option<UserId>) -> Service<MemoryConnectionManager, ReposFactoryImpl> {
        create_service_with_manager(MemoryConnectionManager::new(), user_id)
    }

    /// Keeps the manager at the caller when the test wants to inspect the
    /// key space through a connection of its own.
    pub fn create_service_with_manager(
        manager: MemoryConnectionManager,
        user_id: Option<UserId>,
    ) -> Service<MemoryConnectionManager, ReposFactoryImpl> {
        let store_pool = r2d2::Pool::builder()
            .build(manager)
            .expect("Failed to create store connection pool");
        let cpu_pool = CpuPool::new(1);

        let config = Config {
            server: Server {
                redis: "redis://127.0.0.1/".to_string(),
                thread_count: 1,
            },
            redemption: Redemption { lock_ttl_ms: 5000 },
        };

        let static_context = StaticContext::new(store_pool, cpu_pool, Arc::new(config), ReposFactoryImpl::default());
        let dynamic_context = DynamicContext::new(user_id);

        Service::new(static_context, dynamic_context)
    }
}
