//! Repo for the ephemeral locks that serialize redemptions of one coupon by
//! one user. A lock is a conditional set with expiry: existence of the key
//! means a redemption for the pair is in flight. The hold time is a safety
//! bound, not a correctness guarantee; a redemption outliving it loses its
//! exclusivity.

use std::time::Duration;

use failure::Error as FailureError;

use models::{CouponCode, UserId};
use repos::types::RepoResult;
use store::CounterStore;

/// Coupon locks repository
pub struct CouponLocksRepoImpl<'a, T: CounterStore + 'static> {
    pub store_conn: &'a T,
}

pub trait CouponLocksRepo {
    /// Tries to take the redemption lock for the pair, telling whether it
    /// was taken. A refusal is immediate, there is no waiting or retrying.
    fn acquire(&self, code: CouponCode, user_id: UserId, ttl: Duration) -> RepoResult<bool>;

    /// Drops the redemption lock for the pair.
    fn release(&self, code: CouponCode, user_id: UserId) -> RepoResult<()>;
}

pub fn lock_key(code: &CouponCode, user_id: &UserId) -> String {
    format!("lock:{}:{}", code, user_id)
}

impl<'a, T: CounterStore + 'static> CouponLocksRepoImpl<'a, T> {
    pub fn new(store_conn: &'a T) -> Self {
        Self { store_conn }
    }
}

impl<'a, T: CounterStore + 'static> CouponLocksRepo for CouponLocksRepoImpl<'a, T> {
    fn acquire(&self, code: CouponCode, user_id: UserId, ttl: Duration) -> RepoResult<bool> {
        debug!("Acquire redemption lock for coupon {} and user {}.", code, user_id);
        self.store_conn
            .try_acquire(&lock_key(&code, &user_id), ttl)
            .map_err(|e: FailureError| {
                e.context(format!(
                    "Acquire redemption lock for coupon {} and user {} error occurred",
                    code, user_id
                )).into()
            })
    }

    fn release(&self, code: CouponCode, user_id: UserId) -> RepoResult<()> {
        debug!("Release redemption lock for coupon {} and user {}.", code, user_id);
        self.store_conn
            .delete(&lock_key(&code, &user_id))
            .map_err(|e: FailureError| {
                e.context(format!(
                    "Release redemption lock for coupon {} and user {} error occurred",
                    code, user_id
                )).into()
            })
    }
}
