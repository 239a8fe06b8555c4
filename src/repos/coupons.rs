//! Coupons repo, responsible for handling coupon records and the expiring
//! per user counters that back daily and weekly policies.

use std::time::Duration;

use failure::{Error as FailureError, Fail};
use serde_json;

use errors::Error;
use models::{Coupon, CouponCode, RepeatCountType, UserId};
use repos::types::RepoResult;
use store::CounterStore;

/// Coupons repository, owns (de)serialization of the stored records
pub struct CouponsRepoImpl<'a, T: CounterStore + 'static> {
    pub store_conn: &'a T,
}

pub trait CouponsRepo {
    /// Returns coupon by code
    fn find_by_code(&self, code: CouponCode) -> RepoResult<Option<Coupon>>;

    /// Serializes and overwrites the record keyed by the coupon code
    fn save(&self, coupon: &Coupon) -> RepoResult<()>;

    /// Removes the record, a no-op if absent
    fn delete(&self, code: CouponCode) -> RepoResult<()>;

    /// Bumps the expiring per user counter and resets its window to `ttl`
    fn increment_user_count(
        &self,
        code: CouponCode,
        user_id: UserId,
        count_type: RepeatCountType,
        ttl: Duration,
    ) -> RepoResult<i64>;

    /// Reads the expiring per user counter, zero when absent or lapsed
    fn get_user_count(&self, code: CouponCode, user_id: UserId, count_type: RepeatCountType) -> RepoResult<u32>;
}

pub fn coupon_key(code: &CouponCode) -> String {
    format!("coupon:{}", code)
}

pub fn user_count_key(code: &CouponCode, user_id: &UserId, count_type: RepeatCountType) -> String {
    format!("coupon:{}:{}:{}", code, user_id, count_type)
}

impl<'a, T: CounterStore + 'static> CouponsRepoImpl<'a, T> {
    pub fn new(store_conn: &'a T) -> Self {
        Self { store_conn }
    }
}

impl<'a, T: CounterStore + 'static> CouponsRepo for CouponsRepoImpl<'a, T> {
    /// Returns coupon by code
    fn find_by_code(&self, code: CouponCode) -> RepoResult<Option<Coupon>> {
        debug!("Find coupon with code {}.", code);
        self.store_conn
            .get(&coupon_key(&code))
            .and_then(|value| match value {
                Some(raw) => serde_json::from_str(&raw)
                    .map(Some)
                    .map_err(|e| e.context(Error::Parse).into()),
                None => Ok(None),
            })
            .map_err(|e: FailureError| e.context(format!("Find coupon by code: {} error occurred", code)).into())
    }

    /// Serializes and overwrites the record keyed by the coupon code
    fn save(&self, coupon: &Coupon) -> RepoResult<()> {
        debug!("Save coupon with code {}.", coupon.code);
        serde_json::to_string(coupon)
            .map_err(|e| e.context(Error::Parse).into())
            .and_then(|raw| self.store_conn.set(&coupon_key(&coupon.code), &raw))
            .map_err(|e: FailureError| e.context(format!("Save coupon: {} error occurred", coupon.code)).into())
    }

    /// Removes the record, a no-op if absent
    fn delete(&self, code: CouponCode) -> RepoResult<()> {
        debug!("Delete coupon with code {}.", code);
        self.store_conn
            .delete(&coupon_key(&code))
            .map_err(|e: FailureError| e.context(format!("Delete coupon: {} error occurred", code)).into())
    }

    /// Bumps the expiring per user counter and resets its window to `ttl`
    fn increment_user_count(
        &self,
        code: CouponCode,
        user_id: UserId,
        count_type: RepeatCountType,
        ttl: Duration,
    ) -> RepoResult<i64> {
        debug!("Increment {} counter for coupon {} and user {}.", count_type, code, user_id);
        self.store_conn
            .increment_and_expire(&user_count_key(&code, &user_id, count_type), ttl)
            .map_err(|e: FailureError| {
                e.context(format!(
                    "Increment {} counter for coupon {} and user {} error occurred",
                    count_type, code, user_id
                )).into()
            })
    }

    /// Reads the expiring per user counter, zero when absent or lapsed
    fn get_user_count(&self, code: CouponCode, user_id: UserId, count_type: RepeatCountType) -> RepoResult<u32> {
        debug!("Get {} counter for coupon {} and user {}.", count_type, code, user_id);
        self.store_conn
            .get(&user_count_key(&code, &user_id, count_type))
            .and_then(|value| match value {
                Some(raw) => raw.parse::<u32>().map_err(|e| e.context(Error::Parse).into()),
                None => Ok(0),
            })
            .map_err(|e: FailureError| {
                e.context(format!(
                    "Get {} counter for coupon {} and user {} error occurred",
                    count_type, code, user_id
                )).into()
            })
    }
}
