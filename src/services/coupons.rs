//! Coupons Services, presents CRUD operations with coupons and the
//! concurrency safe redemption of their usage limits.

use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use failure::Error as FailureError;
use futures::future;
use r2d2::ManageConnection;
use validator::Validate;

use super::types::ServiceFuture;
use errors::Error;
use models::*;
use repos::{CouponsRepo, ReposFactory};
use services::Service;
use store::CounterStore;

/// Window of a `USER_DAILY` policy, in seconds.
const SECONDS_IN_DAY: u64 = 86_400;

pub trait CouponsService {
    /// Creates new coupon with an empty policy list
    fn create_coupon(&self, payload: NewCoupon) -> ServiceFuture<Coupon>;
    /// Replaces the repeat count policies of a coupon
    fn add_repeat_counts(&self, code: CouponCode, policies: Vec<RepeatCount>) -> ServiceFuture<Coupon>;
    /// Tells whether the coupon can currently be redeemed
    fn verify_coupon(&self, code: CouponCode) -> ServiceFuture<bool>;
    /// Redeems the coupon for the current user, bumping every usage counter
    fn apply_coupon(&self, code: CouponCode) -> ServiceFuture<Coupon>;
    /// Returns coupon by code
    fn get_coupon(&self, code: CouponCode) -> ServiceFuture<Option<Coupon>>;
    /// Deletes coupon, telling whether a record existed
    fn delete_coupon(&self, code: CouponCode) -> ServiceFuture<bool>;
}

impl<M, F> CouponsService for Service<M, F>
where
    M: ManageConnection,
    M::Connection: CounterStore,
    F: ReposFactory<M::Connection>,
{
    /// Creates new coupon with an empty policy list
    fn create_coupon(&self, payload: NewCoupon) -> ServiceFuture<Coupon> {
        let repo_factory = self.static_context.repo_factory.clone();

        if let Err(validation_errors) = payload.validate() {
            return Box::new(future::err(
                format_err!("Invalid payload for coupon {}", payload.code)
                    .context(Error::Validate(validation_errors))
                    .into(),
            ));
        }

        self.spawn_on_pool(move |conn| {
            let coupon_repo = repo_factory.create_coupons_repo(&*conn);

            coupon_repo
                .find_by_code(payload.code.clone())
                .and_then(|existing| {
                    if existing.is_some() {
                        return Err(format_err!("Coupon with code {} already exists", payload.code)
                            .context(Error::DuplicateCode)
                            .into());
                    }

                    let coupon = Coupon::new(payload);
                    coupon_repo.save(&coupon)?;

                    Ok(coupon)
                }).map_err(|e: FailureError| e.context("Service Coupons, create_coupon endpoint error occurred.").into())
        })
    }

    /// Replaces the repeat count policies of a coupon
    fn add_repeat_counts(&self, code: CouponCode, policies: Vec<RepeatCount>) -> ServiceFuture<Coupon> {
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let coupon_repo = repo_factory.create_coupons_repo(&*conn);

            coupon_repo
                .find_by_code(code.clone())
                .and_then(|coupon| match coupon {
                    Some(mut coupon) => {
                        coupon.repeat_counts = policies;
                        coupon_repo.save(&coupon)?;

                        Ok(coupon)
                    }
                    None => Err(format_err!("Coupon with code {} not found", code)
                        .context(Error::NotFound)
                        .into()),
                }).map_err(|e: FailureError| e.context("Service Coupons, add_repeat_counts endpoint error occurred.").into())
        })
    }

    /// Tells whether the coupon can currently be redeemed
    fn verify_coupon(&self, code: CouponCode) -> ServiceFuture<bool> {
        let user_id = self.dynamic_context.user_id.clone();
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let coupon_repo = repo_factory.create_coupons_repo(&*conn);

            check_eligibility(&*coupon_repo, &code, user_id.as_ref())
                .map_err(|e| e.context("Service Coupons, verify_coupon endpoint error occurred.").into())
        })
    }

    /// Redeems the coupon for the current user, bumping every usage counter
    fn apply_coupon(&self, code: CouponCode) -> ServiceFuture<Coupon> {
        let repo_factory = self.static_context.repo_factory.clone();
        let lock_ttl = Duration::from_millis(self.static_context.config.redemption.lock_ttl_ms);

        let user_id = match self.dynamic_context.user_id.clone() {
            Some(user_id) => user_id,
            None => {
                return Box::new(future::err(
                    format_err!("Denied request to apply coupon for unauthorized user")
                        .context(Error::Forbidden)
                        .into(),
                ));
            }
        };

        self.spawn_on_pool(move |conn| {
            let coupon_repo = repo_factory.create_coupons_repo(&*conn);
            let locks_repo = repo_factory.create_coupon_locks_repo(&*conn);

            if !locks_repo.acquire(code.clone(), user_id.clone(), lock_ttl)? {
                return Err(
                    format_err!("Redemption of coupon {} is already in progress for user {}", code, user_id)
                        .context(Error::LockContention)
                        .into(),
                );
            }

            // The lock is scoped per user: redemptions of one coupon by
            // different users run concurrently and may race the embedded
            // GLOBAL_TOTAL counter through read-modify-write saves.
            let result = redeem(&*coupon_repo, &code, &user_id);

            if let Err(e) = locks_repo.release(code.clone(), user_id.clone()) {
                error!(
                    "Could not release redemption lock for coupon {} and user {}: {}",
                    code, user_id, e
                );
            }

            result.map_err(|e| e.context("Service Coupons, apply_coupon endpoint error occurred.").into())
        })
    }

    /// Returns coupon by code
    fn get_coupon(&self, code: CouponCode) -> ServiceFuture<Option<Coupon>> {
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let coupon_repo = repo_factory.create_coupons_repo(&*conn);

            coupon_repo
                .find_by_code(code)
                .map_err(|e| e.context("Service Coupons, get_coupon endpoint error occurred.").into())
        })
    }

    /// Deletes coupon, telling whether a record existed
    fn delete_coupon(&self, code: CouponCode) -> ServiceFuture<bool> {
        let repo_factory = self.static_context.repo_factory.clone();

        self.spawn_on_pool(move |conn| {
            let coupon_repo = repo_factory.create_coupons_repo(&*conn);

            coupon_repo
                .find_by_code(code.clone())
                .and_then(|existing| match existing {
                    Some(_) => coupon_repo.delete(code).map(|_| true),
                    None => Ok(false),
                }).map_err(|e: FailureError| e.context("Service Coupons, delete_coupon endpoint error occurred.").into())
        })
    }
}

/// Walks the policy list in order; the first exhausted counter makes the
/// coupon invalid, and no further counters are consulted. Daily and weekly
/// policies also consult the expiring per user counter when the caller is
/// known. A coupon without policies is always valid; an absent coupon never
/// is.
pub fn check_eligibility(coupon_repo: &CouponsRepo, code: &CouponCode, user_id: Option<&UserId>) -> Result<bool, FailureError> {
    let coupon = match coupon_repo.find_by_code(code.clone())? {
        Some(coupon) => coupon,
        None => return Ok(false),
    };

    for repeat_count in &coupon.repeat_counts {
        if repeat_count.current >= repeat_count.limit {
            return Ok(false);
        }

        if let Some(user_id) = user_id {
            if repeat_count.count_type.has_user_window() {
                let used = coupon_repo.get_user_count(code.clone(), user_id.clone(), repeat_count.count_type)?;
                if used >= repeat_count.limit {
                    return Ok(false);
                }
            }
        }
    }

    Ok(true)
}

/// The critical section of a redemption, entered with the pair lock held:
/// re-load the authoritative record, re-check every limit, then bump every
/// counter and persist the record in one write. An exhausted embedded
/// counter names its policy in a limit error; an exhausted user window or a
/// vanished record is plain ineligibility.
fn redeem(coupon_repo: &CouponsRepo, code: &CouponCode, user_id: &UserId) -> Result<Coupon, FailureError> {
    let mut coupon = coupon_repo.find_by_code(code.clone())?.ok_or_else(|| -> FailureError {
        format_err!("Coupon {} is not valid for user {}", code, user_id)
            .context(Error::InvalidCoupon)
            .into()
    })?;

    // Every limit is enforced before any counter moves.
    for repeat_count in &coupon.repeat_counts {
        if repeat_count.current >= repeat_count.limit {
            return Err(format_err!(
                "Coupon {} reached its limit of {} for {}",
                code,
                repeat_count.limit,
                repeat_count.count_type
            ).context(Error::LimitExceeded(repeat_count.count_type))
            .into());
        }
    }

    for repeat_count in &coupon.repeat_counts {
        if repeat_count.count_type.has_user_window() {
            let used = coupon_repo.get_user_count(code.clone(), user_id.clone(), repeat_count.count_type)?;
            if used >= repeat_count.limit {
                return Err(format_err!(
                    "Coupon {} is not valid for user {}, the {} window is spent",
                    code,
                    user_id,
                    repeat_count.count_type
                ).context(Error::InvalidCoupon)
                .into());
            }
        }
    }

    let now = Utc::now();
    for repeat_count in coupon.repeat_counts.iter_mut() {
        repeat_count.current += 1;

        if let Some(ttl) = user_counter_ttl(repeat_count.count_type, &now) {
            coupon_repo.increment_user_count(code.clone(), user_id.clone(), repeat_count.count_type, ttl)?;
        }
    }

    coupon_repo.save(&coupon)?;

    Ok(coupon)
}

/// Expiry of the per user counter of a policy: a full day for `USER_DAILY`,
/// the remainder of the calendar week (anchored to Sunday, UTC) for
/// `USER_WEEKLY`. The totals keep no expiring counter.
fn user_counter_ttl(count_type: RepeatCountType, now: &DateTime<Utc>) -> Option<Duration> {
    match count_type {
        RepeatCountType::UserDaily => Some(Duration::from_secs(SECONDS_IN_DAY)),
        RepeatCountType::UserWeekly => {
            let days_left = 7 - u64::from(now.weekday().num_days_from_sunday());
            Some(Duration::from_secs(days_left * SECONDS_IN_DAY))
        }
        RepeatCountType::GlobalTotal | RepeatCountType::UserTotal => None,
    }
}

#[cfg(test)]
pub mod tests {
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use failure::{Context, Error as FailureError, Fail};
    use tokio_core::reactor::Core;

    use super::{user_counter_ttl, SECONDS_IN_DAY};
    use errors::Error;
    use models::*;
    use repos::repo_factory::tests::*;
    use services::*;

    pub fn create_new_coupon(code: CouponCode) -> NewCoupon {
        NewCoupon {
            code,
            description: "Ten percent off".to_string(),
            discount_percentage: 10.0,
            expiration_date: Utc.ymd(2030, 1, 1).and_hms(0, 0, 0),
        }
    }

    fn error_kind(err: &FailureError) -> Option<&Error> {
        let mut fail = Some(err.as_fail());
        while let Some(current) = fail {
            if let Some(ctx) = current.downcast_ref::<Context<Error>>() {
                return Some(ctx.get_context());
            }
            if let Some(kind) = current.downcast_ref::<Error>() {
                return Some(kind);
            }
            fail = current.cause();
        }
        None
    }

    #[test]
    fn test_create_coupon() {
        let mut core = Core::new().unwrap();
        let service = create_service(Some(UserId(MOCK_USER_ID.to_string())));
        let new_coupon = create_new_coupon(CouponCode(MOCK_COUPON_CODE.to_string()));
        let work = service.create_coupon(new_coupon);
        let result = core.run(work).unwrap();
        assert_eq!(result.code, CouponCode(MOCK_COUPON_CODE.to_string()));
        assert!(result.repeat_counts.is_empty());
    }

    #[test]
    fn test_create_coupon_with_duplicate_code() {
        let mut core = Core::new().unwrap();
        let service = create_service(Some(UserId(MOCK_USER_ID.to_string())));
        let new_coupon = create_new_coupon(CouponCode(MOCK_COUPON_CODE.to_string()));
        core.run(service.create_coupon(new_coupon.clone())).unwrap();
        let result = core.run(service.create_coupon(new_coupon));
        match error_kind(&result.unwrap_err()) {
            Some(&Error::DuplicateCode) => {}
            other => panic!("Expected DuplicateCode, got {:?}", other),
        }
    }

    #[test]
    fn test_create_coupon_with_empty_code() {
        let mut core = Core::new().unwrap();
        let service = create_service(Some(UserId(MOCK_USER_ID.to_string())));
        let new_coupon = create_new_coupon(CouponCode("  ".to_string()));
        let result = core.run(service.create_coupon(new_coupon));
        match error_kind(&result.unwrap_err()) {
            Some(&Error::Validate(_)) => {}
            other => panic!("Expected Validate, got {:?}", other),
        }
    }

    #[test]
    fn test_get_coupon() {
        let mut core = Core::new().unwrap();
        let service = create_service(Some(UserId(MOCK_USER_ID.to_string())));
        let new_coupon = create_new_coupon(CouponCode(MOCK_COUPON_CODE.to_string()));
        core.run(service.create_coupon(new_coupon)).unwrap();
        let result = core.run(service.get_coupon(CouponCode(MOCK_COUPON_CODE.to_string()))).unwrap();
        assert_eq!(result.map(|coupon| coupon.code), Some(CouponCode(MOCK_COUPON_CODE.to_string())));
    }

    #[test]
    fn test_get_missing_coupon() {
        let mut core = Core::new().unwrap();
        let service = create_service(Some(UserId(MOCK_USER_ID.to_string())));
        let result = core.run(service.get_coupon(CouponCode("MISSING".to_string()))).unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn test_add_repeat_counts() {
        let mut core = Core::new().unwrap();
        let service = create_service(Some(UserId(MOCK_USER_ID.to_string())));
        let new_coupon = create_new_coupon(CouponCode(MOCK_COUPON_CODE.to_string()));
        core.run(service.create_coupon(new_coupon)).unwrap();

        let policies = vec![
            RepeatCount {
                count_type: RepeatCountType::GlobalTotal,
                limit: 1000,
                current: 0,
            },
            RepeatCount {
                count_type: RepeatCountType::UserTotal,
                limit: 3,
                current: 0,
            },
        ];
        let result = core
            .run(service.add_repeat_counts(CouponCode(MOCK_COUPON_CODE.to_string()), policies.clone()))
            .unwrap();
        assert_eq!(result.repeat_counts, policies);
    }

    #[test]
    fn test_add_repeat_counts_for_missing_coupon() {
        let mut core = Core::new().unwrap();
        let service = create_service(Some(UserId(MOCK_USER_ID.to_string())));
        let result = core.run(service.add_repeat_counts(CouponCode("MISSING".to_string()), vec![]));
        match error_kind(&result.unwrap_err()) {
            Some(&Error::NotFound) => {}
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_coupon_without_policies() {
        let mut core = Core::new().unwrap();
        let service = create_service(Some(UserId(MOCK_USER_ID.to_string())));
        let new_coupon = create_new_coupon(CouponCode(MOCK_COUPON_CODE.to_string()));
        core.run(service.create_coupon(new_coupon)).unwrap();
        let result = core.run(service.verify_coupon(CouponCode(MOCK_COUPON_CODE.to_string()))).unwrap();
        assert_eq!(result, true);
    }

    #[test]
    fn test_verify_missing_coupon() {
        let mut core = Core::new().unwrap();
        let service = create_service(Some(UserId(MOCK_USER_ID.to_string())));
        let result = core.run(service.verify_coupon(CouponCode("MISSING".to_string()))).unwrap();
        assert_eq!(result, false);
    }

    #[test]
    fn test_apply_coupon_without_user() {
        let mut core = Core::new().unwrap();
        let service = create_service(None);
        let result = core.run(service.apply_coupon(CouponCode(MOCK_COUPON_CODE.to_string())));
        match error_kind(&result.unwrap_err()) {
            Some(&Error::Forbidden) => {}
            other => panic!("Expected Forbidden, got {:?}", other),
        }
    }

    #[test]
    fn test_apply_coupon_without_policies_mutates_nothing() {
        let mut core = Core::new().unwrap();
        let service = create_service(Some(UserId(MOCK_USER_ID.to_string())));
        let new_coupon = create_new_coupon(CouponCode(MOCK_COUPON_CODE.to_string()));
        core.run(service.create_coupon(new_coupon)).unwrap();
        let result = core.run(service.apply_coupon(CouponCode(MOCK_COUPON_CODE.to_string()))).unwrap();
        assert!(result.repeat_counts.is_empty());
    }

    #[test]
    fn test_user_counter_ttl_for_daily_policy() {
        let now = Utc.ymd(2026, 8, 5).and_hms(12, 0, 0);
        assert_eq!(
            user_counter_ttl(RepeatCountType::UserDaily, &now),
            Some(Duration::from_secs(SECONDS_IN_DAY))
        );
    }

    #[test]
    fn test_user_counter_ttl_shrinks_through_the_week() {
        // 2026-08-02 is a Sunday, 2026-08-05 a Wednesday, 2026-08-01 a Saturday.
        let sunday = Utc.ymd(2026, 8, 2).and_hms(12, 0, 0);
        let wednesday = Utc.ymd(2026, 8, 5).and_hms(12, 0, 0);
        let saturday = Utc.ymd(2026, 8, 1).and_hms(12, 0, 0);

        assert_eq!(
            user_counter_ttl(RepeatCountType::UserWeekly, &sunday),
            Some(Duration::from_secs(7 * SECONDS_IN_DAY))
        );
        assert_eq!(
            user_counter_ttl(RepeatCountType::UserWeekly, &wednesday),
            Some(Duration::from_secs(4 * SECONDS_IN_DAY))
        );
        assert_eq!(
            user_counter_ttl(RepeatCountType::UserWeekly, &saturday),
            Some(Duration::from_secs(SECONDS_IN_DAY))
        );
    }

    #[test]
    fn test_user_counter_ttl_absent_for_totals() {
        let now = Utc.ymd(2026, 8, 5).and_hms(12, 0, 0);
        assert_eq!(user_counter_ttl(RepeatCountType::GlobalTotal, &now), None);
        assert_eq!(user_counter_ttl(RepeatCountType::UserTotal, &now), None);
    }
}
