//! Repos is a layer for working with the counter store: coupon records,
//! expiring per user counters and redemption locks.

pub mod coupon_locks;
pub mod coupons;
pub mod repo_factory;
pub mod types;

pub use self::coupon_locks::*;
pub use self::coupons::*;
pub use self::repo_factory::*;
pub use self::types::*;
