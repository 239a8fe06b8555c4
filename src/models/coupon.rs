//! Model coupons
use std::fmt;

use chrono::{DateTime, Utc};
use validator::Validate;

use models::types::CouponCode;
use models::validation_rules::*;

/// Stored presentation of a coupon, keyed by its code.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Coupon {
    pub code: CouponCode,
    pub description: String,
    pub discount_percentage: f64,
    pub expiration_date: DateTime<Utc>,
    pub repeat_counts: Vec<RepeatCount>,
}

impl Coupon {
    /// A freshly created coupon carries no usage policies.
    pub fn new(payload: NewCoupon) -> Self {
        Coupon {
            code: payload.code,
            description: payload.description,
            discount_percentage: payload.discount_percentage,
            expiration_date: payload.expiration_date,
            repeat_counts: vec![],
        }
    }
}

/// Payload for creating coupon
#[derive(Serialize, Deserialize, Clone, Validate, Debug)]
pub struct NewCoupon {
    #[validate(custom = "validate_coupon_code")]
    pub code: CouponCode,
    pub description: String,
    #[validate(range(min = "0", max = "100"))]
    pub discount_percentage: f64,
    pub expiration_date: DateTime<Utc>,
}

/// One usage policy attached to a coupon. `current` is the authoritative
/// counter embedded in the record; daily and weekly policies additionally
/// keep an expiring per user counter in the store.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct RepeatCount {
    #[serde(rename = "type")]
    pub count_type: RepeatCountType,
    pub limit: u32,
    pub current: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RepeatCountType {
    GlobalTotal,
    UserTotal,
    UserDaily,
    UserWeekly,
}

impl RepeatCountType {
    /// Whether this policy keeps an expiring per user counter in the store.
    pub fn has_user_window(&self) -> bool {
        match *self {
            RepeatCountType::UserDaily | RepeatCountType::UserWeekly => true,
            RepeatCountType::GlobalTotal | RepeatCountType::UserTotal => false,
        }
    }
}

impl fmt::Display for RepeatCountType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match *self {
            RepeatCountType::GlobalTotal => "GLOBAL_TOTAL",
            RepeatCountType::UserTotal => "USER_TOTAL",
            RepeatCountType::UserDaily => "USER_DAILY",
            RepeatCountType::UserWeekly => "USER_WEEKLY",
        };
        write!(f, "{}", name)
    }
}
