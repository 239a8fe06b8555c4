use std::borrow::Cow;
use std::collections::HashMap;

use validator::ValidationError;

use super::CouponCode;

pub fn validate_coupon_code(code: &CouponCode) -> Result<(), ValidationError> {
    if code.0.trim().is_empty() {
        Err(ValidationError {
            code: Cow::from("code"),
            message: Some(Cow::from("Coupon code must not be empty.")),
            params: HashMap::new(),
        })
    } else {
        Ok(())
    }
}
