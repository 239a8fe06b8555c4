use validator::ValidationErrors;

use models::RepeatCountType;

/// Kinds of failures the coupon service reports to its caller. Attached to
/// the failure chain with `.context(..)`; the shell maps them to status codes.
#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "Not found")]
    NotFound,
    #[fail(display = "Coupon code already exists")]
    DuplicateCode,
    #[fail(display = "Another redemption is in progress, try again later")]
    LockContention,
    #[fail(display = "Coupon is not valid for redemption")]
    InvalidCoupon,
    #[fail(display = "Usage limit exceeded for {}", _0)]
    LimitExceeded(RepeatCountType),
    #[fail(display = "Counter store is unavailable")]
    StoreUnavailable,
    #[fail(display = "Server is refusing to fullfil the reqeust")]
    Forbidden,
    #[fail(display = "Parse error")]
    Parse,
    #[fail(display = "Validation error: {}", _0)]
    Validate(ValidationErrors),
}
