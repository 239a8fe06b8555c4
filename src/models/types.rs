use std::fmt;

/// Coupon code, the primary key of a coupon record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CouponCode(pub String);

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CouponCode {
    fn from(code: String) -> Self {
        CouponCode(code)
    }
}

impl<'a> From<&'a str> for CouponCode {
    fn from(code: &'a str) -> Self {
        CouponCode(code.to_string())
    }
}

/// Identity of the user redeeming a coupon.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        UserId(id)
    }
}

impl<'a> From<&'a str> for UserId {
    fn from(id: &'a str) -> Self {
        UserId(id.to_string())
    }
}
