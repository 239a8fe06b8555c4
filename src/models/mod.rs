//! Models contain the coupon record and the payloads of the service layer.

pub mod coupon;
pub mod types;
pub mod validation_rules;

pub use self::coupon::*;
pub use self::types::*;
