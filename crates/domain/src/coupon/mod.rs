//! Coupons: definitions, the validator and administration.

mod model;
mod service;
mod validator;

pub use model::{Coupon, CouponDraft, DiscountKind};
pub use service::{CouponPreview, CouponService};
pub use validator::validate;

use common::{ErrorKind, Money};
use thiserror::Error;

/// Reasons a coupon cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    /// Unknown or switched-off code.
    #[error("invalid coupon code")]
    Invalid,

    /// Outside the validity window.
    #[error("coupon is expired or not yet active")]
    Expired,

    /// Usage limit already reached.
    #[error("coupon usage limit reached")]
    LimitReached,

    /// Cart subtotal is below the coupon's minimum.
    #[error("minimum purchase amount of {minimum} not met")]
    MinimumPurchaseNotMet { minimum: Money },
}

impl CouponError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CouponError::Invalid => ErrorKind::CouponInvalid,
            CouponError::Expired => ErrorKind::CouponExpired,
            CouponError::LimitReached => ErrorKind::CouponLimitReached,
            CouponError::MinimumPurchaseNotMet { .. } => ErrorKind::MinimumPurchaseNotMet,
        }
    }
}
