use chrono::{DateTime, Utc};
use common::Money;

use super::{Coupon, CouponError};

/// Checks whether a coupon may be used on a cart with the given subtotal.
///
/// Checks run in a fixed order and the first failure wins: active flag,
/// validity window, usage limit, minimum purchase. Callers that could not
/// find the coupon at all report [`CouponError::Invalid`] themselves.
pub fn validate(coupon: &Coupon, now: DateTime<Utc>, subtotal: Money) -> Result<(), CouponError> {
    if !coupon.is_active {
        return Err(CouponError::Invalid);
    }
    if !coupon.is_within_window(now) {
        return Err(CouponError::Expired);
    }
    if coupon.is_exhausted() {
        return Err(CouponError::LimitReached);
    }
    if subtotal < coupon.minimum_purchase {
        return Err(CouponError::MinimumPurchaseNotMet {
            minimum: coupon.minimum_purchase,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal::Decimal;

    use super::*;
    use crate::coupon::DiscountKind;

    fn coupon() -> Coupon {
        let now = Utc::now();
        Coupon::new(
            "SAVE10",
            DiscountKind::FixedAmount,
            Decimal::TEN,
            now - Duration::days(1),
            now + Duration::days(1),
        )
    }

    #[test]
    fn test_valid_coupon_passes() {
        assert_eq!(validate(&coupon(), Utc::now(), Money::from_major(50)), Ok(()));
    }

    #[test]
    fn test_inactive_is_invalid() {
        let mut c = coupon();
        c.is_active = false;
        assert_eq!(validate(&c, Utc::now(), Money::from_major(50)), Err(CouponError::Invalid));
    }

    #[test]
    fn test_window_edges() {
        let c = coupon();
        assert_eq!(validate(&c, c.valid_from, Money::ZERO), Ok(()));
        assert_eq!(validate(&c, c.valid_until, Money::ZERO), Ok(()));
        assert_eq!(
            validate(&c, c.valid_from - Duration::seconds(1), Money::ZERO),
            Err(CouponError::Expired)
        );
        assert_eq!(
            validate(&c, c.valid_until + Duration::seconds(1), Money::ZERO),
            Err(CouponError::Expired)
        );
    }

    #[test]
    fn test_usage_limit() {
        let mut c = coupon().with_usage_limit(2);
        c.usage_count = 1;
        assert_eq!(validate(&c, Utc::now(), Money::ZERO), Ok(()));
        c.usage_count = 2;
        assert_eq!(validate(&c, Utc::now(), Money::ZERO), Err(CouponError::LimitReached));
    }

    #[test]
    fn test_minimum_purchase() {
        let c = coupon().with_minimum_purchase(Money::from_major(100));
        assert_eq!(
            validate(&c, Utc::now(), Money::new(9999, 2)),
            Err(CouponError::MinimumPurchaseNotMet {
                minimum: Money::from_major(100)
            })
        );
        assert_eq!(validate(&c, Utc::now(), Money::from_major(100)), Ok(()));
    }

    #[test]
    fn test_expiry_reported_before_limit() {
        let mut c = coupon().with_usage_limit(1);
        c.usage_count = 1;
        let later = c.valid_until + Duration::days(1);
        assert_eq!(validate(&c, later, Money::ZERO), Err(CouponError::Expired));
    }
}
