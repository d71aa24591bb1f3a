use chrono::{DateTime, Utc};
use common::{CouponId, Money};
use document_store::{IndexKey, Version};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;

/// How a coupon's value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiscountKind {
    /// `value` percent of the subtotal.
    Percentage,
    /// `value` off the subtotal.
    FixedAmount,
}

impl DiscountKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountKind::Percentage => "Percentage",
            DiscountKind::FixedAmount => "FixedAmount",
        }
    }
}

impl std::fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A discount code.
///
/// Codes are stored upper-case and matched case-insensitively. `usage_count`
/// mirrors the coupon's usage counter in the store and is refreshed from it on
/// every load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    pub code: String,
    pub description: Option<String>,
    pub kind: DiscountKind,
    pub value: Decimal,
    pub max_discount_amount: Option<Money>,
    pub minimum_purchase: Money,
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub usage_count: u32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    version: Version,
}

impl Coupon {
    /// Creates an active coupon with no cap, minimum or usage limit.
    pub fn new(
        code: &str,
        kind: DiscountKind,
        value: Decimal,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CouponId::new(),
            code: Self::normalize_code(code),
            description: None,
            kind,
            value,
            max_discount_amount: None,
            minimum_purchase: Money::ZERO,
            usage_limit: None,
            usage_count: 0,
            valid_from,
            valid_until,
            is_active: true,
            created_at: Utc::now(),
            version: Version::initial(),
        }
    }

    pub fn with_max_discount(mut self, cap: Money) -> Self {
        self.max_discount_amount = Some(cap);
        self
    }

    pub fn with_minimum_purchase(mut self, minimum: Money) -> Self {
        self.minimum_purchase = minimum;
        self
    }

    pub fn with_usage_limit(mut self, limit: u32) -> Self {
        self.usage_limit = Some(limit);
        self
    }

    /// Canonical form of a code: trimmed and upper-cased.
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Whether `now` lies inside `[valid_from, valid_until]`.
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.valid_from && now <= self.valid_until
    }

    /// Whether the usage limit has been reached.
    pub fn is_exhausted(&self) -> bool {
        self.usage_limit
            .is_some_and(|limit| self.usage_count >= limit)
    }

    /// Discount this coupon grants on a subtotal.
    ///
    /// Capped by `max_discount_amount`, never more than the subtotal and
    /// rounded to cents.
    pub fn discount_for(&self, subtotal: Money) -> Money {
        let raw = match self.kind {
            DiscountKind::Percentage => subtotal.scale(self.value / Decimal::ONE_HUNDRED),
            DiscountKind::FixedAmount => Money::from_decimal(self.value),
        };
        let capped = match self.max_discount_amount {
            Some(cap) => raw.min(cap),
            None => raw,
        };
        capped.max(Money::ZERO).min(subtotal).round_cents()
    }

    pub(crate) fn apply_draft(&mut self, draft: CouponDraft) {
        self.code = Self::normalize_code(&draft.code);
        self.description = draft.description;
        self.kind = draft.kind;
        self.value = draft.value;
        self.max_discount_amount = draft.max_discount_amount;
        self.minimum_purchase = draft.minimum_purchase;
        self.usage_limit = draft.usage_limit;
        self.valid_from = draft.valid_from;
        self.valid_until = draft.valid_until;
        self.is_active = draft.is_active;
    }
}

impl Aggregate for Coupon {
    fn aggregate_type() -> &'static str {
        "coupons"
    }

    fn id(&self) -> String {
        self.id.to_string()
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn index_keys(&self) -> Vec<IndexKey> {
        vec![IndexKey::unique("code", self.code.clone())]
    }
}

/// Administrator input for creating or updating a coupon.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouponDraft {
    pub code: String,
    pub description: Option<String>,
    pub kind: DiscountKind,
    pub value: Decimal,
    pub max_discount_amount: Option<Money>,
    pub minimum_purchase: Money,
    pub usage_limit: Option<u32>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
}

impl CouponDraft {
    /// Structural checks; returns the first problem found.
    pub fn problem(&self) -> Option<&'static str> {
        if Coupon::normalize_code(&self.code).is_empty() {
            return Some("coupon code is required");
        }
        if self.value <= Decimal::ZERO {
            return Some("discount value must be positive");
        }
        if self.kind == DiscountKind::Percentage && self.value > Decimal::ONE_HUNDRED {
            return Some("percentage discount cannot exceed 100");
        }
        if self.max_discount_amount.is_some_and(|cap| cap.is_negative()) {
            return Some("maximum discount cannot be negative");
        }
        if self.minimum_purchase.is_negative() {
            return Some("minimum purchase cannot be negative");
        }
        if self.valid_until <= self.valid_from {
            return Some("validity window ends before it starts");
        }
        None
    }

    pub(crate) fn into_coupon(self) -> Coupon {
        let mut coupon = Coupon::new(
            &self.code,
            self.kind,
            self.value,
            self.valid_from,
            self.valid_until,
        );
        coupon.apply_draft(self);
        coupon
    }
}
