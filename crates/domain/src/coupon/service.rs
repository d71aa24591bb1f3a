//! Coupon administration and usage accounting.

use chrono::Utc;
use common::{CouponId, Money};
use document_store::{
    CounterBounds, CounterKey, DocumentQuery, DocumentStore, DocumentStoreError,
};
use serde::{Deserialize, Serialize};

use super::{Coupon, CouponDraft, CouponError, validate};
use crate::actor::require_admin;
use crate::aggregate::Aggregate;
use crate::error::{DomainError, Result};
use crate::repository::Repository;

/// Outcome of validating a code against a subtotal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponPreview {
    pub code: String,
    pub discount: Money,
}

/// Service for managing coupons.
///
/// Administrative operations take the caller's pre-checked administrator
/// flag. Usage is tracked in an atomic counter so concurrent checkouts can
/// never push a coupon past its limit.
pub struct CouponService<S: DocumentStore> {
    coupons: Repository<S, Coupon>,
}

impl<S: DocumentStore + Clone> Clone for CouponService<S> {
    fn clone(&self) -> Self {
        Self {
            coupons: self.coupons.clone(),
        }
    }
}

impl<S: DocumentStore> CouponService<S> {
    /// Creates a new coupon service with the given store.
    pub fn new(store: S) -> Self {
        Self {
            coupons: Repository::new(store),
        }
    }

    fn usage_key(id: CouponId) -> CounterKey {
        CounterKey::new(Coupon::aggregate_type(), id.to_string(), "usage")
    }

    async fn hydrate(&self, mut coupon: Coupon) -> Result<Coupon> {
        let usage = self
            .coupons
            .store()
            .get_counter(&Self::usage_key(coupon.id))
            .await?
            .unwrap_or(0);
        coupon.usage_count = u32::try_from(usage).unwrap_or(0);
        Ok(coupon)
    }

    fn map_duplicate(err: DomainError) -> DomainError {
        match err {
            DomainError::Store(DocumentStoreError::UniqueViolation { .. }) => {
                DomainError::InvalidInput("coupon code already exists".to_string())
            }
            other => other,
        }
    }

    /// Creates a coupon.
    #[tracing::instrument(skip(self, draft), fields(code = %draft.code))]
    pub async fn create(&self, draft: CouponDraft, is_admin: bool) -> Result<Coupon> {
        require_admin(is_admin, "create coupons")?;
        if let Some(problem) = draft.problem() {
            return Err(DomainError::InvalidInput(problem.to_string()));
        }
        if self.find_by_code(&draft.code).await?.is_some() {
            return Err(DomainError::InvalidInput(
                "coupon code already exists".to_string(),
            ));
        }

        let mut coupon = draft.into_coupon();
        self.coupons
            .store()
            .set_counter(&Self::usage_key(coupon.id), 0)
            .await?;
        self.coupons
            .save(&mut coupon)
            .await
            .map_err(Self::map_duplicate)?;

        tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "coupon created");
        Ok(coupon)
    }

    /// Replaces a coupon's terms. Usage so far is kept.
    #[tracing::instrument(skip(self, draft))]
    pub async fn update(&self, id: CouponId, draft: CouponDraft, is_admin: bool) -> Result<Coupon> {
        require_admin(is_admin, "update coupons")?;
        if let Some(problem) = draft.problem() {
            return Err(DomainError::InvalidInput(problem.to_string()));
        }

        let mut coupon = self.load(id).await?;
        if let Some(other) = self.find_by_code(&draft.code).await?
            && other.id != id
        {
            return Err(DomainError::InvalidInput(
                "coupon code already exists".to_string(),
            ));
        }

        coupon.apply_draft(draft);
        self.coupons
            .save(&mut coupon)
            .await
            .map_err(Self::map_duplicate)?;
        self.hydrate(coupon).await
    }

    /// Flips the active flag.
    #[tracing::instrument(skip(self))]
    pub async fn toggle_active(&self, id: CouponId, is_admin: bool) -> Result<Coupon> {
        require_admin(is_admin, "toggle coupons")?;
        let mut coupon = self.load(id).await?;
        coupon.is_active = !coupon.is_active;
        self.coupons.save(&mut coupon).await?;

        tracing::info!(coupon_id = %id, active = coupon.is_active, "coupon toggled");
        Ok(coupon)
    }

    /// Deletes a coupon together with its usage counter.
    ///
    /// Carts still holding the code simply stop receiving a discount.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: CouponId, is_admin: bool) -> Result<()> {
        require_admin(is_admin, "delete coupons")?;
        if !self.coupons.delete(&id.to_string()).await? {
            return Err(DomainError::not_found("coupon", id));
        }
        Ok(())
    }

    /// Retrieves a coupon by id.
    pub async fn get(&self, id: CouponId, is_admin: bool) -> Result<Coupon> {
        require_admin(is_admin, "view coupons")?;
        self.load(id).await
    }

    /// Lists every coupon, newest first.
    pub async fn list(&self, is_admin: bool) -> Result<Vec<Coupon>> {
        require_admin(is_admin, "list coupons")?;
        let coupons = self
            .coupons
            .find(DocumentQuery::collection(Coupon::aggregate_type()).newest_first())
            .await?;

        let mut hydrated = Vec::with_capacity(coupons.len());
        for coupon in coupons {
            hydrated.push(self.hydrate(coupon).await?);
        }
        Ok(hydrated)
    }

    /// Looks a coupon up by code, case-insensitively.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>> {
        let normalized = Coupon::normalize_code(code);
        if normalized.is_empty() {
            return Ok(None);
        }
        match self.coupons.find_one("code", &normalized).await? {
            Some(coupon) => Ok(Some(self.hydrate(coupon).await?)),
            None => Ok(None),
        }
    }

    /// Public check of a code against a subtotal, returning the discount it
    /// would give.
    #[tracing::instrument(skip(self))]
    pub async fn validate_code(&self, code: &str, subtotal: Money) -> Result<CouponPreview> {
        let coupon = self
            .find_by_code(code)
            .await?
            .ok_or(CouponError::Invalid)?;
        validate(&coupon, Utc::now(), subtotal)?;

        Ok(CouponPreview {
            discount: coupon.discount_for(subtotal),
            code: coupon.code,
        })
    }

    /// Records one use of a coupon.
    ///
    /// The increment is refused atomically if it would pass the usage limit.
    pub(crate) async fn consume(&self, coupon: &Coupon) -> Result<u32> {
        let bounds = CounterBounds::capped(coupon.usage_limit.map(i64::from));
        let updated = self
            .coupons
            .store()
            .adjust_counter(&Self::usage_key(coupon.id), 1, bounds)
            .await
            .map_err(|e| match e {
                // Deleted between lookup and checkout
                DocumentStoreError::CounterNotFound(_) => DomainError::from(CouponError::Invalid),
                other => DomainError::from(other),
            })?;

        match updated {
            Some(count) => {
                metrics::counter!("coupons_applied_total").increment(1);
                Ok(u32::try_from(count).unwrap_or(u32::MAX))
            }
            None => Err(CouponError::LimitReached.into()),
        }
    }

    /// Gives back a use recorded by [`CouponService::consume`].
    pub(crate) async fn release(&self, coupon: &Coupon) -> Result<()> {
        self.coupons
            .store()
            .adjust_counter(&Self::usage_key(coupon.id), -1, CounterBounds::non_negative())
            .await?;
        Ok(())
    }

    async fn load(&self, id: CouponId) -> Result<Coupon> {
        let coupon = self
            .coupons
            .load(&id.to_string())
            .await?
            .ok_or_else(|| DomainError::not_found("coupon", id))?;
        self.hydrate(coupon).await
    }
}
