//! Cart service: owner resolution, stock-checked mutations and login merge.

use chrono::{Duration, Utc};
use common::{ProductId, SessionId, UserId};
use document_store::{DocumentStore, DocumentStoreError};
use serde::{Deserialize, Serialize};

use super::{Cart, CartError, CartLine, CartOwner};
use crate::aggregate::Aggregate;
use crate::catalog::{Product, ProductCatalog};
use crate::config::CommerceConfig;
use crate::coupon::{Coupon, CouponError, CouponService, validate};
use crate::error::{DomainError, Result};
use crate::repository::Repository;

/// Identity a cart request arrives with, resolved upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerContext {
    pub user_id: Option<UserId>,
    pub session_id: Option<SessionId>,
}

impl OwnerContext {
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            session_id: None,
        }
    }

    pub fn session(session_id: impl Into<SessionId>) -> Self {
        Self {
            user_id: None,
            session_id: Some(session_id.into()),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<SessionId>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Service for managing carts.
///
/// Every mutation loads the cart, applies the change, re-prices it and writes
/// the whole cart back at the version it was loaded at.
pub struct CartService<S: DocumentStore, C: ProductCatalog> {
    carts: Repository<S, Cart>,
    coupons: CouponService<S>,
    catalog: C,
    config: CommerceConfig,
}

impl<S, C> Clone for CartService<S, C>
where
    S: DocumentStore + Clone,
    C: ProductCatalog + Clone,
{
    fn clone(&self) -> Self {
        Self {
            carts: self.carts.clone(),
            coupons: self.coupons.clone(),
            catalog: self.catalog.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S, C> CartService<S, C>
where
    S: DocumentStore + Clone,
    C: ProductCatalog,
{
    /// Creates a new cart service.
    pub fn new(store: S, catalog: C, config: CommerceConfig) -> Self {
        Self {
            coupons: CouponService::new(store.clone()),
            carts: Repository::new(store),
            catalog,
            config,
        }
    }

    /// Returns the product catalog.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Returns the coupon service used to resolve cart coupon codes.
    pub fn coupons(&self) -> &CouponService<S> {
        &self.coupons
    }

    fn ttl(&self) -> Duration {
        Duration::days(self.config.cart_ttl_days)
    }

    /// Resolves the caller's cart, creating or migrating one if needed.
    #[tracing::instrument(skip(self))]
    pub async fn get_or_create(&self, ctx: &OwnerContext) -> Result<Cart> {
        match (&ctx.user_id, &ctx.session_id) {
            (Some(user_id), session_id) => {
                if let Some(cart) = self.find(&CartOwner::User(*user_id)).await? {
                    return Ok(cart);
                }
                if let Some(session_id) = session_id
                    && let Some(mut cart) = self.find(&CartOwner::Session(session_id.clone())).await?
                {
                    cart.assign_to(*user_id);
                    self.carts.save(&mut cart).await?;
                    tracing::info!(cart_id = %cart.id, %user_id, "guest cart migrated to user");
                    return Ok(cart);
                }
                self.create(CartOwner::User(*user_id)).await
            }
            (None, Some(session_id)) => {
                let owner = CartOwner::Session(session_id.clone());
                match self.find(&owner).await? {
                    Some(cart) => Ok(cart),
                    None => self.create(owner).await,
                }
            }
            (None, None) => Err(DomainError::InvalidInput(
                "a user id or session id is required".to_string(),
            )),
        }
    }

    /// Adds `quantity` units of a product, merging into an existing line.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        ctx: &OwnerContext,
        product_id: &ProductId,
        quantity: u32,
        variant: Option<String>,
    ) -> Result<Cart> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity(0).into());
        }

        let product = self.active_product(product_id).await?;
        let mut cart = self.get_or_create(ctx).await?;
        let wanted = cart.product_quantity(product_id) + quantity;
        self.ensure_stock(&product, wanted).await?;

        cart.add_line(CartLine::from_product(&product, quantity, variant))?;
        self.persist(&mut cart, "add_item").await?;
        Ok(cart)
    }

    /// Sets the absolute quantity of a line; 0 removes it.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(
        &self,
        ctx: &OwnerContext,
        product_id: &ProductId,
        variant: Option<&str>,
        quantity: u32,
    ) -> Result<Cart> {
        let mut cart = self.get_or_create(ctx).await?;
        let current = cart
            .line(product_id, variant)
            .map(|l| l.quantity)
            .ok_or_else(|| CartError::line_not_found(product_id, variant))?;

        if quantity > 0 {
            let product = self.active_product(product_id).await?;
            let wanted = cart.product_quantity(product_id) - current + quantity;
            self.ensure_stock(&product, wanted).await?;
        }

        cart.set_quantity(product_id, variant, quantity)?;
        self.persist(&mut cart, "update_item").await?;
        Ok(cart)
    }

    /// Removes a line.
    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        ctx: &OwnerContext,
        product_id: &ProductId,
        variant: Option<&str>,
    ) -> Result<Cart> {
        let mut cart = self.get_or_create(ctx).await?;
        cart.remove_line(product_id, variant)?;
        self.persist(&mut cart, "remove_item").await?;
        Ok(cart)
    }

    /// Empties the cart.
    #[tracing::instrument(skip(self))]
    pub async fn clear(&self, ctx: &OwnerContext) -> Result<Cart> {
        let mut cart = self.get_or_create(ctx).await?;
        cart.clear();
        self.persist(&mut cart, "clear").await?;
        Ok(cart)
    }

    /// Validates a coupon against the current subtotal and stores its code.
    #[tracing::instrument(skip(self))]
    pub async fn apply_coupon(&self, ctx: &OwnerContext, code: &str) -> Result<Cart> {
        if Coupon::normalize_code(code).is_empty() {
            return Err(DomainError::InvalidInput(
                "coupon code is required".to_string(),
            ));
        }

        let mut cart = self.get_or_create(ctx).await?;
        let coupon = self
            .coupons
            .find_by_code(code)
            .await?
            .ok_or(CouponError::Invalid)?;
        validate(&coupon, Utc::now(), cart.subtotal())?;

        cart.apply_coupon_code(&coupon.code);
        self.persist(&mut cart, "apply_coupon").await?;
        tracing::info!(cart_id = %cart.id, code = %coupon.code, discount = %cart.totals.discount, "coupon applied");
        Ok(cart)
    }

    /// Drops the cart's coupon.
    #[tracing::instrument(skip(self))]
    pub async fn remove_coupon(&self, ctx: &OwnerContext) -> Result<Cart> {
        let mut cart = self.get_or_create(ctx).await?;
        cart.remove_coupon();
        self.persist(&mut cart, "remove_coupon").await?;
        Ok(cart)
    }

    /// Folds a guest cart into the user's cart after sign-in.
    ///
    /// A lone guest cart is handed over as is. When both exist, guest lines
    /// merge into the user cart capped at current stock and the guest cart is
    /// deleted.
    #[tracing::instrument(skip(self))]
    pub async fn merge_on_login(&self, user_id: UserId, session_id: &SessionId) -> Result<Cart> {
        let Some(guest) = self.find(&CartOwner::Session(session_id.clone())).await? else {
            return self.get_or_create(&OwnerContext::user(user_id)).await;
        };

        let Some(mut cart) = self.find(&CartOwner::User(user_id)).await? else {
            let mut migrated = guest;
            migrated.assign_to(user_id);
            self.persist(&mut migrated, "merge").await?;
            tracing::info!(cart_id = %migrated.id, %user_id, "guest cart migrated on login");
            return Ok(migrated);
        };

        let mut stock = std::collections::HashMap::new();
        for line in &guest.lines {
            if stock.contains_key(&line.product_id) {
                continue;
            }
            let available = match self.catalog.product(&line.product_id).await? {
                Some(product) if product.is_active => {
                    self.catalog.available_stock(&line.product_id).await?
                }
                _ => 0,
            };
            stock.insert(line.product_id.clone(), available);
        }

        cart.absorb(&guest, |id| stock.get(id).copied().unwrap_or(0));
        self.persist(&mut cart, "merge").await?;
        self.carts.delete(&guest.id()).await?;

        tracing::info!(
            cart_id = %cart.id,
            guest_cart_id = %guest.id,
            %user_id,
            lines = cart.lines.len(),
            "guest cart merged on login"
        );
        Ok(cart)
    }

    /// Loads a user's cart without creating one.
    pub(crate) async fn user_cart(&self, user_id: UserId) -> Result<Option<Cart>> {
        self.find(&CartOwner::User(user_id)).await
    }

    /// Resolves the cart's coupon code to a coupon, if it still exists.
    pub(crate) async fn resolve_coupon(&self, cart: &Cart) -> Result<Option<Coupon>> {
        match &cart.coupon_code {
            Some(code) => self.coupons.find_by_code(code).await,
            None => Ok(None),
        }
    }

    /// Re-prices and writes a cart.
    pub(crate) async fn persist(&self, cart: &mut Cart, operation: &'static str) -> Result<()> {
        let coupon = self.resolve_coupon(cart).await?;
        cart.reprice(coupon.as_ref(), &self.config.pricing);
        self.carts.save(cart).await?;

        metrics::counter!("carts_mutated_total", "operation" => operation).increment(1);
        tracing::debug!(cart_id = %cart.id, operation, total = %cart.totals.total, "cart saved");
        Ok(())
    }

    async fn find(&self, owner: &CartOwner) -> Result<Option<Cart>> {
        self.carts.find_one("owner", &owner.key_value()).await
    }

    async fn create(&self, owner: CartOwner) -> Result<Cart> {
        let mut cart = Cart::new(owner.clone(), self.ttl());
        match self.carts.save(&mut cart).await {
            Ok(_) => {
                tracing::debug!(cart_id = %cart.id, owner = %owner.key_value(), "cart created");
                Ok(cart)
            }
            // Another request created it first
            Err(DomainError::Store(DocumentStoreError::UniqueViolation { .. })) => self
                .find(&owner)
                .await?
                .ok_or_else(|| DomainError::not_found("cart", owner.key_value())),
            Err(e) => Err(e),
        }
    }

    async fn active_product(&self, product_id: &ProductId) -> Result<Product> {
        match self.catalog.product(product_id).await? {
            Some(product) if product.is_active => Ok(product),
            _ => Err(DomainError::not_found("product", product_id)),
        }
    }

    async fn ensure_stock(&self, product: &Product, wanted: u32) -> Result<()> {
        let available = self.catalog.available_stock(&product.id).await?;
        if wanted > available {
            return Err(DomainError::InsufficientStock {
                product_id: product.id.clone(),
                product_name: product.name.clone(),
                requested: wanted,
                available,
            });
        }
        Ok(())
    }
}
