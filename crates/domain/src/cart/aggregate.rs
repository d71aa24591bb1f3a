//! Cart aggregate implementation.

use chrono::{DateTime, Duration, Utc};
use common::{CartId, Money, ProductId, SessionId, UserId};
use document_store::{IndexKey, Version};
use serde::{Deserialize, Serialize};

use super::CartError;
use crate::aggregate::Aggregate;
use crate::catalog::Product;
use crate::coupon::Coupon;
use crate::pricing::{self, PricingConfig, Totals};

/// Who a cart belongs to. A cart has exactly one owner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id")]
pub enum CartOwner {
    User(UserId),
    Session(SessionId),
}

impl CartOwner {
    /// Value of the unique `owner` key.
    pub fn key_value(&self) -> String {
        match self {
            CartOwner::User(id) => format!("user:{id}"),
            CartOwner::Session(id) => format!("session:{id}"),
        }
    }

    pub fn user_id(&self) -> Option<UserId> {
        match self {
            CartOwner::User(id) => Some(*id),
            CartOwner::Session(_) => None,
        }
    }
}

/// A product line in a cart.
///
/// Name, image, SKU and prices are copied from the product when the line is
/// added and are not refreshed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub product_image: Option<String>,
    pub sku: String,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub quantity: u32,
    pub variant: Option<String>,
}

impl CartLine {
    pub fn new(
        product_id: ProductId,
        product_name: impl Into<String>,
        sku: impl Into<String>,
        price: Money,
        quantity: u32,
    ) -> Self {
        Self {
            product_id,
            product_name: product_name.into(),
            product_image: None,
            sku: sku.into(),
            price,
            discount_price: None,
            quantity,
            variant: None,
        }
    }

    /// Snapshots a product into a new line.
    pub fn from_product(product: &Product, quantity: u32, variant: Option<String>) -> Self {
        Self {
            product_id: product.id.clone(),
            product_name: product.name.clone(),
            product_image: product.image_url.clone(),
            sku: product.sku.clone(),
            price: product.price,
            discount_price: product.discount_price,
            quantity,
            variant,
        }
    }

    pub fn with_discount_price(mut self, discount_price: Money) -> Self {
        self.discount_price = Some(discount_price);
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Price charged per unit.
    pub fn unit_price(&self) -> Money {
        self.discount_price.unwrap_or(self.price)
    }

    pub fn subtotal(&self) -> Money {
        self.unit_price() * self.quantity
    }

    /// Line identity within a cart is the (product, variant) pair.
    pub fn matches(&self, product_id: &ProductId, variant: Option<&str>) -> bool {
        &self.product_id == product_id && self.variant.as_deref() == variant
    }
}

/// A shopping cart.
///
/// Totals are derived: every mutation goes through [`Cart::reprice`] before
/// the cart is saved, and nothing sets them by hand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub owner: CartOwner,
    pub lines: Vec<CartLine>,
    pub coupon_code: Option<String>,
    pub totals: Totals,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Nominal expiry; not enforced by the core.
    pub expires_at: DateTime<Utc>,
    #[serde(skip)]
    version: Version,
}

impl Cart {
    /// Creates an empty cart.
    pub fn new(owner: CartOwner, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: CartId::new(),
            owner,
            lines: Vec::new(),
            coupon_code: None,
            totals: Totals::zero(),
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
            version: Version::initial(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn subtotal(&self) -> Money {
        pricing::subtotal(&self.lines)
    }

    pub fn line(&self, product_id: &ProductId, variant: Option<&str>) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.matches(product_id, variant))
    }

    /// Quantity already held on the (product, variant) line, 0 if none.
    pub fn quantity_of(&self, product_id: &ProductId, variant: Option<&str>) -> u32 {
        self.line(product_id, variant).map_or(0, |l| l.quantity)
    }

    /// Units of a product across all of its variants.
    pub fn product_quantity(&self, product_id: &ProductId) -> u32 {
        self.lines
            .iter()
            .filter(|l| &l.product_id == product_id)
            .map(|l| l.quantity)
            .sum()
    }

    /// Adds a line, merging into an existing (product, variant) line.
    ///
    /// A merge keeps the existing price snapshot and only adds quantity.
    pub fn add_line(&mut self, line: CartLine) -> Result<(), CartError> {
        if line.quantity == 0 {
            return Err(CartError::InvalidQuantity(0));
        }

        match self
            .lines
            .iter_mut()
            .find(|l| l.matches(&line.product_id, line.variant.as_deref()))
        {
            Some(existing) => existing.quantity += line.quantity,
            None => self.lines.push(line),
        }
        self.touch();
        Ok(())
    }

    /// Sets the absolute quantity of a line; 0 removes it.
    pub fn set_quantity(
        &mut self,
        product_id: &ProductId,
        variant: Option<&str>,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            self.remove_line(product_id, variant)?;
            return Ok(());
        }

        let line = self
            .lines
            .iter_mut()
            .find(|l| l.matches(product_id, variant))
            .ok_or_else(|| CartError::line_not_found(product_id, variant))?;
        line.quantity = quantity;
        self.touch();
        Ok(())
    }

    /// Removes a line.
    pub fn remove_line(
        &mut self,
        product_id: &ProductId,
        variant: Option<&str>,
    ) -> Result<CartLine, CartError> {
        let index = self
            .lines
            .iter()
            .position(|l| l.matches(product_id, variant))
            .ok_or_else(|| CartError::line_not_found(product_id, variant))?;
        let removed = self.lines.remove(index);
        self.touch();
        Ok(removed)
    }

    /// Empties the cart: no lines, no coupon, zero totals.
    pub fn clear(&mut self) {
        self.lines.clear();
        self.coupon_code = None;
        self.totals = Totals::zero();
        self.touch();
    }

    /// Stores a coupon code. The discount itself is derived when repricing.
    pub fn apply_coupon_code(&mut self, code: &str) {
        self.coupon_code = Some(Coupon::normalize_code(code));
        self.touch();
    }

    pub fn remove_coupon(&mut self) {
        self.coupon_code = None;
        self.touch();
    }

    /// Recomputes totals from the lines and the coupon the code resolved to.
    pub fn reprice(&mut self, coupon: Option<&Coupon>, config: &PricingConfig) {
        let coupon = coupon.filter(|c| self.coupon_code.as_deref() == Some(c.code.as_str()));
        self.totals = pricing::price(&self.lines, coupon, config);
    }

    /// Hands a guest cart over to a user who just signed in.
    pub fn assign_to(&mut self, user_id: UserId) {
        self.owner = CartOwner::User(user_id);
        self.touch();
    }

    /// Folds another cart's lines in, capping each merged (product, variant)
    /// line at `cap(product)` units. Lines that end up with no units are
    /// dropped.
    pub fn absorb(&mut self, other: &Cart, cap: impl Fn(&ProductId) -> u32) {
        for line in &other.lines {
            let limit = cap(&line.product_id);
            let others = self.product_quantity(&line.product_id)
                - self.quantity_of(&line.product_id, line.variant.as_deref());
            let room = limit.saturating_sub(others);

            match self
                .lines
                .iter_mut()
                .find(|l| l.matches(&line.product_id, line.variant.as_deref()))
            {
                Some(existing) => {
                    existing.quantity = (existing.quantity + line.quantity).min(room.max(existing.quantity));
                }
                None if room > 0 => {
                    let mut merged = line.clone();
                    merged.quantity = line.quantity.min(room);
                    self.lines.push(merged);
                }
                None => {}
            }
        }

        if self.coupon_code.is_none() {
            self.coupon_code = other.coupon_code.clone();
        }
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Aggregate for Cart {
    fn aggregate_type() -> &'static str {
        "carts"
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
        vec![IndexKey::unique("owner", self.owner.key_value())]
    }
}
