//! Checkout: turning a user's cart into an order.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use common::{ProductId, UserId};
use document_store::{DocumentStore, DocumentStoreError};
use serde::{Deserialize, Serialize};

use super::{
    Address, NewOrder, Order, OrderError, OrderItem, OrderService, PaymentMethod,
    generate_order_number,
};
use crate::aggregate::Aggregate;
use crate::cart::Cart;
use crate::catalog::ProductCatalog;
use crate::coupon::{Coupon, CouponError, validate};
use crate::error::{DomainError, Result};
use crate::payment::PaymentGateway;

/// What the customer submits at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    #[serde(default = "default_true")]
    pub use_same_address_for_billing: bool,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

fn default_true() -> bool {
    true
}

impl CheckoutRequest {
    pub fn new(shipping_address: Address, payment_method: PaymentMethod) -> Self {
        Self {
            shipping_address,
            billing_address: None,
            use_same_address_for_billing: true,
            payment_method,
            notes: None,
        }
    }

    /// Address the invoice goes to.
    pub fn billing(&self) -> Result<Address> {
        if self.use_same_address_for_billing {
            return Ok(self.shipping_address.clone());
        }
        self.billing_address.clone().ok_or_else(|| {
            DomainError::InvalidInput("billing address is required".to_string())
        })
    }
}

/// Units wanted per product across all variants, with a display name.
fn demand(cart: &Cart) -> BTreeMap<ProductId, (String, u32)> {
    let mut wanted: BTreeMap<ProductId, (String, u32)> = BTreeMap::new();
    for line in &cart.lines {
        wanted
            .entry(line.product_id.clone())
            .or_insert_with(|| (line.product_name.clone(), 0))
            .1 += line.quantity;
    }
    wanted
}

impl<S, C, P> OrderService<S, C, P>
where
    S: DocumentStore + Clone,
    C: ProductCatalog,
    P: PaymentGateway,
{
    /// Places an order from the user's cart.
    ///
    /// Steps, undone in reverse if a later one fails: take stock per product,
    /// record the coupon use, save the order, clear the cart. The cart is
    /// cleared at the version it was read at, so of two checkouts racing on
    /// the same cart only one keeps its order.
    #[tracing::instrument(skip(self, request))]
    pub async fn create_order(
        &self,
        user_id: Option<UserId>,
        request: CheckoutRequest,
    ) -> Result<Order> {
        let started = Instant::now();
        let result = self.checkout(user_id, request).await;

        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());
        match &result {
            Ok(order) => {
                metrics::counter!("orders_created_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    total = %order.totals.total,
                    items = order.items.len(),
                    "order created"
                );
            }
            Err(e) => {
                metrics::counter!("checkout_failures_total", "reason" => e.kind().as_str())
                    .increment(1);
                tracing::warn!(error = %e, "checkout failed");
            }
        }
        result
    }

    async fn checkout(&self, user_id: Option<UserId>, request: CheckoutRequest) -> Result<Order> {
        let user_id = user_id.ok_or_else(|| {
            DomainError::Forbidden("a signed-in user is required to place an order".to_string())
        })?;
        if let Some(field) = request.shipping_address.missing_field() {
            return Err(DomainError::InvalidInput(format!(
                "shipping address is missing {field}"
            )));
        }
        let billing_address = request.billing()?;

        let mut cart = match self.carts.user_cart(user_id).await? {
            Some(cart) if !cart.is_empty() => cart,
            _ => return Err(OrderError::EmptyCart.into()),
        };

        // Totals are taken as the cart last priced them; the coupon is only
        // re-checked for validity.
        let coupon = self.revalidate_coupon(&cart).await?;

        let wanted = demand(&cart);
        for (product_id, (name, quantity)) in &wanted {
            let available = self.available(product_id).await?;
            if *quantity > available {
                return Err(DomainError::InsufficientStock {
                    product_id: product_id.clone(),
                    product_name: name.clone(),
                    requested: *quantity,
                    available,
                });
            }
        }

        let order_number = generate_order_number(Utc::now());
        let taken = self.take_stock(&wanted, &order_number).await?;

        if let Some(coupon) = &coupon
            && let Err(e) = self.carts.coupons().consume(coupon).await
        {
            tracing::warn!(code = %coupon.code, error = %e, "coupon consumption failed, restoring stock");
            self.release_stock(&taken, &order_number).await;
            return Err(e);
        }

        let new_order = NewOrder {
            order_number: order_number.clone(),
            user_id,
            items: cart.lines.iter().map(OrderItem::from).collect(),
            totals: cart.totals,
            coupon_code: coupon.as_ref().map(|c| c.code.clone()),
            shipping_address: request.shipping_address,
            billing_address,
            payment_method: request.payment_method,
            notes: request.notes,
        };

        let order = match self.save_new_order(new_order).await {
            Ok(order) => order,
            Err(e) => {
                tracing::warn!(error = %e, "saving order failed, compensating");
                self.undo_reservation(coupon.as_ref(), &taken, &order_number).await;
                return Err(e);
            }
        };

        cart.clear();
        if let Err(e) = self.carts.persist(&mut cart, "checkout").await {
            tracing::warn!(
                cart_id = %cart.id,
                order_number = %order.order_number,
                error = %e,
                "clearing cart failed, withdrawing order"
            );
            if let Err(delete_err) = self.orders.delete(&order.id()).await {
                tracing::error!(order_number = %order.order_number, error = %delete_err, "failed to withdraw order");
            }
            self.undo_reservation(coupon.as_ref(), &taken, &order.order_number).await;
            return Err(e);
        }
        Ok(order)
    }

    /// Gives back the coupon use and stock taken for an order that did not go through.
    async fn undo_reservation(
        &self,
        coupon: Option<&Coupon>,
        taken: &[(ProductId, u32)],
        order_number: &str,
    ) {
        if let Some(coupon) = coupon
            && let Err(e) = self.carts.coupons().release(coupon).await
        {
            tracing::error!(code = %coupon.code, error = %e, "failed to release coupon use");
        }
        self.release_stock(taken, order_number).await;
    }

    async fn available(&self, product_id: &ProductId) -> Result<u32> {
        match self.catalog().product(product_id).await? {
            Some(product) if product.is_active => self.catalog().available_stock(product_id).await,
            _ => Err(DomainError::not_found("product", product_id)),
        }
    }

    /// Re-checks the cart's coupon at checkout time.
    async fn revalidate_coupon(&self, cart: &Cart) -> Result<Option<Coupon>> {
        if cart.coupon_code.is_none() {
            return Ok(None);
        }
        let coupon = self
            .carts
            .resolve_coupon(cart)
            .await?
            .ok_or(CouponError::Invalid)?;
        validate(&coupon, Utc::now(), cart.subtotal())?;
        Ok(Some(coupon))
    }

    /// Takes stock for every product, giving back what was taken if any
    /// product runs short.
    async fn take_stock(
        &self,
        wanted: &BTreeMap<ProductId, (String, u32)>,
        reference: &str,
    ) -> Result<Vec<(ProductId, u32)>> {
        let mut taken = Vec::with_capacity(wanted.len());
        for (product_id, (name, quantity)) in wanted {
            let outcome = self.catalog().decrement_stock(product_id, *quantity).await;
            match outcome {
                Ok(true) => taken.push((product_id.clone(), *quantity)),
                Ok(false) => {
                    self.release_stock(&taken, reference).await;
                    let available = self.catalog().available_stock(product_id).await.unwrap_or(0);
                    return Err(DomainError::InsufficientStock {
                        product_id: product_id.clone(),
                        product_name: name.clone(),
                        requested: *quantity,
                        available,
                    });
                }
                Err(e) => {
                    self.release_stock(&taken, reference).await;
                    return Err(e);
                }
            }
        }
        Ok(taken)
    }

    /// Saves a new order, drawing a fresh order number on a clash.
    async fn save_new_order(&self, new_order: NewOrder) -> Result<Order> {
        let mut order = Order::place(new_order, Utc::now());
        let attempts = self.config.order_number_attempts;

        for attempt in 1..=attempts {
            match self.orders.save(&mut order).await {
                Ok(_) => return Ok(order),
                Err(DomainError::Store(DocumentStoreError::UniqueViolation { key, .. }))
                    if key == "order_number" && attempt < attempts =>
                {
                    tracing::debug!(order_number = %order.order_number, attempt, "order number taken, regenerating");
                    order.order_number = generate_order_number(Utc::now());
                }
                Err(e) => return Err(e),
            }
        }
        Err(DomainError::InvalidInput(
            "could not allocate an order number".to_string(),
        ))
    }
}
