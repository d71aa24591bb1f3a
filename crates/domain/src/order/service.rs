//! Order service: lifecycle operations on placed orders.

use chrono::{Datelike, TimeZone, Utc};
use common::{OrderId, ProductId};
use document_store::{DocumentQuery, DocumentStore};
use serde::{Deserialize, Serialize};

use super::{
    Order, OrderError, OrderFilter, OrderItem, OrderStats, OrderStatus, Page, PaymentStatus,
};
use crate::actor::{Actor, require_admin};
use crate::aggregate::Aggregate;
use crate::cart::CartService;
use crate::catalog::ProductCatalog;
use crate::config::CommerceConfig;
use crate::error::{DomainError, Result};
use crate::invoice::{InvoiceDocument, InvoiceIssuer, render_invoice};
use crate::payment::{CardDetails, PaymentGateway, PaymentOutcome, PaymentRequest};
use crate::repository::Repository;

/// Administrative status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
    pub note: Option<String>,
    pub tracking_number: Option<String>,
    pub carrier_name: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            note: None,
            tracking_number: None,
            carrier_name: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_tracking(mut self, carrier_name: impl Into<String>, tracking_number: impl Into<String>) -> Self {
        self.carrier_name = Some(carrier_name.into());
        self.tracking_number = Some(tracking_number.into());
        self
    }
}

/// Service for placing and managing orders.
///
/// Orders are written with optimistic concurrency; stock and coupon usage
/// move through atomic counters, never through the order document.
pub struct OrderService<S: DocumentStore, C: ProductCatalog, P: PaymentGateway> {
    pub(super) orders: Repository<S, Order>,
    pub(super) carts: CartService<S, C>,
    pub(super) payments: P,
    pub(super) config: CommerceConfig,
    issuer: InvoiceIssuer,
}

impl<S, C, P> Clone for OrderService<S, C, P>
where
    S: DocumentStore + Clone,
    C: ProductCatalog + Clone,
    P: PaymentGateway + Clone,
{
    fn clone(&self) -> Self {
        Self {
            orders: self.orders.clone(),
            carts: self.carts.clone(),
            payments: self.payments.clone(),
            config: self.config.clone(),
            issuer: self.issuer.clone(),
        }
    }
}

impl<S, C, P> OrderService<S, C, P>
where
    S: DocumentStore + Clone,
    C: ProductCatalog,
    P: PaymentGateway,
{
    /// Creates a new order service.
    pub fn new(store: S, catalog: C, payments: P, config: CommerceConfig) -> Self {
        Self {
            orders: Repository::new(store.clone()),
            carts: CartService::new(store, catalog, config.clone()),
            payments,
            config,
            issuer: InvoiceIssuer::default(),
        }
    }

    /// Sets the company block printed on invoices.
    pub fn with_issuer(mut self, issuer: InvoiceIssuer) -> Self {
        self.issuer = issuer;
        self
    }

    /// Returns the cart service checkout reads from.
    pub fn carts(&self) -> &CartService<S, C> {
        &self.carts
    }

    pub(super) fn catalog(&self) -> &C {
        self.carts.catalog()
    }

    /// Loads an order without access checks.
    pub async fn load(&self, order_id: OrderId) -> Result<Order> {
        self.orders
            .load(&order_id.to_string())
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))
    }

    /// Returns an order visible to the actor.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId, actor: &Actor) -> Result<Order> {
        let order = self.load(order_id).await?;
        actor.ensure_access(order.user_id, "view this order")?;
        Ok(order)
    }

    /// Looks an order up by its number.
    pub async fn find_by_number(&self, order_number: &str, actor: &Actor) -> Result<Order> {
        let order = self
            .orders
            .find_one("order_number", order_number)
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_number))?;
        actor.ensure_access(order.user_id, "view this order")?;
        Ok(order)
    }

    /// Lists orders, newest first.
    ///
    /// Customers only ever see their own orders; the filter's user is applied
    /// for administrators alone.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, actor: &Actor, filter: &OrderFilter) -> Result<Page<Order>> {
        let mut query = DocumentQuery::collection(Order::aggregate_type());
        let user = if actor.is_admin {
            filter.user_id
        } else {
            Some(actor.user_id)
        };
        if let Some(user_id) = user {
            query = query.key("user_id", user_id.to_string());
        }
        if let Some(status) = filter.status {
            query = query.key("status", status.as_str());
        }
        if let Some(payment_status) = filter.payment_status {
            query = query.key("payment_status", payment_status.as_str());
        }
        query = query.created_between(filter.from, filter.to);

        let total_count = self.orders.count(query.clone()).await?;
        let items = self
            .orders
            .find(
                query
                    .newest_first()
                    .offset(filter.offset())
                    .limit(filter.limit()),
            )
            .await?;

        Ok(Page {
            items,
            page: filter.page_number(),
            page_size: filter.limit(),
            total_count,
        })
    }

    /// Administrative status change.
    ///
    /// Moving to `Cancelled` restores stock for every item once the order is
    /// saved; moving to `Refunded` refunds the recorded payment.
    #[tracing::instrument(skip(self, update), fields(status = %update.status))]
    pub async fn update_status(
        &self,
        order_id: OrderId,
        update: StatusUpdate,
        actor: &Actor,
    ) -> Result<Order> {
        require_admin(actor.is_admin, "update order status")?;

        let (order, previous) = self
            .orders
            .update(&order_id.to_string(), |order| {
                let previous = order.status;
                order.transition(update.status, update.note.clone(), Some(actor.user_id), Utc::now())?;
                if update.status == OrderStatus::Shipped {
                    order.set_tracking(update.tracking_number.clone(), update.carrier_name.clone());
                }
                Ok::<_, OrderError>(previous)
            })
            .await?;

        tracing::info!(
            %order_id,
            order_number = %order.order_number,
            from = %previous,
            to = %order.status,
            "order status updated"
        );

        match order.status {
            OrderStatus::Cancelled => {
                metrics::counter!("orders_cancelled_total", "by" => "admin").increment(1);
                self.restore_stock(&order.items, &order.order_number).await;
            }
            OrderStatus::Refunded => self.refund(&order).await,
            _ => {}
        }
        Ok(order)
    }

    /// Customer-initiated cancellation, allowed while Pending or Confirmed.
    ///
    /// Stock is restored after the cancellation is saved. A failed restore of
    /// one item is logged and does not stop the others.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId, reason: &str, actor: &Actor) -> Result<Order> {
        let (order, ()) = self
            .orders
            .update(&order_id.to_string(), |order| {
                actor.ensure_access(order.user_id, "cancel this order")?;
                order.cancel(reason, actor.user_id, Utc::now())?;
                Ok::<_, DomainError>(())
            })
            .await?;

        metrics::counter!("orders_cancelled_total", "by" => "customer").increment(1);
        tracing::info!(%order_id, order_number = %order.order_number, reason, "order cancelled");

        self.restore_stock(&order.items, &order.order_number).await;
        Ok(order)
    }

    /// Runs the order's payment through the gateway.
    ///
    /// An approved payment marks the order Paid and confirms a Pending order.
    /// Offline methods only record the transaction reference; a declined
    /// payment marks the payment Failed so it can be retried. A card charge
    /// that cannot be recorded on the order, e.g. because another payment or
    /// a cancellation got there first, is refunded.
    #[tracing::instrument(skip(self, card))]
    pub async fn pay(
        &self,
        order_id: OrderId,
        card: Option<CardDetails>,
        actor: &Actor,
    ) -> Result<(Order, PaymentOutcome)> {
        let order = self.get_order(order_id, actor).await?;
        Self::ensure_payable(&order)?;

        let outcome = self
            .payments
            .charge(&PaymentRequest {
                order_id,
                order_number: order.order_number.clone(),
                amount: order.totals.total,
                method: order.payment_method,
                card,
            })
            .await?;

        let recorded = self
            .orders
            .update(&order_id.to_string(), |order| {
                Self::ensure_payable(order)?;
                let now = Utc::now();
                if !outcome.success {
                    order.mark_payment_failed(now);
                } else if outcome.requires_manual_confirmation {
                    order.payment_transaction_id = outcome.transaction_id.clone();
                    order.updated_at = now;
                } else {
                    order.mark_paid(outcome.transaction_id.clone(), now);
                    if order.status == OrderStatus::Pending {
                        order.transition(
                            OrderStatus::Confirmed,
                            Some("Payment received".to_string()),
                            Some(actor.user_id),
                            now,
                        )?;
                    }
                }
                Ok::<_, OrderError>(())
            })
            .await;

        let order = match recorded {
            Ok((order, ())) => order,
            Err(e) => {
                if outcome.success && !outcome.requires_manual_confirmation {
                    self.refund_unrecorded(&order, &outcome).await;
                }
                return Err(e);
            }
        };

        tracing::info!(
            %order_id,
            success = outcome.success,
            payment_status = %order.payment_status,
            "payment processed"
        );
        Ok((order, outcome))
    }

    async fn refund_unrecorded(&self, order: &Order, outcome: &PaymentOutcome) {
        let Some(transaction_id) = outcome.transaction_id.as_deref() else {
            return;
        };
        tracing::warn!(
            order_number = %order.order_number,
            transaction_id,
            "payment could not be recorded, refunding charge"
        );
        if let Err(e) = self.payments.refund(transaction_id, order.totals.total).await {
            tracing::error!(
                order_number = %order.order_number,
                transaction_id,
                error = %e,
                "failed to refund unrecorded charge"
            );
        }
    }

    fn ensure_payable(order: &Order) -> std::result::Result<(), OrderError> {
        if matches!(order.payment_status, PaymentStatus::Paid | PaymentStatus::Refunded) {
            return Err(OrderError::PaymentNotPending {
                payment_status: order.payment_status,
            });
        }
        if !order.status.can_cancel() {
            return Err(OrderError::InvalidStatusTransition {
                from: order.status,
                to: OrderStatus::Confirmed,
            });
        }
        Ok(())
    }

    /// Dashboard figures: counts per status and revenue over paid orders.
    #[tracing::instrument(skip(self))]
    pub async fn stats(&self, is_admin: bool) -> Result<OrderStats> {
        require_admin(is_admin, "view order statistics")?;

        let mut stats = OrderStats::default();
        for status in OrderStatus::ALL {
            let count = self
                .orders
                .count(DocumentQuery::collection(Order::aggregate_type()).key("status", status.as_str()))
                .await?;
            stats.total_orders += count;
            stats.by_status.insert(status.as_str().to_string(), count);
        }

        let now = Utc::now();
        let today = now.date_naive().and_hms_opt(0, 0, 0).map(|t| Utc.from_utc_datetime(&t));
        let month_start = now
            .date_naive()
            .with_day(1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| Utc.from_utc_datetime(&t));

        let paid = self
            .orders
            .find(
                DocumentQuery::collection(Order::aggregate_type())
                    .key("payment_status", PaymentStatus::Paid.as_str()),
            )
            .await?;
        for order in &paid {
            stats.total_revenue += order.totals.total;
            if today.is_some_and(|t| order.created_at >= t) {
                stats.today_revenue += order.totals.total;
            }
            if month_start.is_some_and(|t| order.created_at >= t) {
                stats.month_revenue += order.totals.total;
            }
        }
        Ok(stats)
    }

    /// Renders the invoice for an order visible to the actor.
    #[tracing::instrument(skip(self))]
    pub async fn invoice(&self, order_id: OrderId, actor: &Actor) -> Result<InvoiceDocument> {
        let order = self.get_order(order_id, actor).await?;
        Ok(render_invoice(&order, &self.issuer))
    }

    /// Records a hand-over to a carrier. Used by shipment dispatch.
    #[tracing::instrument(skip(self))]
    pub async fn record_shipment(
        &self,
        order_id: OrderId,
        carrier_name: &str,
        tracking_number: &str,
    ) -> Result<Order> {
        let (order, ()) = self
            .orders
            .update(&order_id.to_string(), |order| {
                order.ship(carrier_name, tracking_number, Utc::now())
            })
            .await?;
        tracing::info!(%order_id, carrier_name, tracking_number, "order shipped");
        Ok(order)
    }

    /// Records delivery reported by a carrier.
    ///
    /// Does nothing for an order already delivered, and ignores the report
    /// for an order that cannot be delivered from its status, such as a
    /// cancelled one whose stock was already restored.
    #[tracing::instrument(skip(self))]
    pub async fn record_delivery(&self, order_id: OrderId) -> Result<Order> {
        let order = self.load(order_id).await?;
        if order.status == OrderStatus::Delivered {
            return Ok(order);
        }
        if !order.status.can_transition_to(OrderStatus::Delivered) {
            tracing::warn!(
                %order_id,
                order_number = %order.order_number,
                status = %order.status,
                "ignoring carrier delivery for order that cannot be delivered"
            );
            return Ok(order);
        }

        let (order, changed) = self
            .orders
            .update(&order_id.to_string(), |order| {
                Ok::<_, DomainError>(order.deliver(Utc::now()))
            })
            .await?;
        if changed {
            tracing::info!(%order_id, "order delivered");
        }
        Ok(order)
    }

    /// Puts back the stock of cancelled items, one item at a time.
    pub(super) async fn restore_stock(&self, items: &[OrderItem], order_number: &str) {
        let lines: Vec<(ProductId, u32)> = items
            .iter()
            .map(|item| (item.product_id.clone(), item.quantity))
            .collect();
        self.release_stock(&lines, order_number).await;
    }

    pub(super) async fn release_stock(&self, lines: &[(ProductId, u32)], order_number: &str) {
        for (product_id, quantity) in lines {
            match self.catalog().increment_stock(product_id, *quantity).await {
                Ok(()) => {
                    metrics::counter!("stock_compensations_total").increment(1);
                    tracing::debug!(%product_id, quantity, order_number, "stock restored");
                }
                Err(e) => {
                    tracing::error!(
                        %product_id,
                        quantity,
                        order_number,
                        error = %e,
                        "failed to restore stock"
                    );
                }
            }
        }
    }

    async fn refund(&self, order: &Order) {
        let Some(transaction_id) = order.payment_transaction_id.as_deref() else {
            return;
        };
        match self.payments.refund(transaction_id, order.totals.total).await {
            Ok(outcome) => tracing::info!(
                order_number = %order.order_number,
                refund_id = ?outcome.transaction_id,
                "refund issued"
            ),
            Err(e) => tracing::error!(
                order_number = %order.order_number,
                error = %e,
                "refund failed"
            ),
        }
    }
}
