//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use document_store::{IndexKey, Version};
use serde::{Deserialize, Serialize};

use super::{
    Address, OrderError, OrderItem, OrderStatus, PaymentMethod, PaymentStatus, StatusHistoryEntry,
};
use crate::aggregate::Aggregate;
use crate::pricing::Totals;

/// Order aggregate root.
///
/// Items and totals are copied from the cart at checkout and never
/// recomputed. Status changes go through the methods below so the history,
/// milestone timestamps and payment status stay consistent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub payment_transaction_id: Option<String>,
    pub status: OrderStatus,
    pub totals: Totals,
    pub coupon_code: Option<String>,
    pub notes: Option<String>,
    pub status_history: Vec<StatusHistoryEntry>,
    pub tracking_number: Option<String>,
    pub carrier_name: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    version: Version,
}

/// Everything checkout hands over to create an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub totals: Totals,
    pub coupon_code: Option<String>,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl Order {
    /// Creates a Pending order with its initial history entry.
    pub fn place(new: NewOrder, now: DateTime<Utc>) -> Self {
        Self {
            id: OrderId::new(),
            order_number: new.order_number,
            user_id: new.user_id,
            items: new.items,
            shipping_address: new.shipping_address,
            billing_address: new.billing_address,
            payment_method: new.payment_method,
            payment_status: PaymentStatus::Pending,
            payment_transaction_id: None,
            status: OrderStatus::Pending,
            totals: new.totals,
            coupon_code: new.coupon_code,
            notes: new.notes,
            status_history: vec![StatusHistoryEntry {
                status: OrderStatus::Pending,
                note: Some("Order created".to_string()),
                timestamp: now,
                changed_by: Some(new.user_id),
            }],
            tracking_number: None,
            carrier_name: None,
            cancellation_reason: None,
            created_at: now,
            updated_at: now,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            cancelled_at: None,
            version: Version::initial(),
        }
    }

    /// Units ordered across all items.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Administrator-driven status change.
    ///
    /// Only moves allowed by [`OrderStatus::can_transition_to`] are accepted.
    /// Stock restoration for `Cancelled` is left to the caller.
    pub fn transition(
        &mut self,
        next: OrderStatus,
        note: Option<String>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }
        self.enter(next, note, actor, now);
        Ok(())
    }

    /// Customer-initiated cancellation, allowed only before processing starts.
    pub fn cancel(
        &mut self,
        reason: &str,
        actor: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if !self.status.can_cancel() {
            return Err(OrderError::NotCancellable {
                status: self.status,
            });
        }
        self.cancellation_reason = Some(reason.to_string());
        self.enter(
            OrderStatus::Cancelled,
            Some(format!("Cancelled by customer: {reason}")),
            Some(actor),
            now,
        );
        Ok(())
    }

    /// Records a hand-over to a carrier.
    pub fn ship(
        &mut self,
        carrier_name: &str,
        tracking_number: &str,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if !self.status.can_ship() {
            return Err(OrderError::NotShippable {
                status: self.status,
            });
        }
        self.tracking_number = Some(tracking_number.to_string());
        self.carrier_name = Some(carrier_name.to_string());
        self.enter(
            OrderStatus::Shipped,
            Some(format!("Shipped via {carrier_name} - tracking {tracking_number}")),
            None,
            now,
        );
        Ok(())
    }

    /// Records delivery reported by a carrier. Returns false, leaving the
    /// order untouched, if it is already delivered or cannot move to
    /// Delivered from its current status.
    pub fn deliver(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(OrderStatus::Delivered) {
            return false;
        }
        self.enter(
            OrderStatus::Delivered,
            Some("Delivered to customer".to_string()),
            None,
            now,
        );
        true
    }

    /// Stores tracking details supplied with a manual status change.
    pub fn set_tracking(&mut self, tracking_number: Option<String>, carrier_name: Option<String>) {
        if tracking_number.is_some() {
            self.tracking_number = tracking_number;
        }
        if carrier_name.is_some() {
            self.carrier_name = carrier_name;
        }
    }

    /// Records a successful payment.
    pub fn mark_paid(&mut self, transaction_id: Option<String>, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Paid;
        if transaction_id.is_some() {
            self.payment_transaction_id = transaction_id;
        }
        self.paid_at.get_or_insert(now);
        self.updated_at = now;
    }

    pub fn mark_payment_failed(&mut self, now: DateTime<Utc>) {
        self.payment_status = PaymentStatus::Failed;
        self.updated_at = now;
    }

    fn enter(
        &mut self,
        status: OrderStatus,
        note: Option<String>,
        actor: Option<UserId>,
        now: DateTime<Utc>,
    ) {
        match status {
            OrderStatus::Confirmed => self.mark_paid(None, now),
            OrderStatus::Shipped => self.shipped_at = Some(now),
            OrderStatus::Delivered => self.delivered_at = Some(now),
            OrderStatus::Cancelled => self.cancelled_at = Some(now),
            OrderStatus::Refunded => self.payment_status = PaymentStatus::Refunded,
            OrderStatus::Pending | OrderStatus::Processing | OrderStatus::Returned => {}
        }

        self.status = status;
        self.updated_at = now;
        self.status_history.push(StatusHistoryEntry {
            status,
            note,
            timestamp: now,
            changed_by: actor,
        });
    }
}

impl Aggregate for Order {
    fn aggregate_type() -> &'static str {
        "orders"
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
        vec![
            IndexKey::unique("order_number", self.order_number.clone()),
            IndexKey::new("user_id", self.user_id.to_string()),
            IndexKey::new("status", self.status.as_str()),
            IndexKey::new("payment_status", self.payment_status.as_str()),
        ]
    }
}
