//! Integration tests for checkout and the order lifecycle.
//!
//! These run the cart, coupon, catalog and order services together over one
//! in-memory document store, the way an application would wire them.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{ErrorKind, Money, ProductId, UserId};
use document_store::{
    CounterBounds, CounterKey, Document, DocumentQuery, DocumentStore, InMemoryDocumentStore,
    PutOptions, Version,
};
use domain::{
    Actor, Address, CardDetails, CheckoutRequest, CommerceConfig, CouponDraft, DiscountKind,
    DomainError, Order, OrderFilter, OrderService, OrderStatus, OwnerContext, PaymentMethod,
    PaymentStatus, Product, ProductCatalog, SimulatedPaymentGateway, StatusUpdate, StoreCatalog,
};
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

type Catalog = StoreCatalog<YieldingStore>;
type Orders = OrderService<YieldingStore, Catalog, SimulatedPaymentGateway>;

/// In-memory store that yields to the scheduler before every call, so
/// requests joined on one task interleave the way they would against a
/// database.
#[derive(Clone, Default)]
struct YieldingStore {
    inner: InMemoryDocumentStore,
}

#[async_trait]
impl DocumentStore for YieldingStore {
    async fn put(&self, document: Document, options: PutOptions) -> document_store::Result<Version> {
        tokio::task::yield_now().await;
        self.inner.put(document, options).await
    }

    async fn get(&self, collection: &str, id: &str) -> document_store::Result<Option<Document>> {
        tokio::task::yield_now().await;
        self.inner.get(collection, id).await
    }

    async fn find(&self, query: DocumentQuery) -> document_store::Result<Vec<Document>> {
        tokio::task::yield_now().await;
        self.inner.find(query).await
    }

    async fn count(&self, query: DocumentQuery) -> document_store::Result<u64> {
        tokio::task::yield_now().await;
        self.inner.count(query).await
    }

    async fn delete(&self, collection: &str, id: &str) -> document_store::Result<bool> {
        tokio::task::yield_now().await;
        self.inner.delete(collection, id).await
    }

    async fn set_counter(&self, key: &CounterKey, value: i64) -> document_store::Result<()> {
        tokio::task::yield_now().await;
        self.inner.set_counter(key, value).await
    }

    async fn get_counter(&self, key: &CounterKey) -> document_store::Result<Option<i64>> {
        tokio::task::yield_now().await;
        self.inner.get_counter(key).await
    }

    async fn adjust_counter(
        &self,
        key: &CounterKey,
        delta: i64,
        bounds: CounterBounds,
    ) -> document_store::Result<Option<i64>> {
        tokio::task::yield_now().await;
        self.inner.adjust_counter(key, delta, bounds).await
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct TestHarness {
    store: YieldingStore,
    orders: Orders,
    catalog: Catalog,
    payments: SimulatedPaymentGateway,
    admin: Actor,
}

impl TestHarness {
    async fn new() -> Self {
        init_tracing();
        let store = YieldingStore::default();
        let catalog = StoreCatalog::new(store.clone());
        let payments = SimulatedPaymentGateway::new();

        catalog
            .register(Product::new("SKU-LAMP", "Desk Lamp", Money::from_major(100)), 10)
            .await
            .unwrap();
        catalog
            .register(
                Product::new("SKU-MUG", "Mug", Money::from_major(20))
                    .with_discount_price(Money::from_major(15)),
                10,
            )
            .await
            .unwrap();

        let orders = OrderService::new(
            store.clone(),
            catalog.clone(),
            payments.clone(),
            CommerceConfig::default(),
        );

        Self {
            store,
            orders,
            catalog,
            payments,
            admin: Actor::admin(UserId::new()),
        }
    }

    async fn stock(&self, sku: &str) -> u32 {
        self.catalog
            .available_stock(&ProductId::new(sku))
            .await
            .unwrap()
    }

    async fn add(&self, user: UserId, sku: &str, quantity: u32) {
        self.orders
            .carts()
            .add_item(&OwnerContext::user(user), &ProductId::new(sku), quantity, None)
            .await
            .unwrap();
    }

    async fn create_coupon(&self, code: &str, value: i64, usage_limit: Option<u32>) {
        let now = Utc::now();
        self.orders
            .carts()
            .coupons()
            .create(
                CouponDraft {
                    code: code.to_string(),
                    description: None,
                    kind: DiscountKind::FixedAmount,
                    value: Decimal::from(value),
                    max_discount_amount: None,
                    minimum_purchase: Money::ZERO,
                    usage_limit,
                    valid_from: now - Duration::days(1),
                    valid_until: now + Duration::days(30),
                    is_active: true,
                },
                true,
            )
            .await
            .unwrap();
    }

    async fn checkout(&self, user: UserId) -> Result<Order, DomainError> {
        self.orders
            .create_order(Some(user), CheckoutRequest::new(address(), PaymentMethod::CreditCard))
            .await
    }

    /// Places an order with two lines: 2 lamps and 1 mug.
    async fn two_item_order(&self, user: UserId) -> Order {
        self.add(user, "SKU-LAMP", 2).await;
        self.add(user, "SKU-MUG", 1).await;
        self.checkout(user).await.unwrap()
    }
}

fn address() -> Address {
    Address {
        full_name: "Ada Yilmaz".into(),
        phone: "+90 555 000 0000".into(),
        email: "ada@example.com".into(),
        address_line1: "Ataturk Cd. 10".into(),
        address_line2: None,
        city: "Ankara".into(),
        state: "Cankaya".into(),
        postal_code: "06000".into(),
        country: "TR".into(),
    }
}

fn card() -> CardDetails {
    CardDetails {
        holder_name: "Ada Yilmaz".into(),
        number: "4111111111111111".into(),
        expiry_month: "12".into(),
        expiry_year: "2030".into(),
        cvv: "123".into(),
    }
}

mod checkout {
    use super::*;

    #[tokio::test]
    async fn coupon_scenario_totals_are_copied_onto_order() {
        let h = TestHarness::new().await;
        let user = UserId::new();
        h.create_coupon("SAVE10", 10, None).await;

        h.add(user, "SKU-LAMP", 3).await;
        h.orders
            .carts()
            .apply_coupon(&OwnerContext::user(user), "SAVE10")
            .await
            .unwrap();

        let order = h.checkout(user).await.unwrap();

        assert_eq!(order.totals.subtotal, Money::from_major(300));
        assert_eq!(order.totals.discount, Money::from_major(10));
        assert_eq!(order.totals.tax, Money::from_major(58));
        assert_eq!(order.totals.shipping_cost, Money::new(2999, 2));
        assert_eq!(order.totals.total, Money::new(37799, 2));
        assert_eq!(order.coupon_code.as_deref(), Some("SAVE10"));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.status_history.len(), 1);
        assert!(order.order_number.starts_with("ORD-"));

        assert_eq!(h.stock("SKU-LAMP").await, 7);

        let coupon = h.orders.carts().coupons().find_by_code("SAVE10").await.unwrap().unwrap();
        assert_eq!(coupon.usage_count, 1);

        let cart = h
            .orders
            .carts()
            .get_or_create(&OwnerContext::user(user))
            .await
            .unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.coupon_code, None);
    }

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let h = TestHarness::new().await;
        let err = h.checkout(UserId::new()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyCart);
    }

    #[tokio::test]
    async fn anonymous_checkout_is_rejected() {
        let h = TestHarness::new().await;
        let err = h
            .orders
            .create_order(None, CheckoutRequest::new(address(), PaymentMethod::CreditCard))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn stock_is_checked_again_at_checkout() {
        let h = TestHarness::new().await;
        let user = UserId::new();
        h.add(user, "SKU-LAMP", 4).await;
        h.add(user, "SKU-MUG", 2).await;

        // Someone else buys most of the lamps in the meantime
        h.catalog
            .decrement_stock(&ProductId::new("SKU-LAMP"), 8)
            .await
            .unwrap();

        let err = h.checkout(user).await.unwrap_err();
        match err {
            DomainError::InsufficientStock {
                product_name,
                requested,
                available,
                ..
            } => {
                assert_eq!(product_name, "Desk Lamp");
                assert_eq!(requested, 4);
                assert_eq!(available, 2);
            }
            other => panic!("expected insufficient stock, got {other:?}"),
        }

        // Nothing was taken and the cart is intact
        assert_eq!(h.stock("SKU-LAMP").await, 2);
        assert_eq!(h.stock("SKU-MUG").await, 10);
        let cart = h
            .orders
            .carts()
            .get_or_create(&OwnerContext::user(user))
            .await
            .unwrap();
        assert_eq!(cart.item_count(), 6);
    }

    #[tokio::test]
    async fn exhausted_coupon_fails_checkout() {
        let h = TestHarness::new().await;
        h.create_coupon("ONCE", 5, Some(1)).await;

        let first = UserId::new();
        let second = UserId::new();
        for user in [first, second] {
            h.add(user, "SKU-MUG", 1).await;
            h.orders
                .carts()
                .apply_coupon(&OwnerContext::user(user), "ONCE")
                .await
                .unwrap();
        }

        h.checkout(first).await.unwrap();
        let err = h.checkout(second).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CouponLimitReached);

        // Only the first order took a mug
        assert_eq!(h.stock("SKU-MUG").await, 9);
    }

    #[tokio::test]
    async fn concurrent_checkouts_never_oversell() {
        let h = TestHarness::new().await;
        h.catalog
            .register(Product::new("SKU-RARE", "Rare Print", Money::from_major(50)), 3)
            .await
            .unwrap();

        let users: Vec<UserId> = (0..6).map(|_| UserId::new()).collect();
        for user in &users {
            h.add(*user, "SKU-RARE", 1).await;
        }

        let mut handles = Vec::new();
        for user in users {
            let orders = h.orders.clone();
            handles.push(tokio::spawn(async move {
                orders
                    .create_order(Some(user), CheckoutRequest::new(address(), PaymentMethod::CreditCard))
                    .await
            }));
        }

        let mut placed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => placed += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::InsufficientStock),
            }
        }

        assert_eq!(placed, 3);
        assert_eq!(h.stock("SKU-RARE").await, 0);
    }

    #[tokio::test]
    async fn same_cart_checked_out_twice_places_one_order() {
        let h = TestHarness::new().await;
        let user = UserId::new();
        h.create_coupon("SAVE10", 10, None).await;
        h.add(user, "SKU-LAMP", 3).await;
        h.orders
            .carts()
            .apply_coupon(&OwnerContext::user(user), "SAVE10")
            .await
            .unwrap();

        let (first, second) = tokio::join!(h.checkout(user), h.checkout(user));

        let outcomes = [first, second];
        let placed = outcomes.iter().filter(|o| o.is_ok()).count();
        assert_eq!(placed, 1);
        for outcome in &outcomes {
            if let Err(e) = outcome {
                assert!(
                    matches!(e.kind(), ErrorKind::Conflict | ErrorKind::EmptyCart),
                    "unexpected error {e:?}"
                );
            }
        }

        assert_eq!(h.stock("SKU-LAMP").await, 7);
        assert_eq!(h.store.inner.document_count("orders").await, 1);
        let coupon = h.orders.carts().coupons().find_by_code("SAVE10").await.unwrap().unwrap();
        assert_eq!(coupon.usage_count, 1);
        let cart = h
            .orders
            .carts()
            .get_or_create(&OwnerContext::user(user))
            .await
            .unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn order_items_are_snapshots() {
        let h = TestHarness::new().await;
        let user = UserId::new();
        let order = h.two_item_order(user).await;

        // Catalog price changes after checkout
        h.catalog
            .register(Product::new("SKU-LAMP", "Desk Lamp v2", Money::from_major(999)), 10)
            .await
            .unwrap();

        let reloaded = h.orders.get_order(order.id, &Actor::customer(user)).await.unwrap();
        let lamp = reloaded
            .items
            .iter()
            .find(|i| i.product_id == ProductId::new("SKU-LAMP"))
            .unwrap();
        assert_eq!(lamp.product_name, "Desk Lamp");
        assert_eq!(lamp.unit_price(), Money::from_major(100));
        assert_eq!(reloaded.totals, order.totals);
    }
}

mod cancellation {
    use super::*;

    #[tokio::test]
    async fn customer_cancel_restores_each_item() {
        let h = TestHarness::new().await;
        let user = UserId::new();
        let order = h.two_item_order(user).await;
        assert_eq!(h.stock("SKU-LAMP").await, 8);
        assert_eq!(h.stock("SKU-MUG").await, 9);

        let cancelled = h
            .orders
            .cancel_order(order.id, "found it cheaper", &Actor::customer(user))
            .await
            .unwrap();

        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(cancelled.cancellation_reason.as_deref(), Some("found it cheaper"));
        assert_eq!(
            cancelled.status_history.last().and_then(|e| e.note.as_deref()),
            Some("Cancelled by customer: found it cheaper")
        );
        assert_eq!(h.stock("SKU-LAMP").await, 10);
        assert_eq!(h.stock("SKU-MUG").await, 10);
    }

    #[tokio::test]
    async fn cancel_is_guarded_by_status() {
        let h = TestHarness::new().await;
        let user = UserId::new();
        let order = h.two_item_order(user).await;

        h.orders
            .update_status(order.id, StatusUpdate::to(OrderStatus::Shipped), &h.admin)
            .await
            .unwrap();

        let err = h
            .orders
            .cancel_order(order.id, "too late", &Actor::customer(user))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OrderNotCancellable);
        assert_eq!(h.stock("SKU-LAMP").await, 8);
    }

    #[tokio::test]
    async fn strangers_cannot_cancel() {
        let h = TestHarness::new().await;
        let order = h.two_item_order(UserId::new()).await;

        let err = h
            .orders
            .cancel_order(order.id, "mine now", &Actor::customer(UserId::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn admin_cancel_restores_stock_once() {
        let h = TestHarness::new().await;
        let order = h.two_item_order(UserId::new()).await;

        h.orders
            .update_status(order.id, StatusUpdate::to(OrderStatus::Cancelled), &h.admin)
            .await
            .unwrap();
        let err = h
            .orders
            .update_status(order.id, StatusUpdate::to(OrderStatus::Cancelled), &h.admin)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(h.stock("SKU-LAMP").await, 10);
        assert_eq!(h.stock("SKU-MUG").await, 10);
    }
}

mod status_updates {
    use super::*;

    #[tokio::test]
    async fn confirm_marks_paid_without_touching_stock() {
        let h = TestHarness::new().await;
        let order = h.two_item_order(UserId::new()).await;

        let confirmed = h
            .orders
            .update_status(
                order.id,
                StatusUpdate::to(OrderStatus::Confirmed).with_note("bank transfer received"),
                &h.admin,
            )
            .await
            .unwrap();

        assert_eq!(confirmed.payment_status, PaymentStatus::Paid);
        assert!(confirmed.paid_at.is_some());
        assert_eq!(confirmed.status_history.len(), 2);
        assert_eq!(confirmed.status_history[1].changed_by, Some(h.admin.user_id));
        assert_eq!(h.stock("SKU-LAMP").await, 8);
    }

    #[tokio::test]
    async fn shipped_records_tracking() {
        let h = TestHarness::new().await;
        let order = h.two_item_order(UserId::new()).await;

        let shipped = h
            .orders
            .update_status(
                order.id,
                StatusUpdate::to(OrderStatus::Shipped).with_tracking("Aras Kargo", "ARAS-1"),
                &h.admin,
            )
            .await
            .unwrap();
        assert!(shipped.shipped_at.is_some());
        assert_eq!(shipped.tracking_number.as_deref(), Some("ARAS-1"));
        assert_eq!(shipped.carrier_name.as_deref(), Some("Aras Kargo"));

        let delivered = h
            .orders
            .update_status(order.id, StatusUpdate::to(OrderStatus::Delivered), &h.admin)
            .await
            .unwrap();
        assert!(delivered.delivered_at.is_some());
    }

    #[tokio::test]
    async fn customers_cannot_update_status() {
        let h = TestHarness::new().await;
        let user = UserId::new();
        let order = h.two_item_order(user).await;

        let err = h
            .orders
            .update_status(order.id, StatusUpdate::to(OrderStatus::Confirmed), &Actor::customer(user))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn record_delivery_is_idempotent() {
        let h = TestHarness::new().await;
        let order = h.two_item_order(UserId::new()).await;

        h.orders
            .record_shipment(order.id, "MNG Kargo", "MNG123")
            .await
            .unwrap();
        let first = h.orders.record_delivery(order.id).await.unwrap();
        let second = h.orders.record_delivery(order.id).await.unwrap();

        assert_eq!(first.status, OrderStatus::Delivered);
        assert_eq!(first.status_history.len(), second.status_history.len());
    }
}

mod payments {
    use super::*;

    #[tokio::test]
    async fn card_payment_confirms_order() {
        let h = TestHarness::new().await;
        let user = UserId::new();
        let order = h.two_item_order(user).await;

        let (paid, outcome) = h
            .orders
            .pay(order.id, Some(card()), &Actor::customer(user))
            .await
            .unwrap();

        assert!(outcome.success);
        assert_eq!(paid.status, OrderStatus::Confirmed);
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
        assert!(paid.payment_transaction_id.unwrap().starts_with("TXN-"));
        assert_eq!(h.payments.charge_count(), 1);

        let err = h
            .orders
            .pay(order.id, Some(card()), &Actor::customer(user))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
    }

    #[tokio::test]
    async fn racing_payments_keep_one_charge() {
        let h = TestHarness::new().await;
        let user = UserId::new();
        let order = h.two_item_order(user).await;
        let actor = Actor::customer(user);

        let (a, b) = tokio::join!(
            h.orders.pay(order.id, Some(card()), &actor),
            h.orders.pay(order.id, Some(card()), &actor)
        );

        let outcomes = [a, b];
        assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
        for outcome in &outcomes {
            if let Err(e) = outcome {
                assert_eq!(e.kind(), ErrorKind::InvalidTransition);
            }
        }

        // Every charge beyond the recorded one was handed back
        assert_eq!(h.payments.charge_count() - h.payments.refund_count(), 1);

        let stored = h.orders.load(order.id).await.unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Paid);
        assert_eq!(stored.status, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn declined_card_marks_payment_failed() {
        let h = TestHarness::new().await;
        let user = UserId::new();
        let order = h.two_item_order(user).await;
        h.payments.set_decline_cards(true);

        let (failed, outcome) = h
            .orders
            .pay(order.id, Some(card()), &Actor::customer(user))
            .await
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(failed.payment_status, PaymentStatus::Failed);
        assert_eq!(failed.status, OrderStatus::Pending);

        // A retry may succeed
        h.payments.set_decline_cards(false);
        let (paid, _) = h
            .orders
            .pay(order.id, Some(card()), &Actor::customer(user))
            .await
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn refund_after_cancellation() {
        let h = TestHarness::new().await;
        let user = UserId::new();
        let order = h.two_item_order(user).await;
        h.orders
            .pay(order.id, Some(card()), &Actor::customer(user))
            .await
            .unwrap();

        h.orders
            .update_status(order.id, StatusUpdate::to(OrderStatus::Cancelled), &h.admin)
            .await
            .unwrap();
        let refunded = h
            .orders
            .update_status(order.id, StatusUpdate::to(OrderStatus::Refunded), &h.admin)
            .await
            .unwrap();

        assert_eq!(refunded.payment_status, PaymentStatus::Refunded);
        assert_eq!(h.payments.refund_count(), 1);
    }
}

mod queries {
    use super::*;

    #[tokio::test]
    async fn customers_only_list_their_own_orders() {
        let h = TestHarness::new().await;
        let alice = UserId::new();
        let bob = UserId::new();
        h.two_item_order(alice).await;
        h.two_item_order(alice).await;
        h.two_item_order(bob).await;

        let mine = h
            .orders
            .list_orders(&Actor::customer(alice), &OrderFilter::default().user(bob))
            .await
            .unwrap();
        assert_eq!(mine.total_count, 2);
        assert!(mine.items.iter().all(|o| o.user_id == alice));

        let all = h.orders.list_orders(&h.admin, &OrderFilter::default()).await.unwrap();
        assert_eq!(all.total_count, 3);

        let bobs = h
            .orders
            .list_orders(&h.admin, &OrderFilter::default().user(bob))
            .await
            .unwrap();
        assert_eq!(bobs.total_count, 1);

        let paged = h
            .orders
            .list_orders(&h.admin, &OrderFilter::default().page(2, 2))
            .await
            .unwrap();
        assert_eq!(paged.items.len(), 1);
        assert_eq!(paged.total_pages(), 2);
    }

    #[tokio::test]
    async fn get_order_checks_ownership() {
        let h = TestHarness::new().await;
        let owner = UserId::new();
        let order = h.two_item_order(owner).await;

        assert!(h.orders.get_order(order.id, &Actor::customer(owner)).await.is_ok());
        assert!(h.orders.get_order(order.id, &h.admin).await.is_ok());
        let err = h
            .orders
            .get_order(order.id, &Actor::customer(UserId::new()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let by_number = h
            .orders
            .find_by_number(&order.order_number, &Actor::customer(owner))
            .await
            .unwrap();
        assert_eq!(by_number.id, order.id);
    }

    #[tokio::test]
    async fn stats_count_statuses_and_paid_revenue() {
        let h = TestHarness::new().await;
        let first = h.two_item_order(UserId::new()).await;
        let second = h.two_item_order(UserId::new()).await;

        h.orders
            .update_status(first.id, StatusUpdate::to(OrderStatus::Confirmed), &h.admin)
            .await
            .unwrap();
        h.orders
            .update_status(second.id, StatusUpdate::to(OrderStatus::Cancelled), &h.admin)
            .await
            .unwrap();

        let stats = h.orders.stats(true).await.unwrap();
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.count(OrderStatus::Confirmed), 1);
        assert_eq!(stats.count(OrderStatus::Cancelled), 1);
        assert_eq!(stats.total_revenue, first.totals.total);
        assert_eq!(stats.today_revenue, first.totals.total);

        assert_eq!(h.orders.stats(false).await.unwrap_err().kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn invoice_for_owner() {
        let h = TestHarness::new().await;
        let owner = UserId::new();
        let order = h.two_item_order(owner).await;

        let invoice = h.orders.invoice(order.id, &Actor::customer(owner)).await.unwrap();
        assert_eq!(invoice.file_name, format!("invoice-{}.html", order.order_number));
        assert!(invoice.body.contains("Desk Lamp"));
        assert!(invoice.body.contains("Mug"));
    }
}
