//! Domain layer of the commerce backend.
//!
//! This crate holds the cart-to-order pipeline:
//! - Pricing engine computing subtotal, discount, tax, shipping and total
//! - Coupon definitions, the coupon validator and coupon administration
//! - Cart aggregate with guest/user ownership and login merge
//! - Checkout converting a cart into an order with stock reservation
//! - Order aggregate with its status state machine and compensating restock
//! - Payment stand-in and invoice rendering

pub mod actor;
pub mod aggregate;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod coupon;
pub mod error;
pub mod invoice;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod repository;

pub use actor::Actor;
pub use aggregate::Aggregate;
pub use cart::{Cart, CartError, CartLine, CartOwner, CartService, OwnerContext};
pub use catalog::{Product, ProductCatalog, StoreCatalog};
pub use config::CommerceConfig;
pub use coupon::{Coupon, CouponDraft, CouponError, CouponPreview, CouponService, DiscountKind};
pub use error::{DomainError, Result};
pub use invoice::{InvoiceDocument, InvoiceIssuer, render_invoice};
pub use order::{
    Address, CheckoutRequest, Order, OrderError, OrderFilter, OrderItem, OrderService,
    OrderStats, OrderStatus, Page, PaymentMethod, PaymentStatus, StatusHistoryEntry,
    StatusUpdate,
};
pub use payment::{
    CardDetails, PaymentGateway, PaymentOutcome, PaymentRequest, SimulatedPaymentGateway,
};
pub use pricing::{PricingConfig, Totals};
pub use repository::Repository;
