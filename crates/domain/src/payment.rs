//! Payment gateway trait and simulated implementation.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{Money, OrderId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::order::PaymentMethod;

/// Card details collected upstream. Never persisted.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CardDetails {
    pub holder_name: String,
    pub number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvv: String,
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tail: String = self
            .number
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        f.debug_struct("CardDetails")
            .field("holder_name", &self.holder_name)
            .field("number", &format_args!("****{tail}"))
            .finish_non_exhaustive()
    }
}

/// A charge to run against an order.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub order_number: String,
    pub amount: Money,
    pub method: PaymentMethod,
    pub card: Option<CardDetails>,
}

/// What the gateway answered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub message: String,
    /// Money has not moved yet; an operator confirms it later.
    pub requires_manual_confirmation: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

impl PaymentOutcome {
    fn approved(transaction_id: String, message: &str) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id),
            message: message.to_string(),
            requires_manual_confirmation: false,
            processed_at: Some(Utc::now()),
        }
    }

    fn declined(message: &str) -> Self {
        Self {
            success: false,
            transaction_id: None,
            message: message.to_string(),
            requires_manual_confirmation: false,
            processed_at: None,
        }
    }
}

/// Trait for payment providers.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges an order. A declined payment is a successful call with
    /// `success == false`.
    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentOutcome>;

    /// Gives money back for an earlier transaction.
    async fn refund(&self, transaction_id: &str, amount: Money) -> Result<PaymentOutcome>;
}

#[derive(Debug, Default)]
struct SimulatedPaymentState {
    charges: Vec<(OrderId, Money)>,
    refunds: Vec<(String, Money)>,
    decline_cards: bool,
}

/// Stand-in gateway that approves everything it is given unless told to decline.
#[derive(Debug, Clone, Default)]
pub struct SimulatedPaymentGateway {
    state: Arc<RwLock<SimulatedPaymentState>>,
}

impl SimulatedPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to decline card payments.
    pub fn set_decline_cards(&self, decline: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .decline_cards = decline;
    }

    /// Number of approved charges so far.
    pub fn charge_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .charges
            .len()
    }

    /// Number of refunds issued so far.
    pub fn refund_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .refunds
            .len()
    }
}

#[async_trait]
impl PaymentGateway for SimulatedPaymentGateway {
    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentOutcome> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        let outcome = match request.method {
            PaymentMethod::CreditCard => {
                let card_ok = request.card.as_ref().is_some_and(|card| {
                    !card.number.trim().is_empty() && !card.holder_name.trim().is_empty()
                });
                if !card_ok {
                    PaymentOutcome::declined("invalid card details")
                } else if state.decline_cards {
                    PaymentOutcome::declined("card declined")
                } else {
                    PaymentOutcome::approved(format!("TXN-{}", Uuid::new_v4()), "payment completed")
                }
            }
            PaymentMethod::BankTransfer => PaymentOutcome {
                requires_manual_confirmation: true,
                ..PaymentOutcome::approved(
                    format!("BANK-{}", Uuid::new_v4()),
                    "awaiting manual confirmation",
                )
            },
            PaymentMethod::CashOnDelivery => PaymentOutcome {
                requires_manual_confirmation: true,
                ..PaymentOutcome::approved(
                    format!("COD-{}", Uuid::new_v4()),
                    "payment will be collected on delivery",
                )
            },
        };

        if outcome.success {
            state.charges.push((request.order_id, request.amount));
        }
        tracing::debug!(
            order_number = %request.order_number,
            method = %request.method,
            success = outcome.success,
            "simulated charge"
        );
        Ok(outcome)
    }

    async fn refund(&self, transaction_id: &str, amount: Money) -> Result<PaymentOutcome> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.refunds.push((transaction_id.to_string(), amount));
        Ok(PaymentOutcome::approved(
            format!("REFUND-{}", Uuid::new_v4()),
            "refund initiated",
        ))
    }
}
