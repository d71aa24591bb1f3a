//! Domain error types.

use common::{ErrorKind, ProductId};
use document_store::DocumentStoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::coupon::CouponError;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the document store.
    #[error("Store error: {0}")]
    Store(#[from] DocumentStoreError),

    /// The cart rejected a mutation.
    #[error(transparent)]
    Cart(#[from] CartError),

    /// A coupon was rejected.
    #[error(transparent)]
    Coupon(#[from] CouponError),

    /// The order rejected an operation.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Referenced entity does not exist or is not visible to the caller.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Actor lacks the ownership or role the operation needs.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Structurally invalid request.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Requested quantity exceeds what is on hand.
    #[error(
        "Insufficient stock for {product_name}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: u32,
    },

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classifies the error for callers at the edge.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Store(DocumentStoreError::ConcurrencyConflict { .. })
            | DomainError::Store(DocumentStoreError::UniqueViolation { .. }) => {
                ErrorKind::Conflict
            }
            DomainError::Store(_) | DomainError::Serialization(_) => ErrorKind::Internal,
            DomainError::Cart(e) => e.kind(),
            DomainError::Coupon(e) => e.kind(),
            DomainError::Order(e) => e.kind(),
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
            DomainError::InvalidInput(_) => ErrorKind::InvalidInput,
            DomainError::InsufficientStock { .. } => ErrorKind::InsufficientStock,
        }
    }

    /// Whether this is a lost optimistic-concurrency race.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DomainError::Store(DocumentStoreError::ConcurrencyConflict { .. })
        )
    }
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;
