//! Cart aggregate and its service.

mod aggregate;
mod service;

pub use aggregate::{Cart, CartLine, CartOwner};
pub use service::{CartService, OwnerContext};

use common::{ErrorKind, ProductId};
use thiserror::Error;

/// Errors raised by cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("cart line not found: {product_id}{}", variant_suffix(.variant))]
    LineNotFound {
        product_id: ProductId,
        variant: Option<String>,
    },

    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(u32),
}

fn variant_suffix(variant: &Option<String>) -> String {
    variant
        .as_deref()
        .map(|v| format!(" ({v})"))
        .unwrap_or_default()
}

impl CartError {
    pub(crate) fn line_not_found(product_id: &ProductId, variant: Option<&str>) -> Self {
        CartError::LineNotFound {
            product_id: product_id.clone(),
            variant: variant.map(str::to_string),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CartError::LineNotFound { .. } => ErrorKind::NotFound,
            CartError::InvalidQuantity(_) => ErrorKind::InvalidInput,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_not_found_message() {
        let id = ProductId::new("SKU-1");
        assert_eq!(
            CartError::line_not_found(&id, None).to_string(),
            "cart line not found: SKU-1"
        );
        assert_eq!(
            CartError::line_not_found(&id, Some("red")).to_string(),
            "cart line not found: SKU-1 (red)"
        );
        assert_eq!(CartError::line_not_found(&id, None).kind(), ErrorKind::NotFound);
    }
}
