//! Ledger error types.

use common::{OrderId, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The user has no cart line for this product.
    #[error("Cart line not found for product {0}")]
    CartLineNotFound(ProductId),

    /// The product does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Current stock does not cover the requested quantity.
    #[error("Insufficient stock for {name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        name: String,
        requested: i64,
        available: i64,
    },

    /// A quantity outside the accepted range.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// The underlying store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Returns true for the "row is absent" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::CartLineNotFound(_)
                | LedgerError::ProductNotFound(_)
                | LedgerError::OrderNotFound(_)
        )
    }
}
