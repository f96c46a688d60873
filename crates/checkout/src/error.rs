//! Checkout error types.

use domain::LedgerError;
use store::StoreError;
use thiserror::Error;

/// Errors that end a checkout in the `Aborted` state.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart has no lines; the gateway was not contacted.
    #[error("Cart is empty")]
    EmptyCart,

    /// The cart total does not fit in cents; the gateway was not contacted.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The gateway answered and refused the payment.
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// The gateway could not be reached or did not answer in time.
    #[error("Payment service unavailable: {0}")]
    PaymentUnavailable(String),

    /// Stock ran out before the commit could take it.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A product referenced by the cart no longer exists.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A ledger failed for a reason the caller cannot fix.
    #[error("Ledger error: {0}")]
    Ledger(LedgerError),

    /// The store failed to open, commit or roll back a session.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Short label used for the `reason` metric dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::EmptyCart => "empty_cart",
            CheckoutError::InvalidAmount(_) => "invalid_amount",
            CheckoutError::PaymentDeclined(_) => "payment_declined",
            CheckoutError::PaymentUnavailable(_) => "payment_unavailable",
            CheckoutError::Conflict(_) => "conflict",
            CheckoutError::NotFound(_) => "not_found",
            CheckoutError::Ledger(_) | CheckoutError::Store(_) => "internal",
        }
    }
}

impl From<LedgerError> for CheckoutError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientStock { .. } => CheckoutError::Conflict(err.to_string()),
            err if err.is_not_found() => CheckoutError::NotFound(err.to_string()),
            LedgerError::Store(store) => CheckoutError::Store(store),
            other => CheckoutError::Ledger(other),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;

#[cfg(test)]
mod tests {
    use common::ProductId;

    use super::*;

    #[test]
    fn test_insufficient_stock_is_conflict() {
        let err: CheckoutError = LedgerError::InsufficientStock {
            product_id: ProductId::new(),
            name: "Widget".to_string(),
            requested: 2,
            available: 1,
        }
        .into();
        assert!(matches!(err, CheckoutError::Conflict(ref msg) if msg.contains("Widget")));
        assert_eq!(err.reason(), "conflict");
    }

    #[test]
    fn test_missing_product_is_not_found() {
        let err: CheckoutError = LedgerError::ProductNotFound(ProductId::new()).into();
        assert!(matches!(err, CheckoutError::NotFound(_)));
    }

    #[test]
    fn test_store_failure_is_internal() {
        let err: CheckoutError =
            LedgerError::Store(StoreError::Constraint("orders_pkey".to_string())).into();
        assert!(matches!(err, CheckoutError::Store(_)));
        assert_eq!(err.reason(), "internal");
    }
}
