//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use domain::LedgerError;
use store::StoreError;

use crate::auth::AuthError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Missing or invalid credentials.
    Unauthorized(String),
    /// Ledger error.
    Ledger(LedgerError),
    /// Checkout error.
    Checkout(CheckoutError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Ledger(err) => ledger_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Internal(msg) => internal(msg),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn internal(msg: String) -> (StatusCode, String) {
    tracing::error!(error = %msg, "internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal server error".to_string(),
    )
}

fn ledger_error_to_response(err: LedgerError) -> (StatusCode, String) {
    match &err {
        e if e.is_not_found() => (StatusCode::NOT_FOUND, err.to_string()),
        LedgerError::InvalidQuantity(_) | LedgerError::InsufficientStock { .. } => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        _ => internal(err.to_string()),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::EmptyCart
        | CheckoutError::InvalidAmount(_)
        | CheckoutError::Conflict(_)
        | CheckoutError::PaymentDeclined(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        CheckoutError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CheckoutError::PaymentUnavailable(_) => {
            tracing::error!(error = %err, "payment service unavailable");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "payment service unavailable".to_string(),
            )
        }
        CheckoutError::Ledger(_) | CheckoutError::Store(_) => internal(err.to_string()),
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::Ledger(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use common::ProductId;

    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_checkout_business_failures_are_bad_request() {
        assert_eq!(
            status_of(CheckoutError::EmptyCart.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CheckoutError::PaymentDeclined("no".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CheckoutError::Conflict("stock".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(CheckoutError::InvalidAmount("too large".to_string()).into()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_checkout_infrastructure_failures_are_server_errors() {
        assert_eq!(
            status_of(CheckoutError::PaymentUnavailable("down".to_string()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(CheckoutError::Store(StoreError::Constraint("x".to_string())).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_ledger_not_found() {
        assert_eq!(
            status_of(LedgerError::ProductNotFound(ProductId::new()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(LedgerError::CartLineNotFound(ProductId::new()).into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_unauthorized() {
        assert_eq!(
            status_of(AuthError::MissingHeader.into()),
            StatusCode::UNAUTHORIZED
        );
    }
}
