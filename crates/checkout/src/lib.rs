//! Checkout orchestration for the storefront.
//!
//! A checkout turns a user's cart into a paid order:
//! 1. Price the cart from current product prices
//! 2. Authorize the total with the payment gateway
//! 3. Lock, check and decrement stock, write the order and clear the cart in
//!    one store session
//!
//! Any failure before step 3 commits leaves stock, cart and orders untouched.
//! A successful checkout enqueues an order confirmation notification.

pub mod coordinator;
pub mod error;
pub mod services;
pub mod state;

pub use coordinator::{CheckoutConfig, CheckoutOrchestrator, PAYMENT_TIMEOUT};
pub use error::CheckoutError;
pub use services::{
    HttpPaymentGateway, InMemoryNotificationQueue, InMemoryPaymentGateway, NotificationError,
    NotificationJob, NotificationQueue, PaymentError, PaymentGateway, PaymentRequest,
    PaymentResponse, PostgresNotificationQueue,
};
pub use state::CheckoutState;
