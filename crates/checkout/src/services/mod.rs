//! External collaborators of a checkout and their in-memory implementations.

pub mod notification;
pub mod payment;

pub use notification::{
    InMemoryNotificationQueue, NotificationError, NotificationJob, NotificationQueue,
    PostgresNotificationQueue,
};
pub use payment::{
    HttpPaymentGateway, InMemoryPaymentGateway, PaymentError, PaymentGateway, PaymentRequest,
    PaymentResponse,
};
