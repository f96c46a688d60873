//! Payment gateway trait, HTTP adapter and in-memory implementation.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use common::Money;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An authorization request for a checkout total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Caller-chosen reference correlating the charge with the checkout.
    pub order_reference: String,
    /// Amount in major currency units (dollars for USD).
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: String,
    pub payment_token: String,
}

impl PaymentRequest {
    /// Converts an amount in cents into major units with two decimal places.
    pub fn major_units(amount: Money) -> Decimal {
        Decimal::new(amount.cents(), 2)
    }
}

/// The gateway's answer to an authorization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResponse {
    /// False for a business decline.
    pub success: bool,
    #[serde(default)]
    pub transaction_id: String,
    #[serde(default)]
    pub message: String,
}

/// Failures to obtain an answer from the gateway.
///
/// A decline is not an error at this level: it is a [`PaymentResponse`] with
/// `success == false`.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// Connection failure, non-2xx status or unreadable body.
    #[error("payment transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        PaymentError::Transport(err.to_string())
    }
}

/// Trait for payment authorization.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Authorizes a charge. Never retried by callers.
    async fn authorize(&self, request: PaymentRequest) -> Result<PaymentResponse, PaymentError>;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for Arc<T> {
    async fn authorize(&self, request: PaymentRequest) -> Result<PaymentResponse, PaymentError> {
        self.as_ref().authorize(request).await
    }
}

/// Gateway speaking JSON over HTTP: `POST {base_url}/payments`.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    base_url: String,
    http: Client,
}

impl HttpPaymentGateway {
    /// Creates a gateway client whose requests give up after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, PaymentError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    #[tracing::instrument(skip(self, request), fields(order_reference = %request.order_reference, amount = %request.amount))]
    async fn authorize(&self, request: PaymentRequest) -> Result<PaymentResponse, PaymentError> {
        let url = format!("{}/payments", self.base_url);

        let response = self.http.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(PaymentError::Transport(format!(
                "payment request failed with status {status}: {text}"
            )));
        }

        let parsed: PaymentResponse = response.json().await?;
        tracing::debug!(success = parsed.success, "payment gateway answered");

        Ok(parsed)
    }
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    requests: Vec<PaymentRequest>,
    next_id: u32,
    decline_message: Option<String>,
    limit: Option<Decimal>,
    unavailable: bool,
    latency: Option<Duration>,
}

/// In-memory payment gateway for testing and local runs.
///
/// Approves everything by default with `TXN-0001`, `TXN-0002`, ... ids.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new approving in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines every request with `message` while set.
    pub fn set_decline(&self, message: Option<&str>) {
        if let Ok(mut state) = self.state.write() {
            state.decline_message = message.map(str::to_string);
        }
    }

    /// Declines requests above `limit` major units.
    pub fn set_limit(&self, limit: Option<Decimal>) {
        if let Ok(mut state) = self.state.write() {
            state.limit = limit;
        }
    }

    /// Fails every request with a transport error while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        if let Ok(mut state) = self.state.write() {
            state.unavailable = unavailable;
        }
    }

    /// Delays every answer by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        if let Ok(mut state) = self.state.write() {
            state.latency = latency;
        }
    }

    /// Returns the number of requests received, answered or not.
    pub fn call_count(&self) -> usize {
        self.state.read().map(|s| s.requests.len()).unwrap_or(0)
    }

    /// Returns the requests received so far.
    pub fn requests(&self) -> Vec<PaymentRequest> {
        self.state
            .read()
            .map(|s| s.requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn authorize(&self, request: PaymentRequest) -> Result<PaymentResponse, PaymentError> {
        let latency = {
            let mut state = self
                .state
                .write()
                .map_err(|_| PaymentError::Transport("gateway state poisoned".to_string()))?;
            state.requests.push(request.clone());
            state.latency
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| PaymentError::Transport("gateway state poisoned".to_string()))?;

        if state.unavailable {
            return Err(PaymentError::Transport("connection refused".to_string()));
        }

        if let Some(message) = &state.decline_message {
            return Ok(PaymentResponse {
                success: false,
                transaction_id: String::new(),
                message: message.clone(),
            });
        }

        if state.limit.is_some_and(|limit| request.amount > limit) {
            return Ok(PaymentResponse {
                success: false,
                transaction_id: String::new(),
                message: "Transaction limit exceeded".to_string(),
            });
        }

        state.next_id += 1;
        Ok(PaymentResponse {
            success: true,
            transaction_id: format!("TXN-{:04}", state.next_id),
            message: "Payment processed successfully".to_string(),
        })
    }
}
