//! HTTP API server with observability for the storefront checkout.
//!
//! Provides authenticated REST endpoints for the cart, checkout and order
//! lookup, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post};
use checkout::{
    CheckoutConfig, CheckoutOrchestrator, InMemoryNotificationQueue, InMemoryPaymentGateway,
    NotificationQueue, PaymentGateway,
};
use domain::{CartLedger, OrderLedger};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use auth::JwtKeys;

/// Orchestrator wired with boxed collaborators so one router type serves
/// every gateway and queue implementation.
pub type Orchestrator<S> =
    CheckoutOrchestrator<S, Arc<dyn PaymentGateway>, Arc<dyn NotificationQueue>>;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub store: S,
    pub cart: CartLedger,
    pub orders: OrderLedger,
    pub checkout: Orchestrator<S>,
}

impl<S: Store + Clone> AppState<S> {
    pub fn new(
        store: S,
        payment: Arc<dyn PaymentGateway>,
        notifications: Arc<dyn NotificationQueue>,
        config: CheckoutConfig,
    ) -> Self {
        Self {
            checkout: CheckoutOrchestrator::with_config(
                store.clone(),
                payment,
                notifications,
                config,
            ),
            store,
            cart: CartLedger::new(),
            orders: OrderLedger::new(),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + 'static>(
    state: Arc<AppState<S>>,
    keys: JwtKeys,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    let protected = Router::new()
        .route("/cart", post(routes::cart::add::<S>))
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/checkout", post(routes::cart::checkout::<S>))
        .route("/cart/{product_id}", delete(routes::cart::remove::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route_layer(middleware::from_fn_with_state(keys, auth::require_auth))
        .with_state(state.clone());

    let public = Router::new()
        .route("/health", get(routes::health::check::<S>))
        .with_state(state);

    Router::new()
        .merge(public)
        .merge(protected)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state over `store` with an approving in-memory gateway
/// and an in-memory notification queue.
pub fn create_default_state<S: Store + Clone + 'static>(
    store: S,
) -> (
    Arc<AppState<S>>,
    InMemoryPaymentGateway,
    InMemoryNotificationQueue,
) {
    let payment = InMemoryPaymentGateway::new();
    let notifications = InMemoryNotificationQueue::new();

    let state = Arc::new(AppState::new(
        store,
        Arc::new(payment.clone()),
        Arc::new(notifications.clone()),
        CheckoutConfig::default(),
    ));

    (state, payment, notifications)
}
