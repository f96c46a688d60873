//! API server entry point.

use std::sync::Arc;

use api::auth::JwtKeys;
use api::config::{Config, LogFormat};
use api::{AppState, create_app};
use checkout::{
    CheckoutConfig, HttpPaymentGateway, InMemoryNotificationQueue, InMemoryPaymentGateway,
    NotificationQueue, PAYMENT_TIMEOUT, PaymentGateway, PostgresNotificationQueue,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

fn payment_gateway(config: &Config) -> Arc<dyn PaymentGateway> {
    match &config.payment_service_url {
        Some(url) => {
            tracing::info!(%url, "using HTTP payment gateway");
            Arc::new(
                HttpPaymentGateway::new(url.clone(), PAYMENT_TIMEOUT)
                    .expect("failed to build payment client"),
            )
        }
        None => {
            tracing::warn!("PAYMENT_SERVICE_URL not set, approving payments in memory");
            Arc::new(InMemoryPaymentGateway::new())
        }
    }
}

async fn serve<S: Store + Clone + 'static>(
    config: &Config,
    store: S,
    notifications: Arc<dyn NotificationQueue>,
    metrics_handle: PrometheusHandle,
) {
    let checkout_config = CheckoutConfig {
        currency: config.payment_currency.clone(),
        payment_token: config.payment_token.clone(),
        payment_timeout: PAYMENT_TIMEOUT,
    };
    let state = Arc::new(AppState::new(
        store,
        payment_gateway(config),
        notifications,
        checkout_config,
    ));
    let app = create_app(state, JwtKeys::new(config.jwt_secret.as_bytes()), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

#[tokio::main]
async fn main() {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env().expect("invalid configuration");
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");
    api::routes::metrics::describe();

    // 3. Pick the store and start serving
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to Postgres");
            let store = PostgresStore::new(pool.clone());
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");

            let notifications = Arc::new(PostgresNotificationQueue::new(pool));
            serve(&config, store, notifications, metrics_handle).await;
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory store");
            let notifications = Arc::new(InMemoryNotificationQueue::new());
            serve(&config, InMemoryStore::new(), notifications, metrics_handle).await;
        }
    }

    tracing::info!("server shut down gracefully");
}
