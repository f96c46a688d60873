//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use api::AppState;
use api::auth::JwtKeys;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use checkout::{InMemoryNotificationQueue, InMemoryPaymentGateway};
use chrono::Duration;
use common::{Money, ProductId, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, NewProduct, Session, Store};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

const SECRET: &[u8] = b"test-secret";

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

struct TestApp {
    router: axum::Router,
    store: InMemoryStore,
    payment: InMemoryPaymentGateway,
    notifications: InMemoryNotificationQueue,
    _state: Arc<AppState<InMemoryStore>>,
}

impl TestApp {
    fn new() -> Self {
        let store = InMemoryStore::new();
        let (state, payment, notifications) = api::create_default_state(store.clone());
        let router = api::create_app(state.clone(), JwtKeys::new(SECRET), get_metrics_handle());
        Self {
            router,
            store,
            payment,
            notifications,
            _state: state,
        }
    }

    async fn product(&self, sku: &str, price_cents: i64, stock: i64) -> ProductId {
        let mut session = self.store.begin().await.unwrap();
        let product = session
            .insert_product(NewProduct::new(
                sku,
                format!("Game {sku}"),
                Money::from_cents(price_cents),
                stock,
            ))
            .await
            .unwrap();
        session.commit().await.unwrap();
        product.id
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
        };
        (status, json)
    }
}

fn token_for(user: UserId) -> String {
    JwtKeys::new(SECRET)
        .issue(user, "customer", Duration::minutes(10))
        .unwrap()
}

fn authed(method: &str, uri: &str, user: UserId, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", token_for(user)));
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn add_to_cart(user: UserId, product: ProductId, quantity: i64) -> Request<Body> {
    authed(
        "POST",
        "/cart",
        user,
        Some(serde_json::json!({ "product_id": product, "quantity": quantity })),
    )
}

mod public {
    use super::*;

    #[tokio::test]
    async fn health_check() {
        let app = TestApp::new();

        let (status, json) = app
            .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn metrics_endpoint() {
        let app = TestApp::new();

        let response = app
            .router
            .clone()
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let content_type = response.headers().get("content-type").unwrap();
        assert!(content_type.to_str().unwrap().starts_with("text/plain"));
    }
}

mod authentication {
    use super::*;

    #[tokio::test]
    async fn missing_token_is_unauthorized() {
        let app = TestApp::new();

        let (status, json) = app
            .send(Request::builder().uri("/cart").body(Body::empty()).unwrap())
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(json["error"].is_string());
    }

    #[tokio::test]
    async fn token_signed_with_other_secret_is_unauthorized() {
        let app = TestApp::new();
        let token = JwtKeys::new(b"other")
            .issue(UserId::new(), "customer", Duration::minutes(10))
            .unwrap();

        let (status, _) = app
            .send(
                Request::builder()
                    .uri("/cart")
                    .header("authorization", format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn checkout_requires_token() {
        let app = TestApp::new();

        let (status, _) = app
            .send(
                Request::builder()
                    .method("POST")
                    .uri("/cart/checkout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(app.payment.call_count(), 0);
    }
}

mod cart {
    use super::*;

    #[tokio::test]
    async fn add_then_get() {
        let app = TestApp::new();
        let user = UserId::new();
        let product = app.product("SKU-001", 6000, 10).await;

        let (status, json) = app.send(add_to_cart(user, product, 2)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Added to cart");

        let (status, json) = app.send(authed("GET", "/cart", user, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["items"].as_array().unwrap().len(), 1);
        assert_eq!(json["items"][0]["quantity"], 2);
        assert_eq!(json["items"][0]["unit_price"], 6000);
        assert_eq!(json["items"][0]["name"], "Game SKU-001");
        assert_eq!(json["estimated_total"], 12000);
    }

    #[tokio::test]
    async fn negative_delta_reduces_and_removes() {
        let app = TestApp::new();
        let user = UserId::new();
        let product = app.product("SKU-001", 1000, 10).await;

        app.send(add_to_cart(user, product, 3)).await;
        app.send(add_to_cart(user, product, -1)).await;
        let (_, json) = app.send(authed("GET", "/cart", user, None)).await;
        assert_eq!(json["items"][0]["quantity"], 2);

        app.send(add_to_cart(user, product, -5)).await;
        let (_, json) = app.send(authed("GET", "/cart", user, None)).await;
        assert!(json["items"].as_array().unwrap().is_empty());
        assert_eq!(json["estimated_total"], 0);
    }

    #[tokio::test]
    async fn zero_quantity_is_bad_request() {
        let app = TestApp::new();
        let product = app.product("SKU-001", 1000, 10).await;

        let (status, json) = app.send(add_to_cart(UserId::new(), product, 0)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("zero"));
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let app = TestApp::new();

        let (status, _) = app
            .send(authed(
                "POST",
                "/cart",
                UserId::new(),
                Some(serde_json::json!({ "product_id": "not-a-uuid", "quantity": 1 })),
            ))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let app = TestApp::new();

        let (status, _) = app
            .send(add_to_cart(UserId::new(), ProductId::new(), 1))
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn remove_line() {
        let app = TestApp::new();
        let user = UserId::new();
        let product = app.product("SKU-001", 1000, 10).await;
        app.send(add_to_cart(user, product, 1)).await;

        let uri = format!("/cart/{product}");
        let (status, json) = app.send(authed("DELETE", &uri, user, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["message"], "Item removed");

        let (status, _) = app.send(authed("DELETE", &uri, user, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn remove_with_invalid_id_is_bad_request() {
        let app = TestApp::new();

        let (status, _) = app
            .send(authed("DELETE", "/cart/42", UserId::new(), None))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn carts_are_per_user() {
        let app = TestApp::new();
        let alice = UserId::new();
        let product = app.product("SKU-001", 1000, 10).await;
        app.send(add_to_cart(alice, product, 1)).await;

        let (_, json) = app.send(authed("GET", "/cart", UserId::new(), None)).await;

        assert!(json["items"].as_array().unwrap().is_empty());
    }
}

mod checkout_flow {
    use super::*;

    #[tokio::test]
    async fn checkout_creates_order() {
        let app = TestApp::new();
        let user = UserId::new();
        let product = app.product("SKU-001", 6000, 10).await;
        app.send(add_to_cart(user, product, 2)).await;

        let (status, json) = app
            .send(authed("POST", "/cart/checkout", user, None))
            .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(json["message"], "Order placed successfully");
        assert_eq!(json["total_paid"], 12000);
        assert_eq!(app.store.stock(product).await, Some(8));
        assert_eq!(app.store.cart_len(user).await, 0);
        assert_eq!(app.notifications.jobs().len(), 1);

        let order_id = json["order_id"].as_str().unwrap();
        let (status, order) = app
            .send(authed("GET", &format!("/orders/{order_id}"), user, None))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["status"], "paid");
        assert_eq!(order["total"], 12000);
        assert_eq!(order["transaction_id"], "TXN-0001");
        assert_eq!(order["lines"][0]["quantity"], 2);
        assert_eq!(order["lines"][0]["unit_price"], 6000);
        assert_eq!(order["lines"][0]["total_price"], 12000);
    }

    #[tokio::test]
    async fn empty_cart_is_bad_request() {
        let app = TestApp::new();

        let (status, json) = app
            .send(authed("POST", "/cart/checkout", UserId::new(), None))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Cart is empty");
        assert_eq!(app.payment.call_count(), 0);
    }

    #[tokio::test]
    async fn out_of_stock_is_bad_request() {
        let app = TestApp::new();
        let user = UserId::new();
        let product = app.product("SKU-001", 1000, 0).await;
        app.send(add_to_cart(user, product, 1)).await;

        let (status, json) = app
            .send(authed("POST", "/cart/checkout", user, None))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("Insufficient stock"));
        assert_eq!(app.store.order_count().await, 0);
    }

    #[tokio::test]
    async fn oversized_total_is_bad_request() {
        let app = TestApp::new();
        let user = UserId::new();
        let product = app.product("SKU-001", 6000, 10).await;
        app.send(add_to_cart(user, product, 2_000_000_000_000_000))
            .await;

        let (_, cart) = app.send(authed("GET", "/cart", user, None)).await;
        assert!(cart["estimated_total"].is_null());

        let (status, json) = app
            .send(authed("POST", "/cart/checkout", user, None))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].as_str().unwrap().contains("Invalid amount"));
        assert_eq!(app.payment.call_count(), 0);
    }

    #[tokio::test]
    async fn declined_payment_is_bad_request() {
        let app = TestApp::new();
        let user = UserId::new();
        let product = app.product("SKU-001", 1000, 5).await;
        app.send(add_to_cart(user, product, 1)).await;
        app.payment.set_decline(Some("card declined"));

        let (status, json) = app
            .send(authed("POST", "/cart/checkout", user, None))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "Payment declined: card declined");
        assert_eq!(app.store.stock(product).await, Some(5));
        assert_eq!(app.store.cart_len(user).await, 1);
    }

    #[tokio::test]
    async fn unavailable_payment_is_server_error() {
        let app = TestApp::new();
        let user = UserId::new();
        let product = app.product("SKU-001", 1000, 5).await;
        app.send(add_to_cart(user, product, 1)).await;
        app.payment.set_unavailable(true);

        let (status, json) = app
            .send(authed("POST", "/cart/checkout", user, None))
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["error"], "payment service unavailable");
    }
}

mod orders {
    use super::*;

    #[tokio::test]
    async fn other_users_order_is_not_found() {
        let app = TestApp::new();
        let owner = UserId::new();
        let product = app.product("SKU-001", 1000, 5).await;
        app.send(add_to_cart(owner, product, 1)).await;
        let (_, json) = app
            .send(authed("POST", "/cart/checkout", owner, None))
            .await;
        let order_id = json["order_id"].as_str().unwrap().to_string();

        let (status, _) = app
            .send(authed(
                "GET",
                &format!("/orders/{order_id}"),
                UserId::new(),
                None,
            ))
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let app = TestApp::new();
        let uri = format!("/orders/{}", common::OrderId::new());

        let (status, _) = app.send(authed("GET", &uri, UserId::new(), None)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_order_id_is_bad_request() {
        let app = TestApp::new();

        let (status, _) = app
            .send(authed("GET", "/orders/abc", UserId::new(), None))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
