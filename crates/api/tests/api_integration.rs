//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{Money, ProductId, Role, UserId};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

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

const BUYER: i64 = 1;
const ADMIN: i64 = 90;

struct TestApp {
    app: axum::Router,
    state: Arc<api::InMemoryState>,
    handles: api::InMemoryHandles,
}

impl TestApp {
    async fn new() -> Self {
        let (state, handles) = api::create_default_state();
        handles
            .oracle
            .set_price(ProductId::new(10), Money::from_cents(500))
            .await;
        handles
            .oracle
            .set_price(ProductId::new(11), Money::from_cents(350))
            .await;
        handles
            .directory
            .add_user(UserId::new(BUYER), "buyer@example.com", Some("254700000001"), Role::Customer)
            .await;
        handles
            .directory
            .add_user(UserId::new(ADMIN), "admin@example.com", None, Role::Admin)
            .await;

        let app = api::create_app(state.clone(), get_metrics_handle());
        Self {
            app,
            state,
            handles,
        }
    }

    async fn send(
        &self,
        method: &str,
        uri: &str,
        caller: Option<(i64, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some((user_id, role)) = caller {
            builder = builder
                .header("x-user-id", user_id.to_string())
                .header("x-user-role", role);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    async fn add(&self, caller: (i64, &str), product_id: i64, quantity: i64) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/cart",
            Some(caller),
            Some(json!({ "product_id": product_id, "quantity": quantity })),
        )
        .await
    }
}

fn buyer() -> (i64, &'static str) {
    (BUYER, "customer")
}

fn admin() -> (i64, &'static str) {
    (ADMIN, "admin")
}

#[tokio::test]
async fn test_health_check() {
    let t = TestApp::new().await;
    let (status, json) = t.send("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let t = TestApp::new().await;

    let (status, json) = t.send("GET", "/cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].as_str().unwrap().contains("x-user-id"));

    let (status, _) = t.send("GET", "/cart", Some((BUYER, "superuser")), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_add_to_cart_uses_catalog_price() {
    let t = TestApp::new().await;

    let (status, json) = t.add(buyer(), 10, 2).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["quantity"], 2);
    assert_eq!(json["price"], "5.00");

    let (_, json) = t.add(buyer(), 10, 1).await;
    assert_eq!(json["quantity"], 3);
}

#[tokio::test]
async fn test_add_unknown_product_is_not_found() {
    let t = TestApp::new().await;
    let (status, json) = t.add(buyer(), 404, 1).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_add_zero_quantity_is_bad_request() {
    let t = TestApp::new().await;
    let (status, _) = t.add(buyer(), 10, 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_oversized_quantity_is_bad_request() {
    let t = TestApp::new().await;
    let (status, json) = t.add(buyer(), 10, 40_000_000_000_000_000).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].is_string());

    let (_, cart) = t.send("GET", "/cart", Some(buyer()), None).await;
    assert!(cart.as_array().unwrap().is_empty());

    let (status, _) = t.send("POST", "/orders", Some(buyer()), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(t.handles.ledger.order_count().await, 0);
}

#[tokio::test]
async fn test_view_cart_scoped_by_role() {
    let t = TestApp::new().await;
    t.add(buyer(), 10, 1).await;
    t.add((2, "customer"), 11, 1).await;

    let (status, json) = t.send("GET", "/cart", Some(buyer()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json.as_array().unwrap().len(), 1);

    let (_, json) = t.send("GET", "/cart", Some(admin()), None).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_update_and_remove_cart_line() {
    let t = TestApp::new().await;
    t.add(buyer(), 10, 1).await;

    let (status, json) = t
        .send("PUT", "/cart/10", Some(buyer()), Some(json!({ "quantity": 5 })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["quantity"], 5);

    let (status, _) = t
        .send("PUT", "/cart/11", Some(buyer()), Some(json!({ "quantity": 5 })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = t.send("DELETE", "/cart/10", Some(buyer()), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = t.send("DELETE", "/cart/10", Some(buyer()), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = t.send("GET", "/cart", Some(buyer()), None).await;
    assert!(json.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_checkout_end_to_end() {
    let t = TestApp::new().await;
    t.add(buyer(), 10, 2).await;
    t.add(buyer(), 11, 1).await;

    let (status, json) = t
        .send("POST", "/orders", Some(buyer()), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["total"], "13.50");
    assert_eq!(json["status"], "Pending");
    let order_id = json["order_id"].as_i64().unwrap();

    let (_, cart) = t.send("GET", "/cart", Some(buyer()), None).await;
    assert!(cart.as_array().unwrap().is_empty());

    let (status, orders) = t.send("GET", "/orders", Some(buyer()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders[0]["id"], order_id);
    assert_eq!(orders[0]["items"].as_array().unwrap().len(), 2);

    t.state.fanout.shutdown().await;
    let published = t.handles.publisher.published().await;
    assert_eq!(published.len(), 2);
    assert!(published.iter().any(|i| i.kind == "sms" && i.to == "254700000001"));
    assert!(published.iter().any(|i| i.kind == "email" && i.to == "admin@example.com"));
}

#[tokio::test]
async fn test_checkout_without_body() {
    let t = TestApp::new().await;
    t.add(buyer(), 10, 1).await;

    let (status, json) = t.send("POST", "/orders", Some(buyer()), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["total"], "5.00");
    assert_eq!(t.handles.ledger.order_count().await, 1);
}

#[tokio::test]
async fn test_checkout_empty_cart_is_bad_request() {
    let t = TestApp::new().await;

    let (status, json) = t
        .send("POST", "/orders", Some(buyer()), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "cart is empty");
    assert_eq!(t.handles.ledger.order_count().await, 0);
}

#[tokio::test]
async fn test_admin_checks_out_for_customer() {
    let t = TestApp::new().await;
    t.add(buyer(), 10, 1).await;

    let (status, json) = t
        .send("POST", "/orders", Some(admin()), Some(json!({ "user_id": BUYER })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["total"], "5.00");

    let (_, orders) = t
        .send("GET", &format!("/orders?user_id={BUYER}"), Some(admin()), None)
        .await;
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_order_permissions() {
    let t = TestApp::new().await;
    t.add(buyer(), 10, 1).await;
    let (_, json) = t
        .send("POST", "/orders", Some(buyer()), Some(json!({})))
        .await;
    let uri = format!("/orders/{}", json["order_id"]);

    let (status, _) = t.send("DELETE", &uri, Some((2, "customer")), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = t.send("DELETE", &uri, Some(admin()), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t.send("DELETE", &uri, Some(admin()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let t = TestApp::new().await;
    t.add(buyer(), 10, 1).await;

    let (status, _) = t.send("GET", "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
