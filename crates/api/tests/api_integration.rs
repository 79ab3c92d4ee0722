//! Integration tests for the API server.

use std::sync::OnceLock;

use api::Config;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::ExternalId;
use domain::StatusPolicy;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
use tower::ServiceExt;

const ADMIN_EXTERNAL_ID: i64 = 1;

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

fn setup() -> axum::Router {
    let config = Config {
        admin_external_ids: vec![ExternalId::new(ADMIN_EXTERNAL_ID)],
        ..Config::default()
    };
    let state = api::create_state(InMemoryStore::new(), &config);
    api::create_app(state, get_metrics_handle())
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    user_id: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user_id) = user_id {
        builder = builder.header("x-user-id", user_id);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn upsert_user(app: &axum::Router, external_id: i64) -> String {
    let (status, user) = send(
        app,
        "POST",
        "/users",
        None,
        Some(json!({
            "external_id": external_id,
            "username": format!("user{external_id}"),
            "full_name": null
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    user["id"].as_str().unwrap().to_string()
}

/// Creates a category and a product as admin; returns (admin id, product id).
async fn seed_catalog(app: &axum::Router, price_cents: i64, quantity: u32) -> (String, String) {
    let admin = upsert_user(app, ADMIN_EXTERNAL_ID).await;

    let (status, category) = send(
        app,
        "POST",
        "/categories",
        Some(admin.as_str()),
        Some(json!({ "name": "Electronics" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, product) = send(
        app,
        "POST",
        "/products",
        Some(admin.as_str()),
        Some(json!({
            "name": "Laptop",
            "description": "Gaming laptop",
            "price_cents": price_cents,
            "quantity": quantity,
            "category_id": category["id"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (admin, product["id"].as_str().unwrap().to_string())
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_upsert_user_is_idempotent() {
    let app = setup();

    let first = upsert_user(&app, 42).await;
    let second = upsert_user(&app, 42).await;

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_bootstrap_admin_flag() {
    let app = setup();

    let (_, admin) = send(
        &app,
        "POST",
        "/users",
        None,
        Some(json!({ "external_id": ADMIN_EXTERNAL_ID })),
    )
    .await;
    let (_, regular) = send(
        &app,
        "POST",
        "/users",
        None,
        Some(json!({ "external_id": 2, "full_name": "Jane Doe" })),
    )
    .await;

    assert_eq!(admin["is_admin"], true);
    assert_eq!(regular["is_admin"], false);
    assert_eq!(regular["display_name"], "Jane Doe");
}

#[tokio::test]
async fn test_upsert_requires_frontend_token_when_configured() {
    let config = Config {
        admin_external_ids: vec![ExternalId::new(ADMIN_EXTERNAL_ID)],
        frontend_token: Some("s3cret".to_string()),
        ..Config::default()
    };
    let app = api::create_app(
        api::create_state(InMemoryStore::new(), &config),
        get_metrics_handle(),
    );
    let upsert = |token: Option<&str>| {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/users")
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("x-frontend-token", token);
        }
        builder
            .body(Body::from(
                json!({ "external_id": ADMIN_EXTERNAL_ID }).to_string(),
            ))
            .unwrap()
    };

    let response = app.clone().oneshot(upsert(None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.clone().oneshot(upsert(Some("guess"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.clone().oneshot(upsert(Some("s3cret"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_catalog_mutation_requires_admin() {
    let app = setup();
    let buyer = upsert_user(&app, 2).await;

    let (status, json) = send(
        &app,
        "POST",
        "/categories",
        Some(buyer.as_str()),
        Some(json!({ "name": "Books" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(json["error"].as_str().is_some());
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = setup();

    let (status, _) = send(&app, "GET", "/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let unknown = common::UserId::new().to_string();
    let (status, _) = send(&app, "GET", "/orders", Some(unknown.as_str()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_duplicate_category_is_bad_request() {
    let app = setup();
    let (admin, _) = seed_catalog(&app, 1000, 1).await;

    let (status, _) = send(
        &app,
        "POST",
        "/categories",
        Some(admin.as_str()),
        Some(json!({ "name": "Electronics" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_purchase_and_view_order() {
    let app = setup();
    let (_, product_id) = seed_catalog(&app, 10_000, 5).await;
    let buyer = upsert_user(&app, 2).await;

    let (status, purchase) = send(
        &app,
        "POST",
        "/purchases",
        Some(buyer.as_str()),
        Some(json!({ "product_id": product_id, "quantity": 2 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(purchase["unit_price_cents"], 10_000);
    assert_eq!(purchase["total_cents"], 20_000);
    assert_eq!(purchase["remaining_stock"], 3);
    assert_eq!(purchase["status"], "pending");

    let order_id = purchase["order_id"].as_str().unwrap();
    let (status, order) = send(
        &app,
        "GET",
        &format!("/orders/{order_id}"),
        Some(buyer.as_str()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["total_cents"], 20_000);
    assert_eq!(order["total"], "200.00");
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
    assert_eq!(order["total_quantity"], 2);

    let (status, orders) = send(&app, "GET", "/orders", Some(buyer.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_insufficient_stock_is_conflict() {
    let app = setup();
    let (_, product_id) = seed_catalog(&app, 10_000, 3).await;
    let buyer = upsert_user(&app, 2).await;

    let (status, json) = send(
        &app,
        "POST",
        "/purchases",
        Some(buyer.as_str()),
        Some(json!({ "product_id": product_id, "quantity": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json["error"].as_str().unwrap().contains("Insufficient stock"));

    let (_, orders) = send(&app, "GET", "/orders", Some(buyer.as_str()), None).await;
    assert!(orders.as_array().unwrap().is_empty());

    let (_, product) = send(&app, "GET", &format!("/products/{product_id}"), None, None).await;
    assert_eq!(product["quantity"], 3);
}

#[tokio::test]
async fn test_other_users_order_is_forbidden() {
    let app = setup();
    let (_, product_id) = seed_catalog(&app, 500, 5).await;
    let buyer = upsert_user(&app, 2).await;
    let stranger = upsert_user(&app, 3).await;

    let (_, purchase) = send(
        &app,
        "POST",
        "/purchases",
        Some(buyer.as_str()),
        Some(json!({ "product_id": product_id, "quantity": 1 })),
    )
    .await;
    let order_id = purchase["order_id"].as_str().unwrap();

    let (status, _) = send(
        &app,
        "GET",
        &format!("/orders/{order_id}"),
        Some(stranger.as_str()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_get_nonexistent_order() {
    let app = setup();
    let buyer = upsert_user(&app, 2).await;
    let missing = common::OrderId::new();

    let (status, _) = send(
        &app,
        "GET",
        &format!("/orders/{missing}"),
        Some(buyer.as_str()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_order_id_format() {
    let app = setup();
    let buyer = upsert_user(&app, 2).await;

    let (status, _) = send(&app, "GET", "/orders/not-a-uuid", Some(buyer.as_str()), None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_price_change_keeps_order_total() {
    let app = setup();
    let (admin, product_id) = seed_catalog(&app, 10_000, 5).await;
    let buyer = upsert_user(&app, 2).await;

    let (_, purchase) = send(
        &app,
        "POST",
        "/purchases",
        Some(buyer.as_str()),
        Some(json!({ "product_id": product_id, "quantity": 2 })),
    )
    .await;

    let (status, product) = send(
        &app,
        "PATCH",
        &format!("/products/{product_id}"),
        Some(admin.as_str()),
        Some(json!({ "price_cents": 15_000 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(product["price_cents"], 15_000);
    assert_eq!(product["name"], "Laptop");

    let order_id = purchase["order_id"].as_str().unwrap();
    let (_, order) = send(
        &app,
        "GET",
        &format!("/orders/{order_id}"),
        Some(buyer.as_str()),
        None,
    )
    .await;
    assert_eq!(order["total_cents"], 20_000);
}

async fn purchase_one(app: &axum::Router, buyer: &str, product_id: &str) -> String {
    let (_, purchase) = send(
        app,
        "POST",
        "/purchases",
        Some(buyer),
        Some(json!({ "product_id": product_id, "quantity": 1 })),
    )
    .await;
    purchase["order_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_status_overwrite() {
    let app = setup();
    let (admin, product_id) = seed_catalog(&app, 100, 5).await;
    let buyer = upsert_user(&app, 2).await;
    let order_id = purchase_one(&app, &buyer, &product_id).await;
    let uri = format!("/orders/{order_id}/status");

    let (status, _) = send(&app, "POST", &uri, Some(buyer.as_str()), Some(json!({ "status": "paid" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "POST", &uri, Some(admin.as_str()), Some(json!({ "status": "shipped" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    for next in ["paid", "paid", "cancelled", "pending"] {
        let (status, order) = send(&app, "POST", &uri, Some(admin.as_str()), Some(json!({ "status": next }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["status"], next);
    }

    let missing = format!("/orders/{}/status", common::OrderId::new());
    let (status, _) = send(&app, "POST", &missing, Some(admin.as_str()), Some(json!({ "status": "paid" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_transition_table() {
    let config = Config {
        admin_external_ids: vec![ExternalId::new(ADMIN_EXTERNAL_ID)],
        order_status_policy: StatusPolicy::TransitionTable,
        ..Config::default()
    };
    let app = api::create_app(
        api::create_state(InMemoryStore::new(), &config),
        get_metrics_handle(),
    );
    let (admin, product_id) = seed_catalog(&app, 100, 5).await;
    let buyer = upsert_user(&app, 2).await;
    let order_id = purchase_one(&app, &buyer, &product_id).await;
    let uri = format!("/orders/{order_id}/status");

    let (status, order) = send(&app, "POST", &uri, Some(admin.as_str()), Some(json!({ "status": "paid" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "paid");

    let (status, _) = send(&app, "POST", &uri, Some(admin.as_str()), Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_product_on_order_cannot_be_deleted() {
    let app = setup();
    let (admin, product_id) = seed_catalog(&app, 100, 5).await;
    let buyer = upsert_user(&app, 2).await;
    send(
        &app,
        "POST",
        "/purchases",
        Some(buyer.as_str()),
        Some(json!({ "product_id": product_id, "quantity": 1 })),
    )
    .await;

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/products/{product_id}"),
        Some(admin.as_str()),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_products_by_category() {
    let app = setup();
    let (_, product_id) = seed_catalog(&app, 100, 5).await;

    let (status, categories) = send(&app, "GET", "/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let category_id = categories[0]["id"].as_str().unwrap();

    let (status, products) = send(
        &app,
        "GET",
        &format!("/products?category_id={category_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(products[0]["id"], product_id);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}
