//! Integration tests for the API server.

use std::sync::OnceLock;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::UserId;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use store::InMemoryStore;
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

fn setup() -> axum::Router {
    let state = api::create_state(InMemoryStore::new());
    api::create_app(state, get_metrics_handle())
}

/// Caller identity attached to a request.
#[derive(Clone, Copy)]
enum As {
    Anonymous,
    User(UserId),
    Admin(UserId),
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    caller: As,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    match caller {
        As::Anonymous => {}
        As::User(id) => builder = builder.header("x-user-id", id.to_string()),
        As::Admin(id) => {
            builder = builder
                .header("x-user-id", id.to_string())
                .header("x-user-role", "admin")
        }
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
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_product(app: &axum::Router, name: &str, price: &str, stock: i64) -> String {
    let (status, json) = send(
        app,
        "POST",
        "/admin/products",
        As::Admin(UserId::new()),
        Some(json!({
            "name": name,
            "description": format!("{name} for API tests"),
            "price": price,
            "stock": stock,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{json}");
    json["id"].as_str().unwrap().to_string()
}

async fn place_order(app: &axum::Router, user: UserId, items: Value) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/orders",
        As::User(user),
        Some(json!({ "items": items })),
    )
    .await
}

#[tokio::test]
async fn test_health_check() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/health", As::Anonymous, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
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
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = setup();

    let (status, json) = send(&app, "GET", "/orders", As::Anonymous, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json["error"].as_str().unwrap().contains("x-user-id"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/products")
                .header("x-user-id", "not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

mod catalog {
    use super::*;

    #[tokio::test]
    async fn admin_creates_and_user_lists() {
        let app = setup();
        let id = create_product(&app, "Widget", "19.99", 5).await;

        let (status, json) = send(&app, "GET", "/products", As::User(UserId::new()), None).await;

        assert_eq!(status, StatusCode::OK);
        let products = json.as_array().unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0]["id"], id);
        assert_eq!(products[0]["price"], "19.99");
        assert_eq!(products[0]["stock"], 5);
    }

    #[tokio::test]
    async fn non_admin_cannot_manage_products() {
        let app = setup();

        let (status, _) = send(
            &app,
            "POST",
            "/admin/products",
            As::User(UserId::new()),
            Some(json!({
                "name": "Widget",
                "description": "A widget for testing",
                "price": "1.00",
                "stock": 1,
            })),
        )
        .await;

        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn invalid_product_reports_every_field() {
        let app = setup();

        let (status, json) = send(
            &app,
            "POST",
            "/admin/products",
            As::Admin(UserId::new()),
            Some(json!({
                "name": "ab",
                "description": "short",
                "price": "0",
                "stock": -1,
            })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        for field in ["name", "description", "price", "stock"] {
            assert!(json["details"][field].is_string(), "missing {field}: {json}");
        }
    }

    #[tokio::test]
    async fn oversized_price_is_rejected() {
        let app = setup();

        for price in ["10000000000", "10000000000000000000000000000"] {
            let (status, json) = send(
                &app,
                "POST",
                "/admin/products",
                As::Admin(UserId::new()),
                Some(json!({
                    "name": "Yacht",
                    "description": "Priced beyond what an order can hold",
                    "price": price,
                    "stock": 10,
                })),
            )
            .await;

            assert_eq!(status, StatusCode::BAD_REQUEST, "{json}");
            assert!(json["details"]["price"].is_string());
        }

        let (_, products) = send(&app, "GET", "/products", As::User(UserId::new()), None).await;
        assert!(products.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_name_conflicts() {
        let app = setup();
        create_product(&app, "Widget", "1.00", 1).await;

        let (status, _) = send(
            &app,
            "POST",
            "/admin/products",
            As::Admin(UserId::new()),
            Some(json!({
                "name": "Widget",
                "description": "Another widget entirely",
                "price": "2.00",
                "stock": 1,
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn update_get_and_delete() {
        let app = setup();
        let admin = As::Admin(UserId::new());
        let id = create_product(&app, "Widget", "1.00", 1).await;
        let uri = format!("/admin/products/{id}");

        let (status, json) = send(&app, "PUT", &uri, admin, Some(json!({ "stock": 7 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["stock"], 7);
        assert_eq!(json["name"], "Widget");

        let (status, json) = send(&app, "GET", &uri, admin, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["stock"], 7);

        let (status, _) = send(&app, "DELETE", &uri, admin, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, _) = send(&app, "GET", &uri, admin, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ordered_product_cannot_be_deleted() {
        let app = setup();
        let id = create_product(&app, "Widget", "1.00", 5).await;
        let (status, _) = place_order(
            &app,
            UserId::new(),
            json!([{ "product_id": id, "quantity": 1 }]),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(
            &app,
            "DELETE",
            &format!("/admin/products/{id}"),
            As::Admin(UserId::new()),
            None,
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
    }
}

mod orders {
    use super::*;

    #[tokio::test]
    async fn place_order_rounds_lines_and_totals() {
        let app = setup();
        let a = create_product(&app, "Product A", "10.00", 5).await;
        let b = create_product(&app, "Product B", "5.005", 5).await;

        let (status, json) = place_order(
            &app,
            UserId::new(),
            json!([
                { "product_id": a, "quantity": 2 },
                { "productId": b, "quantity": 1 },
            ]),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED, "{json}");
        assert_eq!(json["total"], "25.01");
        assert_eq!(json["status"], "PENDING");
        let prices: Vec<_> = json["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|item| item["price"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(prices, vec!["20.00", "5.01"]);

        let (_, products) = send(&app, "GET", "/products", As::User(UserId::new()), None).await;
        let stock_of = |id: &str| {
            products
                .as_array()
                .unwrap()
                .iter()
                .find(|p| p["id"] == id)
                .map(|p| p["stock"].as_i64().unwrap())
        };
        assert_eq!(stock_of(&a), Some(3));
        assert_eq!(stock_of(&b), Some(4));
    }

    #[tokio::test]
    async fn rejected_items_are_listed_by_product() {
        let app = setup();
        let a = create_product(&app, "Product A", "10.00", 1).await;
        let missing = UserId::new().to_string();

        let (status, json) = place_order(
            &app,
            UserId::new(),
            json!([
                { "product_id": a, "quantity": 2 },
                { "product_id": missing, "quantity": 1 },
            ]),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["details"][&a],
            "insufficient stock: requested 2, available 1"
        );
        assert_eq!(json["details"][&missing], "product not found");
    }

    #[tokio::test]
    async fn malformed_body_is_bad_request() {
        let app = setup();

        let (status, json) = place_order(&app, UserId::new(), json!("not a list")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["error"].is_string());

        let (status, _) = place_order(&app, UserId::new(), json!([])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn lists_only_callers_orders() {
        let app = setup();
        let a = create_product(&app, "Product A", "1.00", 10).await;
        let user = UserId::new();
        place_order(&app, user, json!([{ "product_id": a, "quantity": 1 }])).await;
        place_order(
            &app,
            UserId::new(),
            json!([{ "product_id": a, "quantity": 1 }]),
        )
        .await;

        let (status, json) = send(&app, "GET", "/orders", As::User(user), None).await;

        assert_eq!(status, StatusCode::OK);
        let orders = json.as_array().unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0]["user_id"], user.to_string());
        assert_eq!(orders[0]["items"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn owner_cancels_once() {
        let app = setup();
        let a = create_product(&app, "Product A", "1.00", 3).await;
        let user = UserId::new();
        let (_, placed) = place_order(&app, user, json!([{ "product_id": a, "quantity": 2 }])).await;
        let uri = format!("/orders/{}", placed["id"].as_str().unwrap());

        let (status, json) = send(&app, "PATCH", &uri, As::User(user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "CANCELLED");

        let (status, _) = send(&app, "PATCH", &uri, As::User(user), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, products) = send(&app, "GET", "/products", As::User(user), None).await;
        assert_eq!(products[0]["stock"], 3);
    }

    #[tokio::test]
    async fn other_users_order_is_not_found() {
        let app = setup();
        let a = create_product(&app, "Product A", "1.00", 3).await;
        let (_, placed) = place_order(
            &app,
            UserId::new(),
            json!([{ "product_id": a, "quantity": 1 }]),
        )
        .await;
        let uri = format!("/orders/{}", placed["id"].as_str().unwrap());

        let (status, _) = send(&app, "PATCH", &uri, As::User(UserId::new()), None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn admin_changes_status() {
        let app = setup();
        let a = create_product(&app, "Product A", "1.00", 3).await;
        let user = UserId::new();
        let (_, placed) = place_order(&app, user, json!([{ "product_id": a, "quantity": 1 }])).await;
        let uri = format!("/admin/orders/{}", placed["id"].as_str().unwrap());

        let (status, _) = send(
            &app,
            "PATCH",
            &uri,
            As::User(user),
            Some(json!({ "status": "COMPLETED" })),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(
            &app,
            "PATCH",
            &uri,
            As::Admin(UserId::new()),
            Some(json!({ "status": "shipped" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, json) = send(
            &app,
            "PATCH",
            &uri,
            As::Admin(UserId::new()),
            Some(json!({ "status": "completed" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "COMPLETED");

        let (status, _) = send(
            &app,
            "PATCH",
            "/admin/orders/00000000-0000-0000-0000-000000000000",
            As::Admin(UserId::new()),
            Some(json!({ "status": "CANCELLED" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
