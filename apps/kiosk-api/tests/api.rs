//! HTTP-level tests: the full router over an in-memory database, driven
//! with `tower::ServiceExt::oneshot`.

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use kiosk_api::auth::bootstrap_admin;
use kiosk_api::config::AppConfig;
use kiosk_api::{build_router, AppState};
use kiosk_db::{Database, DbConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "admin-pass-1";

async fn setup() -> Router {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let config = AppConfig::from_lookup(|key| match key {
        "JWT_SECRET" => Some("test-secret".to_string()),
        "ADMIN_PASSWORD" => Some(ADMIN_PASSWORD.to_string()),
        _ => None,
    })
    .unwrap();
    assert!(bootstrap_admin(&db, &config).await.unwrap());
    build_router(AppState::new(db, config))
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

/// Signs in and returns the `token=...` pair for the Cookie header.
async fn login(app: &Router, login: &str, password: &str) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "login": login, "password": password }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    set_cookie.split(';').next().unwrap().to_string()
}

async fn create_product(app: &Router, cookie: &str, name: &str, price: i64) -> String {
    let (status, body) = send(
        app,
        json_request(
            "POST",
            "/api/products",
            Some(cookie),
            json!({ "name": name, "price": price, "costPrice": price / 2 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["stock"], 0);
    body["id"].as_str().unwrap().to_string()
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_health_is_public() {
    let app = setup().await;
    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_login_sets_cookie_and_me_returns_user() {
    let app = setup().await;
    let cookie = login(&app, "ADMIN", ADMIN_PASSWORD).await;

    let (status, body) = send(&app, get("/api/auth/me", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "admin");
    assert_eq!(body["role"], "ADMIN");
}

#[tokio::test]
async fn test_wrong_password_is_unauthorized() {
    let app = setup().await;
    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "login": "admin", "password": "nope" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_protected_routes_need_a_session() {
    let app = setup().await;

    let (status, _) = send(&app, get("/api/products", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, get("/api/products", Some("token=garbage"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_staff_cannot_use_admin_routes() {
    let app = setup().await;
    let admin = login(&app, "admin", ADMIN_PASSWORD).await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/users",
            Some(&admin),
            json!({ "username": "cashier", "password": "cashier-pass", "role": "STAFF" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "STAFF");

    let staff = login(&app, "cashier", "cashier-pass").await;

    let (status, body) = send(
        &app,
        json_request("POST", "/api/categories", Some(&staff), json!({ "name": "Snacks" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    // Reads stay open to staff.
    let (status, _) = send(&app, get("/api/categories", Some(&staff))).await;
    assert_eq!(status, StatusCode::OK);
}

// =============================================================================
// Catalog
// =============================================================================

#[tokio::test]
async fn test_duplicate_category_conflicts() {
    let app = setup().await;
    let cookie = login(&app, "admin", ADMIN_PASSWORD).await;

    let request = || json_request("POST", "/api/categories", Some(&cookie), json!({ "name": "Drinks" }));
    let (status, _) = send(&app, request()).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, request()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_malformed_json_is_a_validation_error() {
    let app = setup().await;
    let cookie = login(&app, "admin", ADMIN_PASSWORD).await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/categories")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::COOKIE, &cookie)
        .body(Body::from("{\"name\": "))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_product_is_not_found() {
    let app = setup().await;
    let cookie = login(&app, "admin", ADMIN_PASSWORD).await;

    let (status, body) = send(&app, get("/api/products/missing", Some(&cookie))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

// =============================================================================
// Stock and sales
// =============================================================================

#[tokio::test]
async fn test_stock_in_then_sale_decrements_stock() {
    let app = setup().await;
    let cookie = login(&app, "admin", ADMIN_PASSWORD).await;
    let product_id = create_product(&app, &cookie, "Cola", 200).await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/stock/in",
            Some(&cookie),
            json!({ "productId": product_id, "quantity": 10, "unitPrice": 90 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 10);

    let (status, sale) = send(
        &app,
        json_request(
            "POST",
            "/api/sales",
            Some(&cookie),
            json!({
                "items": [{ "productId": product_id, "quantity": 3, "unitPrice": 200 }],
                "paymentMethod": "cash"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sale["total"], 600);

    let (_, product) = send(&app, get(&format!("/api/products/{}", product_id), Some(&cookie))).await;
    assert_eq!(product["stock"], 7);

    let sale_id = sale["id"].as_str().unwrap();
    let (status, detail) = send(&app, get(&format!("/api/sales/{}", sale_id), Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_overselling_is_rejected_without_changes() {
    let app = setup().await;
    let cookie = login(&app, "admin", ADMIN_PASSWORD).await;
    let product_id = create_product(&app, &cookie, "Water", 100).await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/sales",
            Some(&cookie),
            json!({
                "items": [{ "productId": product_id, "quantity": 1, "unitPrice": 100 }],
                "paymentMethod": "card"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");

    let (_, sales) = send(&app, get("/api/sales", Some(&cookie))).await;
    assert_eq!(sales["total"], 0);
}

#[tokio::test]
async fn test_oversized_amounts_are_validation_errors() {
    let app = setup().await;
    let cookie = login(&app, "admin", ADMIN_PASSWORD).await;
    let product_id = create_product(&app, &cookie, "Tea", 100).await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/products",
            Some(&cookie),
            json!({ "name": "Gold", "price": i64::MAX }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/api/sales",
            Some(&cookie),
            json!({
                "items": [{ "productId": product_id, "quantity": 2, "unitPrice": i64::MAX }],
                "paymentMethod": "cash"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

// =============================================================================
// Exports
// =============================================================================

#[tokio::test]
async fn test_sales_export_is_csv_attachment() {
    let app = setup().await;
    let cookie = login(&app, "admin", ADMIN_PASSWORD).await;
    let product_id = create_product(&app, &cookie, "Juice", 350).await;

    send(
        &app,
        json_request(
            "POST",
            "/api/stock/in",
            Some(&cookie),
            json!({ "productId": product_id, "quantity": 5 }),
        ),
    )
    .await;
    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/api/sales",
            Some(&cookie),
            json!({
                "items": [{ "productId": product_id, "quantity": 2, "unitPrice": 350 }],
                "paymentMethod": "cash"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(get("/api/sales/export.csv", Some(&cookie)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("sales.csv"));

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("sale_id,created_at,payment_method"));
    let row = lines.next().unwrap();
    assert!(row.contains("Juice"));
    assert!(row.contains("7.00"));
}
