use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use storefront::application::catalog::CatalogOptions;
use storefront::application::report::Severity;
use storefront::application::social::{FeedProvider, SocialPost, UpstreamError};
use storefront::cache::{CacheConfig, CacheLayer, RENDER_CACHE_HEADER};
use storefront::infra::http::{AppState, REQUEST_ID_HEADER, build_router};
use storefront::infra::memory::InMemoryProducts;
use storefront::infra::sink::MemorySink;

struct UnreachableFeed;

#[async_trait]
impl FeedProvider for UnreachableFeed {
    async fn fetch_posts(&self) -> Result<Vec<SocialPost>, UpstreamError> {
        Err(UpstreamError::Status(502))
    }
}

struct TestApp {
    router: Router,
    repo: Arc<InMemoryProducts>,
    sink: Arc<MemorySink>,
}

fn app() -> TestApp {
    let repo = Arc::new(InMemoryProducts::new());
    let sink = Arc::new(MemorySink::default());
    let cache = CacheLayer::new(CacheConfig::default());
    let state = AppState::assemble(
        repo.clone(),
        repo.clone(),
        Arc::new(UnreachableFeed),
        sink.clone(),
        &cache,
        CatalogOptions::from_cache(&cache.config),
        60,
    );
    TestApp {
        router: build_router(state),
        repo,
        sink,
    }
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes.to_vec())
}

async fn send_json(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, _, bytes) = send(router, method, uri, body).await;
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

async fn create(router: &Router, body: Value) -> Value {
    let (status, value) = send_json(router, Method::POST, "/api/v1/products", Some(body)).await;
    assert_eq!(status, StatusCode::OK, "create failed: {value}");
    value["data"].clone()
}

#[tokio::test]
async fn create_then_fetch_product() {
    let app = app();
    let product = create(
        &app.router,
        json!({"name": "Omega-3", "price": "15.00", "stock": 5, "category": "Fish Oil"}),
    )
    .await;
    assert_eq!(product["category"], "fish-oil");
    assert_eq!(product["price"], "15.00");

    let id = product["id"].as_str().unwrap();
    let (status, body) =
        send_json(&app.router, Method::GET, &format!("/api/v1/products/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Omega-3");
    assert_eq!(app.repo.len(), 1);
}

#[tokio::test]
async fn unknown_and_malformed_ids() {
    let app = app();
    let missing = uuid::Uuid::new_v4();
    let (status, _) = send_json(
        &app.router,
        Method::GET,
        &format!("/api/v1/products/{missing}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app.router, Method::GET, "/api/v1/products/nope", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn action_failures_map_to_statuses() {
    let app = app();
    let (status, body) = send_json(
        &app.router,
        Method::POST,
        "/api/v1/products",
        Some(json!({"price": 3})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false, "error": "name is required"}));

    let product = create(&app.router, json!({"name": "Zinc", "price": 4, "stock": 1})).await;
    let id = product["id"].as_str().unwrap();
    let (status, body) = send_json(
        &app.router,
        Method::POST,
        &format!("/api/v1/products/{id}/stock"),
        Some(json!({"delta": -2})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Insufficient stock");

    let (status, body) = send_json(
        &app.router,
        Method::POST,
        &format!("/api/v1/products/{id}/stock"),
        Some(json!({"delta": "3"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stock"], 4);
}

#[tokio::test]
async fn malformed_json_is_a_validation_failure() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/products")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["success"], false);

    let reported = app.sink.entries();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].endpoint, "infra::http::api::create_product");
    assert_eq!(reported[0].severity, Severity::Warning);
}

#[tokio::test]
async fn malformed_stock_delta_is_reported() {
    let app = app();
    let product = create(&app.router, json!({"name": "Zinc", "price": 4, "stock": 1})).await;
    let id = product["id"].as_str().unwrap();

    let (status, body) = send_json(
        &app.router,
        Method::POST,
        &format!("/api/v1/products/{id}/stock"),
        Some(json!({"delta": "abc"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let reported = app.sink.entries();
    assert_eq!(reported.len(), 1);
    assert_eq!(reported[0].endpoint, "actions::update_product_stock");
    assert_eq!(reported[0].severity, Severity::Warning);
    assert_eq!(reported[0].extra["delta"], "abc");
}

#[tokio::test]
async fn rendered_listing_is_dropped_after_a_create() {
    let app = app();
    create(&app.router, json!({"name": "Krill Oil", "price": "21.00"})).await;

    let (status, headers, _) = send(&app.router, Method::GET, "/products", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[RENDER_CACHE_HEADER], "miss");

    let (_, headers, _) = send(&app.router, Method::GET, "/products", None).await;
    assert_eq!(headers[RENDER_CACHE_HEADER], "hit");

    create(&app.router, json!({"name": "Cod Liver Oil", "price": "9.00"})).await;

    let (_, headers, body) = send(&app.router, Method::GET, "/products", None).await;
    assert_eq!(headers[RENDER_CACHE_HEADER], "miss");
    assert!(String::from_utf8(body).unwrap().contains("Cod Liver Oil"));
}

#[tokio::test]
async fn category_alias_redirects_to_canonical_path() {
    let app = app();
    let (status, headers, _) = send(&app.router, Method::GET, "/category/Fish%20Oil", None).await;
    assert_eq!(status, StatusCode::PERMANENT_REDIRECT);
    assert_eq!(headers[header::LOCATION], "/category/fish-oil");
}

#[tokio::test]
async fn product_id_aliases_redirect_to_canonical_path() {
    let app = app();
    let product = create(&app.router, json!({"name": "Omega-3", "price": "15.00", "stock": 5})).await;
    let id = product["id"].as_str().unwrap().to_string();
    let canonical = format!("/products/{id}");

    let simple = id.replace('-', "");
    for alias in [id.to_uppercase(), simple, format!("%7B{id}%7D")] {
        let (status, headers, _) =
            send(&app.router, Method::GET, &format!("/products/{alias}"), None).await;
        assert_eq!(status, StatusCode::PERMANENT_REDIRECT, "alias {alias}");
        assert_eq!(headers[header::LOCATION], canonical.as_str());
        assert!(!headers.contains_key(RENDER_CACHE_HEADER));
    }

    let (status, headers, _) = send(&app.router, Method::GET, &canonical, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[RENDER_CACHE_HEADER], "miss");
}

#[tokio::test]
async fn category_page_is_dropped_after_a_price_batch() {
    let app = app();
    let product = create(
        &app.router,
        json!({"name": "Vitamin C", "price": "15.00", "category": "vitamins"}),
    )
    .await;
    let id = product["id"].as_str().unwrap();

    let (status, headers, _) = send(&app.router, Method::GET, "/category/vitamins", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[RENDER_CACHE_HEADER], "miss");
    let (_, headers, _) = send(&app.router, Method::GET, "/category/vitamins", None).await;
    assert_eq!(headers[RENDER_CACHE_HEADER], "hit");

    let (status, _) = send_json(
        &app.router,
        Method::POST,
        "/api/v1/products/prices",
        Some(json!({"updates": [{"id": id, "price": "19.99"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, headers, body) = send(&app.router, Method::GET, "/category/vitamins", None).await;
    assert_eq!(headers[RENDER_CACHE_HEADER], "miss");
    assert!(String::from_utf8(body).unwrap().contains("19.99"));
}

#[tokio::test]
async fn health_reports_storage_state() {
    let app = app();
    let (status, headers, _) = send(&app.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(headers.contains_key(REQUEST_ID_HEADER));

    app.repo.fail_reads(true);
    let (status, _, _) = send(&app.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn social_feed_falls_back_when_upstream_fails() {
    let app = app();
    let (status, body) = send_json(&app.router, Method::GET, "/api/v1/social-feed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "items": [], "source": "fallback"}));
}

#[tokio::test]
async fn invalidation_log_lists_newest_first() {
    let app = app();
    create(&app.router, json!({"name": "Vitamin D", "price": 6})).await;

    let (status, body) =
        send_json(&app.router, Method::GET, "/api/v1/cache/invalidations?limit=2", None).await;
    assert_eq!(status, StatusCode::OK);
    let events = body.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0]["epoch"].as_u64() >= events[1]["epoch"].as_u64());
}
