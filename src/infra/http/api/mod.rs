pub mod error;
pub mod handlers;
pub mod models;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::infra::http::AppState;
use crate::infra::http::middleware::{log_responses, set_request_context};

pub fn build_api_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/products",
            get(handlers::list_products).post(handlers::create_product),
        )
        .route("/api/v1/products/stats", get(handlers::product_stats))
        .route("/api/v1/products/prices", post(handlers::bulk_update_prices))
        .route(
            "/api/v1/products/{id}",
            get(handlers::get_product)
                .patch(handlers::update_product)
                .delete(handlers::delete_product),
        )
        .route(
            "/api/v1/products/{id}/stock",
            post(handlers::update_product_stock),
        )
        .route("/api/v1/home", get(handlers::homepage))
        .route("/api/v1/social-feed", get(handlers::social_feed))
        .route(
            "/api/v1/cache/invalidations",
            get(handlers::recent_invalidations),
        )
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
