//! Cached catalog reads.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use uuid::Uuid;

use crate::application::error::HttpError;
use crate::domain::products::{Product, ProductList, ProductStats, normalize_category};
use crate::infra::http::AppState;

use crate::infra::http::api::error::{invalid_product_id, product_not_found};
use crate::infra::http::api::models::ProductListQuery;

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<Json<ProductList>, HttpError> {
    let mut page = state.catalog.options().page(query.limit, query.offset);
    if let Some(category) = query.category.as_deref().filter(|c| !c.trim().is_empty()) {
        let category = normalize_category(category).map_err(|err| {
            HttpError::from_error(
                "infra::http::api::list_products",
                StatusCode::BAD_REQUEST,
                "Invalid category",
                &err,
            )
        })?;
        page = page.in_category(category);
    }

    let list = state.catalog.list_products(page).await?;
    Ok(Json(list))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Product>, HttpError> {
    const SOURCE: &str = "infra::http::api::get_product";
    let id = Uuid::parse_str(raw.trim()).map_err(|_| invalid_product_id(SOURCE, &raw))?;

    state
        .catalog
        .get_product(id)
        .await?
        .map(Json)
        .ok_or_else(|| product_not_found(SOURCE))
}

pub async fn product_stats(State(state): State<AppState>) -> Result<Json<ProductStats>, HttpError> {
    Ok(Json(state.catalog.stats().await?))
}

pub async fn homepage(State(state): State<AppState>) -> Result<Json<ProductList>, HttpError> {
    Ok(Json(state.catalog.homepage().await?))
}
