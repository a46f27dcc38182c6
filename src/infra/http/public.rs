use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::get,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    cache::{paths, render_cache_layer},
    domain::products::normalize_category,
    presentation::views::{
        HomeTemplate, ListingTemplate, ListingView, ProductCardView, ProductTemplate,
        render_not_found_response, render_template_response, render_unavailable_response,
    },
};

use super::{
    AppState, health_response,
    middleware::{log_responses, set_request_context},
};

pub fn build_public_router(state: AppState) -> Router {
    // Rendered pages; their paths are the ones the dispatcher invalidates.
    let cached_routes = Router::new()
        .route(paths::HOME, get(index))
        .route(paths::PRODUCTS, get(products_index))
        .route("/products/{id}", get(product_detail))
        .route("/category/{category}", get(category_index))
        .layer(middleware::from_fn_with_state(
            state.render.clone(),
            render_cache_layer,
        ));

    let uncached_routes = Router::new().route("/health", get(health));

    cached_routes
        .merge(uncached_routes)
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    limit: Option<u32>,
    offset: Option<u32>,
}

async fn index(State(state): State<AppState>) -> Response {
    match state.catalog.homepage().await {
        Ok(list) => render_template_response(
            HomeTemplate {
                products: list.items.iter().map(ProductCardView::from).collect(),
            },
            StatusCode::OK,
        ),
        Err(err) => render_unavailable_response("infra::http::public::index", &err),
    }
}

async fn products_index(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Response {
    let page = state.catalog.options().page(query.limit, query.offset);
    let (limit, offset) = (page.limit, page.offset);

    match state.catalog.list_products(page).await {
        Ok(list) => render_template_response(
            ListingTemplate {
                view: ListingView::new("All products", paths::PRODUCTS, &list, limit, offset),
            },
            StatusCode::OK,
        ),
        Err(err) => render_unavailable_response("infra::http::public::products_index", &err),
    }
}

async fn product_detail(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let Ok(id) = Uuid::parse_str(&raw) else {
        return render_not_found_response();
    };
    // Uppercase, simple, braced and urn forms all parse to the same id.
    if raw != id.to_string() {
        return Redirect::permanent(&paths::product(id)).into_response();
    }

    match state.catalog.get_product(id).await {
        Ok(Some(product)) => render_template_response(
            ProductTemplate {
                product: (&product).into(),
            },
            StatusCode::OK,
        ),
        Ok(None) => render_not_found_response(),
        Err(err) => render_unavailable_response("infra::http::public::product_detail", &err),
    }
}

async fn category_index(
    State(state): State<AppState>,
    Path(raw): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let Ok(category) = normalize_category(&raw) else {
        return render_not_found_response();
    };
    // Only the canonical path is ever invalidated, so never cache an alias.
    if category != raw {
        return Redirect::permanent(&paths::category(&category)).into_response();
    }

    let page = state.catalog.options().page(query.limit, query.offset);
    let (limit, offset) = (page.limit, page.offset);

    match state
        .catalog
        .list_by_category(&category, Some(limit), Some(offset))
        .await
    {
        Ok(list) => render_template_response(
            ListingTemplate {
                view: ListingView::new(
                    category.as_str(),
                    paths::category(&category),
                    &list,
                    limit,
                    offset,
                ),
            },
            StatusCode::OK,
        ),
        Err(err) => render_unavailable_response("infra::http::public::category_index", &err),
    }
}

async fn health(State(state): State<AppState>) -> Response {
    health_response(state.catalog.health_check().await)
}
