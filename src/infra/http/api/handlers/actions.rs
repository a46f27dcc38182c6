//! Mutation endpoints. Every response body is an `ActionResult`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};

use crate::application::products::{CreateProductInput, UpdateProductInput};
use crate::domain::products::Product;
use crate::infra::http::AppState;

use crate::infra::http::api::error::ActionResponse;
use crate::infra::http::api::models::{PriceBatchRequest, StockAdjustmentRequest};

pub async fn create_product(
    State(state): State<AppState>,
    payload: Result<Json<CreateProductInput>, JsonRejection>,
) -> ActionResponse<Product> {
    const SOURCE: &str = "infra::http::api::create_product";
    match payload {
        Ok(Json(input)) => ActionResponse::new(SOURCE, state.actions.create_product(input).await),
        Err(rejection) => ActionResponse::rejected(SOURCE, &state.actions, &rejection),
    }
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateProductInput>, JsonRejection>,
) -> ActionResponse<Product> {
    const SOURCE: &str = "infra::http::api::update_product";
    match payload {
        Ok(Json(input)) => {
            ActionResponse::new(SOURCE, state.actions.update_product(&id, input).await)
        }
        Err(rejection) => ActionResponse::rejected(SOURCE, &state.actions, &rejection),
    }
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ActionResponse<Product> {
    ActionResponse::new(
        "infra::http::api::delete_product",
        state.actions.delete_product(&id).await,
    )
}

pub async fn update_product_stock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<StockAdjustmentRequest>, JsonRejection>,
) -> ActionResponse<Product> {
    const SOURCE: &str = "infra::http::api::update_product_stock";
    match payload {
        Ok(Json(request)) => ActionResponse::new(
            SOURCE,
            state.actions.update_product_stock(&id, request.delta).await,
        ),
        Err(rejection) => ActionResponse::rejected(SOURCE, &state.actions, &rejection),
    }
}

pub async fn bulk_update_prices(
    State(state): State<AppState>,
    payload: Result<Json<PriceBatchRequest>, JsonRejection>,
) -> ActionResponse<Vec<Product>> {
    const SOURCE: &str = "infra::http::api::bulk_update_prices";
    match payload {
        Ok(Json(request)) => ActionResponse::new(
            SOURCE,
            state.actions.bulk_update_prices(request.updates).await,
        ),
        Err(rejection) => ActionResponse::rejected(SOURCE, &state.actions, &rejection),
    }
}
