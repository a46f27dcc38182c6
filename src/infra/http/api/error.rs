use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::{ErrorReport, HttpError};
use crate::application::products::{ActionErrorKind, ActionResult, ProductActions};

pub fn status_for(result_kind: Option<ActionErrorKind>) -> StatusCode {
    match result_kind {
        None => StatusCode::OK,
        Some(ActionErrorKind::Validation) => StatusCode::BAD_REQUEST,
        Some(ActionErrorKind::NotFound) => StatusCode::NOT_FOUND,
        Some(ActionErrorKind::Conflict) => StatusCode::CONFLICT,
        Some(ActionErrorKind::Storage) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// An [`ActionResult`] body with the status its failure class maps to.
pub struct ActionResponse<T> {
    source: &'static str,
    result: ActionResult<T>,
}

impl<T> ActionResponse<T> {
    pub fn new(source: &'static str, result: ActionResult<T>) -> Self {
        Self { source, result }
    }

    /// A request body that could not be decoded is a validation failure,
    /// recorded by `actions` like any other failed action.
    pub fn rejected(
        source: &'static str,
        actions: &ProductActions,
        rejection: &JsonRejection,
    ) -> Self {
        Self::new(source, actions.reject(source, rejection.body_text()))
    }
}

impl<T: Serialize> IntoResponse for ActionResponse<T> {
    fn into_response(self) -> Response {
        let status = status_for(self.result.kind);
        let detail = self.result.error.clone();
        let mut response = (status, Json(self.result)).into_response();
        if let Some(detail) = detail {
            ErrorReport::from_message(self.source, status, detail).attach(&mut response);
        }
        response
    }
}

pub fn product_not_found(source: &'static str) -> HttpError {
    HttpError::new(
        source,
        StatusCode::NOT_FOUND,
        "Product not found",
        "product not found",
    )
}

pub fn invalid_product_id(source: &'static str, raw: &str) -> HttpError {
    HttpError::new(
        source,
        StatusCode::BAD_REQUEST,
        "Invalid product id",
        format!("invalid product id `{raw}`"),
    )
}
