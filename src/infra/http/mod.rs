pub mod api;
mod middleware;
mod public;

pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use public::build_public_router;

use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::catalog::{CatalogOptions, CatalogService};
use crate::application::error::ErrorReport;
use crate::application::products::ProductActions;
use crate::application::report::ErrorSink;
use crate::application::repos::{ProductsRepo, ProductsWriteRepo, RepoError};
use crate::application::social::{FeedProvider, SocialFeedService};
use crate::cache::{CacheLayer, Invalidator, RenderCache};

/// Shared handles for every HTTP handler.
#[derive(Clone)]
pub struct AppState {
    pub catalog: CatalogService,
    pub actions: ProductActions,
    pub social: SocialFeedService,
    pub invalidator: Invalidator,
    pub render: Arc<RenderCache>,
}

impl AppState {
    /// Wire services around one shared cache layer.
    pub fn assemble(
        reader: Arc<dyn ProductsRepo>,
        writer: Arc<dyn ProductsWriteRepo>,
        feed: Arc<dyn FeedProvider>,
        sink: Arc<dyn ErrorSink>,
        cache: &CacheLayer,
        options: CatalogOptions,
        feed_ttl_seconds: u64,
    ) -> Self {
        Self {
            catalog: CatalogService::new(reader, cache.store.clone(), sink.clone(), options),
            actions: ProductActions::new(writer, cache.invalidator.clone(), sink.clone()),
            social: SocialFeedService::new(feed, cache.store.clone(), sink, feed_ttl_seconds),
            invalidator: cache.invalidator.clone(),
            render: cache.render.clone(),
        }
    }
}

/// Public pages and the JSON API, wrapped in request logging.
pub fn build_router(state: AppState) -> Router {
    let api = api::build_api_router(state.clone());
    public::build_public_router(state).merge(api)
}

fn health_response(result: Result<(), RepoError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
