use axum::Json;
use axum::extract::{Query, State};

use crate::application::social::FeedResponse;
use crate::cache::InvalidationEvent;
use crate::infra::http::AppState;

use crate::infra::http::api::models::InvalidationQuery;

pub async fn social_feed(State(state): State<AppState>) -> Json<FeedResponse> {
    Json(state.social.latest().await)
}

/// Most recent invalidations, newest first.
pub async fn recent_invalidations(
    State(state): State<AppState>,
    Query(query): Query<InvalidationQuery>,
) -> Json<Vec<InvalidationEvent>> {
    Json(state.invalidator.history().recent(query.limit()))
}
