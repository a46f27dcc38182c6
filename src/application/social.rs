//! Social feed proxy with a degraded fallback.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::{
    application::report::{ErrorContext, ErrorSink},
    cache::{CacheKey, CacheStore, CacheTag},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default, alias = "imageUrl", alias = "media_url")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub permalink: Option<String>,
    #[serde(default, alias = "timestamp")]
    pub posted_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedSource {
    Upstream,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedResponse {
    pub success: bool,
    pub items: Vec<SocialPost>,
    pub source: FeedSource,
}

impl FeedResponse {
    pub fn fallback() -> Self {
        Self {
            success: true,
            items: Vec::new(),
            source: FeedSource::Fallback,
        }
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("social feed url is not configured")]
    NotConfigured,
    #[error("upstream request failed: {0}")]
    Request(String),
    #[error("upstream responded with status {0}")]
    Status(u16),
    #[error("upstream payload could not be decoded: {0}")]
    Decode(String),
}

#[async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_posts(&self) -> Result<Vec<SocialPost>, UpstreamError>;
}

#[derive(Clone)]
pub struct SocialFeedService {
    provider: Arc<dyn FeedProvider>,
    cache: Arc<CacheStore>,
    sink: Arc<dyn ErrorSink>,
    ttl_seconds: u64,
}

impl SocialFeedService {
    pub fn new(
        provider: Arc<dyn FeedProvider>,
        cache: Arc<CacheStore>,
        sink: Arc<dyn ErrorSink>,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            provider,
            cache,
            sink,
            ttl_seconds,
        }
    }

    /// Latest posts, or an empty fallback when the provider fails.
    #[instrument(skip(self))]
    pub async fn latest(&self) -> FeedResponse {
        let result = self
            .cache
            .get_or_compute(
                CacheKey::social_feed(),
                self.ttl_seconds,
                &[CacheTag::social_feed()],
                || self.provider.fetch_posts(),
            )
            .await;

        match result {
            Ok(items) => FeedResponse {
                success: true,
                items,
                source: FeedSource::Upstream,
            },
            Err(err) => {
                let err = err.into_inner();
                self.sink
                    .report(&err, &ErrorContext::warning("social::latest"));
                FeedResponse::fallback()
            }
        }
    }
}
