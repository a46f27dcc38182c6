//! HTTP client for the social feed upstream.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::application::social::{FeedProvider, SocialPost, UpstreamError};

use super::error::InfraError;

#[derive(Deserialize)]
#[serde(untagged)]
enum FeedPayload {
    Bare(Vec<SocialPost>),
    Items { items: Vec<SocialPost> },
    Data { data: Vec<SocialPost> },
}

impl FeedPayload {
    fn into_posts(self) -> Vec<SocialPost> {
        match self {
            Self::Bare(posts) | Self::Items { items: posts } | Self::Data { data: posts } => posts,
        }
    }
}

pub(crate) fn decode_posts(body: &[u8]) -> Result<Vec<SocialPost>, UpstreamError> {
    serde_json::from_slice::<FeedPayload>(body)
        .map(FeedPayload::into_posts)
        .map_err(|err| UpstreamError::Decode(err.to_string()))
}

pub struct HttpFeedProvider {
    client: Client,
    url: Option<String>,
}

impl HttpFeedProvider {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::http_client(err.to_string()))?;
        Ok(Self { client, url })
    }

    pub fn user_agent() -> &'static str {
        concat!("storefront/", env!("CARGO_PKG_VERSION"))
    }
}

#[async_trait]
impl FeedProvider for HttpFeedProvider {
    async fn fetch_posts(&self) -> Result<Vec<SocialPost>, UpstreamError> {
        let url = self.url.as_deref().ok_or(UpstreamError::NotConfigured)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| UpstreamError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| UpstreamError::Request(err.to_string()))?;
        let posts = decode_posts(&body)?;
        debug!(count = posts.len(), "Fetched social feed");
        Ok(posts)
    }
}
