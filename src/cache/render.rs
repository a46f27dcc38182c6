//! Rendered page cache.
//!
//! Stores successful GET responses for public pages keyed by path and query
//! hash. The dispatcher drops entries through [`RenderInvalidator`]: a `Page`
//! invalidation removes every query variant of one path, a `Layout`
//! invalidation also removes everything nested under it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use bytes::Bytes;
use http_body_util::BodyExt;
use lru::LruCache;
use metrics::counter;
use tracing::{debug, instrument, warn};

use super::config::CacheConfig;
use super::keys::{PathScope, hash_query};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::render";

pub(crate) const METRIC_RENDER_HIT: &str = "storefront_render_cache_hit_total";
pub(crate) const METRIC_RENDER_MISS: &str = "storefront_render_cache_miss_total";

pub const RENDER_CACHE_HEADER: &str = "x-render-cache";

/// Rendering layer seam used by the dispatcher.
pub trait RenderInvalidator: Send + Sync {
    /// Drop rendered output for `path` per `scope`. Returns how many stored
    /// responses were removed.
    fn invalidate_path(&self, path: &str, scope: PathScope) -> usize;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderKey {
    pub path: String,
    pub query_hash: u64,
}

impl RenderKey {
    pub fn new(path: impl Into<String>, query: &str) -> Self {
        Self {
            path: path.into(),
            query_hash: hash_query(query),
        }
    }
}

#[derive(Clone)]
pub struct CachedResponse {
    status: StatusCode,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl CachedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.append(name, value);
        }
        headers.insert(RENDER_CACHE_HEADER, HeaderValue::from_static("hit"));

        response
    }
}

pub struct RenderCache {
    enabled: bool,
    responses: RwLock<LruCache<RenderKey, CachedResponse>>,
    /// Bumped by every path invalidation; a render that started before the
    /// bump is not stored.
    generation: AtomicU64,
}

impl RenderCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.render_enabled,
            responses: RwLock::new(LruCache::new(config.render_max_entries_non_zero())),
            generation: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn get(&self, key: &RenderKey) -> Option<CachedResponse> {
        rw_write(&self.responses, SOURCE, "get").get(key).cloned()
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Stores `response` unless an invalidation ran since `generation` was read.
    fn put(&self, key: RenderKey, response: CachedResponse, generation: u64) -> bool {
        let mut responses = rw_write(&self.responses, SOURCE, "put");
        if self.generation() != generation {
            return false;
        }
        responses.put(key, response);
        true
    }

    pub fn contains_path(&self, path: &str) -> bool {
        rw_read(&self.responses, SOURCE, "contains_path")
            .iter()
            .any(|(key, _)| key.path == path)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.responses, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn path_matches(stored: &str, target: &str, scope: PathScope) -> bool {
    match scope {
        PathScope::Page => stored == target,
        PathScope::Layout => {
            let prefix = target.trim_end_matches('/');
            stored == target
                || prefix.is_empty()
                || stored
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
    }
}

impl RenderInvalidator for RenderCache {
    fn invalidate_path(&self, path: &str, scope: PathScope) -> usize {
        let mut responses = rw_write(&self.responses, SOURCE, "invalidate_path");
        self.generation.fetch_add(1, Ordering::SeqCst);
        let doomed: Vec<RenderKey> = responses
            .iter()
            .filter(|(key, _)| path_matches(&key.path, path, scope))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            responses.pop(key);
        }
        doomed.len()
    }
}

fn should_store_response(response: &Response) -> bool {
    response.status() == StatusCode::OK && !response.headers().contains_key(header::SET_COOKIE)
}

/// Serve public GET pages from the render cache, storing fresh 200 responses.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn render_cache_layer(
    State(cache): State<Arc<RenderCache>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.is_enabled() || request.method() != Method::GET {
        return next.run(request).await;
    }

    let key = RenderKey::new(
        request.uri().path(),
        request.uri().query().unwrap_or_default(),
    );

    if let Some(cached) = cache.get(&key) {
        debug!(cache = "render", outcome = "hit", "serving cached page");
        counter!(METRIC_RENDER_HIT).increment(1);
        return cached.into_response();
    }

    counter!(METRIC_RENDER_MISS).increment(1);
    let generation = cache.generation();
    let response = next.run(request).await;
    if !should_store_response(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    match BodyExt::collect(body).await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            let stored = cache.put(
                key,
                CachedResponse {
                    status: parts.status,
                    headers: parts
                        .headers
                        .iter()
                        .map(|(name, value)| (name.clone(), value.clone()))
                        .collect(),
                    body: bytes.clone(),
                },
                generation,
            );
            if !stored {
                debug!(cache = "render", "page invalidated while rendering, not stored");
            }
            parts
                .headers
                .insert(RENDER_CACHE_HEADER, HeaderValue::from_static("miss"));
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(error) => {
            warn!(error = %error, "failed to buffer rendered page");
            parts.status = StatusCode::INTERNAL_SERVER_ERROR;
            Response::from_parts(parts, Body::empty())
        }
    }
}
