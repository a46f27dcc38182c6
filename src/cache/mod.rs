//! Storefront cache layer.
//!
//! - **Data cache** ([`CacheStore`]): read-through memoization of catalog
//!   queries, keyed by [`CacheKey`] and labelled with [`CacheTag`]s.
//! - **Render cache** ([`RenderCache`]): rendered public pages keyed by path.
//! - **Dispatcher** ([`Invalidator`]): turns a committed write into tag and
//!   path invalidations via an [`InvalidationPlan`].
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 1000
//! product_ttl_seconds = 3600
//! # ... see config.rs for all options
//! ```

mod config;
mod dispatcher;
mod events;
mod keys;
pub(crate) mod lock;
mod planner;
mod render;
mod store;

pub use config::CacheConfig;
pub use dispatcher::Invalidator;
pub use events::{Epoch, InvalidationEvent, InvalidationHistory, InvalidationTarget};
pub use keys::{CacheKey, CacheTag, PathScope, hash_query, hash_value, paths};
pub use planner::{InvalidationPlan, ProductChange};
pub use render::{
    CachedResponse, RENDER_CACHE_HEADER, RenderCache, RenderInvalidator, RenderKey,
    render_cache_layer,
};
pub use store::{CacheError, CacheStore, EntryState};

use std::sync::Arc;

/// The shared cache objects created once at startup.
#[derive(Clone)]
pub struct CacheLayer {
    pub config: CacheConfig,
    pub store: Arc<CacheStore>,
    pub render: Arc<RenderCache>,
    pub invalidator: Invalidator,
}

impl CacheLayer {
    pub fn new(config: CacheConfig) -> Self {
        let store = Arc::new(CacheStore::new(&config));
        let render = Arc::new(RenderCache::new(&config));
        let history = Arc::new(InvalidationHistory::new(config.history_limit_non_zero()));
        let invalidator = Invalidator::new(store.clone(), render.clone(), history);
        Self {
            config,
            store,
            render,
            invalidator,
        }
    }
}
