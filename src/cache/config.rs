//! Cache configuration.
//!
//! Controls the read-through data cache and the rendered page cache via the
//! `[cache]` table of `storefront.toml`.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_MAX_ENTRIES: usize = 1000;
const DEFAULT_HISTORY_LIMIT: usize = 200;
const DEFAULT_PRODUCT_TTL_SECONDS: u64 = 3600;
const DEFAULT_LISTING_TTL_SECONDS: u64 = 300;
const DEFAULT_HOMEPAGE_TTL_SECONDS: u64 = 300;
const DEFAULT_STATS_TTL_SECONDS: u64 = 600;
const DEFAULT_RENDER_MAX_ENTRIES: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the read-through data cache. When off every read computes.
    pub enabled: bool,
    /// Maximum entries held by the data cache before LRU eviction.
    pub max_entries: usize,
    /// Number of applied invalidations kept for inspection.
    pub history_limit: usize,
    pub product_ttl_seconds: u64,
    pub listing_ttl_seconds: u64,
    pub homepage_ttl_seconds: u64,
    pub stats_ttl_seconds: u64,
    /// Enable the rendered page cache.
    pub render_enabled: bool,
    pub render_max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: DEFAULT_MAX_ENTRIES,
            history_limit: DEFAULT_HISTORY_LIMIT,
            product_ttl_seconds: DEFAULT_PRODUCT_TTL_SECONDS,
            listing_ttl_seconds: DEFAULT_LISTING_TTL_SECONDS,
            homepage_ttl_seconds: DEFAULT_HOMEPAGE_TTL_SECONDS,
            stats_ttl_seconds: DEFAULT_STATS_TTL_SECONDS,
            render_enabled: true,
            render_max_entries: DEFAULT_RENDER_MAX_ENTRIES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            max_entries: settings.max_entries,
            history_limit: settings.history_limit,
            product_ttl_seconds: settings.product_ttl_seconds,
            listing_ttl_seconds: settings.listing_ttl_seconds,
            homepage_ttl_seconds: settings.homepage_ttl_seconds,
            stats_ttl_seconds: settings.stats_ttl_seconds,
            render_enabled: settings.render_enabled,
            render_max_entries: settings.render_max_entries,
        }
    }
}

impl CacheConfig {
    /// Returns the data cache capacity, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the render cache capacity, clamping to 1 if zero.
    pub fn render_max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.render_max_entries).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the history capacity, clamping to 1 if zero.
    pub fn history_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.history_limit).unwrap_or(NonZeroUsize::MIN)
    }
}
