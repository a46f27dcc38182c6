//! Read-through data cache.
//!
//! Entries are typed values keyed by [`CacheKey`] and labelled with
//! [`CacheTag`]s. Invalidation never deletes: it bumps the tag's epoch, and any
//! entry whose compute started before that epoch is treated as stale on the
//! next read. Capacity-bounded LRU eviction is the only removal.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use lru::LruCache;
use metrics::counter;
use tokio::time::Instant;
use tracing::debug;

use super::config::CacheConfig;
use super::events::Epoch;
use super::keys::{CacheKey, CacheTag};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_HIT: &str = "storefront_cache_hit_total";
pub(crate) const METRIC_MISS: &str = "storefront_cache_miss_total";
pub(crate) const METRIC_STORE: &str = "storefront_cache_store_total";
pub(crate) const METRIC_COMPUTE_ERROR: &str = "storefront_cache_compute_error_total";
pub(crate) const METRIC_EVICT: &str = "storefront_cache_evict_total";
pub(crate) const METRIC_INVALIDATE: &str = "storefront_cache_invalidate_total";

/// Failure surfaced by [`CacheStore::get_or_compute`].
#[derive(Debug)]
pub enum CacheError<E> {
    /// The compute closure failed; nothing was stored.
    Compute(E),
}

impl<E> CacheError<E> {
    pub fn into_inner(self) -> E {
        match self {
            Self::Compute(err) => err,
        }
    }
}

impl<E: fmt::Display> fmt::Display for CacheError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compute(err) => write!(f, "cache compute failed: {err}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CacheError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Compute(err) => Some(err),
        }
    }
}

/// Observable state of a single key, mainly for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Missing,
    Fresh,
    Expired,
    Invalidated,
}

struct StoredEntry {
    value: Arc<dyn Any + Send + Sync>,
    tags: Vec<CacheTag>,
    computed_at: Instant,
    ttl: Duration,
    epoch: Epoch,
}

impl StoredEntry {
    fn state(&self, now: Instant, tag_epochs: &HashMap<CacheTag, Epoch>) -> EntryState {
        let invalidated = self.tags.iter().any(|tag| {
            tag_epochs
                .get(tag)
                .is_some_and(|invalidated_at| *invalidated_at > self.epoch)
        });
        if invalidated {
            EntryState::Invalidated
        } else if now.saturating_duration_since(self.computed_at) >= self.ttl {
            EntryState::Expired
        } else {
            EntryState::Fresh
        }
    }
}

/// Process-wide read-through cache shared by `Arc`.
pub struct CacheStore {
    enabled: bool,
    entries: RwLock<LruCache<CacheKey, StoredEntry>>,
    tag_epochs: RwLock<HashMap<CacheTag, Epoch>>,
    epoch: AtomicU64,
}

impl CacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            enabled: config.enabled,
            entries: RwLock::new(LruCache::new(config.max_entries_non_zero())),
            tag_epochs: RwLock::new(HashMap::new()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Advance the shared epoch counter.
    pub fn next_epoch(&self) -> Epoch {
        self.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Return the cached value for `key`, or run `compute` and store its result.
    ///
    /// A `ttl_seconds` of zero, or a disabled store, computes on every call and
    /// stores nothing. Failed computes are never stored. Concurrent misses on
    /// the same key may each compute; the last one to finish wins.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: CacheKey,
        ttl_seconds: u64,
        tags: &[CacheTag],
        compute: F,
    ) -> Result<T, CacheError<E>>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.enabled || ttl_seconds == 0 {
            return compute().await.map_err(CacheError::Compute);
        }

        let family = key.family().to_string();
        if let Some(value) = self.lookup::<T>(&key) {
            counter!(METRIC_HIT, "family" => family).increment(1);
            return Ok(value);
        }
        counter!(METRIC_MISS, "family" => family.clone()).increment(1);

        let started = self.next_epoch();
        match compute().await {
            Ok(value) => {
                self.insert(key, value.clone(), ttl_seconds, tags, started);
                counter!(METRIC_STORE, "family" => family).increment(1);
                Ok(value)
            }
            Err(err) => {
                counter!(METRIC_COMPUTE_ERROR, "family" => family).increment(1);
                Err(CacheError::Compute(err))
            }
        }
    }

    fn lookup<T: Clone + 'static>(&self, key: &CacheKey) -> Option<T> {
        let mut entries = rw_write(&self.entries, SOURCE, "lookup");
        let entry = entries.get(key)?;
        let tag_epochs = rw_read(&self.tag_epochs, SOURCE, "lookup.tag_epochs");
        if entry.state(Instant::now(), &tag_epochs) != EntryState::Fresh {
            return None;
        }
        entry.value.downcast_ref::<T>().cloned()
    }

    fn insert<T: Send + Sync + 'static>(
        &self,
        key: CacheKey,
        value: T,
        ttl_seconds: u64,
        tags: &[CacheTag],
        started: Epoch,
    ) {
        let entry = StoredEntry {
            value: Arc::new(value),
            tags: tags.to_vec(),
            computed_at: Instant::now(),
            ttl: Duration::from_secs(ttl_seconds),
            epoch: started,
        };

        let evicted = rw_write(&self.entries, SOURCE, "insert")
            .push(key.clone(), entry)
            .filter(|(evicted_key, _)| *evicted_key != key);
        if let Some((evicted_key, _)) = evicted {
            debug!(key = %evicted_key, "Cache entry evicted");
            counter!(METRIC_EVICT).increment(1);
        }
    }

    /// Mark every entry carrying `tag` stale. Returns the invalidation epoch.
    pub fn invalidate_tag(&self, tag: &CacheTag) -> Epoch {
        let epoch = self.next_epoch();
        rw_write(&self.tag_epochs, SOURCE, "invalidate_tag").insert(tag.clone(), epoch);
        counter!(METRIC_INVALIDATE, "kind" => "tag").increment(1);
        epoch
    }

    /// Number of stored entries labelled with `tag`, stale or not.
    pub fn tagged_entries(&self, tag: &CacheTag) -> usize {
        rw_read(&self.entries, SOURCE, "tagged_entries")
            .iter()
            .filter(|(_, entry)| entry.tags.contains(tag))
            .count()
    }

    pub fn state(&self, key: &CacheKey) -> EntryState {
        let entries = rw_read(&self.entries, SOURCE, "state");
        let Some(entry) = entries.peek(key) else {
            return EntryState::Missing;
        };
        let tag_epochs = rw_read(&self.tag_epochs, SOURCE, "state.tag_epochs");
        entry.state(Instant::now(), &tag_epochs)
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::panic::{AssertUnwindSafe, catch_unwind};
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn store() -> CacheStore {
        CacheStore::new(&CacheConfig::default())
    }

    async fn counted(
        store: &CacheStore,
        calls: &AtomicUsize,
        key: CacheKey,
        ttl: u64,
        tags: &[CacheTag],
    ) -> usize {
        store
            .get_or_compute(key, ttl, tags, || async {
                Ok::<_, Infallible>(calls.fetch_add(1, Ordering::SeqCst) + 1)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fresh_entry_skips_compute() {
        let store = store();
        let calls = AtomicUsize::new(0);
        let tags = [CacheTag::products()];

        let first = counted(&store, &calls, CacheKey::product_stats(), 60, &tags).await;
        let second = counted(&store, &calls, CacheKey::product_stats(), 60, &tags).await;

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.state(&CacheKey::product_stats()), EntryState::Fresh);
    }

    #[tokio::test(start_paused = true)]
    async fn entry_expires_after_ttl() {
        let store = store();
        let calls = AtomicUsize::new(0);
        let key = CacheKey::new(["ttl-probe"]);

        counted(&store, &calls, key.clone(), 1, &[]).await;
        tokio::time::advance(Duration::from_millis(500)).await;
        counted(&store, &calls, key.clone(), 1, &[]).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(store.state(&key), EntryState::Expired);
        let value = counted(&store, &calls, key.clone(), 1, &[]).await;
        assert_eq!(value, 2);
        assert_eq!(store.state(&key), EntryState::Fresh);
    }

    #[tokio::test]
    async fn invalidating_a_tag_forces_recompute_only_for_tagged_entries() {
        let store = store();
        let calls = AtomicUsize::new(0);
        let tagged = CacheKey::new(["tagged"]);
        let untagged = CacheKey::new(["untagged"]);

        counted(&store, &calls, tagged.clone(), 60, &[CacheTag::homepage()]).await;
        counted(&store, &calls, untagged.clone(), 60, &[CacheTag::product_stats()]).await;

        store.invalidate_tag(&CacheTag::homepage());
        assert_eq!(store.state(&tagged), EntryState::Invalidated);
        assert_eq!(store.state(&untagged), EntryState::Fresh);

        let refreshed = counted(&store, &calls, tagged.clone(), 60, &[CacheTag::homepage()]).await;
        assert_eq!(refreshed, 3);
        assert_eq!(store.state(&tagged), EntryState::Fresh);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn repeated_invalidation_is_harmless() {
        let store = store();
        let calls = AtomicUsize::new(0);
        let key = CacheKey::new(["repeat"]);
        let tags = [CacheTag::products()];

        counted(&store, &calls, key.clone(), 60, &tags).await;
        store.invalidate_tag(&CacheTag::products());
        store.invalidate_tag(&CacheTag::products());
        counted(&store, &calls, key.clone(), 60, &tags).await;
        counted(&store, &calls, key.clone(), 60, &tags).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_ttl_passes_through() {
        let store = store();
        let calls = AtomicUsize::new(0);
        let key = CacheKey::new(["no-cache"]);

        counted(&store, &calls, key.clone(), 0, &[]).await;
        counted(&store, &calls, key.clone(), 0, &[]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.state(&key), EntryState::Missing);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn disabled_store_passes_through() {
        let store = CacheStore::new(&CacheConfig {
            enabled: false,
            ..Default::default()
        });
        let calls = AtomicUsize::new(0);

        counted(&store, &calls, CacheKey::product_stats(), 60, &[]).await;
        counted(&store, &calls, CacheKey::product_stats(), 60, &[]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!store.is_enabled());
    }

    #[tokio::test]
    async fn failed_compute_is_not_stored() {
        let store = store();
        let key = CacheKey::new(["flaky"]);

        let failed = store
            .get_or_compute(key.clone(), 60, &[], || async { Err::<u32, _>("boom") })
            .await;
        assert!(matches!(failed, Err(CacheError::Compute("boom"))));
        assert_eq!(store.state(&key), EntryState::Missing);

        let value = store
            .get_or_compute(key.clone(), 60, &[], || async { Ok::<_, &str>(7_u32) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn invalidation_during_compute_leaves_result_stale() {
        let store = store();
        let key = CacheKey::new(["racing"]);
        let tags = [CacheTag::products()];

        let value = store
            .get_or_compute(key.clone(), 60, &tags, || async {
                store.invalidate_tag(&CacheTag::products());
                Ok::<_, Infallible>("before write")
            })
            .await
            .unwrap();

        assert_eq!(value, "before write");
        assert_eq!(store.state(&key), EntryState::Invalidated);

        let next = store
            .get_or_compute(key.clone(), 60, &tags, || async {
                Ok::<_, Infallible>("after write")
            })
            .await
            .unwrap();
        assert_eq!(next, "after write");
    }

    #[tokio::test]
    async fn type_mismatch_is_a_miss() {
        let store = store();
        let key = CacheKey::new(["shape"]);

        store
            .get_or_compute(key.clone(), 60, &[], || async { Ok::<_, Infallible>(1_u32) })
            .await
            .unwrap();
        let text = store
            .get_or_compute(key.clone(), 60, &[], || async {
                Ok::<_, Infallible>("one".to_string())
            })
            .await
            .unwrap();

        assert_eq!(text, "one");
    }

    #[tokio::test]
    async fn capacity_evicts_least_recently_used() {
        let store = CacheStore::new(&CacheConfig {
            max_entries: 2,
            ..Default::default()
        });
        let calls = AtomicUsize::new(0);
        let a = CacheKey::new(["a"]);
        let b = CacheKey::new(["b"]);
        let c = CacheKey::new(["c"]);

        counted(&store, &calls, a.clone(), 60, &[]).await;
        counted(&store, &calls, b.clone(), 60, &[]).await;
        counted(&store, &calls, a.clone(), 60, &[]).await;
        counted(&store, &calls, c.clone(), 60, &[]).await;

        assert_eq!(store.len(), 2);
        assert_eq!(store.state(&b), EntryState::Missing);
        assert_eq!(store.state(&a), EntryState::Fresh);
    }

    #[tokio::test]
    async fn tagged_entries_counts_labels() {
        let store = store();
        let calls = AtomicUsize::new(0);
        let tags = [CacheTag::products(), CacheTag::category("vitamins")];

        counted(&store, &calls, CacheKey::new(["one"]), 60, &tags).await;
        counted(&store, &calls, CacheKey::new(["two"]), 60, &tags[..1]).await;

        assert_eq!(store.tagged_entries(&CacheTag::products()), 2);
        assert_eq!(store.tagged_entries(&CacheTag::category("vitamins")), 1);
        assert_eq!(store.tagged_entries(&CacheTag::homepage()), 0);
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let store = store();
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store.tag_epochs.write().unwrap();
            panic!("poison tag epochs");
        }));

        store.invalidate_tag(&CacheTag::products());
        assert_eq!(store.state(&CacheKey::product_stats()), EntryState::Missing);
    }
}
