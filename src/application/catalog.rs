//! Cached catalog reads.

use std::sync::Arc;

use serde_json::{Value, json};
use thiserror::Error;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    application::{
        report::{ErrorContext, ErrorSink},
        repos::{ProductQuery, ProductsRepo, RepoError},
    },
    cache::{CacheConfig, CacheError, CacheKey, CacheStore, CacheTag},
    domain::products::{Product, ProductList, ProductStats},
};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_HOMEPAGE_SIZE: u32 = 8;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog storage failure")]
    Storage(#[source] RepoError),
}

/// TTLs and page sizes applied to cached reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogOptions {
    pub product_ttl_seconds: u64,
    pub listing_ttl_seconds: u64,
    pub homepage_ttl_seconds: u64,
    pub stats_ttl_seconds: u64,
    pub page_size: u32,
    pub max_page_size: u32,
    pub homepage_size: u32,
}

impl CatalogOptions {
    pub fn from_cache(cache: &CacheConfig) -> Self {
        Self {
            product_ttl_seconds: cache.product_ttl_seconds,
            listing_ttl_seconds: cache.listing_ttl_seconds,
            homepage_ttl_seconds: cache.homepage_ttl_seconds,
            stats_ttl_seconds: cache.stats_ttl_seconds,
            page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            homepage_size: DEFAULT_HOMEPAGE_SIZE,
        }
    }

    pub fn with_page_sizes(mut self, page_size: u32, max_page_size: u32, homepage_size: u32) -> Self {
        self.page_size = page_size;
        self.max_page_size = max_page_size.max(1);
        self.homepage_size = homepage_size;
        self
    }

    /// Build a listing query, falling back to the default page size and
    /// clamping to the maximum.
    pub fn page(&self, limit: Option<u32>, offset: Option<u32>) -> ProductQuery {
        let limit = limit
            .unwrap_or(self.page_size)
            .clamp(1, self.max_page_size);
        ProductQuery::new(limit, offset.unwrap_or(0))
    }
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self::from_cache(&CacheConfig::default())
    }
}

#[derive(Clone)]
pub struct CatalogService {
    reader: Arc<dyn ProductsRepo>,
    cache: Arc<CacheStore>,
    sink: Arc<dyn ErrorSink>,
    options: CatalogOptions,
}

impl CatalogService {
    pub fn new(
        reader: Arc<dyn ProductsRepo>,
        cache: Arc<CacheStore>,
        sink: Arc<dyn ErrorSink>,
        options: CatalogOptions,
    ) -> Self {
        Self {
            reader,
            cache,
            sink,
            options,
        }
    }

    pub fn options(&self) -> &CatalogOptions {
        &self.options
    }

    /// A missing product is cached as `None` under the same tags, so a later
    /// create or update of that id is still picked up.
    #[instrument(skip(self))]
    pub async fn get_product(&self, id: Uuid) -> Result<Option<Product>, CatalogError> {
        let result = self
            .cache
            .get_or_compute(
                CacheKey::product_detail(id),
                self.options.product_ttl_seconds,
                &[CacheTag::product_detail(id), CacheTag::products()],
                || self.reader.find_by_id(id),
            )
            .await;
        self.settle("catalog::get_product", result, json!({ "id": id }))
    }

    #[instrument(skip(self))]
    pub async fn list_products(&self, query: ProductQuery) -> Result<ProductList, CatalogError> {
        let mut tags = vec![CacheTag::products()];
        if let Some(category) = &query.category {
            tags.push(CacheTag::category(category));
        }

        let result = self
            .cache
            .get_or_compute(
                CacheKey::product_list(&query),
                self.options.listing_ttl_seconds,
                &tags,
                || self.reader.list_products(&query),
            )
            .await;
        self.settle(
            "catalog::list_products",
            result,
            json!({
                "category": query.category,
                "limit": query.limit,
                "offset": query.offset,
            }),
        )
    }

    pub async fn list_by_category(
        &self,
        category: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<ProductList, CatalogError> {
        let query = self.options.page(limit, offset).in_category(category);
        self.list_products(query).await
    }

    #[instrument(skip(self))]
    pub async fn homepage(&self) -> Result<ProductList, CatalogError> {
        let limit = self.options.homepage_size;
        let query = ProductQuery::new(limit, 0);
        let result = self
            .cache
            .get_or_compute(
                CacheKey::homepage(limit),
                self.options.homepage_ttl_seconds,
                &[CacheTag::homepage(), CacheTag::products()],
                || self.reader.list_products(&query),
            )
            .await;
        self.settle("catalog::homepage", result, Value::Null)
    }

    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<ProductStats, CatalogError> {
        let result = self
            .cache
            .get_or_compute(
                CacheKey::product_stats(),
                self.options.stats_ttl_seconds,
                &[CacheTag::product_stats(), CacheTag::products()],
                || self.reader.product_stats(),
            )
            .await;
        self.settle("catalog::stats", result, Value::Null)
    }

    pub async fn health_check(&self) -> Result<(), RepoError> {
        self.reader.health_check().await
    }

    fn settle<T>(
        &self,
        endpoint: &'static str,
        result: Result<T, CacheError<RepoError>>,
        extra: Value,
    ) -> Result<T, CatalogError> {
        result.map_err(|err| {
            let err = err.into_inner();
            self.sink
                .report(&err, &ErrorContext::new(endpoint).with_extra(extra));
            CatalogError::Storage(err)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::application::repos::{CreateProductParams, ProductsWriteRepo};
    use crate::cache::EntryState;
    use crate::domain::products::Price;
    use crate::infra::memory::InMemoryProducts;
    use crate::infra::sink::MemorySink;

    struct Fixture {
        catalog: CatalogService,
        repo: Arc<InMemoryProducts>,
        store: Arc<CacheStore>,
        sink: Arc<MemorySink>,
    }

    fn fixture() -> Fixture {
        let repo = Arc::new(InMemoryProducts::new());
        let store = Arc::new(CacheStore::new(&CacheConfig::default()));
        let sink = Arc::new(MemorySink::default());
        let catalog = CatalogService::new(
            repo.clone(),
            store.clone(),
            sink.clone(),
            CatalogOptions::default(),
        );
        Fixture {
            catalog,
            repo,
            store,
            sink,
        }
    }

    fn params(name: &str, category: &str) -> CreateProductParams {
        CreateProductParams {
            name: name.to_string(),
            description: None,
            price: Price::from_cents(1500).unwrap(),
            category: category.to_string(),
            image_url: None,
            stock: 5,
        }
    }

    #[tokio::test]
    async fn repeated_reads_hit_the_store_once() {
        let fx = fixture();
        let product = fx.repo.create_product(params("Omega-3", "fish-oil")).await.unwrap();

        let first = fx.catalog.get_product(product.id).await.unwrap();
        let second = fx.catalog.get_product(product.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fx.repo.reads(), 1);
    }

    #[tokio::test]
    async fn missing_product_is_cached_as_absent() {
        let fx = fixture();
        let id = Uuid::new_v4();

        assert_eq!(fx.catalog.get_product(id).await.unwrap(), None);
        assert_eq!(fx.catalog.get_product(id).await.unwrap(), None);
        assert_eq!(fx.repo.reads(), 1);
        assert_eq!(
            fx.store.state(&CacheKey::product_detail(id)),
            EntryState::Fresh
        );
    }

    #[tokio::test]
    async fn category_listing_is_tagged_with_its_category() {
        let fx = fixture();
        fx.repo.create_product(params("Omega-3", "fish-oil")).await.unwrap();
        fx.repo.create_product(params("Vitamin C", "vitamins")).await.unwrap();

        let listing = fx
            .catalog
            .list_by_category("fish-oil", None, None)
            .await
            .unwrap();
        assert_eq!(listing.total, 1);

        fx.store.invalidate_tag(&CacheTag::category("vitamins"));
        fx.catalog
            .list_by_category("fish-oil", None, None)
            .await
            .unwrap();
        assert_eq!(fx.repo.reads(), 1);

        fx.store.invalidate_tag(&CacheTag::category("fish-oil"));
        fx.catalog
            .list_by_category("fish-oil", None, None)
            .await
            .unwrap();
        assert_eq!(fx.repo.reads(), 2);
    }

    #[tokio::test]
    async fn homepage_and_stats_follow_products_tag() {
        let fx = fixture();
        fx.repo.create_product(params("Omega-3", "fish-oil")).await.unwrap();

        let stats = fx.catalog.stats().await.unwrap();
        assert_eq!(stats.total_products, 1);
        assert_eq!(fx.catalog.homepage().await.unwrap().items.len(), 1);

        fx.repo.create_product(params("Krill", "fish-oil")).await.unwrap();
        assert_eq!(fx.catalog.stats().await.unwrap().total_products, 1);

        fx.store.invalidate_tag(&CacheTag::products());
        assert_eq!(fx.catalog.stats().await.unwrap().total_products, 2);
        assert_eq!(fx.catalog.homepage().await.unwrap().items.len(), 2);
    }

    #[tokio::test]
    async fn storage_failures_are_reported_and_not_cached() {
        let fx = fixture();
        fx.repo.fail_reads(true);

        let err = fx.catalog.stats().await.unwrap_err();
        assert!(matches!(err, CatalogError::Storage(_)));
        assert_eq!(fx.sink.entries().len(), 1);
        assert_eq!(fx.sink.entries()[0].endpoint, "catalog::stats");

        fx.repo.fail_reads(false);
        assert!(fx.catalog.stats().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn listings_refresh_after_their_ttl() {
        let fx = fixture();
        let options = CatalogOptions {
            listing_ttl_seconds: 1,
            ..CatalogOptions::default()
        };
        let catalog = CatalogService::new(
            fx.repo.clone(),
            fx.store.clone(),
            fx.sink.clone(),
            options,
        );

        catalog.list_products(options.page(None, None)).await.unwrap();
        tokio::time::advance(Duration::from_millis(1100)).await;
        catalog.list_products(options.page(None, None)).await.unwrap();

        assert_eq!(fx.repo.reads(), 2);
    }

    #[test]
    fn page_clamps_limits() {
        let options = CatalogOptions::default().with_page_sizes(20, 50, 8);
        assert_eq!(options.page(None, None).limit, 20);
        assert_eq!(options.page(Some(500), Some(3)).limit, 50);
        assert_eq!(options.page(Some(0), None).limit, 1);
        assert_eq!(options.page(None, Some(3)).offset, 3);
    }
}
