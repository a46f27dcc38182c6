//! Process-local product store.
//!
//! Backs the server when no database URL is configured and doubles as the
//! repository in tests. Reads are counted so callers can observe cache hits.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateProductParams, PriceChange, ProductQuery, ProductsRepo, ProductsWriteRepo, RepoError,
    UpdateProductParams, UpdatedProduct,
};
use crate::cache::lock::mutex_lock;
use crate::domain::products::{CategoryCount, Product, ProductList, ProductStats};

const SOURCE: &str = "infra::memory::InMemoryProducts";

struct StoredProduct {
    seq: u64,
    product: Product,
}

#[derive(Default)]
pub struct InMemoryProducts {
    products: Mutex<HashMap<Uuid, StoredProduct>>,
    next_seq: AtomicU64,
    reads: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryProducts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of catalog reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.products, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn begin_read(&self) -> Result<(), RepoError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("simulated read failure"));
        }
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn begin_write(&self) -> Result<(), RepoError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("simulated write failure"));
        }
        Ok(())
    }

    fn sorted(&self, category: Option<&str>) -> Vec<Product> {
        let products = mutex_lock(&self.products, SOURCE, "sorted");
        let mut matching: Vec<&StoredProduct> = products
            .values()
            .filter(|stored| category.is_none_or(|category| stored.product.category == category))
            .collect();
        // Insertion order stands in for created_at, which can tie.
        matching.sort_by(|a, b| b.seq.cmp(&a.seq));
        matching
            .into_iter()
            .map(|stored| stored.product.clone())
            .collect()
    }
}

#[async_trait]
impl ProductsRepo for InMemoryProducts {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, RepoError> {
        self.begin_read()?;
        let products = mutex_lock(&self.products, SOURCE, "find_by_id");
        Ok(products.get(&id).map(|stored| stored.product.clone()))
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductList, RepoError> {
        self.begin_read()?;
        let matching = self.sorted(query.category.as_deref());
        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();
        Ok(ProductList { items, total })
    }

    async fn product_stats(&self) -> Result<ProductStats, RepoError> {
        self.begin_read()?;
        let products = mutex_lock(&self.products, SOURCE, "product_stats");

        let mut categories: HashMap<&str, u64> = HashMap::new();
        let mut total_stock = 0_i64;
        let mut out_of_stock = 0_u64;
        for stored in products.values() {
            let product = &stored.product;
            *categories.entry(product.category.as_str()).or_default() += 1;
            total_stock += i64::from(product.stock);
            if product.stock == 0 {
                out_of_stock += 1;
            }
        }

        let mut categories: Vec<CategoryCount> = categories
            .into_iter()
            .map(|(category, count)| CategoryCount {
                category: category.to_string(),
                count,
            })
            .collect();
        categories.sort_by(|a, b| a.category.cmp(&b.category));

        Ok(ProductStats {
            total_products: products.len() as u64,
            total_stock,
            out_of_stock,
            categories,
        })
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepoError::from_persistence("simulated read failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ProductsWriteRepo for InMemoryProducts {
    async fn create_product(&self, params: CreateProductParams) -> Result<Product, RepoError> {
        self.begin_write()?;
        let now = OffsetDateTime::now_utc();
        let product = Product {
            id: Uuid::new_v4(),
            name: params.name,
            description: params.description,
            price: params.price,
            category: params.category,
            image_url: params.image_url,
            stock: params.stock,
            created_at: now,
            updated_at: now,
        };
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        mutex_lock(&self.products, SOURCE, "create_product").insert(
            product.id,
            StoredProduct {
                seq,
                product: product.clone(),
            },
        );
        Ok(product)
    }

    async fn update_product(
        &self,
        params: UpdateProductParams,
    ) -> Result<UpdatedProduct, RepoError> {
        self.begin_write()?;
        let mut products = mutex_lock(&self.products, SOURCE, "update_product");
        let stored = products.get_mut(&params.id).ok_or(RepoError::NotFound)?;
        let product = &mut stored.product;
        let previous_category = product.category.clone();

        if let Some(name) = params.name {
            product.name = name;
        }
        if let Some(description) = params.description {
            product.description = Some(description);
        }
        if let Some(price) = params.price {
            product.price = price;
        }
        if let Some(category) = params.category {
            product.category = category;
        }
        if let Some(image_url) = params.image_url {
            product.image_url = Some(image_url);
        }
        if let Some(stock) = params.stock {
            product.stock = stock;
        }
        product.updated_at = OffsetDateTime::now_utc();

        Ok(UpdatedProduct {
            product: product.clone(),
            previous_category,
        })
    }

    async fn delete_product(&self, id: Uuid) -> Result<Product, RepoError> {
        self.begin_write()?;
        mutex_lock(&self.products, SOURCE, "delete_product")
            .remove(&id)
            .map(|stored| stored.product)
            .ok_or(RepoError::NotFound)
    }

    async fn adjust_stock(&self, id: Uuid, delta: i32) -> Result<Product, RepoError> {
        self.begin_write()?;
        let mut products = mutex_lock(&self.products, SOURCE, "adjust_stock");
        let product = &mut products
            .get_mut(&id)
            .ok_or(RepoError::NotFound)?
            .product;

        // Postgres fails the same overflow with "integer out of range".
        let next = product
            .stock
            .checked_add(delta)
            .ok_or_else(|| RepoError::from_persistence("stock out of range"))?;
        if next < 0 {
            return Err(RepoError::InsufficientStock);
        }
        product.stock = next;
        product.updated_at = OffsetDateTime::now_utc();
        Ok(product.clone())
    }

    async fn update_prices(&self, changes: &[PriceChange]) -> Result<Vec<Product>, RepoError> {
        self.begin_write()?;
        let mut products = mutex_lock(&self.products, SOURCE, "update_prices");

        if let Some(missing) = changes
            .iter()
            .find(|change| !products.contains_key(&change.id))
        {
            return Err(RepoError::RecordNotFound { id: missing.id });
        }

        let now = OffsetDateTime::now_utc();
        let mut updated = Vec::with_capacity(changes.len());
        for change in changes {
            if let Some(stored) = products.get_mut(&change.id) {
                stored.product.price = change.price;
                stored.product.updated_at = now;
                updated.push(stored.product.clone());
            }
        }
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::products::Price;

    fn params(name: &str, category: &str, stock: i32) -> CreateProductParams {
        CreateProductParams {
            name: name.to_string(),
            description: None,
            price: Price::parse("10.00").unwrap(),
            category: category.to_string(),
            image_url: None,
            stock,
        }
    }

    #[tokio::test]
    async fn listing_is_newest_first_and_filtered() {
        let repo = InMemoryProducts::new();
        let first = repo.create_product(params("A", "vitamins", 1)).await.unwrap();
        let second = repo.create_product(params("B", "fish-oil", 1)).await.unwrap();
        let third = repo.create_product(params("C", "vitamins", 1)).await.unwrap();

        let all = repo.list_products(&ProductQuery::new(10, 0)).await.unwrap();
        let ids: Vec<Uuid> = all.items.iter().map(|product| product.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        let vitamins = repo
            .list_products(&ProductQuery::new(1, 1).in_category("vitamins"))
            .await
            .unwrap();
        assert_eq!(vitamins.total, 2);
        assert_eq!(vitamins.items[0].id, first.id);
        assert_eq!(repo.reads(), 2);
    }

    #[tokio::test]
    async fn stock_never_goes_negative() {
        let repo = InMemoryProducts::new();
        let product = repo.create_product(params("A", "misc", 2)).await.unwrap();

        let err = repo.adjust_stock(product.id, -3).await.unwrap_err();
        assert!(matches!(err, RepoError::InsufficientStock));
        assert_eq!(repo.adjust_stock(product.id, -2).await.unwrap().stock, 0);

        let err = repo.adjust_stock(Uuid::new_v4(), 1).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound));
    }

    #[tokio::test]
    async fn stock_overflow_is_a_storage_failure() {
        let repo = InMemoryProducts::new();
        let product = repo
            .create_product(params("A", "misc", i32::MAX))
            .await
            .unwrap();

        let err = repo.adjust_stock(product.id, 1).await.unwrap_err();
        assert!(matches!(err, RepoError::Persistence(_)));
        let stored = repo.find_by_id(product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock, i32::MAX);
    }

    #[tokio::test]
    async fn price_batch_is_all_or_nothing() {
        let repo = InMemoryProducts::new();
        let product = repo.create_product(params("A", "misc", 2)).await.unwrap();
        let missing = Uuid::new_v4();

        let err = repo
            .update_prices(&[
                PriceChange {
                    id: product.id,
                    price: Price::parse("1.00").unwrap(),
                },
                PriceChange {
                    id: missing,
                    price: Price::parse("2.00").unwrap(),
                },
            ])
            .await
            .unwrap_err();

        assert!(matches!(err, RepoError::RecordNotFound { id } if id == missing));
        let stored = repo.find_by_id(product.id).await.unwrap().unwrap();
        assert_eq!(stored.price.to_string(), "10.00");
    }

    #[tokio::test]
    async fn stats_group_by_category() {
        let repo = InMemoryProducts::new();
        repo.create_product(params("A", "vitamins", 0)).await.unwrap();
        repo.create_product(params("B", "vitamins", 4)).await.unwrap();
        repo.create_product(params("C", "fish-oil", 3)).await.unwrap();

        let stats = repo.product_stats().await.unwrap();
        assert_eq!(stats.total_products, 3);
        assert_eq!(stats.total_stock, 7);
        assert_eq!(stats.out_of_stock, 1);
        assert_eq!(stats.categories[0].category, "fish-oil");
        assert_eq!(stats.categories[1].count, 2);
    }

    #[tokio::test]
    async fn update_reports_previous_category() {
        let repo = InMemoryProducts::new();
        let product = repo.create_product(params("A", "vitamins", 0)).await.unwrap();

        let updated = repo
            .update_product(UpdateProductParams {
                id: product.id,
                category: Some("fish-oil".into()),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(updated.previous_category, "vitamins");
        assert_eq!(updated.product.category, "fish-oil");
    }
}
