//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::products::{Price, Product, ProductList, ProductStats};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("record {id} not found")]
    RecordNotFound { id: Uuid },
    #[error("stock would drop below zero")]
    InsufficientStock,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    pub category: Option<String>,
    pub limit: u32,
    pub offset: u32,
}

impl ProductQuery {
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            category: None,
            limit,
            offset,
        }
    }

    pub fn in_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct CreateProductParams {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub category: String,
    pub image_url: Option<String>,
    pub stock: i32,
}

/// Partial update; `None` leaves the stored column untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateProductParams {
    pub id: Uuid,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub stock: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceChange {
    pub id: Uuid,
    pub price: Price,
}

/// Result of an update, carrying the category the row had before the write.
#[derive(Debug, Clone)]
pub struct UpdatedProduct {
    pub product: Product,
    pub previous_category: String,
}

#[async_trait]
pub trait ProductsRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Product>, RepoError>;

    async fn list_products(&self, query: &ProductQuery) -> Result<ProductList, RepoError>;

    async fn product_stats(&self) -> Result<ProductStats, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ProductsWriteRepo: Send + Sync {
    async fn create_product(&self, params: CreateProductParams) -> Result<Product, RepoError>;

    async fn update_product(&self, params: UpdateProductParams)
    -> Result<UpdatedProduct, RepoError>;

    async fn delete_product(&self, id: Uuid) -> Result<Product, RepoError>;

    /// Applies `delta` only if the resulting stock stays non-negative.
    ///
    /// Returns `InsufficientStock` when the floor would be crossed and
    /// `NotFound` when the row does not exist. No write happens in either case.
    async fn adjust_stock(&self, id: Uuid, delta: i32) -> Result<Product, RepoError>;

    /// Applies every change or none of them; the first failure aborts the batch.
    /// A missing row is reported as `RecordNotFound` naming its id.
    async fn update_prices(&self, changes: &[PriceChange]) -> Result<Vec<Product>, RepoError>;
}
