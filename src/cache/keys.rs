//! Cache key, tag, and render path definitions.
//!
//! `CacheKey` identifies one cached computation, `CacheTag` groups entries for
//! coarse invalidation, and `paths` names the rendered pages the dispatcher can
//! drop.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::application::repos::ProductQuery;

/// Ordered parts uniquely identifying one cached computation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(Vec<String>);

impl CacheKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// Leading part, used as a low-cardinality metrics label.
    pub fn family(&self) -> &str {
        self.0.first().map(String::as_str).unwrap_or("")
    }

    pub fn product_detail(id: Uuid) -> Self {
        Self::new(["product-detail".to_string(), id.to_string()])
    }

    pub fn product_list(query: &ProductQuery) -> Self {
        let category = match query.category.as_deref() {
            Some(category) => format!("category={category}"),
            None => "all".to_string(),
        };
        Self::new([
            "product-list".to_string(),
            category,
            format!("limit={}", query.limit),
            format!("offset={}", query.offset),
        ])
    }

    pub fn homepage(limit: u32) -> Self {
        Self::new(["homepage".to_string(), format!("limit={limit}")])
    }

    pub fn product_stats() -> Self {
        Self::new(["product-stats"])
    }

    pub fn social_feed() -> Self {
        Self::new(["social-feed"])
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("/"))
    }
}

/// Closed set of invalidation labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CacheTag {
    /// One product's detail view.
    ProductDetail(Uuid),
    /// Every listing that may contain any product.
    Products,
    /// Listings filtered to one category.
    Category(String),
    /// The homepage selection.
    Homepage,
    /// Aggregate counts over the catalog.
    ProductStats,
    /// Posts proxied from the social feed provider.
    SocialFeed,
}

impl CacheTag {
    pub fn product_detail(id: Uuid) -> Self {
        Self::ProductDetail(id)
    }

    pub fn products() -> Self {
        Self::Products
    }

    pub fn category(category: impl Into<String>) -> Self {
        Self::Category(category.into())
    }

    pub fn homepage() -> Self {
        Self::Homepage
    }

    pub fn product_stats() -> Self {
        Self::ProductStats
    }

    pub fn social_feed() -> Self {
        Self::SocialFeed
    }
}

impl fmt::Display for CacheTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProductDetail(id) => write!(f, "product:{id}"),
            Self::Products => f.write_str("products"),
            Self::Category(category) => write!(f, "category:{category}"),
            Self::Homepage => f.write_str("homepage"),
            Self::ProductStats => f.write_str("product-stats"),
            Self::SocialFeed => f.write_str("social-feed"),
        }
    }
}

impl Serialize for CacheTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How far a path invalidation reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PathScope {
    /// Only the exact path.
    Page,
    /// The path and everything nested under it.
    Layout,
}

/// Rendered page paths.
pub mod paths {
    use uuid::Uuid;

    pub const HOME: &str = "/";
    pub const PRODUCTS: &str = "/products";

    pub fn product(id: Uuid) -> String {
        format!("{PRODUCTS}/{id}")
    }

    pub fn category(category: &str) -> String {
        format!("/category/{category}")
    }
}

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Hash a query string for render cache keys.
pub fn hash_query(query: &str) -> u64 {
    hash_value(&query)
}
