//! Invalidation plan generation.
//!
//! Maps each committed product write to the tags and rendered paths it can
//! have made stale. The table is total: every change kind names its targets
//! explicitly, and nothing outside it is ever invalidated.

use std::collections::BTreeSet;
use std::fmt;

use uuid::Uuid;

use super::keys::{CacheTag, PathScope, paths};

/// A committed product write, described by what the dispatcher needs to know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductChange {
    Created {
        id: Uuid,
        category: String,
    },
    Updated {
        id: Uuid,
        category: String,
        previous_category: String,
    },
    Deleted {
        id: Uuid,
        category: String,
    },
    StockAdjusted {
        id: Uuid,
        category: String,
    },
    PricesUpdated {
        items: Vec<(Uuid, String)>,
    },
}

/// Deduplicated tags and paths to invalidate after one or more writes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvalidationPlan {
    pub tags: BTreeSet<CacheTag>,
    pub paths: BTreeSet<(String, PathScope)>,
}

impl fmt::Display for InvalidationPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<String> = self.tags.iter().map(ToString::to_string).collect();
        let paths: Vec<String> = self
            .paths
            .iter()
            .map(|(path, scope)| format!("{path}({scope:?})"))
            .collect();
        write!(
            f,
            "InvalidationPlan {{ tags: [{}], paths: [{}] }}",
            tags.join(", "),
            paths.join(", ")
        )
    }
}

impl InvalidationPlan {
    pub fn for_change(change: &ProductChange) -> Self {
        let mut plan = Self::default();

        match change {
            ProductChange::Created { category, .. } => {
                plan.tag(CacheTag::products())
                    .tag(CacheTag::category(category))
                    .tag(CacheTag::homepage())
                    .tag(CacheTag::product_stats())
                    .path(paths::HOME, PathScope::Page)
                    .path(paths::PRODUCTS, PathScope::Layout)
                    .path(paths::category(category), PathScope::Page);
            }
            ProductChange::Updated {
                id,
                category,
                previous_category,
            } => {
                plan.catalog_write(*id, category);
                if previous_category != category {
                    plan.tag(CacheTag::category(previous_category))
                        .path(paths::category(previous_category), PathScope::Page);
                }
            }
            ProductChange::Deleted { id, category } => {
                plan.catalog_write(*id, category);
            }
            ProductChange::StockAdjusted { id, category } => {
                plan.tag(CacheTag::product_detail(*id))
                    .tag(CacheTag::products())
                    .tag(CacheTag::category(category))
                    .tag(CacheTag::homepage())
                    .tag(CacheTag::product_stats())
                    .path(paths::product(*id), PathScope::Page)
                    .path(paths::PRODUCTS, PathScope::Page)
                    .path(paths::category(category), PathScope::Page)
                    .path(paths::HOME, PathScope::Page);
            }
            ProductChange::PricesUpdated { items } => {
                plan.tag(CacheTag::products())
                    .tag(CacheTag::homepage())
                    .path(paths::HOME, PathScope::Page)
                    .path(paths::PRODUCTS, PathScope::Layout);
                for (id, category) in items {
                    plan.tag(CacheTag::product_detail(*id))
                        .tag(CacheTag::category(category))
                        .path(paths::category(category), PathScope::Page);
                }
            }
        }

        plan
    }

    // Shared by update and delete.
    fn catalog_write(&mut self, id: Uuid, category: &str) -> &mut Self {
        self.tag(CacheTag::product_detail(id))
            .tag(CacheTag::products())
            .tag(CacheTag::category(category))
            .tag(CacheTag::homepage())
            .tag(CacheTag::product_stats())
            .path(paths::HOME, PathScope::Page)
            .path(paths::PRODUCTS, PathScope::Layout)
            .path(paths::category(category), PathScope::Page)
    }

    fn tag(&mut self, tag: CacheTag) -> &mut Self {
        self.tags.insert(tag);
        self
    }

    fn path(&mut self, path: impl Into<String>, scope: PathScope) -> &mut Self {
        self.paths.insert((path.into(), scope));
        self
    }
}
