//! Invalidation dispatcher.
//!
//! Fans a committed write out to the data cache (by tag) and the rendering
//! layer (by path), recording each applied invalidation. Every operation is
//! synchronous, idempotent, and order-independent.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info};

use super::events::{InvalidationEvent, InvalidationHistory, InvalidationTarget};
use super::keys::{CacheTag, PathScope};
use super::planner::InvalidationPlan;
use super::render::RenderInvalidator;
use super::store::{CacheStore, METRIC_INVALIDATE};

#[derive(Clone)]
pub struct Invalidator {
    store: Arc<CacheStore>,
    render: Arc<dyn RenderInvalidator>,
    history: Arc<InvalidationHistory>,
}

impl Invalidator {
    pub fn new(
        store: Arc<CacheStore>,
        render: Arc<dyn RenderInvalidator>,
        history: Arc<InvalidationHistory>,
    ) -> Self {
        Self {
            store,
            render,
            history,
        }
    }

    pub fn history(&self) -> &InvalidationHistory {
        &self.history
    }

    /// Every entry labelled with `tag` becomes stale immediately.
    pub fn invalidate_by_tag(&self, tag: &CacheTag) {
        let epoch = self.store.invalidate_tag(tag);
        debug!(
            tag = %tag,
            epoch,
            tagged_entries = self.store.tagged_entries(tag),
            "Cache tag invalidated"
        );
        self.history.record(InvalidationEvent::new(
            InvalidationTarget::Tag { tag: tag.clone() },
            epoch,
        ));
    }

    /// Drop rendered output for `path`, and for nested paths when `scope` is
    /// `Layout`. Does not touch data cache entries.
    pub fn invalidate_by_path(&self, path: &str, scope: PathScope) {
        let removed = self.render.invalidate_path(path, scope);
        counter!(METRIC_INVALIDATE, "kind" => "path").increment(1);
        debug!(path, ?scope, removed, "Rendered path invalidated");
        self.history.record(InvalidationEvent::new(
            InvalidationTarget::Path {
                path: path.to_string(),
                scope,
            },
            self.store.next_epoch(),
        ));
    }

    /// Apply every target of `plan` before returning.
    pub fn apply(&self, plan: &InvalidationPlan) {
        for tag in &plan.tags {
            self.invalidate_by_tag(tag);
        }
        for (path, scope) in &plan.paths {
            self.invalidate_by_path(path, *scope);
        }
        info!(plan = %plan, "Invalidation plan applied");
    }
}
