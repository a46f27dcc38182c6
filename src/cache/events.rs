//! Invalidation events and the bounded history of applied ones.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use super::keys::{CacheTag, PathScope};
use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";

/// Monotonic counter shared by compute starts and invalidations.
///
/// An entry is stale once any of its tags carries an epoch greater than the
/// epoch at which the entry's compute began.
pub type Epoch = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvalidationTarget {
    Tag { tag: CacheTag },
    Path { path: String, scope: PathScope },
}

/// One applied invalidation.
#[derive(Debug, Clone, Serialize)]
pub struct InvalidationEvent {
    /// Unique identifier (UUIDv4).
    pub id: Uuid,
    pub epoch: Epoch,
    pub target: InvalidationTarget,
    #[serde(serialize_with = "time::serde::rfc3339::serialize")]
    pub at: OffsetDateTime,
}

impl InvalidationEvent {
    pub fn new(target: InvalidationTarget, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            target,
            at: OffsetDateTime::now_utc(),
        }
    }
}

/// Ring buffer of the most recent invalidations, oldest dropped first.
pub struct InvalidationHistory {
    events: Mutex<VecDeque<InvalidationEvent>>,
    limit: NonZeroUsize,
}

impl InvalidationHistory {
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            events: Mutex::new(VecDeque::with_capacity(limit.get())),
            limit,
        }
    }

    pub fn record(&self, event: InvalidationEvent) {
        let mut events = mutex_lock(&self.events, SOURCE, "record");
        while events.len() >= self.limit.get() {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Up to `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<InvalidationEvent> {
        mutex_lock(&self.events, SOURCE, "recent")
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.events, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        mutex_lock(&self.events, SOURCE, "clear").clear();
    }
}
