//! Tag-based response cache.
//!
//! Read endpoints store their JSON payload under a key together with the tags it
//! depends on. Mutations invalidate tags, which makes every entry carrying them
//! stale. Entries also expire after a fixed TTL, and the cache holds a bounded
//! number of entries.

use moka::future::Cache;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Tag names shared by the API layer so reads and writes agree.
pub mod tags {
    /// Everything scoped to an organization.
    #[must_use]
    pub fn organization(org_id: i64) -> String {
        format!("org:{org_id}")
    }

    /// Organization list of a user.
    #[must_use]
    pub fn user_organizations(user_id: i64) -> String {
        format!("user:{user_id}:organizations")
    }

    /// Collection of `kind` (e.g. "clients") inside an organization.
    #[must_use]
    pub fn collection(org_id: i64, kind: &str) -> String {
        format!("org:{org_id}:{kind}")
    }

    /// A single row of `kind`.
    #[must_use]
    pub fn entity(kind: &str, id: i64) -> String {
        format!("{kind}:{id}")
    }
}

/// Generations of a set of tags, captured before a payload is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp(Vec<(String, u64)>);

#[derive(Debug)]
struct Entry {
    value: Value,
    stamp: Stamp,
}

/// Shared cache handle; cloning shares the same storage.
///
/// Invalidating a tag bumps its generation. An entry is served only while
/// every tag it was stamped with is still at the stamped generation, so a
/// payload loaded before a concurrent invalidation is never returned.
#[derive(Clone)]
pub struct TagCache {
    entries: Cache<String, Arc<Entry>>,
    generations: Arc<RwLock<HashMap<String, u64>>>,
}

impl std::fmt::Debug for TagCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TagCache")
            .field("entries", &self.entries.entry_count())
            .finish_non_exhaustive()
    }
}

impl TagCache {
    /// Creates an empty cache holding at most `max_entries` entries, each
    /// living for `ttl`.
    #[must_use]
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build(),
            generations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Current generations of `tags`.
    pub async fn stamp(&self, tags: &[String]) -> Stamp {
        let generations = self.generations.read().await;
        Stamp(
            tags.iter()
                .map(|tag| (tag.clone(), generations.get(tag).copied().unwrap_or(0)))
                .collect(),
        )
    }

    async fn is_current(&self, stamp: &Stamp) -> bool {
        let generations = self.generations.read().await;
        stamp
            .0
            .iter()
            .all(|(tag, seen)| generations.get(tag).copied().unwrap_or(0) == *seen)
    }

    /// Returns a fresh entry, or `None` when missing, expired or invalidated.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let entry = self.entries.get(key).await?;
        if self.is_current(&entry.stamp).await {
            trace!("cache hit: {key}");
            return Some(entry.value.clone());
        }
        self.entries.invalidate(key).await;
        None
    }

    /// Stores `value` under `key`, stamped with the current generations of `tags`.
    pub async fn insert(&self, key: impl Into<String>, tags: &[String], value: Value) {
        let stamp = self.stamp(tags).await;
        self.insert_stamped(key, stamp, value).await;
    }

    /// Stores `value` loaded under `stamp`. Returns `false` and stores nothing
    /// when one of its tags was invalidated since the stamp was taken.
    pub async fn insert_stamped(&self, key: impl Into<String>, stamp: Stamp, value: Value) -> bool {
        let key = key.into();
        if !self.is_current(&stamp).await {
            debug!("dropping stale cache payload for {key}");
            return false;
        }
        self.entries.insert(key, Arc::new(Entry { value, stamp })).await;
        true
    }

    /// Makes every entry tagged with `tag` stale.
    pub async fn invalidate_tag(&self, tag: &str) {
        let mut generations = self.generations.write().await;
        let generation = generations.entry(tag.to_string()).or_insert(0);
        *generation = generation.wrapping_add(1);
        debug!("invalidated cache tag {tag}");
    }

    /// Invalidates several tags at once.
    pub async fn invalidate_tags(&self, tags: &[String]) {
        for tag in tags {
            self.invalidate_tag(tag).await;
        }
    }

    /// Number of stored entries after pending evictions ran.
    pub async fn len(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }

    /// True when nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops everything.
    pub async fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }
}
