//! TTL cache holding final task records after they leave the task stores.

use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::time::Instant;

struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

impl CacheEntry {
    fn expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Deadline for `ttl` from `now`; a TTL past what the clock can represent is
/// capped at roughly a century.
fn expiry(now: Instant, ttl: Duration) -> Instant {
    now.checked_add(ttl)
        .or_else(|| now.checked_add(FAR_FUTURE))
        .unwrap_or(now)
}

const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 3600);

/// Expired entries are never returned; `purge_expired` drops them for good.
#[derive(Default)]
pub struct ResultCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: expiry(Instant::now(), ttl),
            },
        );
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.expired(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.expired(now));
        }
        None
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Returns the number of entries dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Entries held, expired ones included until purged or read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ResultCache::new();
        cache.set("generation:a", json!({"status": "completed"}), Duration::from_secs(60));
        assert_eq!(cache.get("generation:a"), Some(json!({"status": "completed"})));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get("generation:a").is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.get("generation:a").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired() {
        let cache = ResultCache::new();
        cache.set("short", json!(1), Duration::from_secs(10));
        cache.set("long", json!(2), Duration::from_secs(100));

        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(json!(2)));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[tokio::test]
    async fn unbounded_ttl_never_expires() {
        let cache = ResultCache::new();
        cache.set("forever", json!(1), Duration::from_secs(u64::MAX));
        assert_eq!(cache.get("forever"), Some(json!(1)));
        assert_eq!(cache.purge_expired(), 0);
    }

    #[tokio::test]
    async fn set_overwrites_and_remove() {
        let cache = ResultCache::new();
        cache.set("k", json!(1), Duration::from_secs(10));
        cache.set("k", json!(2), Duration::from_secs(10));
        assert_eq!(cache.get("k"), Some(json!(2)));
        assert!(cache.remove("k"));
        assert!(!cache.remove("k"));
        assert!(cache.get("missing").is_none());
    }
}
