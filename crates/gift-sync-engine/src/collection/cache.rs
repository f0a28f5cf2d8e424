//! 商品集合缓存
//!
//! 默认实现 `NoCollectionCache` 不做任何缓存，每次解析都重新分页拉取。
//! `TtlCollectionCache` 提供有界的 TTL 缓存：条目过期后在访问时淘汰，
//! 容量满时淘汰最早写入的条目。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::ProductIdSet;

/// 集合缓存抽象
pub trait CollectionCache: Send + Sync {
    fn get(&self, handle: &str) -> Option<Arc<ProductIdSet>>;
    fn put(&self, handle: &str, products: Arc<ProductIdSet>);
}

/// 不缓存
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCollectionCache;

impl CollectionCache for NoCollectionCache {
    fn get(&self, _handle: &str) -> Option<Arc<ProductIdSet>> {
        None
    }

    fn put(&self, _handle: &str, _products: Arc<ProductIdSet>) {}
}

struct CachedCollection {
    products: Arc<ProductIdSet>,
    inserted_at: Instant,
}

/// 有界 TTL 集合缓存
pub struct TtlCollectionCache {
    entries: Mutex<HashMap<String, CachedCollection>>,
    ttl: Duration,
    capacity: usize,
}

impl TtlCollectionCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// 当前缓存条目数（含尚未被访问淘汰的过期条目）
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CollectionCache for TtlCollectionCache {
    fn get(&self, handle: &str) -> Option<Arc<ProductIdSet>> {
        let mut entries = self.entries.lock();
        let expired = match entries.get(handle) {
            Some(entry) if entry.inserted_at.elapsed() < self.ttl => {
                return Some(entry.products.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(handle);
            debug!(handle, "集合缓存条目已过期");
        }
        None
    }

    fn put(&self, handle: &str, products: Arc<ProductIdSet>) {
        let mut entries = self.entries.lock();
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.inserted_at.elapsed() < ttl);

        if entries.len() >= self.capacity && !entries.contains_key(handle) {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                entries.remove(&key);
                debug!(evicted = %key, "集合缓存已满，淘汰最早条目");
            }
        }

        entries.insert(
            handle.to_string(),
            CachedCollection {
                products,
                inserted_at: Instant::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(ids: &[&str]) -> Arc<ProductIdSet> {
        Arc::new(ids.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_no_cache_never_hits() {
        let cache = NoCollectionCache;
        cache.put("summer", set(&["1"]));
        assert!(cache.get("summer").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = TtlCollectionCache::new(Duration::from_secs(60), 8);
        cache.put("summer", set(&["1", "2"]));
        assert_eq!(cache.get("summer").unwrap().len(), 2);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(cache.get("summer").is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let cache = TtlCollectionCache::new(Duration::from_secs(600), 2);
        cache.put("a", set(&["1"]));
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.put("b", set(&["2"]));
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.put("c", set(&["3"]));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_same_handle_does_not_evict() {
        let cache = TtlCollectionCache::new(Duration::from_secs(600), 2);
        cache.put("a", set(&["1"]));
        cache.put("b", set(&["2"]));
        cache.put("b", set(&["2", "3"]));

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_some());
        assert_eq!(cache.get("b").unwrap().len(), 2);
    }
}
