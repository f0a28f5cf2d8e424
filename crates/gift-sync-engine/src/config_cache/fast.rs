//! Redis 快速缓存实现

use async_trait::async_trait;
use gift_shared::cache::{Cache, CacheKey};

use super::FastConfigCache;
use crate::error::Result;
use crate::models::ShopConfig;

pub struct RedisConfigCache {
    cache: Cache,
}

impl RedisConfigCache {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl FastConfigCache for RedisConfigCache {
    async fn get(&self, shop_key: &str) -> Result<Option<ShopConfig>> {
        Ok(self.cache.get(&CacheKey::shop_config(shop_key)).await?)
    }

    async fn put(&self, shop_key: &str, config: &ShopConfig) -> Result<()> {
        Ok(self
            .cache
            .set_persistent(&CacheKey::shop_config(shop_key), config)
            .await?)
    }
}
