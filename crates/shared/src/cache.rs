//! Redis 缓存管理模块
//!
//! 提供 Redis 连接管理和常用缓存操作封装。

use crate::config::RedisConfig;
use crate::error::{GiftError, Result};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{info, instrument};

/// Redis 缓存客户端
#[derive(Clone)]
pub struct Cache {
    client: Client,
}

impl Cache {
    /// 创建 Redis 客户端（懒连接，首次操作时建立连接）
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.as_str())?;
        info!("Redis client created");
        Ok(Self { client })
    }

    async fn get_conn(&self) -> Result<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(GiftError::from)
    }

    /// 获取值
    #[instrument(skip(self))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut conn = self.get_conn().await?;
        let value: Option<String> = conn.get(key).await?;

        match value {
            Some(v) => Ok(Some(serde_json::from_str(&v)?)),
            None => Ok(None),
        }
    }

    /// 设置值，不设过期时间
    ///
    /// 条目一直保留到被外部覆盖或 Redis 自身淘汰。
    #[instrument(skip(self, value))]
    pub async fn set_persistent<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let mut conn = self.get_conn().await?;
        let serialized = serde_json::to_string(value)?;

        let _: () = conn.set(key, serialized).await?;
        Ok(())
    }
}

/// 缓存键生成器
pub struct CacheKey;

impl CacheKey {
    pub fn shop_config(shop_key: &str) -> String {
        format!("gift:config:{}", shop_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_generation() {
        assert_eq!(CacheKey::shop_config("demo-shop"), "gift:config:demo-shop");
    }

    #[test]
    fn test_client_creation_is_lazy() {
        // 创建客户端不会建立连接，地址无服务时也能成功
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
        };
        assert!(Cache::new(&config).is_ok());
    }

    #[test]
    fn test_invalid_url_rejected() {
        let config = RedisConfig {
            url: "not-a-redis-url".to_string(),
        };
        assert!(Cache::new(&config).is_err());
    }
}
