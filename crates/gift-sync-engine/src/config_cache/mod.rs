//! 两级活动配置缓存
//!
//! 快速缓存（Redis）命中直接返回，不做过期或新鲜度检查；
//! 未命中时读取持久化配置源（PostgreSQL），归一化后写回快速缓存（不设过期）。
//!
//! 快速缓存读写失败只记录告警并降级为直接读取持久化源，不影响对账；
//! 持久化源失败返回 `ConfigUnavailable`，由引擎按"不动赠品行"处理。

mod durable;
mod fast;

pub use durable::PgConfigSource;
pub use fast::RedisConfigCache;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::error::{Result, SyncError};
use crate::models::ShopConfig;

/// 快速缓存层
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FastConfigCache: Send + Sync {
    async fn get(&self, shop_key: &str) -> Result<Option<ShopConfig>>;

    /// 写入归一化后的配置，不设过期时间
    async fn put(&self, shop_key: &str, config: &ShopConfig) -> Result<()>;
}

/// 持久化配置源
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DurableConfigSource: Send + Sync {
    /// 读取店铺配置的原始 JSON 文本，店铺不存在时返回 None
    async fn fetch_raw(&self, shop_key: &str) -> Result<Option<String>>;
}

/// 配置缓存
pub struct ConfigCache {
    fast: Arc<dyn FastConfigCache>,
    durable: Arc<dyn DurableConfigSource>,
}

impl ConfigCache {
    pub fn new(fast: Arc<dyn FastConfigCache>, durable: Arc<dyn DurableConfigSource>) -> Self {
        Self { fast, durable }
    }

    /// 读取店铺配置
    #[instrument(skip(self))]
    pub async fn get(&self, shop_key: &str) -> Result<ShopConfig> {
        match self.fast.get(shop_key).await {
            Ok(Some(config)) => {
                record_read("fast");
                debug!(campaigns = config.campaigns.len(), "配置缓存命中");
                Ok(config)
            }
            Ok(None) => {
                let config = self.read_durable(shop_key).await?;
                if let Err(e) = self.fast.put(shop_key, &config).await {
                    warn!(error = %e, "配置写入快速缓存失败");
                }
                Ok(config)
            }
            Err(e) => {
                warn!(error = %e, "快速缓存不可用，降级读取持久化配置");
                self.read_durable(shop_key).await
            }
        }
    }

    async fn read_durable(&self, shop_key: &str) -> Result<ShopConfig> {
        record_read("durable");
        let raw = self
            .durable
            .fetch_raw(shop_key)
            .await
            .map_err(|e| SyncError::config_unavailable(shop_key, e))?;
        normalize_config(shop_key, raw.as_deref())
    }
}

fn record_read(source: &'static str) {
    metrics::counter!("gift_sync_config_reads_total", "source" => source).increment(1);
}

/// 归一化持久化源返回的配置文本
///
/// 空值、`"null"`、`"undefined"`、`"{}"` 以及缺少 `campaigns` 的 JSON 都视为空配置
pub fn normalize_config(shop_key: &str, raw: Option<&str>) -> Result<ShopConfig> {
    let text = match raw.map(str::trim) {
        None | Some("") | Some("null") | Some("undefined") | Some("{}") => {
            return Ok(ShopConfig::empty());
        }
        Some(text) => text,
    };

    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| SyncError::config_unavailable(shop_key, format!("配置 JSON 无效: {e}")))?;

    match value.get("campaigns") {
        None | Some(serde_json::Value::Null) => Ok(ShopConfig::empty()),
        Some(_) => serde_json::from_value(value).map_err(|e| {
            SyncError::config_unavailable(shop_key, format!("配置结构无效: {e}"))
        }),
    }
}
