//! PostgreSQL 持久化配置源
//!
//! 配置由后台写入 `shop_configs` 表，这里只读。

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use super::DurableConfigSource;
use crate::error::Result;

pub struct PgConfigSource {
    pool: PgPool,
}

impl PgConfigSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DurableConfigSource for PgConfigSource {
    #[instrument(skip(self))]
    async fn fetch_raw(&self, shop_key: &str) -> Result<Option<String>> {
        let raw: Option<Option<String>> =
            sqlx::query_scalar("SELECT config::text FROM shop_configs WHERE shop_key = $1")
                .bind(shop_key)
                .fetch_optional(&self.pool)
                .await
                .map_err(gift_shared::error::GiftError::from)?;

        Ok(raw.flatten())
    }
}
