//! 商品集合列表 API 客户端
//!
//! `GET /collections/{handle}/products.json?limit={limit}&page={page}`，页码从 1 开始，
//! 返回条数少于 limit 或为空即为最后一页。

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::{StorefrontHttp, http_error};
use crate::error::Result;
use crate::models::normalize_id;

const SERVICE: &str = "storefront-collections";

/// 一页集合商品
///
/// `raw_count` 是接口返回的原始条数（含无法识别 ID 的条目），
/// 分页是否结束只看原始条数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionPage {
    pub product_ids: Vec<String>,
    pub raw_count: usize,
}

impl From<Vec<String>> for CollectionPage {
    fn from(product_ids: Vec<String>) -> Self {
        Self {
            raw_count: product_ids.len(),
            product_ids,
        }
    }
}

/// 集合分页数据源抽象
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CollectionSource: Send + Sync {
    /// 拉取一页集合内的商品 ID，保持接口返回顺序
    async fn fetch_page(&self, handle: &str, page: u32, limit: usize) -> Result<CollectionPage>;
}

/// 基于 reqwest 的集合列表实现
pub struct HttpCollectionClient {
    http: StorefrontHttp,
}

impl HttpCollectionClient {
    pub fn new(http: StorefrontHttp) -> Self {
        Self { http }
    }
}

#[derive(Debug, Deserialize)]
struct ProductsPage {
    #[serde(default)]
    products: Vec<ProductItem>,
}

#[derive(Debug, Deserialize)]
struct ProductItem {
    id: serde_json::Value,
}

impl ProductsPage {
    fn into_page(self) -> CollectionPage {
        let raw_count = self.products.len();
        let product_ids: Vec<String> = self
            .products
            .into_iter()
            .filter_map(ProductItem::into_id)
            .collect();
        if product_ids.len() < raw_count {
            debug!(
                skipped = raw_count - product_ids.len(),
                "集合商品缺少有效 ID，已跳过"
            );
        }
        CollectionPage {
            product_ids,
            raw_count,
        }
    }
}

impl ProductItem {
    fn into_id(self) -> Option<String> {
        match self.id {
            serde_json::Value::String(s) => Some(normalize_id(&s)),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
impl CollectionSource for HttpCollectionClient {
    #[instrument(skip(self))]
    async fn fetch_page(&self, handle: &str, page: u32, limit: usize) -> Result<CollectionPage> {
        let mut url = self
            .http
            .endpoint(&["collections", handle, "products.json"]);
        url.query_pairs_mut()
            .append_pair("limit", &limit.to_string())
            .append_pair("page", &page.to_string());

        let body: ProductsPage = self
            .http
            .client()
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error(SERVICE, e))?
            .json()
            .await
            .map_err(|e| http_error(SERVICE, e))?;

        Ok(body.into_page())
    }
}
