//! 集合成员解析器
//!
//! 以固定页大小分页拉取，直到某页条数少于页大小或为空；
//! 按页序拼接商品 ID，重复 ID 保留首次出现位置。

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use super::cache::{CollectionCache, NoCollectionCache};
use crate::error::{Result, SyncError};
use crate::platform::CollectionSource;

/// 有序的商品 ID 集合
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductIdSet {
    ordered: Vec<String>,
    index: HashSet<String>,
}

impl ProductIdSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入 ID，已存在时返回 false
    pub fn insert(&mut self, id: String) -> bool {
        if self.index.contains(&id) {
            return false;
        }
        self.index.insert(id.clone());
        self.ordered.push(id);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ordered.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ordered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ordered.is_empty()
    }

    /// 合并另一个集合，保持先后顺序
    pub fn extend_from(&mut self, other: &ProductIdSet) {
        for id in other.iter() {
            self.insert(id.to_string());
        }
    }
}

impl FromIterator<String> for ProductIdSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = ProductIdSet::new();
        for id in iter {
            set.insert(id);
        }
        set
    }
}

/// 解析器配置
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// 每页条数
    pub page_size: usize,
    /// 最大页数，防止接口始终返回满页导致无限翻页
    pub max_pages: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            page_size: 250,
            max_pages: 100,
        }
    }
}

/// 商品集合成员解析器
pub struct CollectionMembershipResolver {
    source: Arc<dyn CollectionSource>,
    cache: Arc<dyn CollectionCache>,
    config: ResolverConfig,
}

impl CollectionMembershipResolver {
    /// 创建不带缓存的解析器
    pub fn new(source: Arc<dyn CollectionSource>, config: ResolverConfig) -> Self {
        Self::with_cache(source, Arc::new(NoCollectionCache), config)
    }

    pub fn with_cache(
        source: Arc<dyn CollectionSource>,
        cache: Arc<dyn CollectionCache>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            source,
            cache,
            config: ResolverConfig {
                page_size: config.page_size.max(1),
                max_pages: config.max_pages.max(1),
            },
        }
    }

    /// 解析单个集合的全部商品 ID
    #[instrument(skip(self))]
    pub async fn resolve(&self, handle: &str) -> Result<Arc<ProductIdSet>> {
        if let Some(cached) = self.cache.get(handle) {
            debug!(handle, products = cached.len(), "集合缓存命中");
            return Ok(cached);
        }

        let page_size = self.config.page_size;
        let mut products = ProductIdSet::new();

        for page in 1..=self.config.max_pages {
            let batch = self
                .source
                .fetch_page(handle, page, page_size)
                .await
                .map_err(|e| {
                    warn!(handle, page, error = %e, "集合分页拉取失败");
                    SyncError::CollectionResolutionFailed {
                        handle: handle.to_string(),
                        page,
                        reason: e.to_string(),
                    }
                })?;

            for id in batch.product_ids {
                products.insert(id);
            }

            if batch.raw_count < page_size {
                debug!(handle, pages = page, products = products.len(), "集合解析完成");
                let products = Arc::new(products);
                self.cache.put(handle, products.clone());
                return Ok(products);
            }
        }

        warn!(handle, max_pages = self.config.max_pages, "集合分页超过上限");
        Err(SyncError::CollectionResolutionFailed {
            handle: handle.to_string(),
            page: self.config.max_pages,
            reason: "超过最大分页数".to_string(),
        })
    }
}
