//! 测试工具模块
//!
//! 提供内存版的购物车、配置源与集合数据源，用于端到端验证对账行为。
//! 与 mockall 生成的 mock 不同，这里的实现会真实地修改内存中的购物车状态。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use gift_shared::error::GiftError;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

use crate::config_cache::{ConfigCache, DurableConfigSource, FastConfigCache};
use crate::error::{Result, SyncError};
use crate::models::{CartLine, CartSnapshot, ShopConfig};
use crate::platform::{CartApi, CollectionPage, CollectionSource};

// ==================== 配置 ====================

/// 内存持久化配置源，记录读取次数
#[derive(Default)]
pub struct StaticConfigSource {
    raw: Mutex<Option<String>>,
    fail: Mutex<bool>,
    fetches: AtomicUsize,
}

impl StaticConfigSource {
    pub fn from_json(value: Value) -> Self {
        Self::from_raw(Some(value.to_string()))
    }

    pub fn from_raw(raw: Option<String>) -> Self {
        Self {
            raw: Mutex::new(raw),
            ..Default::default()
        }
    }

    pub fn set_json(&self, value: Value) {
        *self.raw.lock() = Some(value.to_string());
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurableConfigSource for StaticConfigSource {
    async fn fetch_raw(&self, _shop_key: &str) -> Result<Option<String>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if *self.fail.lock() {
            return Err(GiftError::Internal("durable source offline".to_string()).into());
        }
        Ok(self.raw.lock().clone())
    }
}

/// 内存快速缓存
#[derive(Default)]
pub struct InMemoryConfigCache {
    entries: Mutex<HashMap<String, ShopConfig>>,
}

impl InMemoryConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, shop_key: &str) -> bool {
        self.entries.lock().contains_key(shop_key)
    }
}

#[async_trait]
impl FastConfigCache for InMemoryConfigCache {
    async fn get(&self, shop_key: &str) -> Result<Option<ShopConfig>> {
        Ok(self.entries.lock().get(shop_key).cloned())
    }

    async fn put(&self, shop_key: &str, config: &ShopConfig) -> Result<()> {
        self.entries
            .lock()
            .insert(shop_key.to_string(), config.clone());
        Ok(())
    }
}

/// 始终未命中的快速缓存，配置改动立即可见
pub struct PassThroughCache;

#[async_trait]
impl FastConfigCache for PassThroughCache {
    async fn get(&self, _shop_key: &str) -> Result<Option<ShopConfig>> {
        Ok(None)
    }

    async fn put(&self, _shop_key: &str, _config: &ShopConfig) -> Result<()> {
        Ok(())
    }
}

/// 不做缓存的配置读取
pub fn static_config_cache(source: Arc<dyn DurableConfigSource>) -> ConfigCache {
    ConfigCache::new(Arc::new(PassThroughCache), source)
}

// ==================== 购物车 ====================

/// 购物车调用记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartCall {
    Fetch,
    Add { variant_id: String, quantity: u32 },
    Change { line_key: String, quantity: u32 },
}

/// 内存购物车
///
/// 加购生成新行（key 为 `gift-{n}`），改量为 0 时删除该行
#[derive(Default)]
pub struct FakeCart {
    lines: Mutex<Vec<CartLine>>,
    calls: Mutex<Vec<CartCall>>,
    failing_variants: Mutex<HashSet<String>>,
    fetch_unavailable: Mutex<bool>,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
    next_key: AtomicU64,
}

impl FakeCart {
    pub fn new(lines: Vec<CartLine>) -> Self {
        Self {
            lines: Mutex::new(lines),
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot::new(self.lines.lock().clone())
    }

    /// 模拟宿主页面直接修改购物车
    pub fn set_lines(&self, lines: Vec<CartLine>) {
        *self.lines.lock() = lines;
    }

    pub fn calls(&self) -> Vec<CartCall> {
        self.calls.lock().clone()
    }

    /// 变更调用（不含读取）
    pub fn mutation_calls(&self) -> Vec<CartCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| !matches!(c, CartCall::Fetch))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// 让指定规格的加购请求失败
    pub fn fail_adds_for(&self, variant_id: &str) {
        self.failing_variants.lock().insert(variant_id.to_string());
    }

    pub fn set_fetch_unavailable(&self, unavailable: bool) {
        *self.fetch_unavailable.lock() = unavailable;
    }

    /// 阻塞后续读取，直到返回的 Notify 被触发
    pub fn hold_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.fetch_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn release_fetches(&self) {
        if let Some(gate) = self.fetch_gate.lock().take() {
            gate.notify_waiters();
        }
    }

    /// 带指定标记属性的行
    pub fn gift_lines(&self, gift_key: &str) -> Vec<CartLine> {
        self.lines
            .lock()
            .iter()
            .filter(|l| l.properties.contains_key(gift_key))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CartApi for FakeCart {
    async fn fetch_cart(&self) -> Result<CartSnapshot> {
        self.calls.lock().push(CartCall::Fetch);

        let gate = self.fetch_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        if *self.fetch_unavailable.lock() {
            return Err(SyncError::CartUnavailable("cart.js returned 503".to_string()));
        }
        Ok(self.snapshot())
    }

    async fn add_line(
        &self,
        variant_id: &str,
        quantity: u32,
        properties: BTreeMap<String, String>,
    ) -> Result<()> {
        self.calls.lock().push(CartCall::Add {
            variant_id: variant_id.to_string(),
            quantity,
        });

        if self.failing_variants.lock().contains(variant_id) {
            return Err(GiftError::ExternalService {
                service: "storefront-cart".to_string(),
                message: "422 Unprocessable Entity".to_string(),
            }
            .into());
        }

        let n = self.next_key.fetch_add(1, Ordering::SeqCst);
        self.lines.lock().push(CartLine {
            key: format!("gift-{n}"),
            variant_id: variant_id.to_string(),
            product_id: format!("gift-product-{variant_id}"),
            quantity,
            unit_price: 0,
            properties,
        });
        Ok(())
    }

    async fn change_line(&self, line_key: &str, quantity: u32) -> Result<()> {
        self.calls.lock().push(CartCall::Change {
            line_key: line_key.to_string(),
            quantity,
        });

        let mut lines = self.lines.lock();
        let Some(pos) = lines.iter().position(|l| l.key == line_key) else {
            return Err(GiftError::NotFound {
                entity: "cart line".to_string(),
                id: line_key.to_string(),
            }
            .into());
        };
        if quantity == 0 {
            lines.remove(pos);
        } else {
            lines[pos].quantity = quantity;
        }
        Ok(())
    }
}

/// 构造普通商品行
pub fn cart_line(key: &str, product_id: &str, variant_id: &str, quantity: u32, unit_price: i64) -> CartLine {
    CartLine {
        key: key.to_string(),
        variant_id: variant_id.to_string(),
        product_id: product_id.to_string(),
        quantity,
        unit_price,
        properties: BTreeMap::new(),
    }
}

// ==================== 商品集合 ====================

/// 内存集合数据源，按页切分
#[derive(Default)]
pub struct StaticCollections {
    collections: Mutex<HashMap<String, Vec<String>>>,
    failing: Mutex<HashSet<String>>,
    fetches: AtomicUsize,
}

impl StaticCollections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(self, handle: &str, product_ids: &[&str]) -> Self {
        self.collections.lock().insert(
            handle.to_string(),
            product_ids.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn fail(&self, handle: &str) {
        self.failing.lock().insert(handle.to_string());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollectionSource for StaticCollections {
    async fn fetch_page(&self, handle: &str, page: u32, limit: usize) -> Result<CollectionPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().contains(handle) {
            return Err(GiftError::ExternalServiceTimeout {
                service: "storefront-collections".to_string(),
            }
            .into());
        }

        let collections = self.collections.lock();
        let Some(ids) = collections.get(handle) else {
            return Ok(CollectionPage::default());
        };
        let start = (page.saturating_sub(1) as usize).saturating_mul(limit);
        let product_ids: Vec<String> = ids.iter().skip(start).take(limit).cloned().collect();
        Ok(product_ids.into())
    }
}
