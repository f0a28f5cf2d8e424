//! 购物车 API 客户端
//!
//! 对接店铺前台 AJAX 购物车接口：
//! - `GET  /cart.js` 读取快照
//! - `POST /cart/add.js` 加购
//! - `POST /cart/change.js` 按行 key 设置数量（0 表示移除）
//!
//! 每次调用都是"设置为 N"语义，引擎从不依赖变更接口的返回快照。

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{StorefrontHttp, http_error};
use crate::error::{Result, SyncError};
use crate::models::{CartLine, CartSnapshot, normalize_id};

const SERVICE: &str = "storefront-cart";

/// 购物车 API 抽象
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartApi: Send + Sync {
    /// 读取当前购物车快照
    async fn fetch_cart(&self) -> Result<CartSnapshot>;

    /// 加购一行
    async fn add_line(
        &self,
        variant_id: &str,
        quantity: u32,
        properties: BTreeMap<String, String>,
    ) -> Result<()>;

    /// 按行 key 设置数量
    async fn change_line(&self, line_key: &str, quantity: u32) -> Result<()>;
}

/// 基于 reqwest 的购物车 API 实现
pub struct HttpCartClient {
    http: StorefrontHttp,
}

impl HttpCartClient {
    pub fn new(http: StorefrontHttp) -> Self {
        Self { http }
    }
}

#[async_trait]
impl CartApi for HttpCartClient {
    #[instrument(skip(self))]
    async fn fetch_cart(&self) -> Result<CartSnapshot> {
        let url = self.http.endpoint(&["cart.js"]);
        let response = self
            .http
            .client()
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SyncError::CartUnavailable(http_error(SERVICE, e).to_string()))?;

        let raw: RawCart = response
            .json()
            .await
            .map_err(|e| SyncError::CartUnavailable(format!("购物车响应解析失败: {e}")))?;

        let snapshot = raw.into_snapshot();
        debug!(lines = snapshot.lines.len(), "购物车快照已读取");
        Ok(snapshot)
    }

    #[instrument(skip(self, properties))]
    async fn add_line(
        &self,
        variant_id: &str,
        quantity: u32,
        properties: BTreeMap<String, String>,
    ) -> Result<()> {
        let body = AddRequest {
            items: vec![AddItem {
                id: IdValue::from_id(variant_id),
                quantity,
                properties,
            }],
        };

        self.http
            .client()
            .post(self.http.endpoint(&["cart", "add.js"]))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error(SERVICE, e))?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn change_line(&self, line_key: &str, quantity: u32) -> Result<()> {
        let body = ChangeRequest {
            id: line_key,
            quantity,
        };

        self.http
            .client()
            .post(self.http.endpoint(&["cart", "change.js"]))
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| http_error(SERVICE, e))?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// 接口报文
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawCart {
    #[serde(default)]
    items: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    key: String,
    variant_id: serde_json::Value,
    product_id: serde_json::Value,
    quantity: u32,
    /// 单价，最小货币单位
    #[serde(default)]
    price: i64,
    #[serde(default)]
    properties: Option<BTreeMap<String, serde_json::Value>>,
}

impl RawCart {
    fn into_snapshot(self) -> CartSnapshot {
        CartSnapshot::new(self.items.into_iter().map(RawItem::into_line).collect())
    }
}

impl RawItem {
    fn into_line(self) -> CartLine {
        let properties = self
            .properties
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(k, v)| match v {
                serde_json::Value::Null => None,
                serde_json::Value::String(s) => Some((k, s)),
                other => Some((k, other.to_string())),
            })
            .collect();

        CartLine {
            key: self.key,
            variant_id: json_id(&self.variant_id),
            product_id: json_id(&self.product_id),
            quantity: self.quantity,
            unit_price: self.price,
            properties,
        }
    }
}

fn json_id(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => normalize_id(s),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// 规格 ID：纯数字时按数字发送，否则按字符串发送
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum IdValue {
    Number(u64),
    Text(String),
}

impl IdValue {
    fn from_id(id: &str) -> Self {
        id.parse::<u64>()
            .map(IdValue::Number)
            .unwrap_or_else(|_| IdValue::Text(id.to_string()))
    }
}

#[derive(Debug, Serialize)]
struct AddRequest {
    items: Vec<AddItem>,
}

#[derive(Debug, Serialize)]
struct AddItem {
    id: IdValue,
    quantity: u32,
    properties: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
struct ChangeRequest<'a> {
    id: &'a str,
    quantity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_cart_js_payload() {
        let raw: RawCart = serde_json::from_value(json!({
            "token": "abc",
            "item_count": 3,
            "items": [
                {
                    "key": "111:aaa",
                    "id": 111,
                    "variant_id": 111,
                    "product_id": 900,
                    "quantity": 2,
                    "price": 1500,
                    "properties": {"engraving": "AB", "_auto_gift": null}
                },
                {
                    "key": "222:bbb",
                    "variant_id": "gid://shopify/ProductVariant/222",
                    "product_id": 901,
                    "quantity": 1,
                    "price": 0,
                    "properties": {"_auto_gift": "true", "_position": 3}
                },
                {
                    "key": "333:ccc",
                    "variant_id": 333,
                    "product_id": 902,
                    "quantity": 1,
                    "properties": null
                }
            ]
        }))
        .unwrap();

        let snapshot = raw.into_snapshot();
        assert_eq!(snapshot.lines.len(), 3);

        let first = &snapshot.lines[0];
        assert_eq!(first.variant_id, "111");
        assert_eq!(first.product_id, "900");
        assert_eq!(first.unit_price, 1500);
        assert_eq!(first.property("engraving"), Some("AB"));
        // null 属性被忽略
        assert!(first.property("_auto_gift").is_none());

        let second = &snapshot.lines[1];
        assert_eq!(second.variant_id, "222");
        assert_eq!(second.property("_position"), Some("3"));

        assert!(snapshot.lines[2].properties.is_empty());
        assert_eq!(snapshot.subtotal(), 3000);
    }

    #[test]
    fn test_add_request_encoding() {
        let body = AddRequest {
            items: vec![AddItem {
                id: IdValue::from_id("4242"),
                quantity: 1,
                properties: BTreeMap::from([("_auto_gift".to_string(), "true".to_string())]),
            }],
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"items": [{"id": 4242, "quantity": 1, "properties": {"_auto_gift": "true"}}]})
        );

        assert_eq!(
            serde_json::to_value(IdValue::from_id("V2")).unwrap(),
            json!("V2")
        );
    }

    #[test]
    fn test_change_request_encoding() {
        let body = ChangeRequest {
            id: "111:aaa",
            quantity: 0,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"id": "111:aaa", "quantity": 0})
        );
    }
}
