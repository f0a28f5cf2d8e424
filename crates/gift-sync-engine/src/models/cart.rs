//! 购物车模型
//!
//! 购物车快照每次对账都重新拉取，不跨轮次缓存。
//! 金额统一使用最小货币单位（分）。

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 购物车行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// 行唯一标识，修改数量时使用
    pub key: String,
    pub variant_id: String,
    pub product_id: String,
    pub quantity: u32,
    /// 单价（最小货币单位）
    pub unit_price: i64,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl CartLine {
    /// 行小计（最小货币单位）
    pub fn line_total(&self) -> i64 {
        self.unit_price.saturating_mul(i64::from(self.quantity))
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}

/// 购物车快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub lines: Vec<CartLine>,
}

impl CartSnapshot {
    pub fn new(lines: Vec<CartLine>) -> Self {
        Self { lines }
    }

    /// 购物车小计（最小货币单位）
    pub fn subtotal(&self) -> i64 {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// 购物车小计（主币种单位）
    pub fn subtotal_major(&self) -> Decimal {
        minor_to_major(self.subtotal())
    }

    pub fn total_quantity(&self) -> u64 {
        self.lines.iter().map(|l| u64::from(l.quantity)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// 最小货币单位转换为主币种单位
pub fn minor_to_major(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// 赠品标记
///
/// 引擎添加的赠品行带 `gift_key` 属性；运营手动赠送的免费行带 `free_gift_key` 属性。
/// 两类行都不计入资格判定，但引擎只管理（增删改）前者。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftMarkers {
    pub gift_key: String,
    pub free_gift_key: String,
}

impl Default for GiftMarkers {
    fn default() -> Self {
        Self {
            gift_key: "_auto_gift".to_string(),
            free_gift_key: "_free_gift".to_string(),
        }
    }
}

impl GiftMarkers {
    pub fn new(gift_key: impl Into<String>, free_gift_key: impl Into<String>) -> Self {
        Self {
            gift_key: gift_key.into(),
            free_gift_key: free_gift_key.into(),
        }
    }

    /// 是否为引擎管理的赠品行
    pub fn is_gift(&self, line: &CartLine) -> bool {
        line.property(&self.gift_key).is_some_and(is_truthy)
    }

    /// 是否为手动赠送的免费行
    pub fn is_free_gift(&self, line: &CartLine) -> bool {
        line.property(&self.free_gift_key).is_some_and(is_truthy)
    }

    /// 是否排除在资格判定之外
    pub fn is_excluded(&self, line: &CartLine) -> bool {
        self.is_gift(line) || self.is_free_gift(line)
    }

    /// 赠品行加购时携带的属性
    pub fn gift_properties(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(self.gift_key.clone(), "true".to_string())])
    }
}

fn is_truthy(value: &str) -> bool {
    let v = value.trim();
    !(v.is_empty() || v.eq_ignore_ascii_case("false") || v == "0")
}

/// 当前购物车中的赠品行
///
/// 以规格 ID 识别；同一规格出现多行时，数量比对以第一行为准
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftLine {
    pub key: String,
    pub variant_id: String,
    pub quantity: u32,
}

impl GiftLine {
    /// 从快照中识别所有赠品行，保留购物车顺序
    pub fn collect(cart: &CartSnapshot, markers: &GiftMarkers) -> Vec<GiftLine> {
        cart.lines
            .iter()
            .filter(|line| markers.is_gift(line))
            .map(|line| GiftLine {
                key: line.key.clone(),
                variant_id: line.variant_id.clone(),
                quantity: line.quantity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(key: &str, variant: &str, qty: u32, price: i64, props: &[(&str, &str)]) -> CartLine {
        CartLine {
            key: key.to_string(),
            variant_id: variant.to_string(),
            product_id: format!("P-{variant}"),
            quantity: qty,
            unit_price: price,
            properties: props
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_snapshot_totals() {
        let cart = CartSnapshot::new(vec![
            line("k1", "V1", 2, 500, &[]),
            line("k2", "V2", 1, 250, &[]),
        ]);
        assert_eq!(cart.subtotal(), 1250);
        assert_eq!(cart.subtotal_major(), Decimal::new(1250, 2));
        assert_eq!(cart.total_quantity(), 3);
    }

    #[test]
    fn test_gift_markers() {
        let markers = GiftMarkers::default();
        let gift = line("k1", "V1", 1, 0, &[("_auto_gift", "true")]);
        let manual = line("k2", "V2", 1, 0, &[("_free_gift", "yes")]);
        let disabled = line("k3", "V3", 1, 0, &[("_auto_gift", "false")]);
        let normal = line("k4", "V4", 1, 100, &[("engraving", "A.B.")]);

        assert!(markers.is_gift(&gift));
        assert!(!markers.is_gift(&manual));
        assert!(markers.is_excluded(&manual));
        assert!(!markers.is_gift(&disabled));
        assert!(!markers.is_excluded(&normal));
        assert_eq!(markers.gift_properties().get("_auto_gift").unwrap(), "true");
    }

    #[test]
    fn test_collect_gift_lines_keeps_cart_order() {
        let markers = GiftMarkers::default();
        let cart = CartSnapshot::new(vec![
            line("k1", "V1", 1, 0, &[("_auto_gift", "true")]),
            line("k2", "V9", 3, 100, &[]),
            line("k3", "V5", 2, 0, &[("_auto_gift", "1")]),
        ]);

        let gifts = GiftLine::collect(&cart, &markers);
        assert_eq!(gifts.len(), 2);
        assert_eq!(gifts[0].key, "k1");
        assert_eq!(gifts[1].variant_id, "V5");
        assert_eq!(gifts[1].quantity, 2);
    }
}
