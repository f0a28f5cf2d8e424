//! 平台 ID 与数值字段的宽松解析
//!
//! 活动配置由后台表单写入，同一字段可能是数字也可能是字符串；
//! 商品/规格 ID 既可能是纯数字，也可能是 `gid://shopify/ProductVariant/123` 形式的全局 ID。

use serde::{Deserialize, Deserializer};

/// 归一化平台 ID，取全局 ID 的最后一段并去掉查询串
///
/// `gid://shopify/ProductVariant/123?foo=1` -> `123`，`456` -> `456`
pub fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_query = trimmed.split('?').next().unwrap_or(trimmed);
    without_query
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(without_query)
        .to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

/// 反序列化 ID：接受数字或字符串，统一为归一化后的字符串
pub(crate) fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Unsigned(n) => Ok(n.to_string()),
        NumberOrString::Signed(n) => Ok(n.to_string()),
        NumberOrString::Float(f) => Ok(format!("{}", f as i64)),
        NumberOrString::Text(s) => Ok(normalize_id(&s)),
    }
}

/// 可选 ID，null 或空字符串视为缺失
pub(crate) fn de_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<NumberOrString>::deserialize(deserializer)?;
    Ok(match value {
        None => None,
        Some(NumberOrString::Text(s)) if s.trim().is_empty() => None,
        Some(NumberOrString::Text(s)) => Some(normalize_id(&s)),
        Some(NumberOrString::Unsigned(n)) => Some(n.to_string()),
        Some(NumberOrString::Signed(n)) => Some(n.to_string()),
        Some(NumberOrString::Float(f)) => Some(format!("{}", f as i64)),
    })
}

/// 反序列化数量：接受数字或数字字符串，负数与无法解析的值按 0 处理
pub(crate) fn de_quantity<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<NumberOrString>::deserialize(deserializer)?;
    Ok(match value {
        Some(NumberOrString::Unsigned(n)) => u32::try_from(n).unwrap_or(u32::MAX),
        Some(NumberOrString::Signed(n)) => u32::try_from(n.max(0)).unwrap_or(u32::MAX),
        Some(NumberOrString::Float(f)) if f > 0.0 => f as u32,
        Some(NumberOrString::Text(s)) => s.trim().parse::<u32>().unwrap_or(0),
        _ => 0,
    })
}

/// 反序列化数值目标：接受数字或数字字符串，无法解析时为 0
pub(crate) fn de_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<NumberOrString>::deserialize(deserializer)?;
    Ok(match value {
        Some(NumberOrString::Unsigned(n)) => n as f64,
        Some(NumberOrString::Signed(n)) => n as f64,
        Some(NumberOrString::Float(f)) => f,
        Some(NumberOrString::Text(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        None => 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "de_id")]
        id: String,
        #[serde(default, deserialize_with = "de_quantity")]
        qty: u32,
        #[serde(default, deserialize_with = "de_opt_id")]
        variant: Option<String>,
    }

    #[test]
    fn test_normalize_global_id() {
        assert_eq!(normalize_id("gid://shopify/ProductVariant/123"), "123");
        assert_eq!(normalize_id("gid://shopify/Product/77?from=admin"), "77");
        assert_eq!(normalize_id(" 456 "), "456");
        assert_eq!(normalize_id("P1"), "P1");
    }

    #[test]
    fn test_lenient_fields() {
        let probe: Probe = serde_json::from_value(json!({"id": 42, "qty": "3"})).unwrap();
        assert_eq!(probe.id, "42");
        assert_eq!(probe.qty, 3);
        assert!(probe.variant.is_none());

        let probe: Probe =
            serde_json::from_value(json!({"id": "gid://shopify/Product/9", "qty": -2, "variant": ""}))
                .unwrap();
        assert_eq!(probe.id, "9");
        assert_eq!(probe.qty, 0);
        assert!(probe.variant.is_none());
    }
}
