//! 购物车调用识别
//!
//! 按路径识别加购与改量调用：忽略查询串和语言前缀（如 `/fr/`、`/en-us/`），
//! `.js` 后缀可有可无。GET/HEAD 从不视为变更。

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static CART_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:/[a-z]{2}(?:-[a-z]{2,4})?)?/cart/(add|change|update|clear)(?:\.js)?/?$")
        .expect("cart path pattern is valid")
});

/// 归一化后的购物车信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CartSignal {
    /// 加购，立即触发对账
    Add,
    /// 改量、更新或清空，去抖后触发
    Mutate,
}

impl CartSignal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Mutate => "mutate",
        }
    }
}

/// 识别一次网络调用
pub fn classify(url: &str, method: &str) -> Option<CartSignal> {
    if !is_mutating_method(method) {
        return None;
    }
    let captures = CART_PATH.captures(path_of(url))?;
    match captures.get(1)?.as_str().to_ascii_lowercase().as_str() {
        "add" => Some(CartSignal::Add),
        _ => Some(CartSignal::Mutate),
    }
}

/// 识别一次表单提交，只有指向加购接口的提交才算信号
pub fn classify_form(action: &str, method: &str) -> Option<CartSignal> {
    classify(action, method).filter(|signal| *signal == CartSignal::Add)
}

fn is_mutating_method(method: &str) -> bool {
    let method = method.trim();
    !(method.is_empty() || method.eq_ignore_ascii_case("get") || method.eq_ignore_ascii_case("head"))
}

/// 取 URL 的路径部分，兼容绝对地址与相对路径
fn path_of(url: &str) -> &str {
    let url = url.trim();
    let without_origin = match url.find("://") {
        Some(idx) => {
            let rest = &url[idx + 3..];
            rest.find('/').map_or("/", |slash| &rest[slash..])
        }
        None => url,
    };
    let end = without_origin
        .find(['?', '#'])
        .unwrap_or(without_origin.len());
    &without_origin[..end]
}

/// 宿主页面上报的网络状况
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkCondition {
    /// `slow-2g` / `2g` / `3g` / `4g`
    #[serde(default)]
    pub effective_type: Option<String>,
    #[serde(default)]
    pub save_data: bool,
}

impl NetworkCondition {
    pub fn new(effective_type: impl Into<String>) -> Self {
        Self {
            effective_type: Some(effective_type.into()),
            save_data: false,
        }
    }

    /// 弱网或省流量模式下放宽去抖窗口
    pub fn is_poor(&self) -> bool {
        self.save_data
            || self
                .effective_type
                .as_deref()
                .map(str::trim)
                .is_some_and(|t| {
                    t.eq_ignore_ascii_case("slow-2g")
                        || t.eq_ignore_ascii_case("2g")
                        || t.eq_ignore_ascii_case("3g")
                })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_cart_endpoints() {
        assert_eq!(classify("/cart/add.js", "POST"), Some(CartSignal::Add));
        assert_eq!(classify("/cart/add", "post"), Some(CartSignal::Add));
        assert_eq!(classify("/cart/change.js", "POST"), Some(CartSignal::Mutate));
        assert_eq!(classify("/cart/update.js?foo=1", "POST"), Some(CartSignal::Mutate));
        assert_eq!(classify("/cart/clear", "POST"), Some(CartSignal::Mutate));
    }

    #[test]
    fn test_classify_ignores_locale_and_origin() {
        assert_eq!(
            classify("https://demo.myshopify.com/fr/cart/add.js", "POST"),
            Some(CartSignal::Add)
        );
        assert_eq!(classify("/en-us/cart/change", "POST"), Some(CartSignal::Mutate));
        assert_eq!(classify("/CART/ADD.JS", "POST"), Some(CartSignal::Add));
    }

    #[test]
    fn test_classify_ignores_reads_and_other_paths() {
        assert_eq!(classify("/cart.js", "GET"), None);
        assert_eq!(classify("/cart/add.js", "GET"), None);
        assert_eq!(classify("/cart/change.js", "HEAD"), None);
        assert_eq!(classify("/cart/add.js", ""), None);
        assert_eq!(classify("/cart", "POST"), None);
        assert_eq!(classify("/products/shirt.js", "POST"), None);
        assert_eq!(classify("/cart/additional", "POST"), None);
        assert_eq!(classify("https://demo.myshopify.com", "POST"), None);
    }

    #[test]
    fn test_classify_form_only_add() {
        assert_eq!(classify_form("/cart/add", "post"), Some(CartSignal::Add));
        assert_eq!(classify_form("/cart/change", "post"), None);
        assert_eq!(classify_form("/search", "get"), None);
    }

    #[test]
    fn test_network_condition() {
        assert!(NetworkCondition::new("slow-2g").is_poor());
        assert!(NetworkCondition::new("3G").is_poor());
        assert!(!NetworkCondition::new("4g").is_poor());
        assert!(!NetworkCondition::default().is_poor());
        assert!(
            NetworkCondition {
                effective_type: Some("4g".to_string()),
                save_data: true
            }
            .is_poor()
        );
    }
}
