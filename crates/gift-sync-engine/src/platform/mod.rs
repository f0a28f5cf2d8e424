//! 店铺平台协作方
//!
//! 通过 trait 抽象购物车 API 与商品集合列表 API，便于测试时注入 mock 实现：
//! - `cart`: 读取购物车快照、加购、按行修改数量
//! - `collections`: 分页读取集合内商品

pub mod cart;
pub mod collections;

pub use cart::{CartApi, HttpCartClient};
pub use collections::{CollectionPage, CollectionSource, HttpCollectionClient};

use std::time::Duration;

use gift_shared::config::StorefrontConfig;
use gift_shared::error::GiftError;
use reqwest::Url;
use reqwest::header::{COOKIE, HeaderMap, HeaderValue};

/// 店铺前台 HTTP 基础客户端
///
/// 购物车与集合客户端共用同一个连接池；reqwest::Client clone 是廉价操作
#[derive(Clone)]
pub struct StorefrontHttp {
    client: reqwest::Client,
    base_url: Url,
}

impl StorefrontHttp {
    pub fn new(config: &StorefrontConfig) -> Result<Self, GiftError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| GiftError::Internal(format!("无效的店铺地址 {}: {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(GiftError::Internal(format!(
                "无效的店铺地址: {}",
                config.base_url
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some(cookie) = config.session_cookie.as_deref().filter(|c| !c.is_empty()) {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| GiftError::Internal(format!("无效的会话 cookie: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .default_headers(headers)
            .build()
            .map_err(|e| GiftError::Internal(format!("HTTP 客户端创建失败: {e}")))?;

        Ok(Self { client, base_url })
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// 在店铺地址后拼接路径段，路径段会被正确转义
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }
}

/// 将 reqwest 错误转换为共享错误
pub(crate) fn http_error(service: &str, err: reqwest::Error) -> GiftError {
    if err.is_timeout() {
        GiftError::ExternalServiceTimeout {
            service: service.to_string(),
        }
    } else {
        GiftError::ExternalService {
            service: service.to_string(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storefront(base_url: &str) -> StorefrontConfig {
        StorefrontConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_endpoint_joins_and_escapes_segments() {
        let http = StorefrontHttp::new(&storefront("https://demo.example/")).unwrap();
        assert_eq!(
            http.endpoint(&["cart", "add.js"]).as_str(),
            "https://demo.example/cart/add.js"
        );
        assert_eq!(
            http.endpoint(&["collections", "summer sale", "products.json"]).as_str(),
            "https://demo.example/collections/summer%20sale/products.json"
        );
    }

    #[test]
    fn test_endpoint_keeps_locale_prefix() {
        let http = StorefrontHttp::new(&storefront("https://demo.example/en-gb")).unwrap();
        assert_eq!(
            http.endpoint(&["cart.js"]).as_str(),
            "https://demo.example/en-gb/cart.js"
        );
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        assert!(StorefrontHttp::new(&storefront("not a url")).is_err());
        assert!(StorefrontHttp::new(&storefront("mailto:shop@example.com")).is_err());
    }
}
