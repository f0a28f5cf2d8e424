//! 赠品同步错误类型
//!
//! 所有错误都只在本地诊断通道（日志/指标）中暴露，不会传播到店铺页面。

use gift_shared::error::GiftError;

/// 对账过程中的错误
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// 持久化配置源不可达或配置格式错误，本轮对账中止且不动赠品行
    #[error("活动配置不可用: shop={shop_key}, {reason}")]
    ConfigUnavailable { shop_key: String, reason: String },

    /// 购物车 API 不可达，本轮对账中止且不动赠品行
    #[error("购物车不可用: {0}")]
    CartUnavailable(String),

    /// 单个加购/改量/移除调用失败，不影响同轮其他调用
    #[error("购物车变更失败: {operation} variant={variant_id}, {reason}")]
    MutationFailed {
        operation: &'static str,
        variant_id: String,
        reason: String,
    },

    /// 商品集合分页拉取中途失败，对应目标按不满足处理
    #[error("商品集合解析失败: handle={handle}, page={page}, {reason}")]
    CollectionResolutionFailed {
        handle: String,
        page: u32,
        reason: String,
    },

    #[error(transparent)]
    Shared(#[from] GiftError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl SyncError {
    pub fn config_unavailable(shop_key: &str, reason: impl ToString) -> Self {
        Self::ConfigUnavailable {
            shop_key: shop_key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// 获取错误码（用于日志和指标标签）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ConfigUnavailable { .. } => "CONFIG_UNAVAILABLE",
            Self::CartUnavailable(_) => "CART_UNAVAILABLE",
            Self::MutationFailed { .. } => "MUTATION_FAILED",
            Self::CollectionResolutionFailed { .. } => "COLLECTION_RESOLUTION_FAILED",
            Self::Shared(e) => e.code(),
        }
    }

    /// 下一轮对账是否有望自动恢复
    ///
    /// 引擎从不就地重试，这里只影响日志级别
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConfigUnavailable { .. }
            | Self::CartUnavailable(_)
            | Self::MutationFailed { .. }
            | Self::CollectionResolutionFailed { .. } => true,
            Self::Shared(e) => e.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SyncError::config_unavailable("demo-shop", "connection refused");
        assert_eq!(
            err.to_string(),
            "活动配置不可用: shop=demo-shop, connection refused"
        );

        let err = SyncError::MutationFailed {
            operation: "add",
            variant_id: "V2".to_string(),
            reason: "HTTP 422".to_string(),
        };
        assert_eq!(err.to_string(), "购物车变更失败: add variant=V2, HTTP 422");

        let err = SyncError::CollectionResolutionFailed {
            handle: "summer".to_string(),
            page: 2,
            reason: "timeout".to_string(),
        };
        assert!(err.to_string().contains("page=2"));
    }

    #[test]
    fn test_error_code() {
        assert_eq!(
            SyncError::CartUnavailable("x".to_string()).error_code(),
            "CART_UNAVAILABLE"
        );
        let shared = SyncError::Shared(GiftError::Internal("boom".to_string()));
        assert_eq!(shared.error_code(), "INTERNAL_ERROR");
        assert!(!shared.is_retryable());
        assert!(SyncError::CartUnavailable("x".to_string()).is_retryable());
    }
}
