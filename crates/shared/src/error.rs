//! 统一错误处理模块
//!
//! 定义基础设施层共享的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 基础设施错误类型
#[derive(Debug, Error)]
pub enum GiftError {
    // ==================== 配置错误 ====================
    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    // ==================== 数据库错误 ====================
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("记录未找到: {entity} id={id}")]
    NotFound { entity: String, id: String },

    // ==================== 缓存错误 ====================
    #[error("Redis 错误: {0}")]
    Redis(#[from] redis::RedisError),

    // ==================== 序列化错误 ====================
    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    // ==================== 外部服务错误 ====================
    #[error("外部服务错误: {service} - {message}")]
    ExternalService { service: String, message: String },

    #[error("外部服务超时: {service}")]
    ExternalServiceTimeout { service: String },

    // ==================== 通用错误 ====================
    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, GiftError>;

impl GiftError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            Self::ExternalServiceTimeout { .. } => "EXTERNAL_SERVICE_TIMEOUT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 是否为可重试错误
    ///
    /// 引擎本身不做重试，这里只用于日志分级：可重试错误按 warn 记录。
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Redis(_)
                | Self::ExternalService { .. }
                | Self::ExternalServiceTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        let err = GiftError::NotFound {
            entity: "ShopConfig".to_string(),
            id: "demo-shop".to_string(),
        };
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(GiftError::Internal("bug".to_string()).code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_is_retryable() {
        let db_err = GiftError::Database(sqlx::Error::PoolTimedOut);
        assert!(db_err.is_retryable());

        let timeout = GiftError::ExternalServiceTimeout {
            service: "storefront".to_string(),
        };
        assert!(timeout.is_retryable());

        assert!(!GiftError::Internal("bug".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = GiftError::ExternalService {
            service: "cart".to_string(),
            message: "HTTP 502".to_string(),
        };
        assert_eq!(err.to_string(), "外部服务错误: cart - HTTP 502");
    }
}
