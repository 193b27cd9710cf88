//! 积分服务错误类型
//!
//! 定义服务层的业务错误和系统错误

use rust_decimal::Decimal;
use thiserror::Error;

/// 积分服务错误类型
#[derive(Debug, Error)]
pub enum LoyaltyError {
    // === 格式错误 ===
    #[error("订单号格式无效: {0}")]
    InvalidOrderNumber(String),

    #[error("金额无效: {0}")]
    InvalidAmount(String),

    // === 订单相关错误 ===
    #[error("订单已被其他用户登记: {0}")]
    OrderOwnedByOther(String),

    // === 余额相关错误 ===
    #[error("余额不足: user_id={user_id}, 请求金额 {requested}")]
    InsufficientFunds { user_id: String, requested: Decimal },

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 积分服务 Result 类型别名
pub type Result<T> = std::result::Result<T, LoyaltyError>;

impl LoyaltyError {
    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(self, Self::Database(_) | Self::Internal(_))
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidOrderNumber(_) => "INVALID_ORDER_NUMBER",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::OrderOwnedByOther(_) => "ORDER_OWNED_BY_OTHER",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
