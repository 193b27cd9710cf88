//! 积分计算服务（accrual）客户端
//!
//! 外部服务按订单号返回计算结果，可能限流（429）、暂时不认识订单（204）
//! 或者短暂返回错误数据。客户端把每次响应归为三类：
//! 结果（[`AccrualVerdict`]）、限流、瞬时错误。

mod client;
mod limiter;

pub use client::AccrualClient;
pub use limiter::RateLimiter;

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 积分计算服务报告的订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccrualStatus {
    /// 已登记，尚未开始计算
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl AccrualStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "REGISTERED",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
        }
    }
}

/// 一次轮询得到的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualVerdict {
    pub order: String,
    pub status: AccrualStatus,
    /// 缺省按 0 处理；只对 PROCESSED 有意义
    #[serde(default)]
    pub accrual: Decimal,
}

/// 轮询失败
///
/// 除 `RateLimited` 外都是瞬时错误，调用方在下一个周期重试即可。
#[derive(Debug, Error)]
pub enum AccrualError {
    #[error("积分计算服务限流，{retry_after:?} 后重试")]
    RateLimited { retry_after: Duration },

    #[error("积分计算服务尚未登记订单: {0}")]
    UnknownOrder(String),

    #[error("积分计算服务返回非预期状态码: {0}")]
    UnexpectedStatus(u16),

    #[error("响应解析失败: {0}")]
    Decode(String),

    #[error("响应订单号不匹配: expected={expected}, actual={actual}")]
    OrderMismatch { expected: String, actual: String },

    #[error("HTTP 请求失败: {0}")]
    Http(#[from] reqwest::Error),
}

impl AccrualError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// 指标标签
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::UnknownOrder(_) => "unknown_order",
            Self::UnexpectedStatus(_) => "unexpected_status",
            Self::Decode(_) => "decode_error",
            Self::OrderMismatch { .. } => "order_mismatch",
            Self::Http(_) => "http_error",
        }
    }
}

/// 订单结果来源
///
/// 生产环境由 [`AccrualClient`] 实现；测试可替换为脚本化的实现。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualSource: Send + Sync {
    async fn poll(&self, number: &str) -> Result<AccrualVerdict, AccrualError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_decoding() {
        let verdict: AccrualVerdict =
            serde_json::from_str(r#"{"order":"79927398713","status":"PROCESSED","accrual":729.98}"#)
                .unwrap();
        assert_eq!(verdict.status, AccrualStatus::Processed);
        assert_eq!(verdict.accrual, Decimal::new(72998, 2));
    }

    #[test]
    fn test_missing_accrual_defaults_to_zero() {
        let verdict: AccrualVerdict =
            serde_json::from_str(r#"{"order":"79927398713","status":"PROCESSING"}"#).unwrap();
        assert_eq!(verdict.status, AccrualStatus::Processing);
        assert_eq!(verdict.accrual, Decimal::ZERO);
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result: Result<AccrualVerdict, _> =
            serde_json::from_str(r#"{"order":"79927398713","status":"DONE"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_outcome_labels() {
        let err = AccrualError::RateLimited {
            retry_after: Duration::from_secs(10),
        };
        assert!(err.is_rate_limited());
        assert_eq!(err.outcome(), "rate_limited");
        assert!(!AccrualError::UnexpectedStatus(500).is_rate_limited());
    }
}
