//! HTTP 错误映射
//!
//! 业务错误映射到对应状态码；系统错误只返回通用提示，详细信息记录日志

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::LoyaltyError;

/// HTTP 层错误类型
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("未授权: {0}")]
    Unauthorized(String),

    #[error("请求格式错误: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),
}

impl ApiError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Loyalty(e) => match e {
                LoyaltyError::InvalidOrderNumber(_) | LoyaltyError::InvalidAmount(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                LoyaltyError::OrderOwnedByOther(_) => StatusCode::CONFLICT,
                LoyaltyError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
                LoyaltyError::Database(_) | LoyaltyError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Loyalty(e) => e.error_code(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = match &self {
            Self::Loyalty(e) if !e.is_business_error() => {
                tracing::error!(error = %e, code = e.error_code(), "请求处理失败");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}
