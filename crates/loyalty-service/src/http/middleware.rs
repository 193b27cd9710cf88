//! 用户身份中间件
//!
//! 认证由上游网关完成，这里只读取 `X-User-Id` 并注入请求扩展

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::error::ApiError;

/// 网关注入的用户标识请求头
pub const USER_ID_HEADER: &str = "x-user-id";

/// 当前请求的用户
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser(pub String);

impl CurrentUser {
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// 要求请求携带用户标识，缺失或为空时返回 401
pub async fn require_user(mut request: Request, next: Next) -> Response {
    let user = request
        .headers()
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    match user {
        Some(user_id) => {
            request.extensions_mut().insert(CurrentUser(user_id));
            next.run(request).await
        }
        None => ApiError::Unauthorized("缺少用户标识".to_string()).into_response(),
    }
}
