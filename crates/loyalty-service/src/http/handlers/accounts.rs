//! 内部账户 API
//!
//! 认证服务在用户注册后调用，为用户开通余额账户

use axum::{
    extract::{Path, State},
    http::StatusCode,
};

use crate::http::{error::ApiError, state::AppState};

/// 开户（幂等）
///
/// POST /api/internal/accounts/{user_id}
pub async fn open_account(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(ApiError::BadRequest("用户标识不能为空".to_string()));
    }

    state.balances.open_account(user_id).await?;
    Ok(StatusCode::CREATED)
}
