//! 余额与提现 API 处理器

use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::http::{
    dto::{BalanceResponse, WithdrawRequest, WithdrawalResponse},
    error::ApiError,
    middleware::CurrentUser,
    state::AppState,
};

/// 查询余额
///
/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.balances.balance(user.id()).await?;
    Ok(Json(balance.into()))
}

/// 提现
///
/// POST /api/user/balance/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    state
        .balances
        .withdraw(user.id(), request.order.trim(), request.sum)
        .await?;

    Ok(StatusCode::OK)
}

/// 提现流水
///
/// GET /api/user/withdrawals，没有记录时返回 204
pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    let withdrawals = state.balances.withdrawals(user.id()).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let items: Vec<WithdrawalResponse> = withdrawals
        .into_iter()
        .map(WithdrawalResponse::from)
        .collect();
    Ok(Json(items).into_response())
}
