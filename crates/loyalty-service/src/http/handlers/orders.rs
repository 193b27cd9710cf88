//! 订单 API 处理器

use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};

use crate::http::{
    dto::OrderResponse, error::ApiError, middleware::CurrentUser, state::AppState,
};
use crate::models::RegisterOutcome;

/// 登记订单
///
/// POST /api/user/orders，请求体为纯文本订单号
pub async fn register_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ApiError> {
    let is_text = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/plain"));
    if !is_text {
        return Err(ApiError::BadRequest(
            "Content-Type 必须为 text/plain".to_string(),
        ));
    }

    let number = body.trim();
    if number.is_empty() {
        return Err(ApiError::BadRequest("订单号不能为空".to_string()));
    }

    let status = match state.orders.register(user.id(), number).await? {
        RegisterOutcome::Accepted => StatusCode::ACCEPTED,
        RegisterOutcome::AlreadyRegistered => StatusCode::OK,
    };
    Ok(status)
}

/// 用户订单列表
///
/// GET /api/user/orders，没有订单时返回 204
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Response, ApiError> {
    let orders = state.orders.orders_of(user.id()).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let items: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(Json(items).into_response())
}
