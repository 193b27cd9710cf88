//! 路由配置模块

use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use loyalty_shared::observability::middleware::http_tracing;
use tower_http::{compression::CompressionLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::{handlers, middleware::require_user, state::AppState};

/// 单个请求的处理超时
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// 用户 API（需要 `X-User-Id`）
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/orders",
            post(handlers::orders::register_order).get(handlers::orders::list_orders),
        )
        .route("/balance", get(handlers::balance::get_balance))
        .route("/balance/withdraw", post(handlers::balance::withdraw))
        .route("/withdrawals", get(handlers::balance::list_withdrawals))
        .route_layer(middleware::from_fn(require_user))
}

/// 内部 API（供认证服务调用）
pub fn internal_routes() -> Router<AppState> {
    Router::new().route(
        "/accounts/{user_id}",
        post(handlers::accounts::open_account),
    )
}

/// 构建完整应用路由
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/user", user_routes())
        .nest("/api/internal", internal_routes())
        .route("/health", get(handlers::health::health_check))
        .route_layer(middleware::from_fn(http_tracing))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
