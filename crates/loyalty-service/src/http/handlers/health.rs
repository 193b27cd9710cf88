//! 健康检查

use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};
use tracing::warn;

use crate::http::state::AppState;

/// GET /health
///
/// 配置了数据库时同时探测连接
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let database = match &state.database {
        None => "skipped",
        Some(db) => match db.health_check().await {
            Ok(()) => "ok",
            Err(e) => {
                warn!(error = %e, "数据库健康检查失败");
                "unavailable"
            }
        },
    };

    let status = if database == "unavailable" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "service": "loyalty-service",
            "database": database,
        })),
    )
}
