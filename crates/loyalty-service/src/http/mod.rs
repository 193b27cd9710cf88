//! HTTP 接口层
//!
//! 只做请求/响应映射，业务逻辑在 service 层。用户身份由上游认证网关
//! 通过 `X-User-Id` 请求头传入。

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
