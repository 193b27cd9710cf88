//! 共享库
//!
//! 包含所有服务共用的配置、错误处理、数据库连接、可观测性、重试策略和订单号校验等基础设施代码。

pub mod config;
pub mod database;
pub mod error;
pub mod luhn;
pub mod observability;
pub mod retry;
