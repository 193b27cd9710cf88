//! 积分对账服务
//!
//! 用户上传订单号后，服务持续轮询外部积分计算服务，把结果迁移到订单状态，
//! 并在订单处理完成时给用户入账；用户可以查询余额、用积分抵扣新订单。
//!
//! ## 模块
//!
//! - `accrual`：积分计算服务客户端与共享限流器
//! - `reconciliation`：每个订单一个轮询任务的对账调度器
//! - `repository`：PostgreSQL 与内存两种存储实现
//! - `service`：订单登记、余额与提现业务逻辑
//! - `http`：用户与内部 REST API

pub mod accrual;
pub mod cli;
pub mod error;
pub mod http;
pub mod models;
pub mod reconciliation;
pub mod repository;
pub mod service;

pub use error::{LoyaltyError, Result};
