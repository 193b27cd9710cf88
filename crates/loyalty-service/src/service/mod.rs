//! 业务服务层

mod balance_service;
mod order_service;

pub use balance_service::BalanceService;
pub use order_service::OrderService;
