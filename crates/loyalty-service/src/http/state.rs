//! 应用状态定义

use std::sync::Arc;

use loyalty_shared::database::Database;

use crate::service::{BalanceService, OrderService};

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub balances: Arc<BalanceService>,
    /// 使用内存存储时为空，健康检查跳过数据库探测
    pub database: Option<Database>,
}

impl AppState {
    pub fn new(
        orders: Arc<OrderService>,
        balances: Arc<BalanceService>,
        database: Option<Database>,
    ) -> Self {
        Self {
            orders,
            balances,
            database,
        }
    }
}
