//! 对账调度
//!
//! 每个未完成订单对应一个轮询任务，任务把积分计算服务的结果
//! 转换成订单状态迁移和余额入账，到达终态后退出。

mod scheduler;
pub mod state;

pub use scheduler::ReconciliationScheduler;
pub use state::{Decision, decide, last_seen_from, round_accrual};

/// 新订单登记后开始跟踪
///
/// 订单服务只依赖这个接口，调度策略可以替换。
#[cfg_attr(test, mockall::automock)]
pub trait OrderTracker: Send + Sync {
    fn track(&self, number: &str);
}
