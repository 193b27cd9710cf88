//! 单个订单的对账状态机
//!
//! 纯函数：根据上次看到的状态和本次结果决定是否需要落库，不做任何 IO。

use rust_decimal::{Decimal, RoundingStrategy};

use crate::accrual::{AccrualStatus, AccrualVerdict};
use crate::models::OrderStatus;

/// 本次轮询结果的处理方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// 无需写入（仍为 REGISTERED，或与上次相同）
    Ignore,
    /// 条件迁移订单状态；PROCESSED 时带上已取整的积分
    Persist {
        status: OrderStatus,
        accrual: Option<Decimal>,
    },
}

/// 根据上次看到的状态决定如何处理本次结果
pub fn decide(last_seen: AccrualStatus, verdict: &AccrualVerdict) -> Decision {
    if verdict.status == last_seen {
        return Decision::Ignore;
    }

    match verdict.status {
        // 外部服务暂时回退到 REGISTERED 不影响已记录的进度
        AccrualStatus::Registered => Decision::Ignore,
        AccrualStatus::Processing => Decision::Persist {
            status: OrderStatus::Processing,
            accrual: None,
        },
        AccrualStatus::Invalid => Decision::Persist {
            status: OrderStatus::Invalid,
            accrual: None,
        },
        AccrualStatus::Processed => Decision::Persist {
            status: OrderStatus::Processed,
            accrual: Some(round_accrual(verdict.accrual)),
        },
    }
}

/// 重启恢复时由持久化的订单状态推出上次看到的状态
pub fn last_seen_from(status: OrderStatus) -> AccrualStatus {
    match status {
        OrderStatus::New => AccrualStatus::Registered,
        OrderStatus::Processing => AccrualStatus::Processing,
        OrderStatus::Invalid => AccrualStatus::Invalid,
        OrderStatus::Processed => AccrualStatus::Processed,
    }
}

/// 积分向上取整到两位小数
pub fn round_accrual(accrual: Decimal) -> Decimal {
    accrual.round_dp_with_strategy(2, RoundingStrategy::ToPositiveInfinity)
}
