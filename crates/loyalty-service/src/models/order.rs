//! 订单模型
//!
//! 订单状态只会单向前进：NEW → PROCESSING → {PROCESSED | INVALID}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 订单状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 已登记，尚未从积分计算服务得到结果
    #[default]
    New,
    /// 积分计算服务正在计算
    Processing,
    /// 计算完成，不产生积分
    Invalid,
    /// 计算完成，积分已入账
    Processed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
        }
    }

    /// 终态之后不会再发生迁移
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Invalid | Self::Processed)
    }

    /// 允许迁移到当前状态的前驱状态
    pub fn predecessors(&self) -> &'static [OrderStatus] {
        match self {
            Self::New => &[],
            Self::Processing => &[Self::New],
            Self::Invalid | Self::Processed => &[Self::New, Self::Processing],
        }
    }

    /// 判断 `self -> to` 是否是合法迁移
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        to.predecessors().contains(self)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 用户登记的订单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: i64,
    pub number: String,
    pub user_id: String,
    pub status: OrderStatus,
    /// 仅 PROCESSED 订单有值，已向上取整到两位小数
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 尚未到达终态的订单，用于重启后恢复轮询
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct UnfinishedOrder {
    pub number: String,
    pub user_id: String,
    pub status: OrderStatus,
}

/// 登记结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// 新订单，已开始对账
    Accepted,
    /// 同一用户重复登记，状态不变
    AlreadyRegistered,
}

impl RegisterOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::AlreadyRegistered => "already_registered",
        }
    }
}

/// 状态迁移的落库结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// 条件更新命中，PROCESSED 时已给 owner 入账
    Applied { owner: String },
    /// 订单当前状态不是合法前驱（已迁移过或不存在），什么也没写
    Skipped,
}
