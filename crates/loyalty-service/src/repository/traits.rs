//! 仓储 Trait 定义
//!
//! 服务层和对账调度器依赖这些抽象，PostgreSQL 与内存实现可互换

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::models::{
    ApplyOutcome, Balance, Order, OrderStatus, RegisterOutcome, UnfinishedOrder, Withdrawal,
};

/// 订单仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepositoryTrait: Send + Sync {
    /// 登记订单
    ///
    /// 同一用户重复登记返回 `AlreadyRegistered`；其他用户已登记返回
    /// `LoyaltyError::OrderOwnedByOther`。
    async fn register(&self, user_id: &str, number: &str) -> Result<RegisterOutcome>;

    /// 用户的订单，按登记时间从早到晚
    async fn orders_of(&self, user_id: &str) -> Result<Vec<Order>>;

    /// 所有处于 NEW / PROCESSING 的订单
    async fn unfinished(&self) -> Result<Vec<UnfinishedOrder>>;

    /// 条件迁移订单状态
    ///
    /// 仅当当前状态是 `status` 的合法前驱时写入；迁移到 PROCESSED 时
    /// 在同一事务里给订单所有者入账 `accrual`。
    async fn apply_verdict(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<Decimal>,
    ) -> Result<ApplyOutcome>;
}

/// 余额账本接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BalanceRepositoryTrait: Send + Sync {
    /// 开户（幂等）
    async fn open_account(&self, user_id: &str) -> Result<()>;

    /// 增加可用余额，账户不存在时创建
    async fn credit(&self, user_id: &str, amount: Decimal) -> Result<()>;

    /// 扣款并追加提现流水
    ///
    /// 余额不足时返回 `LoyaltyError::InsufficientFunds`，不产生任何写入。
    async fn withdraw(
        &self,
        user_id: &str,
        order_number: &str,
        amount: Decimal,
    ) -> Result<Withdrawal>;

    /// 当前余额，没有账户时视为 0
    async fn balance(&self, user_id: &str) -> Result<Balance>;

    /// 提现流水，按时间从早到晚
    async fn withdrawals(&self, user_id: &str) -> Result<Vec<Withdrawal>>;
}
