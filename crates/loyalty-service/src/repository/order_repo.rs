//! 订单仓储
//!
//! 状态迁移使用条件更新：只有当前状态是目标状态的合法前驱时才写入，
//! 因此重复或乱序的结果不会产生第二次入账

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, instrument};

use super::balance_repo::BalanceRepository;
use super::traits::OrderRepositoryTrait;
use crate::error::{LoyaltyError, Result};
use crate::models::{ApplyOutcome, Order, OrderStatus, RegisterOutcome, UnfinishedOrder};

/// 订单仓储
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 列出用户订单
    pub async fn orders_of(&self, user_id: &str) -> Result<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, number, user_id, status, accrual, uploaded_at, updated_at
            FROM orders
            WHERE user_id = $1
            ORDER BY uploaded_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// 查询订单所有者
    pub async fn owner_of(&self, number: &str) -> Result<Option<String>> {
        let owner = sqlx::query_scalar::<_, String>(
            r#"
            SELECT user_id FROM orders WHERE number = $1
            "#,
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(owner)
    }

    /// 列出未完成订单
    pub async fn unfinished(&self) -> Result<Vec<UnfinishedOrder>> {
        let orders = sqlx::query_as::<_, UnfinishedOrder>(
            r#"
            SELECT number, user_id, status
            FROM orders
            WHERE status IN ('NEW', 'PROCESSING')
            ORDER BY uploaded_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    // ==================== 写入操作 ====================

    /// 登记订单
    #[instrument(skip(self), fields(user_id = %user_id, order = %number))]
    pub async fn register(&self, user_id: &str, number: &str) -> Result<RegisterOutcome> {
        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO orders (number, user_id, status)
            VALUES ($1, $2, 'NEW')
            ON CONFLICT (number) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(number)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_some() {
            return Ok(RegisterOutcome::Accepted);
        }

        // 冲突：订单号已存在，所有者一旦确定不会再变
        match self.owner_of(number).await? {
            Some(owner) if owner == user_id => Ok(RegisterOutcome::AlreadyRegistered),
            Some(_) => Err(LoyaltyError::OrderOwnedByOther(number.to_string())),
            None => Err(LoyaltyError::Internal(format!(
                "订单登记冲突但查询不到所有者: {}",
                number
            ))),
        }
    }

    /// 条件迁移状态，PROCESSED 时同一事务内入账
    #[instrument(skip(self), fields(order = %number, status = %status))]
    pub async fn apply_verdict(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<Decimal>,
    ) -> Result<ApplyOutcome> {
        let predecessors: Vec<&str> = status.predecessors().iter().map(|s| s.as_str()).collect();
        let accrual = accrual.filter(|_| status == OrderStatus::Processed);

        let mut tx = self.pool.begin().await?;

        let owner = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE orders
            SET status = $2, accrual = $3, updated_at = NOW()
            WHERE number = $1 AND status = ANY($4)
            RETURNING user_id
            "#,
        )
        .bind(number)
        .bind(status)
        .bind(accrual)
        .bind(predecessors)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(owner) = owner else {
            tx.rollback().await?;
            debug!("订单当前状态不允许迁移，跳过");
            return Ok(ApplyOutcome::Skipped);
        };

        if let Some(amount) = accrual.filter(|a| *a > Decimal::ZERO) {
            BalanceRepository::credit_in_tx(&mut *tx, &owner, amount).await?;
        }

        tx.commit().await?;

        Ok(ApplyOutcome::Applied { owner })
    }
}

#[async_trait]
impl OrderRepositoryTrait for OrderRepository {
    async fn register(&self, user_id: &str, number: &str) -> Result<RegisterOutcome> {
        self.register(user_id, number).await
    }

    async fn orders_of(&self, user_id: &str) -> Result<Vec<Order>> {
        self.orders_of(user_id).await
    }

    async fn unfinished(&self) -> Result<Vec<UnfinishedOrder>> {
        self.unfinished().await
    }

    async fn apply_verdict(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<Decimal>,
    ) -> Result<ApplyOutcome> {
        self.apply_verdict(number, status, accrual).await
    }
}
