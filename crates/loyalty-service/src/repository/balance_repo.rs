//! 余额账本仓储
//!
//! 扣款使用条件更新 `WHERE current >= $amount`，充足性检查和扣减由行锁串行化

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::instrument;

use super::traits::BalanceRepositoryTrait;
use crate::error::{LoyaltyError, Result};
use crate::models::{Balance, Withdrawal};

/// 余额账本仓储
pub struct BalanceRepository {
    pool: PgPool,
}

impl BalanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ==================== 查询操作 ====================

    /// 获取用户余额，没有账户时返回 0
    pub async fn balance(&self, user_id: &str) -> Result<Balance> {
        let balance = sqlx::query_as::<_, Balance>(
            r#"
            SELECT current, withdrawn
            FROM balances
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(balance.unwrap_or_default())
    }

    /// 列出用户提现流水
    pub async fn withdrawals(&self, user_id: &str) -> Result<Vec<Withdrawal>> {
        let withdrawals = sqlx::query_as::<_, Withdrawal>(
            r#"
            SELECT id, user_id, order_number, amount, processed_at
            FROM withdrawals
            WHERE user_id = $1
            ORDER BY processed_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(withdrawals)
    }

    // ==================== 写入操作 ====================

    /// 开户
    pub async fn open_account(&self, user_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO balances (user_id, current, withdrawn)
            VALUES ($1, 0, 0)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 入账
    pub async fn credit(&self, user_id: &str, amount: Decimal) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Self::credit_in_tx(&mut *conn, user_id, amount).await
    }

    /// 扣款并记录提现
    #[instrument(skip(self), fields(user_id = %user_id, order = %order_number))]
    pub async fn withdraw(
        &self,
        user_id: &str,
        order_number: &str,
        amount: Decimal,
    ) -> Result<Withdrawal> {
        let mut tx = self.pool.begin().await?;

        let debited = Self::debit_in_tx(&mut *tx, user_id, amount).await?;
        if !debited {
            tx.rollback().await?;
            return Err(LoyaltyError::InsufficientFunds {
                user_id: user_id.to_string(),
                requested: amount,
            });
        }

        let withdrawal = sqlx::query_as::<_, Withdrawal>(
            r#"
            INSERT INTO withdrawals (user_id, order_number, amount)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, order_number, amount, processed_at
            "#,
        )
        .bind(user_id)
        .bind(order_number)
        .bind(amount)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(withdrawal)
    }

    // ==================== 事务操作 ====================

    /// 在事务中入账（账户不存在时创建）
    pub async fn credit_in_tx(tx: &mut PgConnection, user_id: &str, amount: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO balances (user_id, current, withdrawn)
            VALUES ($1, $2, 0)
            ON CONFLICT (user_id)
            DO UPDATE SET current = balances.current + EXCLUDED.current, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(tx)
        .await?;

        Ok(())
    }

    /// 在事务中条件扣款，余额不足时返回 false
    pub async fn debit_in_tx(tx: &mut PgConnection, user_id: &str, amount: Decimal) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE balances
            SET current = current - $2, withdrawn = withdrawn + $2, updated_at = NOW()
            WHERE user_id = $1 AND current >= $2
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .execute(tx)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}

#[async_trait]
impl BalanceRepositoryTrait for BalanceRepository {
    async fn open_account(&self, user_id: &str) -> Result<()> {
        self.open_account(user_id).await
    }

    async fn credit(&self, user_id: &str, amount: Decimal) -> Result<()> {
        self.credit(user_id, amount).await
    }

    async fn withdraw(
        &self,
        user_id: &str,
        order_number: &str,
        amount: Decimal,
    ) -> Result<Withdrawal> {
        self.withdraw(user_id, order_number, amount).await
    }

    async fn balance(&self, user_id: &str) -> Result<Balance> {
        self.balance(user_id).await
    }

    async fn withdrawals(&self, user_id: &str) -> Result<Vec<Withdrawal>> {
        self.withdrawals(user_id).await
    }
}
