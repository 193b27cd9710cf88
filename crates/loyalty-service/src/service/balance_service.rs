//! 余额服务
//!
//! 开户、余额查询、提现和提现流水

use std::sync::Arc;

use loyalty_shared::luhn;
use loyalty_shared::observability::metrics;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use crate::error::{LoyaltyError, Result};
use crate::models::{Balance, MAX_AMOUNT, Withdrawal};
use crate::repository::BalanceRepositoryTrait;

/// 金额最多两位小数
const MONEY_SCALE: u32 = 2;

/// 余额服务
pub struct BalanceService {
    balances: Arc<dyn BalanceRepositoryTrait>,
}

impl BalanceService {
    pub fn new(balances: Arc<dyn BalanceRepositoryTrait>) -> Self {
        Self { balances }
    }

    /// 开户（幂等）
    #[instrument(skip(self))]
    pub async fn open_account(&self, user_id: &str) -> Result<()> {
        self.balances.open_account(user_id).await?;
        info!(user_id = %user_id, "账户已开通");
        Ok(())
    }

    pub async fn balance(&self, user_id: &str) -> Result<Balance> {
        self.balances.balance(user_id).await
    }

    /// 提现
    ///
    /// 订单号须通过 Luhn 校验（不要求是已登记的订单），金额须为正且最多两位小数。
    #[instrument(skip(self), fields(user_id = %user_id, order = %order_number, amount = %amount))]
    pub async fn withdraw(
        &self,
        user_id: &str,
        order_number: &str,
        amount: Decimal,
    ) -> Result<Withdrawal> {
        if !luhn::is_valid(order_number) {
            metrics::record_withdrawal("invalid_number");
            return Err(LoyaltyError::InvalidOrderNumber(order_number.to_string()));
        }
        validate_amount(amount).inspect_err(|_| metrics::record_withdrawal("invalid_amount"))?;

        match self.balances.withdraw(user_id, order_number, amount).await {
            Ok(withdrawal) => {
                metrics::record_withdrawal("ok");
                info!(withdrawal_id = withdrawal.id, "提现成功");
                Ok(withdrawal)
            }
            Err(e @ LoyaltyError::InsufficientFunds { .. }) => {
                metrics::record_withdrawal("insufficient_funds");
                warn!("余额不足，提现被拒绝");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn withdrawals(&self, user_id: &str) -> Result<Vec<Withdrawal>> {
        self.balances.withdrawals(user_id).await
    }
}

fn validate_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(LoyaltyError::InvalidAmount(format!("金额必须大于 0: {}", amount)));
    }
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(LoyaltyError::InvalidAmount(format!(
            "金额最多两位小数: {}",
            amount
        )));
    }
    if amount > MAX_AMOUNT {
        return Err(LoyaltyError::InvalidAmount(format!(
            "金额超出上限 {}: {}",
            MAX_AMOUNT, amount
        )));
    }
    Ok(())
}
