//! 内存存储
//!
//! 同时实现订单仓储和余额账本接口。所有状态由一把锁保护，
//! 组合操作在持锁期间完成，原子性与 PostgreSQL 实现一致。
//! 用于测试，也可通过 `database.url = "memory://"` 在本地运行。

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;

use super::traits::{BalanceRepositoryTrait, OrderRepositoryTrait};
use crate::error::{LoyaltyError, Result};
use crate::models::{
    ApplyOutcome, Balance, Order, OrderStatus, RegisterOutcome, UnfinishedOrder, Withdrawal,
};

#[derive(Default)]
struct MemoryState {
    /// 按登记顺序保存
    orders: Vec<Order>,
    order_index: HashMap<String, usize>,
    balances: HashMap<String, Balance>,
    withdrawals: Vec<Withdrawal>,
    next_order_id: i64,
    next_withdrawal_id: i64,
}

impl MemoryState {
    fn order_mut(&mut self, number: &str) -> Option<&mut Order> {
        let idx = *self.order_index.get(number)?;
        self.orders.get_mut(idx)
    }

    fn insert_order(&mut self, user_id: &str, number: &str, status: OrderStatus) {
        self.next_order_id += 1;
        let now = Utc::now();
        self.order_index.insert(number.to_string(), self.orders.len());
        self.orders.push(Order {
            id: self.next_order_id,
            number: number.to_string(),
            user_id: user_id.to_string(),
            status,
            accrual: None,
            uploaded_at: now,
            updated_at: now,
        });
    }
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 直接写入一条指定状态的订单，用于模拟重启前已存在的数据
    ///
    /// 订单号已存在时返回 false。
    pub fn seed_order(&self, user_id: &str, number: &str, status: OrderStatus) -> bool {
        let mut state = self.state.lock();
        if state.order_index.contains_key(number) {
            return false;
        }
        state.insert_order(user_id, number, status);
        true
    }

    /// 按订单号查询
    pub fn order(&self, number: &str) -> Option<Order> {
        let state = self.state.lock();
        let idx = *state.order_index.get(number)?;
        state.orders.get(idx).cloned()
    }
}

#[async_trait]
impl OrderRepositoryTrait for MemoryStore {
    async fn register(&self, user_id: &str, number: &str) -> Result<RegisterOutcome> {
        let mut state = self.state.lock();

        if let Some(&idx) = state.order_index.get(number) {
            return if state.orders[idx].user_id == user_id {
                Ok(RegisterOutcome::AlreadyRegistered)
            } else {
                Err(LoyaltyError::OrderOwnedByOther(number.to_string()))
            };
        }

        state.insert_order(user_id, number, OrderStatus::New);
        Ok(RegisterOutcome::Accepted)
    }

    async fn orders_of(&self, user_id: &str) -> Result<Vec<Order>> {
        let state = self.state.lock();
        Ok(state
            .orders
            .iter()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn unfinished(&self) -> Result<Vec<UnfinishedOrder>> {
        let state = self.state.lock();
        Ok(state
            .orders
            .iter()
            .filter(|o| !o.status.is_terminal())
            .map(|o| UnfinishedOrder {
                number: o.number.clone(),
                user_id: o.user_id.clone(),
                status: o.status,
            })
            .collect())
    }

    async fn apply_verdict(
        &self,
        number: &str,
        status: OrderStatus,
        accrual: Option<Decimal>,
    ) -> Result<ApplyOutcome> {
        let accrual = accrual.filter(|_| status == OrderStatus::Processed);
        let mut state = self.state.lock();

        let owner = match state.order_mut(number) {
            Some(order) if order.status.can_transition_to(status) => {
                order.status = status;
                order.accrual = accrual;
                order.updated_at = Utc::now();
                order.user_id.clone()
            }
            _ => return Ok(ApplyOutcome::Skipped),
        };

        if let Some(amount) = accrual.filter(|a| *a > Decimal::ZERO) {
            state.balances.entry(owner.clone()).or_default().current += amount;
        }

        Ok(ApplyOutcome::Applied { owner })
    }
}

#[async_trait]
impl BalanceRepositoryTrait for MemoryStore {
    async fn open_account(&self, user_id: &str) -> Result<()> {
        self.state
            .lock()
            .balances
            .entry(user_id.to_string())
            .or_default();
        Ok(())
    }

    async fn credit(&self, user_id: &str, amount: Decimal) -> Result<()> {
        self.state
            .lock()
            .balances
            .entry(user_id.to_string())
            .or_default()
            .current += amount;
        Ok(())
    }

    async fn withdraw(
        &self,
        user_id: &str,
        order_number: &str,
        amount: Decimal,
    ) -> Result<Withdrawal> {
        let mut state = self.state.lock();

        match state.balances.get_mut(user_id) {
            Some(balance) if balance.current >= amount => {
                balance.current -= amount;
                balance.withdrawn += amount;
            }
            _ => {
                return Err(LoyaltyError::InsufficientFunds {
                    user_id: user_id.to_string(),
                    requested: amount,
                });
            }
        }

        state.next_withdrawal_id += 1;
        let withdrawal = Withdrawal {
            id: state.next_withdrawal_id,
            user_id: user_id.to_string(),
            order_number: order_number.to_string(),
            amount,
            processed_at: Utc::now(),
        };
        state.withdrawals.push(withdrawal.clone());

        Ok(withdrawal)
    }

    async fn balance(&self, user_id: &str) -> Result<Balance> {
        Ok(self
            .state
            .lock()
            .balances
            .get(user_id)
            .copied()
            .unwrap_or_default())
    }

    async fn withdrawals(&self, user_id: &str) -> Result<Vec<Withdrawal>> {
        let state = self.state.lock();
        Ok(state
            .withdrawals
            .iter()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_register_is_idempotent_and_exclusive() {
        let store = MemoryStore::new();

        let first = store.register("alice", "79927398713").await.unwrap();
        assert_eq!(first, RegisterOutcome::Accepted);

        let again = store.register("alice", "79927398713").await.unwrap();
        assert_eq!(again, RegisterOutcome::AlreadyRegistered);

        let other = store.register("bob", "79927398713").await;
        assert!(matches!(other, Err(LoyaltyError::OrderOwnedByOther(_))));

        let orders = store.orders_of("alice").await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status, OrderStatus::New);
        assert!(store.orders_of("bob").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_verdict_credits_once() {
        let store = MemoryStore::new();
        store.register("alice", "79927398713").await.unwrap();

        let applied = store
            .apply_verdict("79927398713", OrderStatus::Processed, Some(dec("22.00")))
            .await
            .unwrap();
        assert_eq!(
            applied,
            ApplyOutcome::Applied {
                owner: "alice".to_string()
            }
        );

        // 重复结果不会再次入账
        let repeated = store
            .apply_verdict("79927398713", OrderStatus::Processed, Some(dec("22.00")))
            .await
            .unwrap();
        assert_eq!(repeated, ApplyOutcome::Skipped);

        let balance = store.balance("alice").await.unwrap();
        assert_eq!(balance.current, dec("22.00"));
        assert!(store.unfinished().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_apply_verdict_never_regresses() {
        let store = MemoryStore::new();
        store.register("alice", "79927398713").await.unwrap();

        store
            .apply_verdict("79927398713", OrderStatus::Invalid, None)
            .await
            .unwrap();

        let back = store
            .apply_verdict("79927398713", OrderStatus::Processing, None)
            .await
            .unwrap();
        assert_eq!(back, ApplyOutcome::Skipped);
        assert_eq!(
            store.order("79927398713").unwrap().status,
            OrderStatus::Invalid
        );

        let missing = store
            .apply_verdict("12345678903", OrderStatus::Processed, Some(dec("1")))
            .await
            .unwrap();
        assert_eq!(missing, ApplyOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_processing_keeps_accrual_empty() {
        let store = MemoryStore::new();
        store.register("alice", "79927398713").await.unwrap();

        store
            .apply_verdict("79927398713", OrderStatus::Processing, Some(dec("5")))
            .await
            .unwrap();

        let order = store.order("79927398713").unwrap();
        assert_eq!(order.status, OrderStatus::Processing);
        assert_eq!(order.accrual, None);
        assert_eq!(store.balance("alice").await.unwrap(), Balance::default());
    }

    #[tokio::test]
    async fn test_withdraw_checks_funds() {
        let store = MemoryStore::new();
        store.open_account("alice").await.unwrap();
        store.credit("alice", dec("22.00")).await.unwrap();

        let denied = store.withdraw("alice", "2377225624", dec("23.00")).await;
        assert!(matches!(denied, Err(LoyaltyError::InsufficientFunds { .. })));
        assert!(store.withdrawals("alice").await.unwrap().is_empty());

        let withdrawal = store
            .withdraw("alice", "2377225624", dec("20.50"))
            .await
            .unwrap();
        assert_eq!(withdrawal.amount, dec("20.50"));

        let balance = store.balance("alice").await.unwrap();
        assert_eq!(balance.current, dec("1.50"));
        assert_eq!(balance.withdrawn, dec("20.50"));
    }

    #[tokio::test]
    async fn test_withdraw_without_account() {
        let store = MemoryStore::new();
        let result = store.withdraw("ghost", "2377225624", dec("1")).await;
        assert!(matches!(result, Err(LoyaltyError::InsufficientFunds { .. })));
        assert_eq!(store.balance("ghost").await.unwrap(), Balance::default());
    }

    #[tokio::test]
    async fn test_open_account_is_idempotent() {
        let store = MemoryStore::new();
        store.credit("alice", dec("3")).await.unwrap();
        store.open_account("alice").await.unwrap();
        assert_eq!(store.balance("alice").await.unwrap().current, dec("3"));
    }

    #[test]
    fn test_seed_order() {
        let store = MemoryStore::new();
        assert!(store.seed_order("alice", "79927398713", OrderStatus::Processing));
        assert!(!store.seed_order("bob", "79927398713", OrderStatus::New));
        assert_eq!(store.order("79927398713").unwrap().user_id, "alice");
    }
}
