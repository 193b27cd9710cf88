//! 订单服务
//!
//! 登记订单并交给对账调度器跟踪；查询用户订单

use std::sync::Arc;

use loyalty_shared::luhn;
use loyalty_shared::observability::metrics;
use tracing::{info, instrument};

use crate::error::{LoyaltyError, Result};
use crate::models::{Order, RegisterOutcome};
use crate::reconciliation::OrderTracker;
use crate::repository::OrderRepositoryTrait;

/// 订单服务
pub struct OrderService {
    orders: Arc<dyn OrderRepositoryTrait>,
    tracker: Arc<dyn OrderTracker>,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepositoryTrait>, tracker: Arc<dyn OrderTracker>) -> Self {
        Self { orders, tracker }
    }

    /// 登记订单
    ///
    /// 新订单返回 `Accepted` 并开始对账；同一用户重复登记返回
    /// `AlreadyRegistered`，不会再启动对账任务。
    #[instrument(skip(self), fields(user_id = %user_id, order = %number))]
    pub async fn register(&self, user_id: &str, number: &str) -> Result<RegisterOutcome> {
        if !luhn::is_valid(number) {
            metrics::record_order_registration("invalid_number");
            return Err(LoyaltyError::InvalidOrderNumber(number.to_string()));
        }

        let outcome = match self.orders.register(user_id, number).await {
            Ok(outcome) => outcome,
            Err(e) => {
                if let LoyaltyError::OrderOwnedByOther(_) = e {
                    metrics::record_order_registration("owned_by_other");
                }
                return Err(e);
            }
        };

        metrics::record_order_registration(outcome.as_str());
        if outcome == RegisterOutcome::Accepted {
            self.tracker.track(number);
            info!("订单已登记，开始对账");
        }

        Ok(outcome)
    }

    /// 用户订单，按登记时间从早到晚
    pub async fn orders_of(&self, user_id: &str) -> Result<Vec<Order>> {
        self.orders.orders_of(user_id).await
    }
}
