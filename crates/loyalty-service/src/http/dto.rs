//! 请求/响应 DTO
//!
//! 金额在 JSON 中以数字表示

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Balance, Order, OrderStatus, Withdrawal};

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// 订单列表项
#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub number: String,
    pub status: OrderStatus,
    /// 只有 PROCESSED 订单返回
    #[serde(
        with = "rust_decimal::serde::float_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub accrual: Option<Decimal>,
    pub uploaded_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let accrual = order
            .accrual
            .filter(|_| order.status == OrderStatus::Processed);
        Self {
            uploaded_at: format_time(&order.uploaded_at),
            number: order.number,
            status: order.status,
            accrual,
        }
    }
}

/// 余额
#[derive(Debug, Clone, Serialize)]
pub struct BalanceResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub current: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub withdrawn: Decimal,
}

impl From<Balance> for BalanceResponse {
    fn from(balance: Balance) -> Self {
        Self {
            current: balance.current,
            withdrawn: balance.withdrawn,
        }
    }
}

/// 提现请求
#[derive(Debug, Clone, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Decimal,
}

/// 提现流水
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalResponse {
    pub order: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub sum: Decimal,
    pub processed_at: String,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(withdrawal: Withdrawal) -> Self {
        Self {
            processed_at: format_time(&withdrawal.processed_at),
            order: withdrawal.order_number,
            sum: withdrawal.amount,
        }
    }
}
