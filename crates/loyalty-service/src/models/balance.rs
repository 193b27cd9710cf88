//! 余额与提现模型

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 单个金额允许的最大值，与库表 NUMERIC(14,2) 一致
// 99_999_999_999_999 scale 2 (Decimal::new is not const)
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

/// 用户余额
///
/// `current` 始终不小于 0；`withdrawn` 等于该用户所有提现金额之和。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Balance {
    pub current: Decimal,
    pub withdrawn: Decimal,
}

/// 提现记录（只追加）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: String,
    pub order_number: String,
    pub amount: Decimal,
    pub processed_at: DateTime<Utc>,
}
