//! 领域模型定义

mod balance;
mod order;

pub use balance::*;
pub use order::*;
