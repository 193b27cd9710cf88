//! API 处理器

pub mod accounts;
pub mod balance;
pub mod health;
pub mod orders;
