//! 数据库仓储层
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 需要原子性的组合操作（状态迁移 + 入账、扣款 + 流水）在仓储内部用一个事务完成
//! - 定义 trait 接口以支持 mock 测试和内存实现

mod balance_repo;
mod memory;
mod order_repo;
mod traits;

pub use balance_repo::BalanceRepository;
pub use memory::MemoryStore;
pub use order_repo::OrderRepository;
pub use traits::*;
