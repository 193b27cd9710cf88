//! 命令行参数
//!
//! 命令行参数优先级最高，覆盖配置文件和环境变量。

use clap::Parser;
use config::ConfigError;
use loyalty_shared::config::AppConfig;

/// 积分对账服务
#[derive(Parser, Debug, Default)]
#[command(name = "loyalty-server")]
#[command(version, about = "积分对账服务")]
pub struct Cli {
    /// 监听地址（host:port）
    #[arg(short = 'a', long)]
    pub address: Option<String>,

    /// PostgreSQL 连接串；`memory://` 使用内存存储
    #[arg(short = 'd', long)]
    pub database: Option<String>,

    /// 积分计算服务根地址
    #[arg(short = 'r', long)]
    pub accrual: Option<String>,
}

impl Cli {
    /// 用命令行参数覆盖配置
    pub fn apply(&self, config: &mut AppConfig) -> Result<(), ConfigError> {
        if let Some(addr) = &self.address {
            config.set_server_addr(addr)?;
        }
        if let Some(url) = &self.database {
            config.database.url = url.clone();
        }
        if let Some(url) = &self.accrual {
            config.accrual.base_url = url.clone();
        }
        Ok(())
    }
}
