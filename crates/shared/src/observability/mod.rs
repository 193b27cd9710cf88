//! 统一可观测性模块
//!
//! 提供 metrics、tracing、logging 的统一初始化和管理。

pub mod metrics;
pub mod middleware;
pub mod tracing;

use ::tracing::info;
use anyhow::Result;

pub use crate::config::ObservabilityConfig;

/// 可观测性资源守卫
///
/// 持有指标服务器的生命周期，drop 时停止导出。
pub struct ObservabilityGuard {
    metrics_handle: Option<metrics::MetricsHandle>,
}

impl ObservabilityGuard {
    /// 创建一个空的 Guard（用于测试或禁用可观测性时）
    pub fn empty() -> Self {
        Self {
            metrics_handle: None,
        }
    }

    pub fn metrics_enabled(&self) -> bool {
        self.metrics_handle.is_some()
    }
}

impl Drop for ObservabilityGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.metrics_handle.take() {
            handle.stop();
        }
        info!("Shutting down observability...");
    }
}

/// 统一初始化可观测性
///
/// 初始化顺序：
/// 1. Tracing（日志）
/// 2. Metrics（Prometheus 指标，`metrics_enabled = false` 时跳过）
///
/// ```ignore
/// let config = AppConfig::load("loyalty-service")?;
/// let obs = config.observability.clone().with_service_name(&config.service_name);
/// let _guard = loyalty_shared::observability::init(&obs).await?;
/// ```
pub async fn init(config: &ObservabilityConfig) -> Result<ObservabilityGuard> {
    tracing::init(config)?;

    info!(
        service = %config.service_name,
        metrics_enabled = config.metrics_enabled,
        metrics_port = config.metrics_port,
        "Observability initialized"
    );

    let metrics_handle = if config.metrics_enabled {
        Some(metrics::init(config).await?)
    } else {
        None
    };

    Ok(ObservabilityGuard { metrics_handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.log_level, "info");
        assert!(!config.json_logs());
    }

    #[test]
    fn test_empty_guard() {
        let guard = ObservabilityGuard::empty();
        assert!(!guard.metrics_enabled());
    }
}
