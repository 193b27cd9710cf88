//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl MetricsHandle {
    /// 停止指标 HTTP 服务器
    pub fn stop(self) {
        self.server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

/// 注册指标描述，出现在 /metrics 的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "accrual_polls_total",
        "Accrual service polls by outcome"
    );
    metrics::describe_counter!(
        "accrual_rate_limited_total",
        "Number of 429 responses from the accrual service"
    );
    metrics::describe_counter!(
        "reconciliation_transitions_total",
        "Order status transitions applied by the reconciler"
    );
    metrics::describe_gauge!(
        "reconciliation_active_tasks",
        "Orders currently being polled"
    );
    metrics::describe_counter!("ledger_credits_total", "Balance credits from processed orders");
    metrics::describe_counter!("withdrawals_total", "Withdrawal attempts by result");
    metrics::describe_counter!(
        "orders_registered_total",
        "Order registration attempts by result"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 业务指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录一次 accrual 轮询结果，标签取自 `AccrualError::outcome` 或 `verdict`
#[inline]
pub fn record_accrual_poll(outcome: &'static str) {
    metrics::counter!("accrual_polls_total", "outcome" => outcome).increment(1);
}

/// 记录一次 429
#[inline]
pub fn record_accrual_rate_limited() {
    metrics::counter!("accrual_rate_limited_total").increment(1);
}

/// 记录订单状态迁移
#[inline]
pub fn record_transition(status: &'static str) {
    metrics::counter!("reconciliation_transitions_total", "status" => status).increment(1);
}

/// 更新活跃轮询任务数
#[inline]
pub fn set_active_tasks(count: usize) {
    metrics::gauge!("reconciliation_active_tasks").set(count as f64);
}

/// 记录余额入账
#[inline]
pub fn record_ledger_credit() {
    metrics::counter!("ledger_credits_total").increment(1);
}

/// 记录提现结果
#[inline]
pub fn record_withdrawal(result: &'static str) {
    metrics::counter!("withdrawals_total", "result" => result).increment(1);
}

/// 记录订单登记结果
#[inline]
pub fn record_order_registration(result: &'static str) {
    metrics::counter!("orders_registered_total", "result" => result).increment(1);
}
