//! 积分对账服务入口
//!
//! 启动顺序：配置 → 可观测性 → 存储 → 对账调度器（恢复未完成订单）→ HTTP 服务。

use std::sync::Arc;

use clap::Parser;
use loyalty_service::{
    accrual::{AccrualClient, RateLimiter},
    cli::Cli,
    http::{AppState, build_router},
    reconciliation::ReconciliationScheduler,
    repository::{
        BalanceRepository, BalanceRepositoryTrait, MemoryStore, OrderRepository,
        OrderRepositoryTrait,
    },
    service::{BalanceService, OrderService},
};
use loyalty_shared::{
    config::AppConfig,
    database::Database,
    error::SharedError,
    observability,
    retry::{RetryPolicy, retry_with_policy},
};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// 存储后端
struct Storage {
    orders: Arc<dyn OrderRepositoryTrait>,
    balances: Arc<dyn BalanceRepositoryTrait>,
    database: Option<Database>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = AppConfig::load("loyalty-service")?;
    cli.apply(&mut config)?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!(
        environment = %config.environment,
        accrual = %config.accrual.normalized_base_url(),
        "Starting loyalty-service on {}",
        config.server_addr()
    );

    let storage = open_storage(&config).await?;

    let limiter = Arc::new(RateLimiter::from_config(&config.accrual));
    let client = AccrualClient::new(&config.accrual, limiter)?;
    let scheduler = ReconciliationScheduler::new(
        storage.orders.clone(),
        Arc::new(client),
        config.reconciliation.poll_interval(),
    );

    let order_service = Arc::new(OrderService::new(
        storage.orders.clone(),
        Arc::new(scheduler.clone()),
    ));
    let balance_service = Arc::new(BalanceService::new(storage.balances.clone()));
    let state = AppState::new(order_service, balance_service, storage.database.clone());

    let recovered = scheduler.recover().await?;
    info!(recovered, "Reconciliation scheduler started");

    let app = build_router(state);
    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    scheduler.shutdown();
    if let Some(db) = &storage.database {
        db.close().await;
    }

    info!("Server shutdown complete");

    Ok(())
}

/// 按配置选择存储
///
/// PostgreSQL 启动时可能尚未就绪，连接按指数退避重试。
async fn open_storage(config: &AppConfig) -> anyhow::Result<Storage> {
    if config.database.is_in_memory() {
        warn!("Using in-memory storage, data will be lost on restart");
        let store = Arc::new(MemoryStore::new());
        return Ok(Storage {
            orders: store.clone(),
            balances: store,
            database: None,
        });
    }

    let db = retry_with_policy(
        &RetryPolicy::default(),
        "database_connect",
        SharedError::is_retryable,
        || Database::connect(&config.database),
    )
    .await?;
    db.run_migrations().await?;

    Ok(Storage {
        orders: Arc::new(OrderRepository::new(db.pool().clone())),
        balances: Arc::new(BalanceRepository::new(db.pool().clone())),
        database: Some(db),
    })
}

/// 监听关闭信号
///
/// 收到 Ctrl+C 或 SIGTERM 后停止接收新连接，等待进行中的请求完成。
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("注册 Ctrl+C 处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("注册 SIGTERM 处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
