//! 对账调度器
//!
//! - 每个订单一个 tokio 任务，按固定间隔轮询
//! - `active` 登记表保证同一订单同时只有一个任务
//! - 迁移先落库再推进 last_seen，落库失败下个周期重试同一条边
//! - 重启后由 `recover` 从持久化状态恢复

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use loyalty_shared::observability::metrics;
use tokio::task::{self, AbortHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use super::OrderTracker;
use super::state::{self, Decision};
use crate::accrual::{AccrualSource, AccrualStatus};
use crate::error::Result;
use crate::models::{ApplyOutcome, OrderStatus};
use crate::repository::OrderRepositoryTrait;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

struct SchedulerInner {
    orders: Arc<dyn OrderRepositoryTrait>,
    source: Arc<dyn AccrualSource>,
    poll_interval: Duration,
    active: DashMap<String, AbortHandle>,
}

/// 单次轮询后的走向
enum Flow {
    Continue,
    Finished,
}

/// 对账调度器
#[derive(Clone)]
pub struct ReconciliationScheduler {
    inner: Arc<SchedulerInner>,
}

impl ReconciliationScheduler {
    pub fn new(
        orders: Arc<dyn OrderRepositoryTrait>,
        source: Arc<dyn AccrualSource>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                orders,
                source,
                poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
                active: DashMap::new(),
            }),
        }
    }

    /// 为新登记的订单启动轮询
    ///
    /// 已有任务时不做任何事，返回 false。
    pub fn spawn(&self, number: &str) -> bool {
        self.spawn_from(number, AccrualStatus::Registered)
    }

    fn spawn_from(&self, number: &str, last_seen: AccrualStatus) -> bool {
        let spawned = match self.inner.active.entry(number.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let inner = Arc::clone(&self.inner);
                let order = number.to_string();
                let handle = tokio::spawn(async move {
                    run_order(inner, order, last_seen).await;
                });
                slot.insert(handle.abort_handle());
                true
            }
        };

        if spawned {
            debug!(order = %number, last_seen = last_seen.as_str(), "对账任务已启动");
            metrics::set_active_tasks(self.inner.active.len());
        } else {
            debug!(order = %number, "订单已有对账任务，忽略");
        }
        spawned
    }

    /// 恢复所有未完成订单的轮询
    ///
    /// 返回新启动的任务数
    #[instrument(skip(self))]
    pub async fn recover(&self) -> Result<usize> {
        let unfinished = self.inner.orders.unfinished().await?;
        let total = unfinished.len();

        let spawned = unfinished
            .iter()
            .filter(|order| self.spawn_from(&order.number, state::last_seen_from(order.status)))
            .count();

        info!(total, spawned, "已恢复未完成订单的对账任务");
        Ok(spawned)
    }

    /// 中止所有轮询任务
    ///
    /// 已落库的迁移不受影响，下次启动时 `recover` 会接着轮询。
    pub fn shutdown(&self) {
        let numbers: Vec<String> = self
            .inner
            .active
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for number in &numbers {
            if let Some((_, handle)) = self.inner.active.remove(number) {
                handle.abort();
            }
        }

        metrics::set_active_tasks(0);
        info!(aborted = numbers.len(), "对账调度器已停止");
    }

    /// 正在轮询的订单数
    pub fn active_count(&self) -> usize {
        self.inner.active.len()
    }

    /// 订单是否正在轮询
    pub fn is_tracking(&self, number: &str) -> bool {
        self.inner.active.contains_key(number)
    }
}

impl OrderTracker for ReconciliationScheduler {
    fn track(&self, number: &str) {
        self.spawn(number);
    }
}

/// 任务结束时从登记表注销，包括 panic 与被中止的情况
///
/// 只移除属于本任务的登记项，不影响同一订单之后启动的任务。
struct Deregister {
    inner: Arc<SchedulerInner>,
    number: String,
    task: Option<task::Id>,
}

impl Drop for Deregister {
    fn drop(&mut self) {
        let removed = self
            .inner
            .active
            .remove_if(&self.number, |_, handle| Some(handle.id()) == self.task);
        if removed.is_some() {
            metrics::set_active_tasks(self.inner.active.len());
        }
        if std::thread::panicking() {
            error!(order = %self.number, "对账任务异常退出");
        } else {
            debug!(order = %self.number, "对账任务结束");
        }
    }
}

/// 单个订单的轮询循环，到达终态后退出并注销
async fn run_order(inner: Arc<SchedulerInner>, number: String, mut last_seen: AccrualStatus) {
    let _deregister = Deregister {
        inner: Arc::clone(&inner),
        number: number.clone(),
        task: task::try_id(),
    };

    let mut ticker = tokio::time::interval(inner.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // 第一次 tick 立即返回，跳过
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if let Flow::Finished = poll_once(&inner, &number, &mut last_seen).await {
            break;
        }
    }
}

async fn poll_once(inner: &SchedulerInner, number: &str, last_seen: &mut AccrualStatus) -> Flow {
    let verdict = match inner.source.poll(number).await {
        Ok(verdict) => verdict,
        Err(e) if e.is_rate_limited() => {
            debug!(order = %number, error = %e, "积分计算服务限流，等待冷却");
            return Flow::Continue;
        }
        Err(e) => {
            warn!(order = %number, error = %e, "轮询积分计算服务失败，下个周期重试");
            return Flow::Continue;
        }
    };

    let (status, accrual) = match state::decide(*last_seen, &verdict) {
        Decision::Ignore => return Flow::Continue,
        Decision::Persist { status, accrual } => (status, accrual),
    };

    match inner.orders.apply_verdict(number, status, accrual).await {
        Ok(ApplyOutcome::Applied { owner }) => {
            info!(
                order = %number,
                owner = %owner,
                status = %status,
                accrual = ?accrual,
                "订单状态已更新"
            );
            metrics::record_transition(status.as_str());
            if status == OrderStatus::Processed {
                metrics::record_ledger_credit();
            }
        }
        Ok(ApplyOutcome::Skipped) => {
            debug!(order = %number, status = %status, "订单已处于该状态或更后的状态，跳过");
        }
        Err(e) => {
            error!(order = %number, status = %status, error = %e, "订单状态落库失败，下个周期重试");
            return Flow::Continue;
        }
    }

    *last_seen = verdict.status;

    if status.is_terminal() {
        Flow::Finished
    } else {
        Flow::Continue
    }
}
