//! 重试策略与执行器
//!
//! 提供指数退避重试，用于启动阶段等待依赖（数据库）就绪这类瞬时故障。
//! 是否重试由调用方通过 `is_retryable` 闭包决定。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

// ---------------------------------------------------------------------------
// RetryPolicy — 重试策略配置
// ---------------------------------------------------------------------------

/// 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大重试次数（不含首次执行）
    pub max_retries: u32,
    /// 首次重试前的等待时间
    pub initial_delay: Duration,
    /// 退避时间上限
    pub max_delay: Duration,
    /// 每次重试的退避倍数
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// 计算第 N 次重试的等待时间（attempt 从 0 开始）
    ///
    /// initial_delay * multiplier^attempt，不超过 max_delay。
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_ms = self.initial_delay.as_millis() as f64;
        let delay_ms = base_ms * self.multiplier.powi(attempt as i32);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// attempt 为已失败的重试轮次
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries
    }
}

// ---------------------------------------------------------------------------
// retry_with_policy — 带重试的异步执行器
// ---------------------------------------------------------------------------

/// 带重试的异步执行器
///
/// 仅在操作返回可重试错误时才重试，其余错误直接返回。
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    info!(operation = operation_name, attempt, "操作在重试后成功");
                }
                return Ok(value);
            }
            Err(err) => {
                if !is_retryable(&err) {
                    warn!(
                        operation = operation_name,
                        error = %err,
                        "操作失败且不可重试，直接返回错误"
                    );
                    return Err(err);
                }

                if !policy.should_retry(attempt) {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_retries = policy.max_retries,
                        error = %err,
                        "已达最大重试次数，放弃重试"
                    );
                    return Err(err);
                }

                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "操作失败，将在退避后重试"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SharedError;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(100),
            multiplier: 2.0,
        }
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = fast_policy(10);
        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(40));
        assert_eq!(policy.delay_for_attempt(8), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<u32, SharedError> = retry_with_policy(
            &fast_policy(3),
            "flaky",
            SharedError::is_retryable,
            || {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst);
                    if n < 2 {
                        Err(SharedError::Database(sqlx::Error::PoolTimedOut))
                    } else {
                        Ok(n)
                    }
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_returns_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), SharedError> = retry_with_policy(
            &fast_policy(3),
            "broken",
            SharedError::is_retryable,
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(SharedError::Internal("bad input".to_string()))
                }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), SharedError> = retry_with_policy(
            &fast_policy(2),
            "down",
            SharedError::is_retryable,
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(SharedError::Database(sqlx::Error::PoolClosed))
                }
            },
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
