//! 进程级限流器
//!
//! 所有轮询任务共享同一个实例：任何一个任务收到 429 后，
//! 其余任务的下一次请求都会等到冷却结束。可选地按固定窗口限制请求数。

use std::time::Duration;

use loyalty_shared::config::AccrualConfig;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// 单次冷却的默认上限
pub const DEFAULT_MAX_COOLDOWN: Duration = Duration::from_secs(300);

#[derive(Debug)]
struct LimiterState {
    window_started: Instant,
    used: u32,
    paused_until: Option<Instant>,
}

/// 共享限流器
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    default_cooldown: Duration,
    max_cooldown: Duration,
    max_requests: Option<u32>,
    window: Duration,
}

impl RateLimiter {
    pub fn new(default_cooldown: Duration, max_requests: Option<u32>, window: Duration) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                window_started: Instant::now(),
                used: 0,
                paused_until: None,
            }),
            default_cooldown,
            max_cooldown: DEFAULT_MAX_COOLDOWN.max(default_cooldown),
            max_requests,
            window,
        }
    }

    pub fn from_config(config: &AccrualConfig) -> Self {
        Self::new(
            config.rate_limit_cooldown(),
            config.max_requests_per_window,
            config.window(),
        )
        .with_max_cooldown(config.max_cooldown())
    }

    /// 设置单次冷却的上限，不低于默认冷却时间
    pub fn with_max_cooldown(mut self, max_cooldown: Duration) -> Self {
        self.max_cooldown = max_cooldown.max(self.default_cooldown);
        self
    }

    /// 没有窗口预算，只响应 429
    pub fn cooldown_only(default_cooldown: Duration) -> Self {
        Self::new(default_cooldown, None, Duration::from_secs(60))
    }

    pub fn default_cooldown(&self) -> Duration {
        self.default_cooldown
    }

    pub fn max_cooldown(&self) -> Duration {
        self.max_cooldown
    }

    /// 等待直到允许发出一次请求
    pub async fn acquire(&self) {
        loop {
            let wait = match self.try_acquire(Instant::now()) {
                None => return,
                Some(wait) => wait,
            };
            debug!(wait_ms = wait.as_millis() as u64, "等待限流冷却");
            tokio::time::sleep(wait).await;
        }
    }

    /// 能发请求时占用一个名额并返回 None，否则返回需要等待的时长
    fn try_acquire(&self, now: Instant) -> Option<Duration> {
        let mut state = self.state.lock();

        if let Some(until) = state.paused_until {
            if until > now {
                return Some(until - now);
            }
            state.paused_until = None;
        }

        let Some(max) = self.max_requests else {
            return None;
        };

        if now.duration_since(state.window_started) >= self.window {
            state.window_started = now;
            state.used = 0;
        }

        if state.used >= max {
            return Some((state.window_started + self.window).saturating_duration_since(now));
        }

        state.used += 1;
        None
    }

    /// 进入冷却
    ///
    /// `retry_after` 为空时使用默认冷却时间，超过上限时截断到上限；
    /// 已有更长的冷却时不会被缩短。返回冷却实际结束前的剩余时长。
    pub fn trip(&self, retry_after: Option<Duration>) -> Duration {
        let now = Instant::now();
        let cooldown = retry_after
            .unwrap_or(self.default_cooldown)
            .min(self.max_cooldown);
        let until = now
            .checked_add(cooldown)
            .or_else(|| now.checked_add(self.default_cooldown))
            .unwrap_or(now);

        let mut state = self.state.lock();
        let effective = match state.paused_until {
            Some(existing) if existing >= until => existing,
            _ => until,
        };
        state.paused_until = Some(effective);

        let remaining = effective - now;
        warn!(cooldown_ms = remaining.as_millis() as u64, "积分计算服务限流，暂停所有轮询");
        remaining
    }

    /// 当前冷却的剩余时间
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let now = Instant::now();
        self.state
            .lock()
            .paused_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_acquire_without_limits_is_immediate() {
        let limiter = RateLimiter::cooldown_only(Duration::from_secs(10));
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trip_blocks_until_cooldown_ends() {
        let limiter = RateLimiter::cooldown_only(Duration::from_secs(10));
        limiter.trip(None);
        assert_eq!(limiter.cooldown_remaining(), Some(Duration::from_secs(10)));

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert_eq!(limiter.cooldown_remaining(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_overrides_default() {
        let limiter = RateLimiter::cooldown_only(Duration::from_secs(10));
        let remaining = limiter.trip(Some(Duration::from_secs(3)));
        assert_eq!(remaining, Duration::from_secs(3));

        let start = Instant::now();
        limiter.acquire().await;
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(3) && waited < Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shorter_trip_never_shortens_cooldown() {
        let limiter = RateLimiter::cooldown_only(Duration::from_secs(10));
        limiter.trip(Some(Duration::from_secs(30)));
        let remaining = limiter.trip(Some(Duration::from_secs(1)));
        assert_eq!(remaining, Duration::from_secs(30));
        assert_eq!(limiter.cooldown_remaining(), Some(Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_retry_after_is_clamped() {
        let limiter = RateLimiter::cooldown_only(Duration::from_secs(10))
            .with_max_cooldown(Duration::from_secs(120));

        let remaining = limiter.trip(Some(Duration::from_secs(u64::MAX)));
        assert_eq!(remaining, Duration::from_secs(120));
        assert_eq!(limiter.cooldown_remaining(), Some(Duration::from_secs(120)));

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::from_secs(120));
    }

    #[test]
    fn test_max_cooldown_never_below_default() {
        let limiter = RateLimiter::cooldown_only(Duration::from_secs(10))
            .with_max_cooldown(Duration::from_secs(1));
        assert_eq!(limiter.max_cooldown(), Duration::from_secs(10));
        assert_eq!(
            RateLimiter::cooldown_only(Duration::from_secs(10)).max_cooldown(),
            DEFAULT_MAX_COOLDOWN
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_budget() {
        let limiter = RateLimiter::new(Duration::from_secs(10), Some(2), Duration::from_secs(60));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        // 第三次要等到下一个窗口
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }
}
