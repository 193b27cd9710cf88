//! 积分计算服务 HTTP 客户端

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loyalty_shared::config::AccrualConfig;
use loyalty_shared::observability::metrics;
use reqwest::StatusCode;
use reqwest::header::RETRY_AFTER;
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use super::{AccrualError, AccrualSource, AccrualVerdict, RateLimiter};
use crate::models::MAX_AMOUNT;

/// 积分计算服务客户端
///
/// 每次请求前先经过共享限流器；收到 429 时触发全局冷却。
pub struct AccrualClient {
    http: reqwest::Client,
    base_url: String,
    limiter: Arc<RateLimiter>,
}

impl AccrualClient {
    pub fn new(config: &AccrualConfig, limiter: Arc<RateLimiter>) -> Result<Self, AccrualError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            base_url: config.normalized_base_url(),
            limiter,
        })
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn fetch(&self, number: &str) -> Result<AccrualVerdict, AccrualError> {
        self.limiter.acquire().await;

        let url = format!("{}/api/orders/{}", self.base_url, number);
        let response = self.http.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await?;
                let verdict: AccrualVerdict = serde_json::from_slice(&body)
                    .map_err(|e| AccrualError::Decode(e.to_string()))?;

                if verdict.order != number {
                    return Err(AccrualError::OrderMismatch {
                        expected: number.to_string(),
                        actual: verdict.order,
                    });
                }
                if verdict.accrual < Decimal::ZERO {
                    return Err(AccrualError::Decode(format!(
                        "负的积分: {}",
                        verdict.accrual
                    )));
                }
                if verdict.accrual > MAX_AMOUNT {
                    return Err(AccrualError::Decode(format!(
                        "积分超出上限 {}: {}",
                        MAX_AMOUNT, verdict.accrual
                    )));
                }
                Ok(verdict)
            }
            StatusCode::NO_CONTENT => Err(AccrualError::UnknownOrder(number.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                let retry_after = self.limiter.trip(retry_after);
                metrics::record_accrual_rate_limited();
                Err(AccrualError::RateLimited { retry_after })
            }
            other => Err(AccrualError::UnexpectedStatus(other.as_u16())),
        }
    }
}

/// Retry-After 只支持秒数形式；HTTP 日期形式交给默认冷却时间
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[async_trait]
impl AccrualSource for AccrualClient {
    #[instrument(skip(self), fields(order = %number))]
    async fn poll(&self, number: &str) -> Result<AccrualVerdict, AccrualError> {
        let result = self.fetch(number).await;

        match &result {
            Ok(verdict) => {
                debug!(status = verdict.status.as_str(), accrual = %verdict.accrual, "收到积分计算结果");
                metrics::record_accrual_poll("verdict");
            }
            Err(e) => metrics::record_accrual_poll(e.outcome()),
        }

        result
    }
}
