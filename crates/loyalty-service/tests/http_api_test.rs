//! HTTP API 集成测试
//!
//! 直接对 `build_router` 发请求（tower `oneshot`），使用内存存储，
//! 积分计算服务替换为固定返回 PROCESSED 的实现。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use http_body_util::BodyExt;
use loyalty_service::accrual::{AccrualError, AccrualSource, AccrualStatus, AccrualVerdict};
use loyalty_service::http::{AppState, build_router};
use loyalty_service::reconciliation::ReconciliationScheduler;
use loyalty_service::repository::MemoryStore;
use loyalty_service::service::{BalanceService, OrderService};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

const INTERVAL: Duration = Duration::from_secs(1);

/// 所有订单都立即算出 729.98 积分
struct FixedAccrual;

#[async_trait]
impl AccrualSource for FixedAccrual {
    async fn poll(&self, number: &str) -> Result<AccrualVerdict, AccrualError> {
        Ok(AccrualVerdict {
            order: number.to_string(),
            status: AccrualStatus::Processed,
            accrual: Decimal::new(72998, 2),
        })
    }
}

struct TestApp {
    router: Router,
    scheduler: ReconciliationScheduler,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let scheduler = ReconciliationScheduler::new(store.clone(), Arc::new(FixedAccrual), INTERVAL);
        let orders = Arc::new(OrderService::new(store.clone(), Arc::new(scheduler.clone())));
        let balances = Arc::new(BalanceService::new(store));

        Self {
            router: build_router(AppState::new(orders, balances, None)),
            scheduler,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Option<Value>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            None
        } else {
            Some(serde_json::from_slice(&bytes).unwrap())
        };
        (status, body)
    }

    async fn wait_until_idle(&self) {
        for _ in 0..100 {
            if self.scheduler.active_count() == 0 {
                return;
            }
            tokio::time::sleep(INTERVAL).await;
        }
        panic!("对账任务未在预期时间内结束");
    }
}

// ==================== 请求构造 ====================

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        builder = builder.header("x-user-id", user);
    }
    builder.body(Body::empty()).unwrap()
}

fn post_order(user: &str, number: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/user/orders")
        .header("x-user-id", user)
        .header(CONTENT_TYPE, "text/plain")
        .body(Body::from(number.to_string()))
        .unwrap()
}

fn post_withdraw(user: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/user/balance/withdraw")
        .header("x-user-id", user)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn open_account(user: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!("/api/internal/accounts/{}", user))
        .body(Body::empty())
        .unwrap()
}

// ==================== 身份 ====================

#[tokio::test]
async fn test_missing_user_is_unauthorized() {
    let app = TestApp::new();

    let (status, body) = app.send(get("/api/user/orders", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body.unwrap()["code"], "UNAUTHORIZED");

    let (status, _) = app.send(get("/api/user/balance", Some("  "))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ==================== 订单 ====================

#[tokio::test]
async fn test_register_order_status_codes() {
    let app = TestApp::new();

    let wrong_type = Request::builder()
        .method("POST")
        .uri("/api/user/orders")
        .header("x-user-id", "alice")
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from("79927398713"))
        .unwrap();
    let (status, _) = app.send(wrong_type).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.send(post_order("alice", "   ")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.send(post_order("alice", "79927398710")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body.unwrap()["code"], "INVALID_ORDER_NUMBER");

    let (status, _) = app.send(post_order("alice", "79927398713")).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, _) = app.send(post_order("alice", "79927398713\n")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.send(post_order("bob", "79927398713")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body.unwrap()["success"], false);

    app.scheduler.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_list_orders() {
    let app = TestApp::new();

    let (status, body) = app.send(get("/api/user/orders", Some("alice"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_none());

    app.send(post_order("alice", "79927398713")).await;

    // 处理完成前 accrual 字段不出现
    let (status, body) = app.send(get("/api/user/orders", Some("alice"))).await;
    assert_eq!(status, StatusCode::OK);
    let orders = body.unwrap();
    assert_eq!(orders[0]["status"], "NEW");
    assert!(orders[0].get("accrual").is_none());

    app.wait_until_idle().await;

    let (_, body) = app.send(get("/api/user/orders", Some("alice"))).await;
    let orders = body.unwrap();
    assert_eq!(orders.as_array().unwrap().len(), 1);
    assert_eq!(orders[0]["number"], "79927398713");
    assert_eq!(orders[0]["status"], "PROCESSED");
    assert_eq!(orders[0]["accrual"].as_f64(), Some(729.98));
    assert!(orders[0]["uploaded_at"].as_str().unwrap().ends_with('Z'));

    // 其他用户看不到
    let (status, _) = app.send(get("/api/user/orders", Some("bob"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

// ==================== 余额与提现 ====================

#[tokio::test(start_paused = true)]
async fn test_balance_and_withdraw() {
    let app = TestApp::new();

    let (status, _) = app.send(open_account("alice")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app.send(get("/api/user/balance", Some("alice"))).await;
    assert_eq!(status, StatusCode::OK);
    let balance = body.unwrap();
    assert_eq!(balance["current"].as_f64(), Some(0.0));
    assert_eq!(balance["withdrawn"].as_f64(), Some(0.0));

    app.send(post_order("alice", "79927398713")).await;
    app.wait_until_idle().await;

    let (status, _) = app.send(post_withdraw("alice", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(post_withdraw("alice", r#"{"order":"2377225625","sum":1}"#))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = app
        .send(post_withdraw("alice", r#"{"order":"2377225624","sum":1.001}"#))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // 超出库表金额范围
    let (status, body) = app
        .send(post_withdraw(
            "alice",
            r#"{"order":"2377225624","sum":10000000000000}"#,
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body.unwrap()["code"], "INVALID_AMOUNT");

    let (status, body) = app
        .send(post_withdraw("alice", r#"{"order":"2377225624","sum":1000}"#))
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body.unwrap()["code"], "INSUFFICIENT_FUNDS");

    let (status, body) = app.send(get("/api/user/withdrawals", Some("alice"))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_none());

    let (status, _) = app
        .send(post_withdraw("alice", r#"{"order":"2377225624","sum":729.5}"#))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.send(get("/api/user/balance", Some("alice"))).await;
    let balance = body.unwrap();
    assert_eq!(balance["current"].as_f64(), Some(0.48));
    assert_eq!(balance["withdrawn"].as_f64(), Some(729.5));

    let (status, body) = app.send(get("/api/user/withdrawals", Some("alice"))).await;
    assert_eq!(status, StatusCode::OK);
    let withdrawals = body.unwrap();
    assert_eq!(withdrawals[0]["order"], "2377225624");
    assert_eq!(withdrawals[0]["sum"].as_f64(), Some(729.5));
}

#[tokio::test]
async fn test_open_account_is_idempotent() {
    let app = TestApp::new();

    let (first, _) = app.send(open_account("alice")).await;
    let (second, _) = app.send(open_account("alice")).await;
    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CREATED);
}

// ==================== 健康检查 ====================

#[tokio::test]
async fn test_health_without_database() {
    let app = TestApp::new();

    let (status, body) = app.send(get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "skipped");
}
