//! 远程 API 客户端
//!
//! worker 只依赖这里的两个 trait，真实实现基于 reqwest，测试中换成内存实现。

pub mod ledger_client;
pub mod queue_client;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{
    CaseStatus, OrderDetail, OrderItemId, OrderSummary, QuotaSnapshot, SchedulingUpdate,
};

pub use ledger_client::LedgerClient;
pub use queue_client::QueueClient;

/// 远程订单队列
#[async_trait]
pub trait QueueApi: Send + Sync {
    /// 拉取一页待处理订单
    async fn pending_orders(&self, page_size: usize) -> AppResult<Vec<OrderSummary>>;

    /// 订单详情，不存在时返回 None
    async fn order_detail(&self, order_item_id: OrderItemId) -> AppResult<Option<OrderDetail>>;

    async fn update_scheduling(
        &self,
        order_item_id: OrderItemId,
        update: &SchedulingUpdate,
    ) -> AppResult<()>;

    async fn update_case_status(
        &self,
        order_item_id: OrderItemId,
        status: CaseStatus,
        confirmation: Option<String>,
    ) -> AppResult<()>;
}

/// 预付费余额账本
#[async_trait]
pub trait LedgerApi: Send + Sync {
    /// 读取余额（租户名称已解密）
    async fn fetch_balance(&self) -> AppResult<QuotaSnapshot>;

    /// 写回新的余额
    async fn write_balance(&self, balance: f64) -> AppResult<()>;
}

/// API 的统一外层 `{ "data": ..., "message": ... }`
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default)]
    pub data: Option<T>,
}

/// 构建带超时的 HTTP 客户端
pub(crate) fn build_http_client(timeout: std::time::Duration) -> AppResult<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// 检查状态码；非 2xx 时带上响应体返回错误
pub(crate) async fn check_status(
    endpoint: &str,
    response: reqwest::Response,
) -> AppResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AppError::api_bad_status(
        endpoint,
        status.as_u16(),
        crate::utils::truncate_text(&body, 200),
    ))
}

/// 读取 JSON 响应体
pub(crate) async fn read_json<T: DeserializeOwned>(
    endpoint: &str,
    response: reqwest::Response,
) -> AppResult<T> {
    let response = check_status(endpoint, response).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| AppError::api_request_failed(endpoint, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}
