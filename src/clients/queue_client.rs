/// 订单队列 API 客户端
///
/// 封装 programacion-ordenes / lis-pacientes-ordeneshc / h-itemordenesproced 三组接口
use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};

use crate::clients::{build_http_client, check_status, read_json, Envelope, QueueApi};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{
    CaseStatus, CaseStatusUpdate, OrderDetail, OrderItemId, OrderSummary, SchedulingState,
    SchedulingUpdate,
};
use crate::utils::timestamp_now;

#[derive(Debug, Default, Deserialize)]
struct PendingPage {
    #[serde(rename = "programaciones", default)]
    orders: Vec<OrderSummary>,
}

/// 新建调度记录（POST programacion-ordenes）
#[derive(Debug, Serialize)]
struct NewScheduling<'a> {
    id_item_orden_proced: OrderItemId,
    id_orden: &'a str,
    estado: SchedulingState,
    fecha_programacion: String,
    intentos_maximos: u32,
    usuario_programo: &'a str,
}

/// 队列 API 客户端
pub struct QueueClient {
    http: reqwest::Client,
    base_url: String,
}

impl QueueClient {
    /// 创建新的队列客户端
    pub fn new(config: &Config) -> AppResult<Self> {
        Self::with_base_url(&config.api_base_url, config.http_timeout())
    }

    pub fn with_base_url(base_url: &str, timeout: std::time::Duration) -> AppResult<Self> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn put_json<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> AppResult<()> {
        let endpoint = self.url(path);
        debug!("PUT {} {}", endpoint, serde_json::to_string(body)?);
        let response = self
            .http
            .put(&endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint.clone(), e))?;
        check_status(&endpoint, response).await?;
        Ok(())
    }

    /// 安排一个订单进入队列
    ///
    /// 先把业务代码设为"已排期"，再插入一条 PENDIENTE 调度记录。
    pub async fn schedule_order(
        &self,
        order_item_id: OrderItemId,
        order_id: &str,
        scheduled_for: DateTime<Local>,
        attempts_max: u32,
        scheduled_by: &str,
    ) -> AppResult<()> {
        self.update_case_status(order_item_id, CaseStatus::Scheduled, None)
            .await?;

        let endpoint = self.url("/programacion-ordenes");
        let body = NewScheduling {
            id_item_orden_proced: order_item_id,
            id_orden: order_id,
            estado: SchedulingState::Pending,
            fecha_programacion: scheduled_for.format("%Y-%m-%d %H:%M:%S").to_string(),
            intentos_maximos: attempts_max,
            usuario_programo: scheduled_by,
        };
        let response = self
            .http
            .post(&endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint.clone(), e))?;
        check_status(&endpoint, response).await?;

        info!("📅 订单 #{} 已排期: {}", order_item_id, body.fecha_programacion);
        Ok(())
    }

    /// 作废订单：业务代码 99 并清空受理编号，调度状态改为 cancelado
    pub async fn cancel_order(&self, order_item_id: OrderItemId, cancelled_by: &str) -> AppResult<()> {
        self.update_case_status(order_item_id, CaseStatus::Cancelled, Some(String::new()))
            .await?;
        let update = SchedulingUpdate::new(SchedulingState::Cancelled)
            .finished_at(timestamp_now())
            .executed_by(cancelled_by)
            .result("Orden anulada");
        self.update_scheduling(order_item_id, &update).await?;
        info!("🗑️ 订单 #{} 已作废", order_item_id);
        Ok(())
    }
}

#[async_trait]
impl QueueApi for QueueClient {
    async fn pending_orders(&self, page_size: usize) -> AppResult<Vec<OrderSummary>> {
        let endpoint = self.url("/programacion-ordenes");
        let response = self
            .http
            .get(&endpoint)
            .query(&[
                ("estado", SchedulingState::Pending.as_str().to_string()),
                ("per_page", page_size.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint.clone(), e))?;

        let envelope: Envelope<PendingPage> = read_json(&endpoint, response).await?;
        Ok(envelope.data.unwrap_or_default().orders)
    }

    async fn order_detail(&self, order_item_id: OrderItemId) -> AppResult<Option<OrderDetail>> {
        let endpoint = self.url(&format!("/lis-pacientes-ordeneshc/{}", order_item_id));
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint.clone(), e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        // data 可能是 null、空对象或空数组
        let envelope: Envelope<JsonValue> = read_json(&endpoint, response).await?;
        let record = match envelope.data {
            Some(JsonValue::Object(map)) if !map.is_empty() => JsonValue::Object(map),
            Some(JsonValue::Array(mut items)) if !items.is_empty() => items.remove(0),
            _ => return Ok(None),
        };
        if record.as_object().map(Map::is_empty).unwrap_or(true) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(record)?))
    }

    async fn update_scheduling(
        &self,
        order_item_id: OrderItemId,
        update: &SchedulingUpdate,
    ) -> AppResult<()> {
        self.put_json(&format!("/programacion-ordenes/item/{}", order_item_id), update)
            .await
    }

    async fn update_case_status(
        &self,
        order_item_id: OrderItemId,
        status: CaseStatus,
        confirmation: Option<String>,
    ) -> AppResult<()> {
        let body = CaseStatusUpdate::new(status, confirmation);
        self.put_json(&format!("/h-itemordenesproced/{}/estadoCaso", order_item_id), &body)
            .await
    }
}
