use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::lenient;
use super::status::SchedulingState;

/// 订单项 ID（所有状态更新的主键）
pub type OrderItemId = i64;

/// 默认证件类型
pub const DEFAULT_IDENTIFICATION_TYPE: &str = "Cédula de Ciudadanía";

/// 队列中的订单摘要（programacion-ordenes）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    #[serde(rename = "id_item_orden_proced")]
    pub order_item_id: OrderItemId,

    #[serde(rename = "id_orden", default, deserialize_with = "lenient::opt_string")]
    pub order_id: Option<String>,

    #[serde(rename = "estado", default, deserialize_with = "lenient::opt_string")]
    pub state: Option<String>,

    #[serde(
        rename = "intentos_realizados",
        default,
        deserialize_with = "lenient::opt_u32"
    )]
    pub attempts_made: Option<u32>,

    #[serde(
        rename = "intentos_maximos",
        default,
        deserialize_with = "lenient::opt_u32"
    )]
    pub attempts_max: Option<u32>,

    #[serde(rename = "fecha_inicio", default, deserialize_with = "lenient::opt_string")]
    pub first_attempt_started_at: Option<String>,
}

impl OrderSummary {
    /// 新建一个待处理订单摘要（测试与排期时使用）
    pub fn pending(order_item_id: OrderItemId, attempts_made: u32, attempts_max: u32) -> Self {
        Self {
            order_item_id,
            order_id: None,
            state: Some(SchedulingState::Pending.as_str().to_string()),
            attempts_made: Some(attempts_made),
            attempts_max: Some(attempts_max),
            first_attempt_started_at: None,
        }
    }

    /// 解析远程调度状态，无法识别时返回 None
    pub fn scheduling_state(&self) -> Option<SchedulingState> {
        self.state.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn attempts_made(&self) -> u32 {
        self.attempts_made.unwrap_or(0)
    }

    pub fn attempts_max(&self, default_max: u32) -> u32 {
        self.attempts_max.filter(|m| *m > 0).unwrap_or(default_max)
    }
}

/// 订单详情（lis-pacientes-ordeneshc）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(rename = "Nombre1", default, deserialize_with = "lenient::opt_string")]
    pub first_name: Option<String>,

    #[serde(rename = "Apellido1", default, deserialize_with = "lenient::opt_string")]
    pub last_name: Option<String>,

    #[serde(rename = "NoDocumento", default, deserialize_with = "lenient::opt_string")]
    pub document_number: Option<String>,

    #[serde(
        rename = "TipoIdentificacion",
        default,
        deserialize_with = "lenient::opt_string"
    )]
    pub identification_type: Option<String>,

    #[serde(rename = "telefono", default, deserialize_with = "lenient::opt_string")]
    pub phone: Option<String>,

    #[serde(rename = "FechaOrden", default, deserialize_with = "lenient::opt_string")]
    pub order_date: Option<String>,

    #[serde(rename = "DxIngreso", default, deserialize_with = "lenient::opt_string")]
    pub diagnosis: Option<String>,

    #[serde(rename = "idItemOrden", default, deserialize_with = "lenient::opt_string")]
    pub order_item_id: Option<String>,

    #[serde(rename = "idOrden", default, deserialize_with = "lenient::opt_string")]
    pub order_id: Option<String>,

    #[serde(rename = "urlOrdenMedica", default, deserialize_with = "lenient::opt_string")]
    pub medical_order_file: Option<String>,

    #[serde(rename = "idProcedimiento", default, deserialize_with = "lenient::opt_string")]
    pub procedure_id: Option<String>,

    #[serde(rename = "idAtencion", default, deserialize_with = "lenient::opt_string")]
    pub attention_id: Option<String>,

    #[serde(rename = "cups", default, deserialize_with = "lenient::opt_string")]
    pub cups: Option<String>,

    /// 其他字段原样保留给表单驱动
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl OrderDetail {
    /// 患者姓名（用于日志）
    pub fn display_name(&self) -> String {
        let name = format!(
            "{} {}",
            self.first_name.as_deref().unwrap_or(""),
            self.last_name.as_deref().unwrap_or("")
        );
        let name = name.trim();
        if name.is_empty() {
            "Desconocido".to_string()
        } else {
            name.to_string()
        }
    }

    /// 请求的服务代码列表，`cups` 字段以逗号或分号分隔
    pub fn requested_items(&self) -> Vec<String> {
        self.cups
            .as_deref()
            .map(|c| {
                c.split([',', ';'])
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// 表单驱动的输入契约
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedOrder {
    pub order_item_id: OrderItemId,
    pub order_id: String,
    pub subject_id: String,
    pub identification_type: String,
    pub patient_name: String,
    pub phone: String,
    pub order_date: String,
    pub diagnosis: String,
    pub requested_items: Vec<String>,
    pub procedure_id: String,
    pub attention_id: String,
    pub source_document: PathBuf,
    /// 本次是第几次尝试（从 1 开始）
    pub attempt: u32,
    pub extra: Map<String, JsonValue>,
}

impl NormalizedOrder {
    /// 把订单详情整理成表单驱动需要的格式
    pub fn from_detail(
        order_item_id: OrderItemId,
        detail: &OrderDetail,
        source_document: PathBuf,
        attempt: u32,
    ) -> Self {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        Self {
            order_item_id,
            order_id: text(&detail.order_id),
            subject_id: text(&detail.document_number),
            identification_type: detail
                .identification_type
                .clone()
                .unwrap_or_else(|| DEFAULT_IDENTIFICATION_TYPE.to_string()),
            patient_name: detail.display_name(),
            phone: text(&detail.phone),
            order_date: text(&detail.order_date),
            diagnosis: text(&detail.diagnosis),
            requested_items: detail.requested_items(),
            procedure_id: text(&detail.procedure_id),
            attention_id: text(&detail.attention_id),
            source_document,
            attempt,
            extra: detail.extra.clone(),
        }
    }
}
