use serde::Serialize;

use super::status::{CaseStatus, SchedulingState};

/// 调度记录更新（PUT programacion-ordenes/item/{id}）
///
/// 未设置的字段不会出现在请求体里，远程记录保持原值。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchedulingUpdate {
    #[serde(rename = "estado")]
    pub state: SchedulingState,

    #[serde(rename = "intentos_realizados", skip_serializing_if = "Option::is_none")]
    pub attempts_made: Option<u32>,

    #[serde(rename = "fecha_inicio", skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,

    #[serde(rename = "fecha_fin", skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<String>,

    #[serde(rename = "usuario_ejecuto", skip_serializing_if = "Option::is_none")]
    pub executed_by: Option<String>,

    #[serde(rename = "resultado_ejecucion", skip_serializing_if = "Option::is_none")]
    pub result_message: Option<String>,

    #[serde(rename = "mensaje_error", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SchedulingUpdate {
    pub fn new(state: SchedulingState) -> Self {
        Self {
            state,
            attempts_made: None,
            started_at: None,
            finished_at: None,
            executed_by: None,
            result_message: None,
            error_message: None,
        }
    }

    pub fn attempts(mut self, attempts_made: u32) -> Self {
        self.attempts_made = Some(attempts_made);
        self
    }

    pub fn started_at(mut self, timestamp: impl Into<String>) -> Self {
        self.started_at = Some(timestamp.into());
        self
    }

    pub fn finished_at(mut self, timestamp: impl Into<String>) -> Self {
        self.finished_at = Some(timestamp.into());
        self
    }

    pub fn executed_by(mut self, user: impl Into<String>) -> Self {
        self.executed_by = Some(user.into());
        self
    }

    pub fn result(mut self, message: impl Into<String>) -> Self {
        self.result_message = Some(message.into());
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// 业务结果代码更新（PUT h-itemordenesproced/{id}/estadoCaso）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaseStatusUpdate {
    #[serde(rename = "estadoCaso")]
    pub code: u16,

    #[serde(rename = "numeroAutorizacion", skip_serializing_if = "Option::is_none")]
    pub confirmation: Option<String>,
}

impl CaseStatusUpdate {
    pub fn new(status: CaseStatus, confirmation: Option<String>) -> Self {
        Self {
            code: status.code(),
            confirmation,
        }
    }
}
