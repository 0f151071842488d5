//! 订单状态
//!
//! 两条相互独立的状态线：
//! - `SchedulingState`：队列层面的生命周期，决定订单是否会被再次处理
//! - `CaseStatus`：面向业务报表的结果代码

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// 队列调度状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchedulingState {
    #[serde(rename = "PENDIENTE")]
    Pending,
    #[serde(rename = "EN_PROGRESO")]
    InProgress,
    #[serde(rename = "COMPLETADO")]
    Completed,
    #[serde(rename = "ERROR")]
    Failed,
    #[serde(rename = "cancelado", alias = "CANCELADO")]
    Cancelled,
}

impl SchedulingState {
    /// 远程 API 使用的字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            SchedulingState::Pending => "PENDIENTE",
            SchedulingState::InProgress => "EN_PROGRESO",
            SchedulingState::Completed => "COMPLETADO",
            SchedulingState::Failed => "ERROR",
            SchedulingState::Cancelled => "cancelado",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SchedulingState::Completed | SchedulingState::Failed | SchedulingState::Cancelled
        )
    }

    /// 状态机允许的迁移
    ///
    /// 终态之后不允许任何迁移；`IN_PROGRESS → PENDING` 只在可重试失败时由 worker 发起。
    pub fn can_transition_to(&self, next: SchedulingState) -> bool {
        use SchedulingState::*;
        match (self, next) {
            (Completed | Failed | Cancelled, _) => false,
            (Pending, InProgress) | (Pending, Pending) | (Pending, Cancelled) => true,
            (InProgress, InProgress)
            | (InProgress, Pending)
            | (InProgress, Completed)
            | (InProgress, Failed)
            | (InProgress, Cancelled) => true,
            (Pending, Completed) | (Pending, Failed) => false,
        }
    }
}

impl fmt::Display for SchedulingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchedulingState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "PENDIENTE" => Ok(SchedulingState::Pending),
            "EN_PROGRESO" => Ok(SchedulingState::InProgress),
            "COMPLETADO" => Ok(SchedulingState::Completed),
            "ERROR" => Ok(SchedulingState::Failed),
            "CANCELADO" => Ok(SchedulingState::Cancelled),
            other => Err(format!("未知调度状态: {}", other)),
        }
    }
}

/// 业务结果代码（estadoCaso）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseStatus {
    /// 1 = 提交成功
    Success,
    /// 2 = 已排期
    Scheduled,
    /// 3 = 处理中（首次认领）
    Claimed,
    /// 4 = 证件类型错误
    DocumentType,
    /// 5 = 缺少 PDF 文件
    MissingFile,
    /// 6 = 已在别处提交（solicitud activa / ya radicada）
    AlreadyFiled,
    /// 11 = 患者不存在
    SubjectNotFound,
    /// 12 = 浏览器会话丢失
    SessionLost,
    /// 13 = 超时
    Timeout,
    /// 14 = 目标机构不存在
    TargetNotFound,
    /// 15 = 元素已失效
    StaleElement,
    /// 16 = 网络错误
    Network,
    /// 17 = 未分类错误
    Unclassified,
    /// 18 = 权限不足
    PermissionDenied,
    /// 19 = 无法判断提交结果
    Undetermined,
    /// 99 = 已作废
    Cancelled,
}

impl CaseStatus {
    pub fn code(&self) -> u16 {
        match self {
            CaseStatus::Success => 1,
            CaseStatus::Scheduled => 2,
            CaseStatus::Claimed => 3,
            CaseStatus::DocumentType => 4,
            CaseStatus::MissingFile => 5,
            CaseStatus::AlreadyFiled => 6,
            CaseStatus::SubjectNotFound => 11,
            CaseStatus::SessionLost => 12,
            CaseStatus::Timeout => 13,
            CaseStatus::TargetNotFound => 14,
            CaseStatus::StaleElement => 15,
            CaseStatus::Network => 16,
            CaseStatus::Unclassified => 17,
            CaseStatus::PermissionDenied => 18,
            CaseStatus::Undetermined => 19,
            CaseStatus::Cancelled => 99,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        let status = match code {
            1 => CaseStatus::Success,
            2 => CaseStatus::Scheduled,
            3 => CaseStatus::Claimed,
            4 => CaseStatus::DocumentType,
            5 => CaseStatus::MissingFile,
            6 => CaseStatus::AlreadyFiled,
            11 => CaseStatus::SubjectNotFound,
            12 => CaseStatus::SessionLost,
            13 => CaseStatus::Timeout,
            14 => CaseStatus::TargetNotFound,
            15 => CaseStatus::StaleElement,
            16 => CaseStatus::Network,
            17 => CaseStatus::Unclassified,
            18 => CaseStatus::PermissionDenied,
            19 => CaseStatus::Undetermined,
            99 => CaseStatus::Cancelled,
            _ => return None,
        };
        Some(status)
    }

    /// 是否为终态结果码（排期 / 认领之外的都是）
    pub fn is_terminal(&self) -> bool {
        !matches!(self, CaseStatus::Scheduled | CaseStatus::Claimed)
    }

    /// 日志标签
    pub fn tag(&self) -> &'static str {
        match self {
            CaseStatus::Success => "[OK]",
            CaseStatus::Scheduled => "[PROGRAMADA]",
            CaseStatus::Claimed => "[EN PROCESO]",
            CaseStatus::DocumentType => "[DOCUMENTO]",
            CaseStatus::MissingFile => "[PDF FALTANTE]",
            CaseStatus::AlreadyFiled => "[YA RADICADA]",
            CaseStatus::SubjectNotFound => "[NO ENCONTRADO]",
            CaseStatus::SessionLost => "[SESIÓN PERDIDA]",
            CaseStatus::Timeout => "[TIMEOUT]",
            CaseStatus::TargetNotFound => "[IPS NO ENCONTRADA]",
            CaseStatus::StaleElement => "[ELEMENTO OBSOLETO]",
            CaseStatus::Network => "[SIN INTERNET]",
            CaseStatus::Unclassified => "[ERROR]",
            CaseStatus::PermissionDenied => "[SIN PERMISOS]",
            CaseStatus::Undetermined => "[SIN RESULTADO]",
            CaseStatus::Cancelled => "[ANULADA]",
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.tag(), self.code())
    }
}
