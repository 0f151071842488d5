//! 错误分类 - 业务能力层
//!
//! 纯函数：失败信息（小写）→ 错误类别 + 业务结果代码。
//! 关键字表按顺序匹配，第一个命中的生效。

use std::fmt;

use crate::models::CaseStatus;

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// 不重试，直接终态失败
    Permanent,
    /// 在尝试次数内重新排队
    Retryable,
    /// 未知错误，按不可重试处理
    Unclassified,
}

impl ErrorClass {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorClass::Retryable)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorClass::Permanent => "Permanent",
            ErrorClass::Retryable => "Retryable",
            ErrorClass::Unclassified => "Unclassified",
        };
        f.write_str(name)
    }
}

/// 分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub class: ErrorClass,
    pub case_status: CaseStatus,
}

impl Classification {
    const fn new(class: ErrorClass, case_status: CaseStatus) -> Self {
        Self { class, case_status }
    }
}

/// 未命中任何关键字时的结果
pub const UNCLASSIFIED: Classification =
    Classification::new(ErrorClass::Unclassified, CaseStatus::Unclassified);

use crate::models::CaseStatus as C;
use self::ErrorClass::{Permanent as P, Retryable as R, Unclassified as U};

/// 关键字表
///
/// 永久错误排在前面：门户的"重复提交"消息里常带有 "sesión" 之类的词。
const KEYWORD_TABLE: &[(&str, Classification)] = &[
    // 已提交过
    ("duplicado", Classification::new(P, C::AlreadyFiled)),
    ("ya reportado", Classification::new(P, C::AlreadyFiled)),
    ("ya existe", Classification::new(P, C::AlreadyFiled)),
    ("número de radicado", Classification::new(P, C::AlreadyFiled)),
    ("numero de radicado", Classification::new(P, C::AlreadyFiled)),
    ("ya radicada", Classification::new(P, C::AlreadyFiled)),
    ("solicitud activa", Classification::new(P, C::AlreadyFiled)),
    // 证件类型
    ("tipo de documento", Classification::new(P, C::DocumentType)),
    ("tipo documento", Classification::new(P, C::DocumentType)),
    ("documento incorrecto", Classification::new(P, C::DocumentType)),
    ("identificación inválida", Classification::new(P, C::DocumentType)),
    ("identificacion invalida", Classification::new(P, C::DocumentType)),
    // 患者 / 机构不存在
    ("paciente no encontrado", Classification::new(P, C::SubjectNotFound)),
    ("no encontrado en base", Classification::new(P, C::SubjectNotFound)),
    ("sin procedimientos", Classification::new(P, C::SubjectNotFound)),
    ("ips no encontrada", Classification::new(P, C::TargetNotFound)),
    // 缺少文件
    ("archivo no encontrado", Classification::new(P, C::MissingFile)),
    ("pdf no encontrado", Classification::new(P, C::MissingFile)),
    ("pdf no existe", Classification::new(P, C::MissingFile)),
    ("no se encontró pdf", Classification::new(P, C::MissingFile)),
    ("pdf faltante", Classification::new(P, C::MissingFile)),
    // 权限
    ("permission", Classification::new(P, C::PermissionDenied)),
    ("access denied", Classification::new(P, C::PermissionDenied)),
    ("forbidden", Classification::new(P, C::PermissionDenied)),
    // 会话丢失
    ("invalid session", Classification::new(R, C::SessionLost)),
    ("no such session", Classification::new(R, C::SessionLost)),
    ("chrome not reachable", Classification::new(R, C::SessionLost)),
    ("browser has been closed", Classification::new(R, C::SessionLost)),
    ("context has been closed", Classification::new(R, C::SessionLost)),
    ("disconnected", Classification::new(R, C::SessionLost)),
    ("session", Classification::new(R, C::SessionLost)),
    ("sesión", Classification::new(R, C::SessionLost)),
    // 超时
    ("timeout", Classification::new(R, C::Timeout)),
    ("timed out", Classification::new(R, C::Timeout)),
    ("exceeded", Classification::new(R, C::Timeout)),
    // 元素失效
    ("stale element", Classification::new(R, C::StaleElement)),
    ("element is not attached", Classification::new(R, C::StaleElement)),
    ("detached", Classification::new(R, C::StaleElement)),
    // 网络
    ("network", Classification::new(R, C::Network)),
    ("connection", Classification::new(R, C::Network)),
    ("dns", Classification::new(R, C::Network)),
    ("resolve", Classification::new(R, C::Network)),
    ("unreachable", Classification::new(R, C::Network)),
    ("temporarily unavailable", Classification::new(R, C::Network)),
    // 门户没有给出任何结果
    ("sin resultado", Classification::new(U, C::Undetermined)),
];

/// 对失败信息分类
///
/// 总是返回一个结果；未知信息归为 `Unclassified`（不重试）。
pub fn classify_failure(message: &str) -> Classification {
    let lowered = message.to_lowercase();
    KEYWORD_TABLE
        .iter()
        .find(|(keyword, _)| lowered.contains(keyword))
        .map(|(_, classification)| *classification)
        .unwrap_or(UNCLASSIFIED)
}
