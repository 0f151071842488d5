//! 业务变体策略
//!
//! 两个业务变体只在两件事上不同：
//! - 门户返回"已提交过"时如何处理
//! - 去哪里找要上传的源文件
//!
//! 状态机本身只有一份，留在 worker 里。

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::models::{CaseStatus, OrderDetail, OrderItemId, SchedulingState};

/// 配置中选择的业务变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainVariant {
    /// 服务授权申请（Anexo 3）
    #[default]
    Anexo3,
    /// 实验室检查授权
    Laboratorio,
}

impl DomainVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainVariant::Anexo3 => "anexo3",
            DomainVariant::Laboratorio => "laboratorio",
        }
    }

    /// 按变体构建策略对象
    pub fn policy(&self, documents_dir: impl Into<PathBuf>) -> Box<dyn DomainPolicy> {
        let documents_dir = documents_dir.into();
        match self {
            DomainVariant::Anexo3 => Box::new(Anexo3Policy::new(documents_dir)),
            DomainVariant::Laboratorio => Box::new(LaboratorioPolicy::new(documents_dir)),
        }
    }
}

impl fmt::Display for DomainVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DomainVariant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anexo3" => Ok(DomainVariant::Anexo3),
            "laboratorio" => Ok(DomainVariant::Laboratorio),
            other => Err(ConfigError::InvalidValue {
                key: "domain_variant".to_string(),
                value: other.to_string(),
                expected: "anexo3 | laboratorio".to_string(),
            }),
        }
    }
}

/// "已提交过"的处理决定
#[derive(Debug, Clone, PartialEq)]
pub struct AlreadyFiledDecision {
    /// COMPLETED 或 FAILED
    pub scheduling: SchedulingState,
    pub case_status: CaseStatus,
    /// 从门户消息中提取到的受理编号
    pub confirmation: Option<String>,
    /// 是否扣费
    pub billable: bool,
    /// 是否计入成功数
    pub counts_as_success: bool,
}

/// 业务变体策略
pub trait DomainPolicy: Send + Sync {
    fn variant(&self) -> DomainVariant;

    /// 门户返回"已提交过"时的处理方式
    fn classify_already_filed(&self, message: &str) -> AlreadyFiledDecision;

    /// 找到订单对应的源文件，文件不存在时返回 None
    fn locate_source_document(&self, order_item_id: OrderItemId, detail: &OrderDetail)
        -> Option<PathBuf>;
}

/// Anexo 3 变体：已提交视为成功，但不扣费
pub struct Anexo3Policy {
    documents_dir: PathBuf,
}

impl Anexo3Policy {
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
        }
    }

    /// 生成的 Anexo 3 PDF 文件名
    pub fn document_name(order_item_id: OrderItemId, detail: &OrderDetail) -> String {
        format!(
            "anexo3_{}_{}_{}.pdf",
            detail.attention_id.as_deref().unwrap_or("0"),
            detail
                .order_id
                .clone()
                .unwrap_or_else(|| order_item_id.to_string()),
            detail.procedure_id.as_deref().unwrap_or("0"),
        )
    }
}

impl DomainPolicy for Anexo3Policy {
    fn variant(&self) -> DomainVariant {
        DomainVariant::Anexo3
    }

    fn classify_already_filed(&self, message: &str) -> AlreadyFiledDecision {
        AlreadyFiledDecision {
            scheduling: SchedulingState::Completed,
            case_status: CaseStatus::Success,
            confirmation: extract_filing_number(message),
            billable: false,
            counts_as_success: true,
        }
    }

    fn locate_source_document(
        &self,
        order_item_id: OrderItemId,
        detail: &OrderDetail,
    ) -> Option<PathBuf> {
        existing_file(
            &self
                .documents_dir
                .join(Self::document_name(order_item_id, detail)),
        )
    }
}

/// 实验室变体：已提交视为终态失败（代码 6），不扣费
pub struct LaboratorioPolicy {
    documents_dir: PathBuf,
}

impl LaboratorioPolicy {
    pub fn new(documents_dir: impl Into<PathBuf>) -> Self {
        Self {
            documents_dir: documents_dir.into(),
        }
    }
}

impl DomainPolicy for LaboratorioPolicy {
    fn variant(&self) -> DomainVariant {
        DomainVariant::Laboratorio
    }

    fn classify_already_filed(&self, message: &str) -> AlreadyFiledDecision {
        AlreadyFiledDecision {
            scheduling: SchedulingState::Failed,
            case_status: CaseStatus::AlreadyFiled,
            confirmation: extract_filing_number(message),
            billable: false,
            counts_as_success: false,
        }
    }

    fn locate_source_document(
        &self,
        _order_item_id: OrderItemId,
        detail: &OrderDetail,
    ) -> Option<PathBuf> {
        let file_name = detail.medical_order_file.as_deref()?.trim();
        if file_name.is_empty() {
            return None;
        }
        // 只取文件名，忽略记录里可能带的目录
        let file_name = Path::new(file_name).file_name()?;
        existing_file(&self.documents_dir.join(file_name))
    }
}

fn existing_file(path: &Path) -> Option<PathBuf> {
    path.is_file().then(|| path.to_path_buf())
}

/// 从门户消息中提取受理编号（"número de radicado # 12345"）
pub fn extract_filing_number(message: &str) -> Option<String> {
    static FILING_NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    FILING_NUMBER
        .get_or_init(|| Regex::new(r"(?i)n[úu]mero de radicado\s*#?\s*(\d+)").ok())
        .as_ref()?
        .captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
