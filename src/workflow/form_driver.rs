//! 表单驱动契约 - 流程层
//!
//! worker 只通过这个 trait 和门户打交道，具体怎么填表由实现决定。

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::NormalizedOrder;

/// 单次提交的结构化结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// 门户确认受理，可能带回受理编号
    Success { confirmation: Option<String> },
    /// 门户识别为重复提交
    AlreadyFiled { message: String },
    /// 门户返回了错误信息
    Failure { message: String },
}

impl Outcome {
    pub fn success(confirmation: impl Into<String>) -> Self {
        let confirmation = confirmation.into();
        Outcome::Success {
            confirmation: (!confirmation.trim().is_empty()).then_some(confirmation),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Outcome::Failure {
            message: message.into(),
        }
    }
}

/// 表单驱动
///
/// `H` 是会话句柄（真实环境下是 `JsExecutor`，测试里可以是 `()`）。
/// `submit` 可能耗时数十秒；返回 `Err` 与返回 `Outcome::Failure` 都会进入错误分类。
#[async_trait]
pub trait FormDriver<H>: Send + Sync
where
    H: Send + Sync,
{
    /// 完整登录流程（含验证码），只在登录探测失败时调用
    async fn login(&self, handle: &H) -> Result<()>;

    /// 提交一个订单
    async fn submit(&self, handle: &H, order: &NormalizedOrder) -> Result<Outcome>;

    /// 把门户表单恢复到干净状态
    async fn reset(&self, handle: &H) -> Result<()>;
}

/// 脚本返回的原始结果
#[derive(Debug, Clone, Deserialize)]
pub struct RawOutcome {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub confirmation: Option<String>,
}

impl From<RawOutcome> for Outcome {
    fn from(raw: RawOutcome) -> Self {
        let message = raw.message.unwrap_or_default();
        match raw.status.trim().to_lowercase().as_str() {
            "success" | "ok" => Outcome::success(raw.confirmation.unwrap_or_default()),
            "already_filed" | "duplicate" => Outcome::AlreadyFiled { message },
            "failure" | "error" if !message.trim().is_empty() => Outcome::Failure { message },
            other => Outcome::failure(format!("sin resultado del portal (status: {})", other)),
        }
    }
}
