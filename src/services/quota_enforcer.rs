//! 余额计量 - 业务能力层
//!
//! 读取 → 扣减 → 写回。单租户只运行一个 worker，因此不做分布式加锁。

use std::sync::Arc;

use tracing::{debug, warn};

use crate::clients::LedgerApi;
use crate::error::{AppError, AppResult, LedgerError};
use crate::models::QuotaSnapshot;

/// 一次扣费的结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebitReceipt {
    pub previous_balance: f64,
    pub new_balance: f64,
    /// 扣费后余额已耗尽，worker 应在当前订单之后停止
    pub exhausted: bool,
}

/// 余额计量
pub struct QuotaEnforcer<L> {
    ledger: Arc<L>,
}

impl<L: LedgerApi> QuotaEnforcer<L> {
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    /// 读取当前余额
    pub async fn snapshot(&self) -> AppResult<QuotaSnapshot> {
        self.ledger.fetch_balance().await
    }

    /// 为一个成功的订单扣费
    ///
    /// 新余额 = max(0, 余额 - 单价)。任何一步失败都返回错误，由调用方记录。
    pub async fn debit_one_case(&self) -> AppResult<DebitReceipt> {
        let snapshot = self.ledger.fetch_balance().await?;
        if snapshot.cost_per_case < 0.0 {
            return Err(AppError::Ledger(LedgerError::InvalidAmount {
                field: "valorCaso".to_string(),
                value: snapshot.cost_per_case.to_string(),
            }));
        }

        let new_balance = snapshot.balance_after_one_case();
        debug!(
            "扣费: {} - {} -> {}",
            snapshot.balance, snapshot.cost_per_case, new_balance
        );
        self.ledger.write_balance(new_balance).await?;

        Ok(DebitReceipt {
            previous_balance: snapshot.balance,
            new_balance,
            exhausted: new_balance <= 0.0,
        })
    }
}

/// 规范化租户名称：不间断空格换成空格，合并空白，转大写
pub fn normalize_tenant_name(name: &str) -> String {
    name.replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// 检查租户是否在授权名单中；名单为空时不做限制
pub fn authorize_tenant(snapshot: &QuotaSnapshot, allowed: &[String]) -> Result<(), LedgerError> {
    let allowed: Vec<String> = allowed
        .iter()
        .map(|name| normalize_tenant_name(name))
        .filter(|name| !name.is_empty())
        .collect();
    if allowed.is_empty() {
        return Ok(());
    }

    let tenant = snapshot.tenant_identity.as_deref().map(normalize_tenant_name);
    match tenant {
        Some(ref name) if allowed.contains(name) => Ok(()),
        _ => {
            warn!("⛔ 租户未授权: {:?}", snapshot.tenant_identity);
            Err(LedgerError::TenantNotAuthorized {
                tenant: snapshot.tenant_identity.clone(),
            })
        }
    }
}
