/// 余额账本 API 客户端（ips-saldos）
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::clients::{build_http_client, check_status, read_json, Envelope, LedgerApi};
use crate::config::{Config, LedgerSettings};
use crate::error::{AppError, AppResult, LedgerError};
use crate::infrastructure::TenantCipher;
use crate::models::{QuotaRecord, QuotaSnapshot};

/// 余额账本客户端
pub struct LedgerClient {
    http: reqwest::Client,
    base_url: String,
    cipher: Option<TenantCipher>,
}

impl LedgerClient {
    pub fn new(config: &Config) -> AppResult<Self> {
        Self::from_settings(&config.ledger_settings(), config.http_timeout())
    }

    pub fn from_settings(settings: &LedgerSettings, timeout: Duration) -> AppResult<Self> {
        let cipher = match TenantCipher::new(&settings.cipher_key, &settings.cipher_salt) {
            Ok(cipher) => Some(cipher),
            Err(e) => {
                warn!("⚠️ 无法初始化租户解密: {}", e);
                None
            }
        };
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            cipher,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/ips-saldos", self.base_url)
    }

    fn decrypt_tenant(&self, token: Option<&str>) -> Option<String> {
        let token = token?;
        let cipher = self.cipher.as_ref()?;
        match cipher.decrypt(token) {
            Ok(name) => Some(name),
            Err(e) => {
                debug!("租户名称解密失败: {}", e);
                None
            }
        }
    }
}

/// 把原始记录转换成快照，缺少金额字段时报错
fn snapshot_from_record(record: QuotaRecord, tenant: Option<String>) -> AppResult<QuotaSnapshot> {
    let balance = finite_amount("saldoRobot", record.balance)?;
    let cost_per_case = finite_amount("valorCaso", record.cost_per_case)?;
    Ok(QuotaSnapshot {
        balance,
        cost_per_case,
        tenant_identity: tenant,
    })
}

/// 缺失或非有限值（NaN、inf）都视为无效金额
fn finite_amount(field: &str, value: Option<f64>) -> AppResult<f64> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        other => Err(AppError::Ledger(LedgerError::InvalidAmount {
            field: field.to_string(),
            value: other.map_or_else(|| "null".to_string(), |v| v.to_string()),
        })),
    }
}

#[async_trait]
impl LedgerApi for LedgerClient {
    async fn fetch_balance(&self) -> AppResult<QuotaSnapshot> {
        let endpoint = self.endpoint();
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint.clone(), e))?;

        let envelope: Envelope<Vec<QuotaRecord>> = read_json(&endpoint, response).await?;
        let record = envelope
            .data
            .and_then(|records| records.into_iter().next())
            .ok_or(AppError::Ledger(LedgerError::MissingRecord))?;

        let tenant = self.decrypt_tenant(record.tenant_token.as_deref());
        snapshot_from_record(record, tenant)
    }

    async fn write_balance(&self, balance: f64) -> AppResult<()> {
        let endpoint = self.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .json(&json!({ "saldoRobot": balance }))
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(endpoint.clone(), e))?;
        check_status(&endpoint, response).await?;
        Ok(())
    }
}
