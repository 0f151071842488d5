use serde::{Deserialize, Serialize};

use super::lenient;

/// 余额接口返回的原始记录（ips-saldos）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuotaRecord {
    #[serde(rename = "saldoRobot", default, deserialize_with = "lenient::opt_f64")]
    pub balance: Option<f64>,

    #[serde(rename = "valorCaso", default, deserialize_with = "lenient::opt_f64")]
    pub cost_per_case: Option<f64>,

    /// 加密后的租户名称
    #[serde(rename = "Nbre", default, deserialize_with = "lenient::opt_string")]
    pub tenant_token: Option<String>,
}

/// 读取时已解密的余额快照
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaSnapshot {
    pub balance: f64,
    pub cost_per_case: f64,
    pub tenant_identity: Option<String>,
}

impl QuotaSnapshot {
    pub fn is_exhausted(&self) -> bool {
        self.balance <= 0.0
    }

    /// 扣除一个案例后的余额，最低为 0
    pub fn balance_after_one_case(&self) -> f64 {
        (self.balance - self.cost_per_case).max(0.0)
    }
}
