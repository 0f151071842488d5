pub mod order;
pub mod quota;
pub mod status;
pub mod update;

pub use order::{NormalizedOrder, OrderDetail, OrderItemId, OrderSummary};
pub use quota::{QuotaRecord, QuotaSnapshot};
pub use status::{CaseStatus, SchedulingState};
pub use update::{CaseStatusUpdate, SchedulingUpdate};

/// 远程 API 的字段有时是数字有时是字符串，这里统一成字符串
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            Some(other) => Some(other.to_string()),
        })
    }

    pub fn opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(opt_string(deserializer)?.and_then(|s| s.parse().ok()))
    }

    pub fn opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(opt_string(deserializer)?
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite()))
    }
}
