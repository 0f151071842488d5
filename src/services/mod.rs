pub mod classifier;
pub mod event_log;
pub mod quota_enforcer;

pub use classifier::{classify_failure, Classification, ErrorClass, UNCLASSIFIED};
pub use event_log::EventLogWriter;
pub use quota_enforcer::{authorize_tenant, normalize_tenant_name, DebitReceipt, QuotaEnforcer};
