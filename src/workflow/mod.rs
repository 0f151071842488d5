pub mod form_driver;
pub mod order_ctx;
pub mod policy;
pub mod script_driver;

pub use form_driver::{FormDriver, Outcome};
pub use order_ctx::OrderCtx;
pub use policy::{AlreadyFiledDecision, Anexo3Policy, DomainPolicy, DomainVariant, LaboratorioPolicy};
pub use script_driver::{Credentials, ScriptFormDriver};
