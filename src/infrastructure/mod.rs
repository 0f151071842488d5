pub mod js_executor;
pub mod tenant_cipher;

pub use js_executor::JsExecutor;
pub use tenant_cipher::{CipherError, TenantCipher};
