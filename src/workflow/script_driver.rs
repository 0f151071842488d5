//! 脚本表单驱动
//!
//! 门户的选择器和操作步骤由运维人员写成 JS 文件放在脚本目录下：
//!
//! - `login.js`：输入 `{ loginUrl, email, password }`，失败时抛出异常
//! - `submit.js`：输入规范化后的订单，返回 `{ status, message, confirmation }`
//! - `reset.js`：无输入，把表单恢复到初始状态
//!
//! 每个文件都是一个 async 函数体，可以直接使用 `input` 变量。

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{AppError, AppResult, FileError};
use crate::infrastructure::JsExecutor;
use crate::models::NormalizedOrder;
use crate::workflow::form_driver::{FormDriver, Outcome, RawOutcome};

const LOGIN_SCRIPT: &str = "login.js";
const SUBMIT_SCRIPT: &str = "submit.js";
const RESET_SCRIPT: &str = "reset.js";

/// 门户登录凭据
#[derive(Clone)]
pub struct Credentials {
    pub login_url: String,
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login_url", &self.login_url)
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// 执行脚本目录中 JS 文件的表单驱动
pub struct ScriptFormDriver {
    login_script: String,
    submit_script: String,
    reset_script: String,
    credentials: Credentials,
}

impl ScriptFormDriver {
    /// 从配置中的脚本目录加载
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let credentials = Credentials {
            login_url: config.portal_login_url.clone(),
            email: config.login_email.clone(),
            password: config.login_password.clone(),
        };
        Self::load(&config.scripts_dir, credentials)
    }

    pub fn load(scripts_dir: &Path, credentials: Credentials) -> AppResult<Self> {
        let driver = Self {
            login_script: read_script(&scripts_dir.join(LOGIN_SCRIPT))?,
            submit_script: read_script(&scripts_dir.join(SUBMIT_SCRIPT))?,
            reset_script: read_script(&scripts_dir.join(RESET_SCRIPT))?,
            credentials,
        };
        info!("✓ 已加载门户脚本: {}", scripts_dir.display());
        Ok(driver)
    }
}

fn read_script(path: &PathBuf) -> AppResult<String> {
    if !path.is_file() {
        return Err(AppError::File(FileError::NotFound {
            path: path.display().to_string(),
        }));
    }
    std::fs::read_to_string(path).map_err(|e| AppError::file_read_failed(path.display().to_string(), e))
}

#[async_trait]
impl FormDriver<JsExecutor> for ScriptFormDriver {
    async fn login(&self, executor: &JsExecutor) -> Result<()> {
        let input = json!({
            "loginUrl": self.credentials.login_url,
            "email": self.credentials.email,
            "password": self.credentials.password,
        });
        let result: serde_json::Value = executor.call_with(&self.login_script, &input).await?;

        // 登录脚本成功时可以返回任意值；只有显式的 failure 才算失败
        if result.get("status").and_then(|s| s.as_str()) == Some("failure") {
            let message = result
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("login failed");
            bail!("{}", message);
        }
        Ok(())
    }

    async fn submit(&self, executor: &JsExecutor, order: &NormalizedOrder) -> Result<Outcome> {
        debug!("提交订单 #{} (尝试 {})", order.order_item_id, order.attempt);
        let raw: RawOutcome = executor.call_with(&self.submit_script, order).await?;
        Ok(raw.into())
    }

    async fn reset(&self, executor: &JsExecutor) -> Result<()> {
        let result: serde_json::Value = executor.call_with(&self.reset_script, &json!({})).await?;
        if result.get("status").and_then(|s| s.as_str()) == Some("failure") {
            bail!(
                "reset failed: {}",
                result.get("message").and_then(|m| m.as_str()).unwrap_or("")
            );
        }
        Ok(())
    }
}
