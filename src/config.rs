use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, AppResult, ConfigError, FileError};
use crate::workflow::policy::DomainVariant;

/// 程序配置
///
/// 启动时构建一次，之后以引用的方式传给 worker、会话管理器和各个客户端。
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 远程队列 / 余额 API ---
    pub api_base_url: String,
    pub ledger_base_url: String,
    pub http_timeout_secs: u64,

    // --- Worker 调度 ---
    /// 每次拉取的待处理订单数量
    pub page_size: usize,
    /// 队列为空时的轮询间隔
    pub poll_interval_secs: u64,
    /// 暂停状态下的检查间隔
    pub pause_check_interval_ms: u64,
    /// 会话无法建立时的退避时间
    pub session_backoff_secs: u64,
    /// 会话空闲超时，超过后关闭浏览器
    pub inactivity_timeout_secs: u64,
    /// 订单未提供时的默认最大尝试次数
    pub default_attempts_max: u32,
    /// 连续失败告警阈值
    pub failure_alert_threshold: u64,
    /// 写入调度记录的执行人
    pub executor_user: String,
    /// 业务变体（anexo3 / laboratorio）
    pub domain_variant: DomainVariant,

    // --- 浏览器 ---
    pub browser_executable: Option<PathBuf>,
    pub headless: bool,
    /// 设置后改为连接已运行的浏览器而不是启动新的
    pub browser_debug_port: Option<u16>,
    pub portal_login_url: String,
    pub portal_host: String,
    /// 仅在登录后出现的页面标记（XPath）
    pub authenticated_marker: String,
    pub session_state_file: PathBuf,
    pub screenshots_dir: PathBuf,
    /// 启动参数中的进程标记，用于清理残留浏览器进程
    pub launch_marker: String,
    pub browser_close_timeout_secs: u64,

    // --- 表单驱动脚本 ---
    pub scripts_dir: PathBuf,
    pub documents_dir: PathBuf,
    pub login_email: String,
    pub login_password: String,

    // --- 租户 / 授权 ---
    pub ledger_cipher_key: String,
    pub ledger_cipher_salt: String,
    pub allowed_tenants: Vec<String>,

    // --- 日志 ---
    pub output_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:5000".to_string(),
            ledger_base_url: "http://localhost:5000".to_string(),
            http_timeout_secs: 10,
            page_size: 100,
            poll_interval_secs: 5,
            pause_check_interval_ms: 1000,
            session_backoff_secs: 30,
            inactivity_timeout_secs: 3600,
            default_attempts_max: 2,
            failure_alert_threshold: 5,
            executor_user: "worker_automatico".to_string(),
            domain_variant: DomainVariant::Anexo3,
            browser_executable: None,
            headless: false,
            browser_debug_port: None,
            portal_login_url: "https://portalsalud.coosalud.com/login".to_string(),
            portal_host: "portalsalud.coosalud.com".to_string(),
            authenticated_marker: "//div[contains(.,'Hola,')]".to_string(),
            session_state_file: PathBuf::from("session_data/session_state.json"),
            screenshots_dir: PathBuf::from("screenshots"),
            launch_marker: "--autorizacion-worker-session".to_string(),
            browser_close_timeout_secs: 10,
            scripts_dir: PathBuf::from("portal_scripts"),
            documents_dir: PathBuf::from("documentos"),
            login_email: String::new(),
            login_password: String::new(),
            ledger_cipher_key: "LICENSE_DB_ENCRYPTION_KEY_2024".to_string(),
            ledger_cipher_salt: "license_salt_2024_stable".to_string(),
            allowed_tenants: Vec::new(),
            output_log_file: "output.txt".to_string(),
        }
    }
}

impl Config {
    /// 只从环境变量构建（未设置或无法解析的值使用默认值）
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 先读取 TOML 配置文件，再叠加环境变量
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let base = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    /// 从 TOML 文件读取配置，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Config(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        toml::from_str(&content).map_err(|e| {
            AppError::File(FileError::TomlParseFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })
        })
    }

    fn with_env_overrides(self) -> Self {
        let d = self;
        Self {
            api_base_url: env_string("API_BASE_URL").unwrap_or(d.api_base_url),
            ledger_base_url: env_string("LEDGER_BASE_URL").unwrap_or(d.ledger_base_url),
            http_timeout_secs: env_parse("HTTP_TIMEOUT_SECS").unwrap_or(d.http_timeout_secs),
            page_size: env_parse("PAGE_SIZE").unwrap_or(d.page_size),
            poll_interval_secs: env_parse("POLL_INTERVAL_SECS").unwrap_or(d.poll_interval_secs),
            pause_check_interval_ms: env_parse("PAUSE_CHECK_INTERVAL_MS")
                .unwrap_or(d.pause_check_interval_ms),
            session_backoff_secs: env_parse("SESSION_BACKOFF_SECS")
                .unwrap_or(d.session_backoff_secs),
            inactivity_timeout_secs: env_parse("INACTIVITY_TIMEOUT_SECS")
                .unwrap_or(d.inactivity_timeout_secs),
            default_attempts_max: env_parse("DEFAULT_ATTEMPTS_MAX")
                .unwrap_or(d.default_attempts_max),
            failure_alert_threshold: env_parse("FAILURE_ALERT_THRESHOLD")
                .unwrap_or(d.failure_alert_threshold),
            executor_user: env_string("EXECUTOR_USER").unwrap_or(d.executor_user),
            domain_variant: env_parse("DOMAIN_VARIANT").unwrap_or(d.domain_variant),
            browser_executable: env_string("BROWSER_EXECUTABLE")
                .map(PathBuf::from)
                .or(d.browser_executable),
            headless: env_parse("HEADLESS").unwrap_or(d.headless),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT").or(d.browser_debug_port),
            portal_login_url: env_string("PORTAL_LOGIN_URL").unwrap_or(d.portal_login_url),
            portal_host: env_string("PORTAL_HOST").unwrap_or(d.portal_host),
            authenticated_marker: env_string("AUTHENTICATED_MARKER")
                .unwrap_or(d.authenticated_marker),
            session_state_file: env_string("SESSION_STATE_FILE")
                .map(PathBuf::from)
                .unwrap_or(d.session_state_file),
            screenshots_dir: env_string("SCREENSHOTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.screenshots_dir),
            launch_marker: env_string("LAUNCH_MARKER").unwrap_or(d.launch_marker),
            browser_close_timeout_secs: env_parse("BROWSER_CLOSE_TIMEOUT_SECS")
                .unwrap_or(d.browser_close_timeout_secs),
            scripts_dir: env_string("SCRIPTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.scripts_dir),
            documents_dir: env_string("DOCUMENTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(d.documents_dir),
            login_email: env_string("LOGIN_EMAIL").unwrap_or(d.login_email),
            login_password: env_string("LOGIN_PASSWORD").unwrap_or(d.login_password),
            ledger_cipher_key: env_string("LEDGER_CIPHER_KEY").unwrap_or(d.ledger_cipher_key),
            ledger_cipher_salt: env_string("LEDGER_CIPHER_SALT").unwrap_or(d.ledger_cipher_salt),
            allowed_tenants: env_string("ALLOWED_TENANTS")
                .map(|v| parse_list(&v))
                .unwrap_or(d.allowed_tenants),
            output_log_file: env_string("OUTPUT_LOG_FILE").unwrap_or(d.output_log_file),
        }
    }

    /// worker 调度参数
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            page_size: self.page_size,
            poll_interval: self.poll_interval(),
            pause_check_interval: self.pause_check_interval(),
            session_backoff: self.session_backoff(),
            inactivity_timeout: self.inactivity_timeout(),
            default_attempts_max: self.default_attempts_max.max(1),
            failure_alert_threshold: self.failure_alert_threshold,
            executor_user: self.executor_user.clone(),
        }
    }

    /// 浏览器会话参数
    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            executable: self.browser_executable.clone(),
            headless: self.headless,
            debug_port: self.browser_debug_port,
            portal_login_url: self.portal_login_url.clone(),
            portal_host: self.portal_host.clone(),
            authenticated_marker: self.authenticated_marker.clone(),
            session_state_file: self.session_state_file.clone(),
            screenshots_dir: self.screenshots_dir.clone(),
            launch_marker: self.launch_marker.clone(),
            close_timeout: self.browser_close_timeout(),
        }
    }

    /// 余额账本参数
    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            base_url: self.ledger_base_url.clone(),
            cipher_key: self.ledger_cipher_key.clone(),
            cipher_salt: self.ledger_cipher_salt.clone(),
            allowed_tenants: self.allowed_tenants.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn pause_check_interval(&self) -> Duration {
        Duration::from_millis(self.pause_check_interval_ms)
    }

    pub fn session_backoff(&self) -> Duration {
        Duration::from_secs(self.session_backoff_secs)
    }

    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_secs(self.inactivity_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn browser_close_timeout(&self) -> Duration {
        Duration::from_secs(self.browser_close_timeout_secs)
    }
}

/// worker 调度参数
#[derive(Clone, Debug)]
pub struct WorkerSettings {
    pub page_size: usize,
    pub poll_interval: Duration,
    pub pause_check_interval: Duration,
    pub session_backoff: Duration,
    pub inactivity_timeout: Duration,
    pub default_attempts_max: u32,
    pub failure_alert_threshold: u64,
    pub executor_user: String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Config::default().worker_settings()
    }
}

/// 浏览器会话参数
#[derive(Clone, Debug)]
pub struct BrowserSettings {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub debug_port: Option<u16>,
    pub portal_login_url: String,
    pub portal_host: String,
    pub authenticated_marker: String,
    pub session_state_file: PathBuf,
    pub screenshots_dir: PathBuf,
    pub launch_marker: String,
    pub close_timeout: Duration,
}

/// 余额账本参数
#[derive(Clone, Debug)]
pub struct LedgerSettings {
    pub base_url: String,
    pub cipher_key: String,
    pub cipher_salt: String,
    pub allowed_tenants: Vec<String>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.trim().parse().ok())
}

/// 逗号分隔的列表
fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_worker_contract() {
        let config = Config::default();
        assert_eq!(config.default_attempts_max, 2);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.inactivity_timeout(), Duration::from_secs(3600));
        assert_eq!(config.domain_variant, DomainVariant::Anexo3);
    }

    #[test]
    fn test_toml_overlay_keeps_missing_fields_default() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "api_base_url = \"http://queue.local\"\npage_size = 10\ndomain_variant = \"laboratorio\"\nallowed_tenants = [\"IPS UNO\"]"
        )
        .unwrap();

        let config = Config::from_toml_file(file.path()).unwrap();
        assert_eq!(config.api_base_url, "http://queue.local");
        assert_eq!(config.page_size, 10);
        assert_eq!(config.domain_variant, DomainVariant::Laboratorio);
        assert_eq!(config.allowed_tenants, vec!["IPS UNO".to_string()]);
        assert_eq!(config.poll_interval_secs, 5);
    }

    #[test]
    fn test_missing_toml_file_is_config_error() {
        let result = Config::from_toml_file(Path::new("/definitely/not/here.toml"));
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::FileNotFound { .. }))
        ));
    }

    #[test]
    fn test_parse_list_trims_and_skips_empty() {
        assert_eq!(
            parse_list(" IPS UNO , ,IPS DOS"),
            vec!["IPS UNO".to_string(), "IPS DOS".to_string()]
        );
    }
}
