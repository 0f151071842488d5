//! 会话管理
//!
//! 持有唯一的浏览器会话，保证 worker 看到的要么是已登录的会话，要么是明确的失败。

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{Cookie, CookieParam};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Browser;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::browser::{connection, launcher, process_sweeper, SessionControl};
use crate::config::BrowserSettings;
use crate::error::{AppError, AppResult, BrowserError, SessionError};
use crate::infrastructure::JsExecutor;
use crate::workflow::FormDriver;

/// 登录标记的探测次数（门户登录后的跳转是异步的）
const AUTH_PROBE_ATTEMPTS: u32 = 5;
const AUTH_PROBE_INTERVAL: Duration = Duration::from_secs(1);
const RESPONSIVE_TIMEOUT: Duration = Duration::from_secs(5);

/// 保存到磁盘的 cookie
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
}

impl From<&Cookie> for StoredCookie {
    fn from(cookie: &Cookie) -> Self {
        Self {
            name: cookie.name.clone(),
            value: cookie.value.clone(),
            domain: cookie.domain.clone(),
            path: cookie.path.clone(),
            http_only: cookie.http_only,
            secure: cookie.secure,
        }
    }
}

impl StoredCookie {
    /// 转为 CDP 参数，绑定到门户 URL
    fn to_param(&self, portal_url: &str) -> Option<CookieParam> {
        CookieParam::builder()
            .name(self.name.clone())
            .url(portal_url)
            .value(self.value.clone())
            .domain(self.domain.clone())
            .path(self.path.clone())
            .http_only(self.http_only)
            .secure(self.secure)
            .build()
            .ok()
    }
}

/// 会话状态文件内容
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub cookies: Vec<StoredCookie>,
}

impl SessionState {
    /// 恢复用的 cookie 参数；空状态返回空列表
    pub fn cookie_params(&self, portal_url: &str) -> Vec<CookieParam> {
        self.cookies
            .iter()
            .filter_map(|cookie| cookie.to_param(portal_url))
            .collect()
    }

    pub fn load(path: &Path) -> AppResult<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path).map_err(|e| state_file_error(path, e))?;
        let state = serde_json::from_str(&content).map_err(|e| state_file_error(path, e))?;
        Ok(Some(state))
    }

    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| state_file_error(path, e))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| state_file_error(path, e))
    }
}

fn state_file_error(
    path: &Path,
    source: impl std::error::Error + Send + Sync + 'static,
) -> AppError {
    AppError::Session(SessionError::StateFileFailed {
        path: path.display().to_string(),
        source: Box::new(source),
    })
}

struct LiveSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    executor: JsExecutor,
    /// 连接的是外部浏览器，拆除时只断开不关闭
    attached: bool,
    healthy: bool,
}

/// 会话管理器
///
/// - 唯一持有 Browser 的模块
/// - 先探测登录标记，只有探测失败才走完整登录
/// - 关闭失败时按进程标记清理残留进程
pub struct SessionManager<D> {
    settings: BrowserSettings,
    driver: Arc<D>,
    live: Option<LiveSession>,
    last_activity: Option<Instant>,
}

impl<D> SessionManager<D>
where
    D: FormDriver<JsExecutor> + 'static,
{
    pub fn new(settings: BrowserSettings, driver: Arc<D>) -> Self {
        Self {
            settings,
            driver,
            live: None,
            last_activity: None,
        }
    }

    /// 建立会话：启动或连接浏览器、恢复 cookie、探测登录、必要时登录
    async fn establish(&mut self) -> AppResult<()> {
        let (browser, handler_task, page, attached) = match self.settings.debug_port {
            Some(port) => {
                let (browser, task, page) =
                    connection::attach_to_browser(port, &self.settings.portal_host).await?;
                (browser, task, page, true)
            }
            None => {
                let (mut browser, task) = launcher::launch_browser(&self.settings).await?;
                match launcher::open_page(&browser, "about:blank").await {
                    Ok(page) => (browser, task, page, false),
                    Err(e) => {
                        let _ = timeout(self.settings.close_timeout, browser.close()).await;
                        task.abort();
                        process_sweeper::sweep_orphans(&self.settings.launch_marker);
                        return Err(e);
                    }
                }
            }
        };

        let executor = JsExecutor::new(page);
        self.live = Some(LiveSession {
            browser,
            handler_task,
            executor: executor.clone(),
            attached,
            healthy: true,
        });

        // about:blank 上不能写 cookie，先进入门户再恢复，然后刷新让 cookie 生效
        self.open_portal(&executor).await?;
        if self.restore_cookies(&executor).await {
            if let Err(e) = executor.page().reload().await {
                warn!("⚠️ 恢复 cookie 后刷新失败: {}", e);
                self.open_portal(&executor).await?;
            }
        }

        if self.probe_authenticated(&executor).await {
            info!("♻️ 已复用保存的登录状态");
            return Ok(());
        }

        info!("🔐 需要登录门户...");
        self.driver.login(&executor).await.map_err(|e| {
            AppError::Session(SessionError::LoginFailed {
                reason: format!("{:#}", e),
            })
        })?;

        if !self.probe_authenticated(&executor).await {
            return Err(AppError::Session(SessionError::LoginFailed {
                reason: "登录后未检测到已登录标记".to_string(),
            }));
        }

        info!("✅ 门户登录成功");
        self.save_cookies(&executor).await;
        Ok(())
    }

    async fn open_portal(&self, executor: &JsExecutor) -> AppResult<()> {
        executor
            .page()
            .goto(self.settings.portal_login_url.as_str())
            .await
            .map_err(|e| {
                AppError::Browser(BrowserError::NavigationFailed {
                    url: self.settings.portal_login_url.clone(),
                    source: Box::new(e),
                })
            })?;
        Ok(())
    }

    /// 探测是否已登录：URL 不是登录页，且页面上有登录后才出现的标记
    async fn probe_authenticated(&self, executor: &JsExecutor) -> bool {
        for attempt in 1..=AUTH_PROBE_ATTEMPTS {
            let url = executor.page().url().await.ok().flatten().unwrap_or_default();
            let on_login_page = url.to_lowercase().contains("login") || url == "about:blank";
            if !on_login_page {
                match executor.xpath_exists(&self.settings.authenticated_marker).await {
                    Ok(true) => return true,
                    Ok(false) => {}
                    Err(e) => debug!("登录标记探测失败: {}", e),
                }
            }
            if attempt < AUTH_PROBE_ATTEMPTS {
                sleep(AUTH_PROBE_INTERVAL).await;
            }
        }
        false
    }

    /// 恢复保存的 cookie，页面必须已在门户上；返回是否写入了 cookie
    async fn restore_cookies(&self, executor: &JsExecutor) -> bool {
        let state = match SessionState::load(&self.settings.session_state_file) {
            Ok(Some(state)) => state,
            Ok(None) => return false,
            Err(e) => {
                warn!("⚠️ 读取会话状态失败: {}", e);
                return false;
            }
        };

        let params = state.cookie_params(&self.settings.portal_login_url);
        if params.is_empty() {
            return false;
        }
        let count = params.len();
        match executor.page().set_cookies(params).await {
            Ok(_) => {
                debug!("已恢复 {} 个 cookie", count);
                true
            }
            Err(e) => {
                warn!("⚠️ 恢复 cookie 失败: {}", e);
                false
            }
        }
    }

    async fn save_cookies(&self, executor: &JsExecutor) {
        let cookies = match executor.page().get_cookies().await {
            Ok(cookies) => cookies,
            Err(e) => {
                warn!("⚠️ 读取 cookie 失败: {}", e);
                return;
            }
        };
        let state = SessionState {
            cookies: cookies.iter().map(StoredCookie::from).collect(),
        };
        match state.save(&self.settings.session_state_file) {
            Ok(()) => debug!("会话状态已保存: {}", self.settings.session_state_file.display()),
            Err(e) => warn!("⚠️ 保存会话状态失败: {}", e),
        }
    }
}

async fn is_responsive(executor: &JsExecutor) -> bool {
    matches!(
        timeout(RESPONSIVE_TIMEOUT, executor.page().url()).await,
        Ok(Ok(_))
    )
}

#[async_trait]
impl<D> SessionControl for SessionManager<D>
where
    D: FormDriver<JsExecutor> + 'static,
{
    type Handle = JsExecutor;

    async fn ensure_live(&mut self) -> bool {
        if let Some(session) = &self.live {
            if session.healthy && is_responsive(&session.executor).await {
                return true;
            }
            warn!("⚠️ 会话无响应，重新建立...");
            self.teardown().await;
        }

        match self.establish().await {
            Ok(()) => {
                self.touch();
                true
            }
            Err(e) => {
                error!("❌ 无法建立会话: {}", e);
                self.teardown().await;
                false
            }
        }
    }

    fn handle(&self) -> Option<JsExecutor> {
        self.live
            .as_ref()
            .filter(|session| session.healthy)
            .map(|session| session.executor.clone())
    }

    fn mark_not_live(&mut self) {
        if let Some(session) = self.live.as_mut() {
            session.healthy = false;
        }
    }

    fn touch(&mut self) {
        self.last_activity = Some(Instant::now());
    }

    fn idle_for(&self) -> Option<Duration> {
        self.live.as_ref()?;
        self.last_activity.map(|at| at.elapsed())
    }

    async fn teardown(&mut self) {
        let Some(mut session) = self.live.take() else {
            return;
        };
        self.last_activity = None;

        if session.attached {
            session.handler_task.abort();
            info!("🔌 已断开浏览器连接");
            return;
        }

        let close_timeout = self.settings.close_timeout;
        let closed = match timeout(close_timeout, session.browser.close()).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                warn!("⚠️ 关闭浏览器失败: {}", e);
                false
            }
            Err(_) => {
                warn!("⚠️ 关闭浏览器超时");
                false
            }
        };

        if closed {
            let _ = timeout(close_timeout, session.browser.wait()).await;
        } else if let Some(Err(e)) = session.browser.kill().await {
            debug!("结束浏览器进程失败: {}", e);
        }
        session.handler_task.abort();

        if !closed {
            process_sweeper::sweep_orphans(&self.settings.launch_marker);
        }
        info!("🛑 浏览器会话已关闭");
    }

    async fn capture_failure(&self, name: &str) {
        let Some(session) = self.live.as_ref() else {
            return;
        };
        let dir = &self.settings.screenshots_dir;
        if let Err(e) = std::fs::create_dir_all(dir) {
            warn!("⚠️ 无法创建截图目录: {}", e);
            return;
        }
        let path = dir.join(format!("{}.png", name));
        match session
            .executor
            .page()
            .save_screenshot(ScreenshotParams::builder().full_page(true).build(), &path)
            .await
        {
            Ok(_) => info!("📸 截图已保存: {}", path.display()),
            Err(e) => warn!("⚠️ 截图失败: {}", e),
        }
    }
}
