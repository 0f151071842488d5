use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::BrowserSettings;
use crate::error::{AppError, AppResult, BrowserError};

/// 启动浏览器
///
/// 启动参数中带有进程标记，关闭失败时可以据此找到残留进程。
pub async fn launch_browser(settings: &BrowserSettings) -> AppResult<(Browser, JoinHandle<()>)> {
    info!("🚀 启动浏览器...");

    let mut builder = BrowserConfig::builder()
        .args(vec![
            "--start-maximized",
            "--disable-blink-features=AutomationControlled",
            "--no-sandbox",              // 禁用沙盒，防止权限问题导致的崩溃
            "--disable-dev-shm-usage",   // 防止共享内存不足
            "--disable-gpu",
        ])
        .arg(settings.launch_marker.as_str())
        .viewport(None);

    builder = if settings.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };

    if let Some(executable) = &settings.executable {
        debug!("浏览器路径: {}", executable.display());
        builder = builder.chrome_executable(executable);
    }

    let config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        AppError::Browser(BrowserError::ConfigurationFailed { message: e })
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        AppError::browser_launch_failed(e)
    })?;
    debug!("浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    Ok((browser, handler_task))
}

/// 打开门户页面
pub async fn open_page(browser: &Browser, url: &str) -> AppResult<chromiumoxide::Page> {
    browser.new_page(url).await.map_err(|e| {
        error!("创建页面失败: {}", e);
        AppError::Browser(BrowserError::NavigationFailed {
            url: url.to_string(),
            source: Box::new(e),
        })
    })
}
