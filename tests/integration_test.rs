use std::sync::Arc;

use autorizacion_worker::browser::connection::attach_to_browser;
use autorizacion_worker::browser::launcher::{launch_browser, open_page};
use autorizacion_worker::browser::{SessionControl, SessionManager};
use autorizacion_worker::config::Config;
use autorizacion_worker::infrastructure::JsExecutor;
use autorizacion_worker::logger;
use autorizacion_worker::workflow::ScriptFormDriver;

#[tokio::test]
#[ignore] // 默认忽略，需要手动运行：cargo test -- --ignored
async fn test_attach_to_running_browser() {
    // 初始化日志
    logger::init();

    // 加载配置
    let config = Config::from_env();
    let port = config
        .browser_debug_port
        .expect("需要设置 BROWSER_DEBUG_PORT");

    // 测试浏览器连接
    let result = attach_to_browser(port, &config.portal_host).await;

    assert!(result.is_ok(), "应该能够成功连接浏览器");
}

#[tokio::test]
#[ignore]
async fn test_launch_and_evaluate_script() {
    logger::init();

    let mut config = Config::from_env();
    config.headless = true;
    let settings = config.browser_settings();

    let (mut browser, handler_task) = launch_browser(&settings).await.expect("启动浏览器失败");
    let page = open_page(&browser, "about:blank").await.expect("打开页面失败");

    let executor = JsExecutor::new(page);
    let sum: i64 = executor
        .call_with("return input.a + input.b;", &serde_json::json!({"a": 2, "b": 3}))
        .await
        .expect("执行脚本失败");
    assert_eq!(sum, 5);
    assert!(!executor
        .xpath_exists("//div[contains(.,'Hola,')]")
        .await
        .expect("XPath 查询失败"));

    let _ = browser.close().await;
    handler_task.abort();
}

#[tokio::test]
#[ignore]
async fn test_session_manager_logs_in_with_scripts() {
    logger::init();

    // 需要 LOGIN_EMAIL / LOGIN_PASSWORD 和脚本目录
    let config = Config::from_env();
    let driver = Arc::new(ScriptFormDriver::from_config(&config).expect("加载脚本失败"));
    let mut session = SessionManager::new(config.browser_settings(), driver);

    assert!(session.ensure_live().await, "会话应该可用");
    assert!(session.handle().is_some());

    session.teardown().await;
    assert!(session.handle().is_none());
}
