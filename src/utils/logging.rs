use anyhow::Result;
/// 日志工具模块
///
/// 提供日志格式化和输出的辅助函数
use std::fs;
use tracing::info;

use crate::config::Config;
use crate::orchestrator::Counters;

/// 远程 API 使用的时间格式
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n订单处理日志 - {}\n{}\n\n",
        "=".repeat(60),
        timestamp_now(),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 订单处理 worker 启动");
    info!("📋 业务变体: {}", config.domain_variant);
    info!("🌐 队列 API: {}", config.api_base_url);
    info!(
        "⏱️ 轮询间隔: {}s | 空闲超时: {}s",
        config.poll_interval_secs, config.inactivity_timeout_secs
    );
    match config.browser_debug_port {
        Some(port) => info!("🔌 浏览器模式: 连接已有浏览器 (端口 {})", port),
        None => info!("🔌 浏览器模式: 启动新浏览器"),
    }
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
///
/// # 参数
/// - `counters`: 本次运行的计数
/// - `log_file_path`: 日志文件路径
pub fn log_final_stats(counters: &Counters, log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 Worker 已停止");
    info!("完成时间: {}", timestamp_now());
    info!("{}", "=".repeat(60));
    info!("📦 已处理: {}", counters.processed);
    info!("✅ 成功: {}", counters.succeeded);
    info!("❌ 失败: {}", counters.failed);
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
