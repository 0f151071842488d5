use std::sync::Arc;

use anyhow::Result;
use autorizacion_worker::cli::{Cli, Command};
use autorizacion_worker::clients::{LedgerApi, LedgerClient, QueueClient};
use autorizacion_worker::config::Config;
use autorizacion_worker::logger;
use autorizacion_worker::orchestrator::{Worker, WorkerEvent};
use autorizacion_worker::services::EventLogWriter;
use autorizacion_worker::utils::{init_log_file, log_final_stats, log_startup};
use autorizacion_worker::workflow::ScriptFormDriver;
use autorizacion_worker::SessionManager;
use clap::Parser;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logger::init();

    let cli = Cli::parse();

    // 加载配置
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run => run_worker(config).await,
        Command::Schedule {
            order_item_id,
            order_id,
            attempts_max,
        } => {
            let queue = QueueClient::new(&config)?;
            queue
                .schedule_order(
                    order_item_id,
                    &order_id,
                    chrono::Local::now(),
                    attempts_max.unwrap_or(config.default_attempts_max),
                    &config.executor_user,
                )
                .await?;
            Ok(())
        }
        Command::Cancel { order_item_id } => {
            let queue = QueueClient::new(&config)?;
            queue.cancel_order(order_item_id, &config.executor_user).await?;
            Ok(())
        }
        Command::Balance => {
            let ledger = LedgerClient::new(&config)?;
            let snapshot = ledger.fetch_balance().await?;
            info!("💰 余额: {}", snapshot.balance);
            info!("🏷️ 每单费用: {}", snapshot.cost_per_case);
            info!(
                "🏥 租户: {}",
                snapshot.tenant_identity.as_deref().unwrap_or("(未知)")
            );
            Ok(())
        }
    }
}

async fn run_worker(config: Config) -> Result<()> {
    log_startup(&config);
    init_log_file(&config.output_log_file)?;

    let log_writer = EventLogWriter::with_path(&config.output_log_file);
    let observer = Arc::new(move |event: WorkerEvent| match event {
        WorkerEvent::Log(line) => {
            log_writer.append(&line);
        }
        WorkerEvent::QuotaExhausted { balance } => {
            log_writer.append(&format!("⛔ 余额已耗尽 (余额: {})", balance));
        }
        WorkerEvent::Counters(_) | WorkerEvent::Stopped(_) => {}
    });

    let queue = Arc::new(QueueClient::new(&config)?);
    let ledger = Arc::new(LedgerClient::new(&config)?);
    let driver = Arc::new(ScriptFormDriver::from_config(&config)?);
    let session = SessionManager::new(config.browser_settings(), driver.clone());
    let policy = config.domain_variant.policy(config.documents_dir.clone());

    let handle = Worker::new(
        config.worker_settings(),
        queue,
        ledger,
        session,
        driver,
        policy,
    )
    .with_observer(observer)
    .with_allowed_tenants(config.allowed_tenants.clone())
    .start();

    let control = handle.control();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("收到 Ctrl+C，正在停止...");
            control.stop();
        }
    });

    match handle.join().await {
        Ok(counters) => log_final_stats(&counters, &config.output_log_file),
        Err(e) => error!("❌ Worker 异常退出: {}", e),
    }
    Ok(())
}
