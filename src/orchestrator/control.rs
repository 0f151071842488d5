//! worker 控制面
//!
//! 展示层和 worker 之间只有三样共享的东西：暂停标记、停止信号、单向的事件回调。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{AppError, AppResult};

/// 本次运行的计数（只统计进入终态的订单）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub processed: u64,
    pub succeeded: u64,
    pub failed: u64,
}

/// worker 停止的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// 收到停止请求
    Requested,
    /// 余额耗尽
    QuotaExhausted,
    /// 租户不在授权名单中
    TenantNotAuthorized,
}

/// 推送给观察者的事件
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// 一行可读日志
    Log(String),
    /// 计数更新
    Counters(Counters),
    /// 余额耗尽（与普通失败区分）
    QuotaExhausted { balance: f64 },
    Stopped(StopReason),
}

/// 事件观察者
pub trait WorkerObserver: Send + Sync {
    fn notify(&self, event: WorkerEvent);
}

impl<F> WorkerObserver for F
where
    F: Fn(WorkerEvent) + Send + Sync,
{
    fn notify(&self, event: WorkerEvent) {
        self(event)
    }
}

/// 暂停 / 停止信号，可以在任意线程克隆使用
#[derive(Debug, Clone, Default)]
pub struct WorkerControl {
    paused: Arc<AtomicBool>,
    stop: CancellationToken,
}

impl WorkerControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// 在下一个检查点暂停
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// 立即停止：正在进行的提交会被放弃，会话被关闭
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// 等待停止信号
    pub async fn cancelled(&self) {
        self.stop.cancelled().await
    }
}

/// 运行中的 worker
pub struct WorkerHandle {
    control: WorkerControl,
    task: JoinHandle<Counters>,
}

impl WorkerHandle {
    pub(crate) fn new(control: WorkerControl, task: JoinHandle<Counters>) -> Self {
        Self { control, task }
    }

    pub fn control(&self) -> WorkerControl {
        self.control.clone()
    }

    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// 等待 worker 退出并取回最终计数
    pub async fn join(self) -> AppResult<Counters> {
        self.task
            .await
            .map_err(|e| AppError::Other(format!("worker 任务异常退出: {}", e)))
    }
}
