//! 浏览器会话层
//!
//! - `launcher`：启动新浏览器（带进程标记）
//! - `connection`：连接已运行的浏览器（调试端口）
//! - `session`：唯一的会话所有者，负责登录探测、重建与拆除
//! - `process_sweeper`：清理残留浏览器进程

pub mod connection;
pub mod launcher;
pub mod process_sweeper;
pub mod session;

use std::time::Duration;

use async_trait::async_trait;

pub use session::{SessionManager, SessionState, StoredCookie};

/// worker 看到的会话能力
///
/// `Handle` 是交给表单驱动的句柄；真实环境下是 `JsExecutor`。
#[async_trait]
pub trait SessionControl: Send + Sync {
    type Handle: Clone + Send + Sync;

    /// 确保会话可用且已登录；重建和重新登录都失败时返回 false
    async fn ensure_live(&mut self) -> bool;

    /// 当前会话句柄，会话不可用时为 None
    fn handle(&self) -> Option<Self::Handle>;

    /// 标记会话已损坏，下次 `ensure_live` 会重建
    fn mark_not_live(&mut self);

    /// 记录一次活动
    fn touch(&mut self);

    /// 距上次活动的时间；没有会话时为 None
    fn idle_for(&self) -> Option<Duration>;

    /// 释放所有会话资源
    async fn teardown(&mut self);

    /// 失败现场截图（尽力而为）
    async fn capture_failure(&self, name: &str);
}
