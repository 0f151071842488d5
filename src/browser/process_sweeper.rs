//! 残留浏览器进程清理
//!
//! 正常关闭失败时，按启动参数中的进程标记找到并结束残留进程。

use sysinfo::System;
use tracing::{info, warn};

/// 命令行中是否带有进程标记
pub fn is_marked(cmd: &[String], marker: &str) -> bool {
    !marker.trim().is_empty() && cmd.iter().any(|arg| arg.contains(marker))
}

/// 结束所有带有标记的进程（当前进程除外），返回结束的数量
pub fn sweep_orphans(marker: &str) -> usize {
    if marker.trim().is_empty() {
        return 0;
    }

    let mut system = System::new();
    system.refresh_processes();

    let own_pid = std::process::id();
    let mut killed = 0;
    for (pid, process) in system.processes() {
        if pid.as_u32() == own_pid || !is_marked(process.cmd(), marker) {
            continue;
        }
        if process.kill() {
            killed += 1;
        } else {
            warn!("⚠️ 无法结束残留进程 {}", pid);
        }
    }

    if killed > 0 {
        info!("🧹 已清理 {} 个残留浏览器进程", killed);
    }
    killed
}
