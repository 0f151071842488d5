//! 事件日志写入服务 - 业务能力层
//!
//! 只负责把 worker 的日志行追加到输出文件，不关心流程

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::utils::timestamp_now;

/// 事件日志写入服务
///
/// 职责：
/// - 将 worker 产生的可读日志行追加到输出文件
/// - 每行带时间戳
/// - 不关心日志来自哪个订单
pub struct EventLogWriter {
    log_file_path: PathBuf,
}

impl EventLogWriter {
    /// 使用默认文件路径创建
    pub fn new() -> Self {
        Self::with_path("output.txt")
    }

    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            log_file_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_file_path
    }

    /// 追加一行日志
    pub fn write_line(&self, line: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)?;

        writeln!(file, "[{}] {}", timestamp_now(), line)?;

        Ok(())
    }

    /// 追加一行日志，失败时记录警告并返回 false
    pub fn append(&self, line: &str) -> bool {
        match self.write_line(line) {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "⚠️ 写入日志文件失败 ({}): {}",
                    self.log_file_path.display(),
                    e
                );
                false
            }
        }
    }
}

impl Default for EventLogWriter {
    fn default() -> Self {
        Self::new()
    }
}
