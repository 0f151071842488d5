//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责订单调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `worker` - 订单处理 worker
//! - 轮询队列、余额熔断
//! - 单个订单的状态机（认领 → 提交 → 分类 → 上报 → 扣费 → 重置）
//! - 持有唯一的会话
//!
//! ### `tracker` - 进程内订单跟踪
//! - 终态保护、尝试次数单调、认领与扣费只发生一次
//!
//! ### `control` - 控制面
//! - 暂停 / 恢复 / 停止
//! - 计数与日志事件回调
//!
//! ## 层次关系
//!
//! ```text
//! worker (轮询 Vec<OrderSummary>)
//!     ↓
//! workflow::FormDriver (处理单个订单) + workflow::DomainPolicy
//!     ↓
//! services (能力层：分类 / 计量 / 日志)
//!     ↓
//! clients + browser + infrastructure
//! ```

pub mod control;
pub mod tracker;
pub mod worker;

// 重新导出主要类型
pub use control::{Counters, StopReason, WorkerControl, WorkerEvent, WorkerHandle, WorkerObserver};
pub use tracker::{Admission, OrderTracker};
pub use worker::Worker;
