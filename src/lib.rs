//! # Autorización Worker
//!
//! 把门诊的服务授权申请自动提交到第三方门户，并跟踪每个订单直到受理、拒绝或用完尝试次数。
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `JsExecutor` - 在会话页面上执行 JS
//! - `TenantCipher` - 解密余额记录中的租户名称
//!
//! ### ② 客户端与会话（Clients / Browser）
//! - `clients/` - 队列 API 与余额 API（`QueueApi` / `LedgerApi`）
//! - `browser/` - 启动或连接浏览器、登录探测、残留进程清理（`SessionControl`）
//!
//! ### ③ 业务能力层（Services）
//! - `classify_failure` - 失败信息 → 错误类别 + 结果代码
//! - `QuotaEnforcer` - 每个成功订单扣费一次
//! - `EventLogWriter` - 写输出日志文件
//!
//! ### ④ 流程层（Workflow）
//! - `FormDriver` - 提交单个订单的契约
//! - `DomainPolicy` - 业务变体（anexo3 / laboratorio）
//! - `OrderCtx` - 上下文封装（订单 + 尝试次数）
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator/worker` - 轮询、状态机、余额熔断
//! - `orchestrator/control` - 暂停 / 恢复 / 停止与事件回调
//!
//! ## 模块结构

pub mod browser;
pub mod cli;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod logger;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use browser::{SessionControl, SessionManager};
pub use clients::{LedgerApi, LedgerClient, QueueApi, QueueClient};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use orchestrator::{Counters, Worker, WorkerControl, WorkerEvent, WorkerHandle};
pub use services::{classify_failure, ErrorClass, QuotaEnforcer};
pub use workflow::{DomainPolicy, DomainVariant, FormDriver, Outcome};
