//! 命令行入口定义
//!
//! 子命令：run（启动 worker）、schedule（排期订单）、cancel（作废订单）、balance（查看余额）

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::models::OrderItemId;

/// 服务授权申请自动提交 worker
#[derive(Debug, Parser)]
#[command(name = "autorizacion-worker", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML 配置文件路径（环境变量会覆盖其中的值）
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// 启动 worker，Ctrl+C 停止
    Run,

    /// 把订单加入队列
    Schedule {
        /// 订单项编号（id_item_orden_proced）
        order_item_id: OrderItemId,

        /// 订单编号（id_orden）
        #[arg(long)]
        order_id: String,

        /// 最大尝试次数，缺省使用配置值
        #[arg(long)]
        attempts_max: Option<u32>,
    },

    /// 作废订单
    Cancel {
        order_item_id: OrderItemId,
    },

    /// 查看余额、单价和租户
    Balance,
}
