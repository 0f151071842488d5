//! 订单处理上下文
//!
//! 封装"我正在处理哪个订单的第几次尝试"这一信息

use std::fmt::Display;

use crate::models::{OrderItemId, OrderSummary};

/// 订单处理上下文
#[derive(Debug, Clone)]
pub struct OrderCtx {
    /// 订单项 ID
    pub order_item_id: OrderItemId,

    /// 患者证件号，详情读取前为空
    pub subject_id: Option<String>,

    /// 认领前已经失败的次数
    pub attempts_made: u32,

    pub attempts_max: u32,
}

impl OrderCtx {
    pub fn new(summary: &OrderSummary, default_attempts_max: u32) -> Self {
        Self {
            order_item_id: summary.order_item_id,
            subject_id: None,
            attempts_made: summary.attempts_made(),
            attempts_max: summary.attempts_max(default_attempts_max),
        }
    }

    /// 本次尝试序号（从 1 开始）
    pub fn attempt(&self) -> u32 {
        self.attempts_made + 1
    }

    /// 本次失败后是否还能再试
    pub fn can_retry(&self) -> bool {
        self.attempts_made + 1 < self.attempts_max
    }

    /// 日志中使用的主体标识
    pub fn subject(&self) -> &str {
        self.subject_id.as_deref().unwrap_or("?")
    }
}

impl Display for OrderCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[订单 #{} 证件 {} 尝试 {}/{}]",
            self.order_item_id,
            self.subject(),
            self.attempt(),
            self.attempts_max
        )
    }
}
