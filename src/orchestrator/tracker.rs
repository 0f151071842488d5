//! 进程内订单跟踪
//!
//! 远程记录可能滞后（上报失败时本地状态照样前进），这里保证：
//! - 终态不会被覆盖
//! - 尝试次数只增不减
//! - 认领代码只发一次
//! - 每个订单最多扣费一次

use std::collections::{HashMap, HashSet};

use crate::models::{CaseStatus, OrderItemId, OrderSummary, SchedulingState};

#[derive(Debug, Clone)]
struct OrderTrack {
    state: SchedulingState,
    attempts_made: u32,
    claimed: bool,
    terminal_case: Option<CaseStatus>,
    billed: bool,
}

/// 是否处理这个订单
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 处理，附带本地与远程中较大的已尝试次数
    Work { attempts_made: u32 },
    /// 本地已是终态
    AlreadyFinished,
    /// 远程记录已是终态
    RemoteTerminal,
}

#[derive(Debug, Default)]
pub struct OrderTracker {
    orders: HashMap<OrderItemId, OrderTrack>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&mut self, summary: &OrderSummary) -> Admission {
        if summary
            .scheduling_state()
            .map(|state| state.is_terminal())
            .unwrap_or(false)
        {
            return Admission::RemoteTerminal;
        }

        let remote_attempts = summary.attempts_made();
        let track = self
            .orders
            .entry(summary.order_item_id)
            .or_insert_with(|| OrderTrack {
                state: SchedulingState::Pending,
                attempts_made: remote_attempts,
                claimed: false,
                terminal_case: None,
                billed: false,
            });

        if track.state.is_terminal() {
            return Admission::AlreadyFinished;
        }
        track.attempts_made = track.attempts_made.max(remote_attempts);
        Admission::Work {
            attempts_made: track.attempts_made,
        }
    }

    pub fn state(&self, id: OrderItemId) -> Option<SchedulingState> {
        self.orders.get(&id).map(|t| t.state)
    }

    pub fn attempts_made(&self, id: OrderItemId) -> u32 {
        self.orders.get(&id).map(|t| t.attempts_made).unwrap_or(0)
    }

    pub fn terminal_case(&self, id: OrderItemId) -> Option<CaseStatus> {
        self.orders.get(&id).and_then(|t| t.terminal_case)
    }

    /// 状态迁移，不允许时返回 false 且不做任何修改
    pub fn transition(&mut self, id: OrderItemId, next: SchedulingState) -> bool {
        match self.orders.get_mut(&id) {
            Some(track) if track.state.can_transition_to(next) => {
                track.state = next;
                true
            }
            _ => false,
        }
    }

    /// 认领代码只在第一次尝试时发出
    pub fn claim(&mut self, id: OrderItemId) -> bool {
        match self.orders.get_mut(&id) {
            Some(track) if track.attempts_made == 0 && !track.claimed => {
                track.claimed = true;
                true
            }
            _ => false,
        }
    }

    /// 记录一次完成的尝试，返回新的尝试次数（不超过上限）
    pub fn record_attempt(&mut self, id: OrderItemId, attempts_max: u32) -> u32 {
        match self.orders.get_mut(&id) {
            Some(track) => {
                track.attempts_made = (track.attempts_made + 1).min(attempts_max.max(1));
                track.attempts_made
            }
            None => 0,
        }
    }

    /// 记录终态结果代码；已有终态代码时返回 false
    pub fn set_terminal_case(&mut self, id: OrderItemId, status: CaseStatus) -> bool {
        match self.orders.get_mut(&id) {
            Some(track) if track.terminal_case.is_none() && status.is_terminal() => {
                track.terminal_case = Some(status);
                true
            }
            _ => false,
        }
    }

    /// 丢弃已不在待处理列表中的终态订单
    ///
    /// 终态订单从列表消失说明远程记录已经追上，本地保护不再需要。
    /// 非终态订单保留，以免丢失尝试次数。
    pub fn prune(&mut self, listed: &HashSet<OrderItemId>) -> usize {
        let before = self.orders.len();
        self.orders
            .retain(|id, track| listed.contains(id) || !track.state.is_terminal());
        before - self.orders.len()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// 标记已扣费；已扣过时返回 false
    pub fn mark_billed(&mut self, id: OrderItemId) -> bool {
        match self.orders.get_mut(&id) {
            Some(track) if !track.billed => {
                track.billed = true;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_order_is_not_admitted_again() {
        let mut tracker = OrderTracker::new();
        let summary = OrderSummary::pending(1, 0, 2);
        assert_eq!(tracker.admit(&summary), Admission::Work { attempts_made: 0 });
        assert!(tracker.transition(1, SchedulingState::InProgress));
        assert!(tracker.transition(1, SchedulingState::Completed));

        assert_eq!(tracker.admit(&summary), Admission::AlreadyFinished);
        assert!(!tracker.transition(1, SchedulingState::Pending));
        assert_eq!(tracker.state(1), Some(SchedulingState::Completed));
    }

    #[test]
    fn test_attempts_never_decrease_when_remote_lags() {
        let mut tracker = OrderTracker::new();
        tracker.admit(&OrderSummary::pending(2, 0, 2));
        tracker.transition(2, SchedulingState::InProgress);
        assert_eq!(tracker.record_attempt(2, 2), 1);
        tracker.transition(2, SchedulingState::Pending);

        // 远程仍显示 0 次
        assert_eq!(
            tracker.admit(&OrderSummary::pending(2, 0, 2)),
            Admission::Work { attempts_made: 1 }
        );
        assert_eq!(tracker.record_attempt(2, 2), 2);
        assert_eq!(tracker.record_attempt(2, 2), 2);
    }

    #[test]
    fn test_claim_emitted_once_and_only_on_first_attempt() {
        let mut tracker = OrderTracker::new();
        tracker.admit(&OrderSummary::pending(3, 0, 2));
        assert!(tracker.claim(3));
        assert!(!tracker.claim(3));

        tracker.admit(&OrderSummary::pending(4, 1, 2));
        assert!(!tracker.claim(4));
    }

    #[test]
    fn test_terminal_case_and_billing_are_idempotent() {
        let mut tracker = OrderTracker::new();
        tracker.admit(&OrderSummary::pending(5, 0, 2));
        assert!(!tracker.set_terminal_case(5, CaseStatus::Claimed));
        assert!(tracker.set_terminal_case(5, CaseStatus::Success));
        assert!(!tracker.set_terminal_case(5, CaseStatus::Timeout));
        assert_eq!(tracker.terminal_case(5), Some(CaseStatus::Success));

        assert!(tracker.mark_billed(5));
        assert!(!tracker.mark_billed(5));
    }

    #[test]
    fn test_prune_drops_terminal_orders_missing_from_listing() {
        let mut tracker = OrderTracker::new();
        for id in 1..=3 {
            tracker.admit(&OrderSummary::pending(id, 0, 2));
            tracker.transition(id, SchedulingState::InProgress);
        }
        tracker.transition(1, SchedulingState::Completed);
        tracker.transition(2, SchedulingState::Failed);

        // 2 仍出现在滞后的列表中，3 还在处理
        let listed: HashSet<OrderItemId> = [2].into_iter().collect();
        assert_eq!(tracker.prune(&listed), 1);
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.state(1), None);
        assert_eq!(
            tracker.admit(&OrderSummary::pending(2, 0, 2)),
            Admission::AlreadyFinished
        );
        assert_eq!(tracker.state(3), Some(SchedulingState::InProgress));

        assert_eq!(tracker.prune(&HashSet::new()), 1);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_remote_terminal_is_skipped() {
        let mut tracker = OrderTracker::new();
        let mut summary = OrderSummary::pending(6, 0, 2);
        summary.state = Some("COMPLETADO".to_string());
        assert_eq!(tracker.admit(&summary), Admission::RemoteTerminal);
    }
}
