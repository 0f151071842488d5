//! 订单处理 worker - 编排层
//!
//! ## 职责
//!
//! 后台循环：检查余额 → 拉取待处理订单 → 逐个认领、提交、分类、上报 → 扣费 → 重置表单。
//!
//! ## 核心约束
//!
//! 1. **严格串行**：同一时间只处理一个订单，只持有一个会话
//! 2. **协作式暂停**：只在检查点响应暂停，不会打断正在进行的提交
//! 3. **立即停止**：停止时放弃当前提交，订单保持 EN_PROGRESO，不重排也不结案
//! 4. **向前推进**：状态上报失败只记录日志，本地状态照常前进

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::browser::SessionControl;
use crate::clients::{LedgerApi, QueueApi};
use crate::config::WorkerSettings;
use crate::models::{
    CaseStatus, NormalizedOrder, OrderItemId, OrderSummary, SchedulingState, SchedulingUpdate,
};
use crate::orchestrator::control::{
    Counters, StopReason, WorkerControl, WorkerEvent, WorkerHandle, WorkerObserver,
};
use crate::orchestrator::tracker::{Admission, OrderTracker};
use crate::services::{
    authorize_tenant, classify_failure, Classification, QuotaEnforcer, UNCLASSIFIED,
};
use crate::utils::{timestamp_now, truncate_text};
use crate::workflow::{DomainPolicy, FormDriver, OrderCtx, Outcome};

/// 日志中失败信息的最大长度
const MESSAGE_PREVIEW_LEN: usize = 200;

/// 一批订单的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BatchEnd {
    /// 全部处理完，`finished` 为进入终态的订单数
    Completed { finished: usize },
    /// 遇到暂停检查点
    Paused,
    /// 会话无法建立
    SessionUnavailable,
    QuotaExhausted,
    Stopped,
}

/// 单个订单的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderEnd {
    /// 进入终态；`quota_exhausted` 表示扣费后余额耗尽
    Finished { quota_exhausted: bool },
    /// 重新排队
    Requeued,
    /// 收到停止信号，订单原样保留
    Stopped,
}

/// 订单处理 worker
///
/// - 唯一持有会话的模块
/// - 每个订单的状态机只在这里
/// - 业务变体的差异由 `DomainPolicy` 提供
pub struct Worker<Q, L, S, D> {
    settings: WorkerSettings,
    allowed_tenants: Vec<String>,
    queue: Arc<Q>,
    quota: QuotaEnforcer<L>,
    session: S,
    driver: Arc<D>,
    policy: Box<dyn DomainPolicy>,
    observer: Arc<dyn WorkerObserver>,
    control: WorkerControl,
    tracker: OrderTracker,
    counters: Counters,
    failure_alert_sent: bool,
}

impl<Q, L, S, D> Worker<Q, L, S, D>
where
    Q: QueueApi + 'static,
    L: LedgerApi + 'static,
    S: SessionControl + 'static,
    D: FormDriver<S::Handle> + 'static,
{
    pub fn new(
        settings: WorkerSettings,
        queue: Arc<Q>,
        ledger: Arc<L>,
        session: S,
        driver: Arc<D>,
        policy: Box<dyn DomainPolicy>,
    ) -> Self {
        Self {
            settings,
            allowed_tenants: Vec::new(),
            queue,
            quota: QuotaEnforcer::new(ledger),
            session,
            driver,
            policy,
            observer: Arc::new(|_: WorkerEvent| {}),
            control: WorkerControl::new(),
            tracker: OrderTracker::new(),
            counters: Counters::default(),
            failure_alert_sent: false,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn WorkerObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// 授权租户名单；为空时不检查
    pub fn with_allowed_tenants(mut self, allowed: Vec<String>) -> Self {
        self.allowed_tenants = allowed;
        self
    }

    pub fn control(&self) -> WorkerControl {
        self.control.clone()
    }

    /// 在后台任务中启动
    pub fn start(self) -> WorkerHandle {
        let control = self.control.clone();
        let task = tokio::spawn(self.run());
        WorkerHandle::new(control, task)
    }

    /// 运行直到停止，返回最终计数
    pub async fn run(mut self) -> Counters {
        self.log_info(format!(
            "▶️ Worker 已启动 (变体: {})",
            self.policy.variant()
        ));

        let reason = self.run_loop().await;

        self.session.teardown().await;
        match reason {
            StopReason::Requested => self.log_info("⏹️ Worker 已停止".to_string()),
            StopReason::QuotaExhausted => {
                self.log_error("⛔ 余额已耗尽，Worker 已停止".to_string())
            }
            StopReason::TenantNotAuthorized => {
                self.log_error("⛔ 租户未授权，Worker 已停止".to_string())
            }
        }
        self.observer.notify(WorkerEvent::Stopped(reason));
        self.counters
    }

    async fn run_loop(&mut self) -> StopReason {
        loop {
            // 1. 停止
            if self.control.is_stopped() {
                return StopReason::Requested;
            }

            // 2. 暂停
            if self.control.is_paused() {
                self.idle(self.settings.pause_check_interval).await;
                continue;
            }

            // 3. 余额熔断
            let snapshot = match self.quota.snapshot().await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("⚠️ 读取余额失败，等待下次轮询: {}", e);
                    self.idle(self.settings.poll_interval).await;
                    continue;
                }
            };
            if authorize_tenant(&snapshot, &self.allowed_tenants).is_err() {
                return StopReason::TenantNotAuthorized;
            }
            if snapshot.is_exhausted() {
                self.observer.notify(WorkerEvent::QuotaExhausted {
                    balance: snapshot.balance,
                });
                return StopReason::QuotaExhausted;
            }

            // 4. 拉取队列
            let orders = match self.queue.pending_orders(self.settings.page_size).await {
                Ok(orders) => orders,
                Err(e) => {
                    warn!("⚠️ 读取队列失败，等待下次轮询: {}", e);
                    self.idle(self.settings.poll_interval).await;
                    continue;
                }
            };

            let listed: HashSet<OrderItemId> = orders.iter().map(|o| o.order_item_id).collect();
            let pruned = self.tracker.prune(&listed);
            if pruned > 0 {
                debug!("🧹 清理 {} 个已结束订单的本地记录", pruned);
            }

            if orders.is_empty() {
                self.release_idle_session().await;
                self.idle(self.settings.poll_interval).await;
                continue;
            }

            info!("📋 获取到 {} 个待处理订单", orders.len());
            match self.process_batch(orders).await {
                BatchEnd::Completed { finished } => {
                    if finished > 0 {
                        self.log_info("✅ 所有待处理订单已处理完毕".to_string());
                    } else {
                        self.idle(self.settings.poll_interval).await;
                    }
                }
                BatchEnd::Paused => {}
                BatchEnd::SessionUnavailable => {
                    self.log_warn(format!(
                        "⚠️ 会话不可用，{} 秒后重试",
                        self.settings.session_backoff.as_secs()
                    ));
                    self.idle(self.settings.session_backoff).await;
                }
                BatchEnd::QuotaExhausted => {
                    let balance = self
                        .quota
                        .snapshot()
                        .await
                        .map(|s| s.balance)
                        .unwrap_or(0.0);
                    self.observer
                        .notify(WorkerEvent::QuotaExhausted { balance });
                    return StopReason::QuotaExhausted;
                }
                BatchEnd::Stopped => return StopReason::Requested,
            }
        }
    }

    async fn process_batch(&mut self, orders: Vec<OrderSummary>) -> BatchEnd {
        let mut finished = 0;
        for summary in orders {
            if self.control.is_stopped() {
                return BatchEnd::Stopped;
            }
            if self.control.is_paused() {
                return BatchEnd::Paused;
            }

            let attempts_made = match self.tracker.admit(&summary) {
                Admission::Work { attempts_made } => attempts_made,
                Admission::AlreadyFinished | Admission::RemoteTerminal => continue,
            };

            // 5. 会话（停止信号优先）
            let live = tokio::select! {
                biased;
                _ = self.control.cancelled() => return BatchEnd::Stopped,
                live = self.session.ensure_live() => live,
            };
            if !live {
                return BatchEnd::SessionUnavailable;
            }
            if self.control.is_stopped() {
                return BatchEnd::Stopped;
            }

            let mut ctx = OrderCtx::new(&summary, self.settings.default_attempts_max);
            ctx.attempts_made = attempts_made;

            match self.process_order(ctx).await {
                OrderEnd::Finished {
                    quota_exhausted: true,
                } => return BatchEnd::QuotaExhausted,
                OrderEnd::Stopped => return BatchEnd::Stopped,
                OrderEnd::Finished { .. } => finished += 1,
                OrderEnd::Requeued => {}
            }
        }
        BatchEnd::Completed { finished }
    }

    async fn process_order(&mut self, mut ctx: OrderCtx) -> OrderEnd {
        let id = ctx.order_item_id;

        if ctx.attempts_made >= ctx.attempts_max {
            // 远程记录残留：已用完尝试次数却仍是 PENDIENTE
            self.tracker.transition(id, SchedulingState::InProgress);
            return self
                .finalize_failure(&ctx, UNCLASSIFIED, "intentos máximos alcanzados")
                .await;
        }

        // 6. 认领
        self.tracker.transition(id, SchedulingState::InProgress);
        // 首次认领才写开始时间，详情读取失败后的重新认领不覆盖
        let first_claim = self.tracker.claim(id);
        let mut claim = SchedulingUpdate::new(SchedulingState::InProgress)
            .executed_by(self.settings.executor_user.clone());
        if first_claim {
            claim = claim.started_at(timestamp_now());
        }
        self.report_scheduling(id, &claim).await;
        if first_claim {
            self.report_case(id, CaseStatus::Claimed, None).await;
        }
        info!("🚀 {} 开始处理", ctx);

        // 7. 订单详情
        let detail = match self.queue.order_detail(id).await {
            Ok(Some(detail)) => detail,
            Ok(None) => {
                return self
                    .finalize_failure(&ctx, UNCLASSIFIED, "detalle de orden no disponible")
                    .await;
            }
            Err(e) => {
                // 读取失败不消耗尝试次数，放回队列等待下次轮询
                warn!("⚠️ {} 读取订单详情失败: {}", ctx, e);
                self.tracker.transition(id, SchedulingState::Pending);
                let update = SchedulingUpdate::new(SchedulingState::Pending)
                    .executed_by(self.settings.executor_user.clone());
                self.report_scheduling(id, &update).await;
                return OrderEnd::Requeued;
            }
        };
        ctx.subject_id = detail.document_number.clone();

        let Some(source_document) = self.policy.locate_source_document(id, &detail) else {
            return self
                .handle_failure(&ctx, "archivo no encontrado para la orden")
                .await;
        };
        let order = NormalizedOrder::from_detail(id, &detail, source_document, ctx.attempt());

        // 提交前的暂停检查点
        if !self.wait_while_paused().await {
            return OrderEnd::Stopped;
        }

        // 8. 提交
        let Some(handle) = self.session.handle() else {
            return self
                .handle_failure(&ctx, "invalid session: sesión no disponible")
                .await;
        };
        let submitted = tokio::select! {
            biased;
            _ = self.control.cancelled() => return OrderEnd::Stopped,
            result = self.driver.submit(&handle, &order) => result,
        };
        self.session.touch();

        // 9-11. 结果
        let end = match submitted {
            Ok(Outcome::Success { confirmation }) => self.finish_success(&ctx, confirmation).await,
            Ok(Outcome::AlreadyFiled { message }) => self.finish_already_filed(&ctx, &message).await,
            Ok(Outcome::Failure { message }) => self.handle_failure(&ctx, &message).await,
            Err(e) => self.handle_failure(&ctx, &format!("{:#}", e)).await,
        };

        // 12. 重置表单
        if let Err(e) = self.driver.reset(&handle).await {
            warn!("⚠️ {} 表单重置失败，下次将重建会话: {:#}", ctx, e);
            self.session.mark_not_live();
        }

        end
    }

    async fn finish_success(&mut self, ctx: &OrderCtx, confirmation: Option<String>) -> OrderEnd {
        let id = ctx.order_item_id;
        let result = match &confirmation {
            Some(number) => format!("Radicado exitoso: {}", number),
            None => "Radicado exitoso".to_string(),
        };
        if !self
            .finalize(ctx, SchedulingState::Completed, CaseStatus::Success, confirmation, &result, None)
            .await
        {
            return OrderEnd::Finished {
                quota_exhausted: false,
            };
        }
        self.counters.succeeded += 1;
        self.publish_counters();

        let quota_exhausted = self.bill(id).await;
        OrderEnd::Finished { quota_exhausted }
    }

    async fn finish_already_filed(&mut self, ctx: &OrderCtx, message: &str) -> OrderEnd {
        let id = ctx.order_item_id;
        let decision = self.policy.classify_already_filed(message);
        let preview = truncate_text(message, MESSAGE_PREVIEW_LEN);
        let error_message = (!decision.counts_as_success).then(|| preview.clone());

        if !self
            .finalize(
                ctx,
                decision.scheduling,
                decision.case_status,
                decision.confirmation.clone(),
                &format!("Ya radicada: {}", preview),
                error_message,
            )
            .await
        {
            return OrderEnd::Finished {
                quota_exhausted: false,
            };
        }

        if decision.counts_as_success {
            self.counters.succeeded += 1;
        } else {
            self.counters.failed += 1;
        }
        self.publish_counters();
        self.check_failure_alert();

        let quota_exhausted = if decision.billable {
            self.bill(id).await
        } else {
            false
        };
        OrderEnd::Finished { quota_exhausted }
    }

    /// 11. 失败分类：可重试且仍有次数时重排，否则终态失败
    async fn handle_failure(&mut self, ctx: &OrderCtx, message: &str) -> OrderEnd {
        let classification = classify_failure(message);

        if classification.class.is_retryable() && ctx.can_retry() {
            let id = ctx.order_item_id;
            let attempts = self.tracker.record_attempt(id, ctx.attempts_max);
            self.tracker.transition(id, SchedulingState::Pending);

            let preview = truncate_text(message, MESSAGE_PREVIEW_LEN);
            let update = SchedulingUpdate::new(SchedulingState::Pending)
                .attempts(attempts)
                .executed_by(self.settings.executor_user.clone())
                .error(preview.clone());
            self.report_scheduling(id, &update).await;

            self.log_warn(format!(
                "🔁 {} {} {} 已重新排队 ({}/{}): {}",
                ctx,
                classification.case_status.tag(),
                classification.class,
                attempts,
                ctx.attempts_max,
                preview
            ));
            return OrderEnd::Requeued;
        }

        self.finalize_failure(ctx, classification, message).await
    }

    async fn finalize_failure(
        &mut self,
        ctx: &OrderCtx,
        classification: Classification,
        message: &str,
    ) -> OrderEnd {
        let preview = truncate_text(message, MESSAGE_PREVIEW_LEN);
        let result = format!("{} {}", classification.case_status.tag(), classification.class);

        // 截图要在表单重置之前
        self.session
            .capture_failure(&format!("error_{}", ctx.order_item_id))
            .await;

        if self
            .finalize(
                ctx,
                SchedulingState::Failed,
                classification.case_status,
                None,
                &result,
                Some(preview),
            )
            .await
        {
            self.counters.failed += 1;
            self.publish_counters();
            self.check_failure_alert();
        }
        OrderEnd::Finished {
            quota_exhausted: false,
        }
    }

    /// 写入终态；订单已是终态时什么都不做并返回 false
    async fn finalize(
        &mut self,
        ctx: &OrderCtx,
        state: SchedulingState,
        case_status: CaseStatus,
        confirmation: Option<String>,
        result: &str,
        error_message: Option<String>,
    ) -> bool {
        let id = ctx.order_item_id;
        if !self.tracker.transition(id, state) {
            warn!("⚠️ {} 已是终态，忽略 {}", ctx, state);
            return false;
        }
        let attempts = self.tracker.record_attempt(id, ctx.attempts_max);

        let mut update = SchedulingUpdate::new(state)
            .attempts(attempts)
            .finished_at(timestamp_now())
            .executed_by(self.settings.executor_user.clone())
            .result(result);
        if let Some(message) = &error_message {
            update = update.error(message.clone());
        }
        self.report_scheduling(id, &update).await;

        if self.tracker.set_terminal_case(id, case_status) {
            self.report_case(id, case_status, confirmation.clone()).await;
        }
        self.counters.processed += 1;

        let line = match (&error_message, state) {
            (Some(message), SchedulingState::Failed) => {
                format!("❌ {} {} {}: {}", ctx, case_status.tag(), state, message)
            }
            _ => format!(
                "✅ {} {} {}{}",
                ctx,
                case_status.tag(),
                state,
                confirmation
                    .map(|n| format!(" radicado {}", n))
                    .unwrap_or_default()
            ),
        };
        if state == SchedulingState::Failed {
            self.log_error(line);
        } else {
            self.log_info(line);
        }
        true
    }

    /// 为成功的订单扣费，返回扣费后余额是否耗尽
    async fn bill(&mut self, id: OrderItemId) -> bool {
        if !self.tracker.mark_billed(id) {
            return false;
        }
        match self.quota.debit_one_case().await {
            Ok(receipt) => {
                info!(
                    "💰 订单 #{} 扣费: {} -> {}",
                    id, receipt.previous_balance, receipt.new_balance
                );
                receipt.exhausted
            }
            Err(e) => {
                self.log_error(format!(
                    "⚠️ 订单 #{} 扣费失败，需要人工对账: {}",
                    id, e
                ));
                false
            }
        }
    }

    fn check_failure_alert(&mut self) {
        let threshold = self.settings.failure_alert_threshold;
        if threshold == 0 || self.failure_alert_sent {
            return;
        }
        if self.counters.failed >= threshold && self.counters.succeeded == 0 {
            self.failure_alert_sent = true;
            self.log_error(format!(
                "🚨 已连续失败 {} 个订单且没有任何成功，请检查门户或会话",
                self.counters.failed
            ));
        }
    }

    /// 队列为空时，会话空闲超过阈值就关闭浏览器
    async fn release_idle_session(&mut self) {
        let idle = match self.session.idle_for() {
            Some(idle) => idle,
            None => return,
        };
        if idle >= self.settings.inactivity_timeout {
            self.log_info(format!(
                "💤 会话已空闲 {} 秒，关闭浏览器",
                idle.as_secs()
            ));
            self.session.teardown().await;
        }
    }

    /// 暂停时原地等待；等待期间收到停止信号返回 false
    async fn wait_while_paused(&self) -> bool {
        while self.control.is_paused() {
            if self.control.is_stopped() {
                return false;
            }
            self.idle(self.settings.pause_check_interval).await;
        }
        !self.control.is_stopped()
    }

    /// 等待一段时间，收到停止信号时提前返回
    async fn idle(&self, duration: Duration) {
        tokio::select! {
            _ = sleep(duration) => {}
            _ = self.control.cancelled() => {}
        }
    }

    async fn report_scheduling(&self, id: OrderItemId, update: &SchedulingUpdate) {
        if let Err(e) = self.queue.update_scheduling(id, update).await {
            warn!("⚠️ 订单 #{} 调度状态 {} 上报失败: {}", id, update.state, e);
        }
    }

    async fn report_case(&self, id: OrderItemId, status: CaseStatus, confirmation: Option<String>) {
        if let Err(e) = self.queue.update_case_status(id, status, confirmation).await {
            warn!("⚠️ 订单 #{} 结果代码 {} 上报失败: {}", id, status, e);
        }
    }

    fn publish_counters(&self) {
        self.observer.notify(WorkerEvent::Counters(self.counters));
    }

    fn log_info(&self, line: String) {
        info!("{}", line);
        self.observer.notify(WorkerEvent::Log(line));
    }

    fn log_warn(&self, line: String) {
        warn!("{}", line);
        self.observer.notify(WorkerEvent::Log(line));
    }

    fn log_error(&self, line: String) {
        error!("{}", line);
        self.observer.notify(WorkerEvent::Log(line));
    }
}
