//! 规范化订阅流。
//!
//! # 模块定位（Why）
//! - 把一条上游原始流与一个独占的 [`NotificationBufferNormalizer`] 绑定，向消费者暴露规范化后的 `Stream`；
//! - 上游的推送式订阅在这里表现为拉取式流：每次 `poll_next` 先清空出站队列，再向上游拉取下一条原始事件并同步送入规范化器。
//!
//! # 生命周期契约（What）
//! - 上游报错：交付 `Err(SubscriptionError::Upstream(e))` 后结束，未释放的累积变更被丢弃；
//! - 上游完成：丢弃累积变更后结束；
//! - 契约违例：交付 `Err(SubscriptionError::ContractViolation(..))` 后结束，并立即释放上游；
//! - 取消：[`NormalizedStream::close`] 或直接丢弃流，均同步释放上游订阅并丢弃累积变更，不做冲刷；
//! - 结束后不会再产生任何条目（实现 [`FusedStream`]）。
//! - 单次轮询最多处理固定数量的原始事件；上游持续就绪却无输出时自我唤醒并返回 `Pending`，不独占执行线程。

use std::{
    collections::VecDeque,
    fmt,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use futures_util::{
    Stream, StreamExt,
    stream::FusedStream,
};
use tracing::{debug, trace, warn};

use crate::{
    config::UpstreamDelimiterPolicy,
    error::SubscriptionError,
    interest::Interest,
    normalizer::{NotificationBufferNormalizer, RawEventOutcome},
    notification::ChangeNotification,
    observability::SubscriptionMetrics,
    registry::{SubscriptionId, SubscriptionLease},
    source::RawFeed,
};

/// 单次 `poll_next` 最多处理的原始事件数；用尽后让出执行权并自我唤醒。
const RAW_EVENTS_PER_POLL: usize = 128;

/// 订阅终止原因，仅用于日志。
#[derive(Clone, Copy, Debug)]
enum Termination {
    Completed,
    UpstreamFailed,
    ContractViolated,
    Cancelled,
}

impl Termination {
    fn as_str(self) -> &'static str {
        match self {
            Termination::Completed => "completed",
            Termination::UpstreamFailed => "upstream_failed",
            Termination::ContractViolated => "contract_violated",
            Termination::Cancelled => "cancelled",
        }
    }
}

/// 交付给消费者的规范化通知流。
///
/// # 教案式注释
/// - **意图 (Why)**：一个订阅 = 一条上游原始流 + 一个规范化器 + 一份指标，三者同生共死。
/// - **契约 (What)**：
///   - `Item = Result<ChangeNotification<T>, SubscriptionError<E>>`；消费者永远看不到 `BufferSentinel`，
///     也不会看到缺少 `BufferEnd` 的 `BufferStart`（出站队列中的批次总是完整的）；
///   - 输出顺序与上游到达顺序一致；
///   - 丢弃即取消。
/// - **设计权衡 (Trade-offs)**：出站队列最多容纳一次冲刷的输出（批次长度 + 2），不承担额外的背压缓冲，
///   上游节奏由上游自行控制。
pub struct NormalizedStream<T, E> {
    id: SubscriptionId,
    upstream: Option<RawFeed<T, E>>,
    normalizer: NotificationBufferNormalizer<T>,
    outbox: VecDeque<ChangeNotification<T>>,
    terminal: Option<SubscriptionError<E>>,
    metrics: Arc<SubscriptionMetrics>,
    lease: Option<SubscriptionLease>,
}

// 不做结构化 pin 投影：所有字段都只经由 `&mut Self` 访问。
impl<T, E> Unpin for NormalizedStream<T, E> {}

impl<T, E> NormalizedStream<T, E> {
    pub(crate) fn open(
        id: SubscriptionId,
        interest: Interest,
        upstream: RawFeed<T, E>,
        policy: UpstreamDelimiterPolicy,
        lease: SubscriptionLease,
    ) -> Self {
        debug!(subscription = %id, interest = %interest, ?policy, "subscription opened");
        Self {
            id,
            upstream: Some(upstream),
            normalizer: NotificationBufferNormalizer::with_policy(interest, policy),
            outbox: VecDeque::new(),
            terminal: None,
            metrics: Arc::new(SubscriptionMetrics::default()),
            lease: Some(lease),
        }
    }

    /// 构造一条只交付一个终止错误的流，不接触上游。
    pub(crate) fn refused(id: SubscriptionId, interest: Interest, error: SubscriptionError<E>) -> Self {
        let metrics = Arc::new(SubscriptionMetrics::default());
        metrics.record_termination(0);
        Self {
            id,
            upstream: None,
            normalizer: NotificationBufferNormalizer::new(interest),
            outbox: VecDeque::new(),
            terminal: Some(error),
            metrics,
            lease: None,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn interest(&self) -> &Interest {
        self.normalizer.interest()
    }

    /// 订阅级指标；可在其它线程读取快照。
    pub fn metrics(&self) -> Arc<SubscriptionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// 上游订阅是否仍在。
    pub fn is_live(&self) -> bool {
        self.upstream.is_some()
    }

    /// 同步取消订阅：立即释放上游并丢弃累积与待交付的通知，此后轮询返回 `None`。
    pub fn close(&mut self) {
        self.outbox.clear();
        self.terminal = None;
        if self.upstream.is_some() {
            self.release(Termination::Cancelled);
        }
    }

    fn release(&mut self, reason: Termination) {
        self.upstream = None;
        let discarded = self.normalizer.discard_pending();
        self.metrics.record_termination(discarded);
        self.lease = None;
        debug!(
            subscription = %self.id,
            interest = %self.normalizer.interest(),
            discarded,
            reason = reason.as_str(),
            "subscription terminated"
        );
    }

    fn observe(&self, outcome: &RawEventOutcome) {
        self.metrics.record_outcome(outcome);
        match outcome {
            RawEventOutcome::DelimiterDiscarded { pending } => warn!(
                subscription = %self.id,
                interest = %self.normalizer.interest(),
                pending,
                "discarded buffer delimiter delivered by upstream"
            ),
            RawEventOutcome::BatchReleased { len } => debug!(
                subscription = %self.id,
                interest = %self.normalizer.interest(),
                len,
                "batch released"
            ),
            _ => trace!(subscription = %self.id, ?outcome, "raw event normalized"),
        }
    }
}

impl<T, E> Stream for NormalizedStream<T, E> {
    type Item = Result<ChangeNotification<T>, SubscriptionError<E>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let mut budget = RAW_EVENTS_PER_POLL;
        loop {
            if let Some(notification) = this.outbox.pop_front() {
                this.metrics.record_emitted();
                return Poll::Ready(Some(Ok(notification)));
            }
            if let Some(error) = this.terminal.take() {
                return Poll::Ready(Some(Err(error)));
            }
            let Some(upstream) = this.upstream.as_mut() else {
                return Poll::Ready(None);
            };
            if budget == 0 {
                // 上游持续就绪却没有产生输出（大量变更或空哨兵），不能在一次轮询里无限循环。
                cx.waker().wake_by_ref();
                return Poll::Pending;
            }
            budget -= 1;

            match upstream.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => this.release(Termination::Completed),
                Poll::Ready(Some(Ok(event))) => {
                    match this.normalizer.on_raw_event(event, &mut this.outbox) {
                        Ok(outcome) => this.observe(&outcome),
                        Err(violation) => {
                            warn!(
                                subscription = %this.id,
                                interest = %violation.interest,
                                kind = %violation.kind,
                                code = violation.code(),
                                "upstream violated the raw feed contract"
                            );
                            this.release(Termination::ContractViolated);
                            this.terminal = Some(violation.into());
                        }
                    }
                }
                Poll::Ready(Some(Err(error))) => {
                    this.release(Termination::UpstreamFailed);
                    this.terminal = Some(SubscriptionError::Upstream(error));
                }
            }
        }
    }
}

impl<T, E> FusedStream for NormalizedStream<T, E> {
    fn is_terminated(&self) -> bool {
        self.upstream.is_none() && self.outbox.is_empty() && self.terminal.is_none()
    }
}

impl<T, E> Drop for NormalizedStream<T, E> {
    fn drop(&mut self) {
        if self.upstream.is_some() {
            self.release(Termination::Cancelled);
        }
    }
}

impl<T, E> fmt::Debug for NormalizedStream<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NormalizedStream")
            .field("id", &self.id)
            .field("interest", self.normalizer.interest())
            .field("live", &self.upstream.is_some())
            .field("pending", &self.normalizer.pending_len())
            .field("outbox", &self.outbox.len())
            .finish()
    }
}
