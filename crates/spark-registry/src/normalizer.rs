//! # NotificationBufferNormalizer：批次哨兵规范化状态机
//!
//! ## 核心意图（Why）
//! - 上游兴趣源在离散变更之间穿插不带兴趣上下文的 `BufferSentinel`，其含义取决于前面累积了多少条变更；
//!   消费者则需要一个无歧义的协议：离散变更，或由同一兴趣的 `BufferStart`/`BufferEnd` 成对包裹的原子批次。
//! - 本模块把这一转换实现为显式的有限状态对象：一个按到达顺序排列的累积区 + 所属兴趣。
//!
//! ## 行为契约（What）
//! - 离散变更（`Add`/`Modify`/`Delete`）只入累积区，不立即输出；
//! - 遇到哨兵时按累积长度决定输出：
//!   - 0 条：哨兵被吞掉，不产生任何输出；
//!   - 1 条：原样释放该变更，不加定界；
//!   - ≥2 条：依次输出 `BufferStart(interest)`、全部变更（到达顺序）、`BufferEnd(interest)`；
//!   - 三种情况结束后累积区均为空；
//! - 上游直接推送的 `BufferStart`/`BufferEnd` 属于契约违例，按 [`UpstreamDelimiterPolicy`] 拒绝或丢弃；
//! - 批次只会被显式哨兵释放；流结束、报错或取消时由持有者调用 [`NotificationBufferNormalizer::discard_pending`] 丢弃。
//!
//! ## 并发模型（Where）
//! - 不加锁：同一订阅的原始事件严格串行送入，实例由订阅流独占，不跨订阅共享；
//! - 每条事件摊还 O(1)，累积区至多保存一个未闭合的批次。

use std::fmt;

use crate::{
    config::UpstreamDelimiterPolicy, error::ContractViolation, interest::Interest,
    notification::ChangeNotification,
};

/// 单条原始事件被处理后的结果，供日志与指标使用。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawEventOutcome {
    /// 离散变更已入累积区，`pending` 为当前累积长度。
    Buffered { pending: usize },
    /// 哨兵前没有累积变更，未产生输出。
    SentinelSuppressed,
    /// 单条变更被原样释放。
    Released,
    /// `len` 条变更被定界标记包裹释放（输出共 `len + 2` 条）。
    BatchReleased { len: usize },
    /// 上游定界标记按策略被丢弃。
    DelimiterDiscarded { pending: usize },
}

impl RawEventOutcome {
    /// 该结果向下游输出的通知条数。
    pub fn emitted(&self) -> usize {
        match *self {
            RawEventOutcome::Buffered { .. }
            | RawEventOutcome::SentinelSuppressed
            | RawEventOutcome::DelimiterDiscarded { .. } => 0,
            RawEventOutcome::Released => 1,
            RawEventOutcome::BatchReleased { len } => len + 2,
        }
    }
}

/// 单个订阅的批次规范化器。
///
/// # 教案式注释
/// - **意图 (Why)**：把“缓冲若干变更 → 观察哨兵 → 按数量决定吞掉/透传/定界”的隐式状态显式化，
///   让每个订阅持有一份独立实例，未释放的累积状态不会在消费者之间泄漏。
/// - **契约 (What)**：
///   - `interest`：用于给合成的定界标记打上作用域；
///   - `pending`：自上次哨兵（或订阅开始）以来尚未释放的离散变更，保持到达顺序；
///   - **前置条件**：调用方保证不并发调用 [`Self::on_raw_event`]；
///   - **后置条件**：任一哨兵处理后 `pending_len() == 0`。
/// - **设计权衡 (Trade-offs)**：输出写入调用方提供的 `Extend` 容器而非返回 `Vec`，
///   订阅流可复用同一个出站队列，批次释放时不产生额外分配。
pub struct NotificationBufferNormalizer<T> {
    interest: Interest,
    pending: Vec<ChangeNotification<T>>,
    delimiter_policy: UpstreamDelimiterPolicy,
}

impl<T> NotificationBufferNormalizer<T> {
    /// 以默认策略（拒绝上游定界标记）构造。
    pub fn new(interest: Interest) -> Self {
        Self::with_policy(interest, UpstreamDelimiterPolicy::default())
    }

    pub fn with_policy(interest: Interest, delimiter_policy: UpstreamDelimiterPolicy) -> Self {
        Self {
            interest,
            pending: Vec::new(),
            delimiter_policy,
        }
    }

    pub fn interest(&self) -> &Interest {
        &self.interest
    }

    pub fn delimiter_policy(&self) -> UpstreamDelimiterPolicy {
        self.delimiter_policy
    }

    /// 当前累积但尚未释放的变更数。
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// 处理一条上游原始事件，把产生的规范化输出按顺序追加到 `out`。
    ///
    /// # 契约说明
    /// - **输入**：`event` 为上游原始事件；`out` 为下游出站队列。
    /// - **返回**：成功时返回 [`RawEventOutcome`]；策略为 `Reject` 且收到定界标记时返回 [`ContractViolation`]，
    ///   此时 `out` 与累积区均不被修改，是否继续由调用方决定（订阅流会终止订阅）。
    pub fn on_raw_event<O>(
        &mut self,
        event: ChangeNotification<T>,
        out: &mut O,
    ) -> Result<RawEventOutcome, ContractViolation>
    where
        O: Extend<ChangeNotification<T>>,
    {
        match event {
            ChangeNotification::Add(_)
            | ChangeNotification::Modify(_)
            | ChangeNotification::Delete(_) => {
                self.pending.push(event);
                Ok(RawEventOutcome::Buffered {
                    pending: self.pending.len(),
                })
            }
            ChangeNotification::BufferSentinel => Ok(self.flush(out)),
            ChangeNotification::BufferStart(_) | ChangeNotification::BufferEnd(_) => {
                match self.delimiter_policy {
                    UpstreamDelimiterPolicy::Reject => Err(ContractViolation {
                        interest: self.interest.clone(),
                        kind: event.kind(),
                    }),
                    UpstreamDelimiterPolicy::Discard => Ok(RawEventOutcome::DelimiterDiscarded {
                        pending: self.pending.len(),
                    }),
                }
            }
        }
    }

    /// 丢弃未释放的累积变更，返回被丢弃的条数。
    ///
    /// 用于上游完成、报错或订阅取消：批次只由显式哨兵释放，终止路径从不冲刷。
    pub fn discard_pending(&mut self) -> usize {
        let discarded = self.pending.len();
        self.pending.clear();
        discarded
    }

    fn flush<O>(&mut self, out: &mut O) -> RawEventOutcome
    where
        O: Extend<ChangeNotification<T>>,
    {
        match self.pending.len() {
            0 => RawEventOutcome::SentinelSuppressed,
            1 => {
                out.extend(self.pending.pop());
                RawEventOutcome::Released
            }
            len => {
                out.extend(Some(ChangeNotification::BufferStart(self.interest.clone())));
                out.extend(self.pending.drain(..));
                out.extend(Some(ChangeNotification::BufferEnd(self.interest.clone())));
                RawEventOutcome::BatchReleased { len }
            }
        }
    }
}

impl<T> fmt::Debug for NotificationBufferNormalizer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationBufferNormalizer")
            .field("interest", &self.interest)
            .field("pending", &self.pending.len())
            .field("delimiter_policy", &self.delimiter_policy)
            .finish()
    }
}
