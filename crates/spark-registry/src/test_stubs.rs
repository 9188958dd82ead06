//! 测试桩：内存版上游兴趣源。
//!
//! # 设计背景（Why）
//! - 集成测试、基准与示例都需要一个可手动驱动的上游：按兴趣推送原始事件、注入错误、正常完成，
//!   并观察注册中心发起了多少次上游订阅、哪些订阅已被释放。
//!
//! # 使用方式（How）
//! - 用 `Arc` 包裹后交给 [`crate::InterestRegistry`]，测试侧保留另一份 `Arc` 以推送事件；
//! - 每次 `for_interest` 建立一条独立的无界通道；`publish` 向该兴趣的全部在途通道广播，
//!   行为接近“热”发布主题：后加入的订阅只能收到加入之后的事件。
//!
//! # 契约说明（What）
//! - 推送是同步的：`publish` 返回后，事件已在对应原始流中就绪，可被立即轮询；
//! - 消费端丢弃原始流后，对应通道在下一次 `publish`/`live_feeds` 时被清理。

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, UnboundedSender};

use crate::{
    interest::Interest,
    notification::ChangeNotification,
    source::{InterestSource, RawFeed},
};

struct Feed<T, E> {
    interest: Interest,
    tx: UnboundedSender<Result<ChangeNotification<T>, E>>,
}

struct SourceState<T, E> {
    feeds: Vec<Feed<T, E>>,
    requests: Vec<Interest>,
    shut_down: bool,
}

/// 内存版上游兴趣源。
pub struct InMemoryInterestSource<T, E> {
    state: Mutex<SourceState<T, E>>,
}

impl<T, E> Default for InMemoryInterestSource<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> InMemoryInterestSource<T, E> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SourceState {
                feeds: Vec::new(),
                requests: Vec::new(),
                shut_down: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SourceState<T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 向兴趣的全部在途原始流推送一条事件，返回成功送达的条数。
    pub fn publish(&self, interest: &Interest, event: ChangeNotification<T>) -> usize
    where
        T: Clone,
    {
        let mut state = self.lock();
        state.feeds.retain(|feed| !feed.tx.is_closed());
        let mut delivered = 0;
        for feed in state.feeds.iter().filter(|feed| &feed.interest == interest) {
            if feed.tx.send(Ok(event.clone())).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// 以错误结束兴趣的全部在途原始流，返回受影响的条数。
    pub fn fail(&self, interest: &Interest, error: E) -> usize
    where
        E: Clone,
    {
        let mut state = self.lock();
        let mut failed = 0;
        state.feeds.retain(|feed| {
            if &feed.interest != interest {
                return true;
            }
            if feed.tx.send(Err(error.clone())).is_ok() {
                failed += 1;
            }
            false
        });
        failed
    }

    /// 正常完成兴趣的全部在途原始流，返回受影响的条数。
    pub fn complete(&self, interest: &Interest) -> usize {
        let mut state = self.lock();
        let before = state.feeds.len();
        state.feeds.retain(|feed| &feed.interest != interest);
        before - state.feeds.len()
    }

    /// 兴趣当前仍被消费端持有的原始流数量。
    pub fn live_feeds(&self, interest: &Interest) -> usize {
        let mut state = self.lock();
        state.feeds.retain(|feed| !feed.tx.is_closed());
        state
            .feeds
            .iter()
            .filter(|feed| &feed.interest == interest)
            .count()
    }

    /// 按调用顺序记录的 `for_interest` 请求。
    pub fn requests(&self) -> Vec<Interest> {
        self.lock().requests.clone()
    }

    pub fn is_shut_down(&self) -> bool {
        self.lock().shut_down
    }
}

impl<T, E> InterestSource for InMemoryInterestSource<T, E>
where
    T: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = T;
    type Error = E;

    fn for_interest(&self, interest: &Interest) -> RawFeed<T, E> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut state = self.lock();
        state.requests.push(interest.clone());
        // 关闭后直接丢弃发送端，原始流立即完成。
        if !state.shut_down {
            state.feeds.push(Feed {
                interest: interest.clone(),
                tx,
            });
        }
        Box::pin(futures_util::stream::poll_fn(move |cx| rx.poll_recv(cx)))
    }

    fn shutdown(&self) {
        let mut state = self.lock();
        state.shut_down = true;
        state.feeds.clear();
    }
}
