//! 上游兴趣源契约。
//!
//! # 设计背景（Why）
//! - 注册中心读路径不自行解析兴趣：它把原始查询委托给上游兴趣客户端（注册、网络、重连与重订阅均由其负责），
//!   自身只负责把返回的原始通知流规范化。
//!
//! # 契约说明（What）
//! - [`InterestSource::for_interest`] 为给定兴趣返回一条实时、可能无限的原始流，只包含
//!   `Add`/`Modify`/`Delete`/`BufferSentinel`；顺序由上游保证，本层不重排；
//! - 原始流可能以错误结束（网络或重订阅失败），也可能正常完成（例如关闭时）；
//! - 丢弃返回的流即释放上游订阅；
//! - [`InterestSource::shutdown`] 要求上游结束全部在途原始流，默认实现为空操作。

use std::sync::Arc;

use futures_util::stream::BoxStream;

use crate::{interest::Interest, notification::ChangeNotification};

/// 上游原始通知流。
pub type RawFeed<T, E> = BoxStream<'static, Result<ChangeNotification<T>, E>>;

/// 上游兴趣解析客户端。
///
/// # 教案式说明
/// - **意图 (Why)**：以 trait 隔离真实的兴趣客户端，便于注册中心在测试与生产中替换实现。
/// - **契约 (What)**：
///   - `Item`：实例负载类型，通常为 [`crate::InstanceInfo`]；
///   - `Error`：原始流的终止错误，会被原样转交给消费者；
///   - 实现需满足 `Send + Sync + 'static`，以便被注册中心共享。
/// - **风险 (Trade-offs)**：返回装箱流带来一次堆分配与虚表调用，相对订阅建立的开销可以忽略。
pub trait InterestSource: Send + Sync + 'static {
    type Item: Send + 'static;
    type Error: std::error::Error + Send + Sync + 'static;

    /// 为兴趣建立一条新的原始通知流；每次调用都对应一个独立的上游订阅。
    fn for_interest(&self, interest: &Interest) -> RawFeed<Self::Item, Self::Error>;

    /// 关闭上游，结束全部在途原始流。
    fn shutdown(&self) {}
}

impl<S: InterestSource> InterestSource for Arc<S> {
    type Item = S::Item;
    type Error = S::Error;

    fn for_interest(&self, interest: &Interest) -> RawFeed<Self::Item, Self::Error> {
        (**self).for_interest(interest)
    }

    fn shutdown(&self) {
        (**self).shutdown()
    }
}
