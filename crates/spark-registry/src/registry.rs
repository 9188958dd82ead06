//! # InterestRegistry：读路径订阅入口
//!
//! ## 核心意图（Why）
//! - 对外暴露 `for_interest(interest) -> 规范化通知流`：向上游兴趣源请求原始流，为该订阅新建一个独占的
//!   规范化器，并把两者封装为 [`NormalizedStream`] 交给调用方；
//! - 记录在途订阅（ID → 兴趣），方便运维查看，也用于验证取消后上游订阅被及时释放。
//!
//! ## 行为契约（What）
//! - 每次调用恰好向上游请求一次原始流，不在调用之间缓存或共享上游流；
//! - 同一兴趣的多个订阅完全独立：各自的上游流、规范化器、累积区与指标；
//! - [`InterestRegistry::shutdown`] 幂等：标记关闭并委托上游结束全部在途原始流；关闭后新的订阅不再接触上游，
//!   返回只交付一个 [`SubscriptionError::RegistryShutdown`] 的流。
//!
//! ## 并发模型（Where）
//! - 注册中心本身 `Send + Sync`，可被多个任务共享；
//! - 在途订阅表使用 `DashMap`，订阅流被关闭或丢弃时通过租约自动移除条目。

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
};

use dashmap::DashMap;
use tracing::{debug, info};

use crate::{
    config::RegistryConfig,
    error::SubscriptionError,
    interest::Interest,
    source::InterestSource,
    stream::NormalizedStream,
};

/// 订阅标识，在单个注册中心内单调递增。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type SubscriptionTable = DashMap<SubscriptionId, Interest>;

/// 在途订阅的登记租约；析构时从订阅表中移除自身。
pub(crate) struct SubscriptionLease {
    id: SubscriptionId,
    table: Arc<SubscriptionTable>,
}

impl Drop for SubscriptionLease {
    fn drop(&mut self) {
        self.table.remove(&self.id);
    }
}

/// 读路径兴趣注册中心。
///
/// # 教案式注释
/// - **意图 (Why)**：把“上游原始流 → 规范化 → 消费者”的装配集中在一处，保证每个订阅都拿到全新的规范化器。
/// - **契约 (What)**：
///   - `source`：上游兴趣客户端，只在 [`Self::for_interest`] 与 [`Self::shutdown`] 中被调用；
///   - `config`：决定上游定界标记的处理策略；
///   - **后置条件**：除一次上游订阅外，`for_interest` 不产生其它副作用（订阅表登记仅用于观测）。
/// - **风险 (Trade-offs)**：订阅表对每个订阅多一次并发映射写入；对订阅建立这种低频操作可以接受。
pub struct InterestRegistry<S> {
    source: S,
    config: RegistryConfig,
    subscriptions: Arc<SubscriptionTable>,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

impl<S: InterestSource> InterestRegistry<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, RegistryConfig::default())
    }

    pub fn with_config(source: S, config: RegistryConfig) -> Self {
        Self {
            source,
            config,
            subscriptions: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// 为兴趣建立规范化订阅。
    ///
    /// # 契约说明
    /// - **输入**：`interest`，按值传入并由订阅持有；
    /// - **执行**：向上游请求一条原始流，创建独占的规范化器，登记订阅后返回 [`NormalizedStream`]；
    /// - **关闭后**：不请求上游，返回的流只交付一个 [`SubscriptionError::RegistryShutdown`]。
    pub fn for_interest(&self, interest: Interest) -> NormalizedStream<S::Item, S::Error> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));

        if self.is_shut_down() {
            debug!(subscription = %id, interest = %interest, "subscription refused after shutdown");
            let error = SubscriptionError::RegistryShutdown {
                interest: interest.clone(),
            };
            return NormalizedStream::refused(id, interest, error);
        }

        let upstream = self.source.for_interest(&interest);
        self.subscriptions.insert(id, interest.clone());
        let lease = SubscriptionLease {
            id,
            table: Arc::clone(&self.subscriptions),
        };
        NormalizedStream::open(id, interest, upstream, self.config.upstream_delimiters, lease)
    }

    /// 当前在途订阅数。
    pub fn active_subscriptions(&self) -> usize {
        self.subscriptions.len()
    }

    /// 在途订阅列表，按订阅 ID 排序。
    pub fn subscriptions(&self) -> Vec<(SubscriptionId, Interest)> {
        let mut entries: Vec<_> = self
            .subscriptions
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// 关闭注册中心并委托上游结束全部原始流；重复调用无副作用。
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        info!(
            active = self.subscriptions.len(),
            "interest registry shutting down"
        );
        self.source.shutdown();
    }
}

impl<S> fmt::Debug for InterestRegistry<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterestRegistry")
            .field("config", &self.config)
            .field("active_subscriptions", &self.subscriptions.len())
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::{FutureExt, StreamExt};
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        config::UpstreamDelimiterPolicy, instance::InstanceInfo, notification::ChangeNotification,
        test_stubs::InMemoryInterestSource,
    };

    #[derive(Clone, Debug, PartialEq, thiserror::Error)]
    #[error("interest channel lost")]
    struct ChannelLost;

    fn vip() -> Interest {
        Interest::for_vip("testVip")
    }

    #[test]
    #[traced_test]
    fn contract_violation_is_logged_and_terminates() {
        let source = Arc::new(InMemoryInterestSource::<InstanceInfo, ChannelLost>::new());
        let registry = InterestRegistry::new(Arc::clone(&source));
        let mut stream = registry.for_interest(vip());

        source.publish(&vip(), ChangeNotification::BufferStart(vip()));

        let item = stream.next().now_or_never().flatten();
        assert!(matches!(
            item,
            Some(Err(SubscriptionError::ContractViolation(_)))
        ));
        assert!(matches!(stream.next().now_or_never(), Some(None)));
        assert!(logs_contain("upstream violated the raw feed contract"));
        assert!(logs_contain("registry.upstream.contract_violation"));
        assert_eq!(registry.active_subscriptions(), 0);
        assert_eq!(source.live_feeds(&vip()), 0, "违例后应立即释放上游");
    }

    #[test]
    #[traced_test]
    fn discarded_delimiter_is_logged() {
        let source = Arc::new(InMemoryInterestSource::<u32, ChannelLost>::new());
        let config =
            RegistryConfig::default().with_upstream_delimiters(UpstreamDelimiterPolicy::Discard);
        let registry = InterestRegistry::with_config(Arc::clone(&source), config);
        assert_eq!(
            registry.config().upstream_delimiters,
            UpstreamDelimiterPolicy::Discard
        );
        let mut stream = registry.for_interest(vip());

        source.publish(&vip(), ChangeNotification::Add(1));
        source.publish(&vip(), ChangeNotification::BufferEnd(vip()));
        source.publish(&vip(), ChangeNotification::BufferSentinel);

        assert_eq!(
            stream.next().now_or_never().flatten().map(Result::ok),
            Some(Some(ChangeNotification::Add(1)))
        );
        assert!(logs_contain("discarded buffer delimiter delivered by upstream"));
        assert_eq!(stream.metrics().snapshot().discarded_delimiters, 1);
    }

    #[test]
    #[traced_test]
    fn batch_release_logs_its_length() {
        let source = Arc::new(InMemoryInterestSource::<u32, ChannelLost>::new());
        let registry = InterestRegistry::new(Arc::clone(&source));
        let mut stream = registry.for_interest(vip());

        source.publish(&vip(), ChangeNotification::Add(1));
        source.publish(&vip(), ChangeNotification::Add(2));
        source.publish(&vip(), ChangeNotification::BufferSentinel);

        assert!(matches!(
            stream.next().now_or_never(),
            Some(Some(Ok(ChangeNotification::BufferStart(_))))
        ));
        assert!(logs_contain("batch released"));
        assert!(logs_contain("len=2"));
    }

    #[test]
    fn subscription_ids_are_unique_and_listed() {
        let source = InMemoryInterestSource::<u32, ChannelLost>::new();
        let registry = InterestRegistry::new(source);
        assert_eq!(registry.config(), &RegistryConfig::default());

        let first = registry.for_interest(vip());
        let second = registry.for_interest(Interest::full_registry());

        assert_ne!(first.id(), second.id());
        assert_eq!(
            registry.subscriptions(),
            vec![
                (first.id(), vip()),
                (second.id(), Interest::FullRegistry)
            ]
        );
        assert_eq!(first.id().to_string(), format!("sub-{}", first.id().get()));

        drop(first);
        assert_eq!(registry.active_subscriptions(), 1);
    }
}
