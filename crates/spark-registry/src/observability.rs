//! 观测：tracing 初始化与订阅级指标。
//!
//! # 模块定位（Why）
//! - 库内部统一通过 `tracing` 宏输出结构化日志（字段：`subscription`、`interest`、`pending`、`len`、`code`）；
//!   宿主进程可调用 [`init_tracing`] 安装 `fmt` + `EnvFilter` 订阅者。
//! - 每个订阅附带一份 [`SubscriptionMetrics`]，以原子计数器记录规范化过程，供运维面板或测试按需读取快照。
//!
//! # 契约说明（What）
//! - [`init_tracing`] 不 panic：过滤指令非法或全局订阅者已存在时返回 [`ObservabilityError`]；
//! - 环境变量 `RUST_LOG` 存在且合法时优先于配置中的 `filter`。

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{error::ObservabilityError, normalizer::RawEventOutcome};

/// 日志输出配置。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TracingConfig {
    /// `EnvFilter` 指令，例如 `spark_registry=debug,info`。
    pub filter: String,
    pub ansi: bool,
    pub with_target: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            ansi: true,
            with_target: true,
        }
    }
}

/// 按配置构建过滤器；`RUST_LOG` 合法时优先生效。
pub fn build_filter(config: &TracingConfig) -> Result<EnvFilter, ObservabilityError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    parse_filter(&config.filter)
}

/// 只解析给定指令，不读取环境变量。
pub fn parse_filter(directive: &str) -> Result<EnvFilter, ObservabilityError> {
    EnvFilter::try_new(directive).map_err(|source| ObservabilityError::InvalidFilter {
        directive: directive.to_owned(),
        source,
    })
}

/// 安装全局 tracing 订阅者。
///
/// # 教案式说明
/// - **意图 (Why)**：宿主进程只需在启动时调用一次，即可让注册中心的订阅生命周期日志按配置输出。
/// - **执行 (How)**：`registry()` 叠加 `EnvFilter` 与 `fmt::layer()`，再以 `try_init` 注册为全局默认。
/// - **契约 (What)**：重复调用返回 [`ObservabilityError::SubscriberAlreadySet`]，不会覆盖已有订阅者。
pub fn init_tracing(config: &TracingConfig) -> Result<(), ObservabilityError> {
    let filter = build_filter(config)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(config.ansi)
                .with_target(config.with_target),
        )
        .try_init()
        .map_err(ObservabilityError::SubscriberAlreadySet)
}

/// 单个订阅的规范化指标。
///
/// # 教案式说明
/// - **意图 (Why)**：规范化器本身无锁且只被订阅流驱动，外部线程若想观测其进度，需要一份可共享的计数器。
/// - **契约 (What)**：
///   - 所有计数器单调递增，`pending` 为最近一次原始事件处理后的待释放变更数；
///   - 计数使用 `Relaxed` 内存序，快照之间的字段不保证同一时刻一致，只保证各自单调。
/// - **风险 (Trade-offs)**：每条原始事件会触发一到两次原子写，相比规范化本身的成本可以忽略。
#[derive(Debug, Default)]
pub struct SubscriptionMetrics {
    raw_events: AtomicU64,
    emitted: AtomicU64,
    singletons: AtomicU64,
    batches: AtomicU64,
    suppressed_sentinels: AtomicU64,
    discarded_delimiters: AtomicU64,
    discarded_on_termination: AtomicU64,
    pending: AtomicUsize,
    terminated: AtomicBool,
}

impl SubscriptionMetrics {
    pub(crate) fn record_outcome(&self, outcome: &RawEventOutcome) {
        self.raw_events.fetch_add(1, Ordering::Relaxed);
        match *outcome {
            RawEventOutcome::Buffered { pending } => {
                self.pending.store(pending, Ordering::Relaxed);
                return;
            }
            RawEventOutcome::SentinelSuppressed => {
                self.suppressed_sentinels.fetch_add(1, Ordering::Relaxed);
            }
            RawEventOutcome::Released => {
                self.singletons.fetch_add(1, Ordering::Relaxed);
            }
            RawEventOutcome::BatchReleased { .. } => {
                self.batches.fetch_add(1, Ordering::Relaxed);
            }
            RawEventOutcome::DelimiterDiscarded { .. } => {
                self.discarded_delimiters.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        self.pending.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_emitted(&self) {
        self.emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_termination(&self, discarded: usize) {
        self.discarded_on_termination
            .fetch_add(discarded as u64, Ordering::Relaxed);
        self.pending.store(0, Ordering::Relaxed);
        self.terminated.store(true, Ordering::Relaxed);
    }

    /// 读取当前指标快照。
    pub fn snapshot(&self) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            raw_events: self.raw_events.load(Ordering::Relaxed),
            emitted: self.emitted.load(Ordering::Relaxed),
            singletons: self.singletons.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            suppressed_sentinels: self.suppressed_sentinels.load(Ordering::Relaxed),
            discarded_delimiters: self.discarded_delimiters.load(Ordering::Relaxed),
            discarded_on_termination: self.discarded_on_termination.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
            terminated: self.terminated.load(Ordering::Relaxed),
        }
    }
}

/// [`SubscriptionMetrics`] 的只读快照。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    /// 已处理的上游原始事件数（含哨兵）。
    pub raw_events: u64,
    /// 已交付给消费者的通知数（含合成的定界标记）。
    pub emitted: u64,
    /// 以单条形式释放的批次数。
    pub singletons: u64,
    /// 以 `BufferStart`/`BufferEnd` 包裹释放的批次数。
    pub batches: u64,
    pub suppressed_sentinels: u64,
    pub discarded_delimiters: u64,
    /// 订阅终止时被丢弃的未释放变更数。
    pub discarded_on_termination: u64,
    pub pending: usize,
    pub terminated: bool,
}
