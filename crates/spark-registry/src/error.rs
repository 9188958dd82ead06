//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 集中定义订阅、兴趣构造、配置加载与观测初始化的错误语义；
//! - 每个错误都映射到稳定的错误码（`area.subject.reason`），方便告警与日志聚合。
//!
//! ## 设计要求（What）
//! - 所有错误类型派生 `thiserror::Error`，可直接交给 `anyhow` 等上层框架；
//! - 上游失败原样转交：[`SubscriptionError::Upstream`] 透明转发上游错误的 `Display` 与 `source`，
//!   本组件不重试、不包装语义；
//! - 契约违例（上游直接推送定界标记）按快速失败处理，不静默吸收。

use std::path::PathBuf;

use thiserror::Error;

use crate::{interest::Interest, notification::NotificationKind};

/// 稳定错误码。
pub mod codes {
    pub const UPSTREAM_FAILURE: &str = "registry.upstream.failure";
    pub const UPSTREAM_CONTRACT_VIOLATION: &str = "registry.upstream.contract_violation";
    pub const REGISTRY_SHUTDOWN: &str = "registry.shutdown";
    pub const INTEREST_PATTERN_INVALID: &str = "interest.pattern.invalid";
    pub const CONFIG_IO: &str = "config.io";
    pub const CONFIG_PARSE: &str = "config.parse";
    pub const OBSERVABILITY_FILTER_INVALID: &str = "observability.filter.invalid";
    pub const OBSERVABILITY_SUBSCRIBER_EXISTS: &str = "observability.subscriber.exists";
}

/// 上游原始流中出现了只允许由规范化层合成的定界标记。
///
/// # 教案式说明
/// - **意图 (Why)**：上游契约只允许离散变更与 `BufferSentinel`；若直接收到 `BufferStart`/`BufferEnd`，
///   无论透传还是改写都可能破坏“定界成对出现”的不变量，因此作为逻辑错误上报。
/// - **契约 (What)**：`interest` 为出错订阅的兴趣，`kind` 为违规通知的种类。
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error(
    "upstream feed for interest `{interest}` delivered `{kind}`; delimiters may only be synthesized from buffer sentinels"
)]
pub struct ContractViolation {
    pub interest: Interest,
    pub kind: NotificationKind,
}

impl ContractViolation {
    pub fn code(&self) -> &'static str {
        codes::UPSTREAM_CONTRACT_VIOLATION
    }
}

/// 规范化订阅流的终止错误。
///
/// # 教案式说明
/// - **意图 (Why)**：消费者只会看到“干净的通知序列”或“一个终止错误”，这里枚举全部终止原因。
/// - **契约 (What)**：
///   - 任一错误交付后订阅流立即结束，累积未释放的变更被丢弃；
///   - `Upstream(E)` 中的 `E` 是上游产出的原值，可通过 [`Self::into_upstream`] 取回。
/// - **风险 (Trade-offs)**：错误类型对上游错误保持泛型，调用方需在签名中携带 `E`；
///   换来的是不丢失任何上游诊断信息。
#[derive(Debug, Error)]
pub enum SubscriptionError<E> {
    /// 上游原始流报错。
    #[error(transparent)]
    Upstream(E),

    /// 上游推送了定界标记，且策略为拒绝。
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),

    /// 注册中心已关闭，拒绝建立新订阅。
    #[error("registry is shut down; subscription for interest `{interest}` was refused")]
    RegistryShutdown { interest: Interest },
}

impl<E> SubscriptionError<E> {
    pub fn code(&self) -> &'static str {
        match self {
            SubscriptionError::Upstream(_) => codes::UPSTREAM_FAILURE,
            SubscriptionError::ContractViolation(_) => codes::UPSTREAM_CONTRACT_VIOLATION,
            SubscriptionError::RegistryShutdown { .. } => codes::REGISTRY_SHUTDOWN,
        }
    }

    pub fn upstream(&self) -> Option<&E> {
        match self {
            SubscriptionError::Upstream(err) => Some(err),
            _ => None,
        }
    }

    /// 取回上游原始错误；其它终止原因返回 `None`。
    pub fn into_upstream(self) -> Option<E> {
        match self {
            SubscriptionError::Upstream(err) => Some(err),
            _ => None,
        }
    }
}

/// 兴趣构造错误。
#[derive(Clone, Debug, Error)]
pub enum InterestError {
    #[error("invalid interest pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl InterestError {
    pub fn code(&self) -> &'static str {
        match self {
            InterestError::InvalidPattern { .. } => codes::INTEREST_PATTERN_INVALID,
        }
    }
}

/// 配置加载错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Io { .. } => codes::CONFIG_IO,
            ConfigError::Parse(_) => codes::CONFIG_PARSE,
        }
    }
}

/// tracing 初始化错误。
#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("invalid tracing filter directive `{directive}`")]
    InvalidFilter {
        directive: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("a global tracing subscriber is already installed")]
    SubscriberAlreadySet(#[source] tracing_subscriber::util::TryInitError),
}

impl ObservabilityError {
    pub fn code(&self) -> &'static str {
        match self {
            ObservabilityError::InvalidFilter { .. } => codes::OBSERVABILITY_FILTER_INVALID,
            ObservabilityError::SubscriberAlreadySet(_) => codes::OBSERVABILITY_SUBSCRIBER_EXISTS,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[derive(Debug, Error, PartialEq)]
    #[error("channel to write cluster lost")]
    struct ChannelLost;

    #[test]
    fn upstream_error_is_forwarded_unchanged() {
        let err: SubscriptionError<ChannelLost> = SubscriptionError::Upstream(ChannelLost);
        assert_eq!(err.to_string(), "channel to write cluster lost");
        assert_eq!(err.code(), codes::UPSTREAM_FAILURE);
        assert_eq!(err.upstream(), Some(&ChannelLost));
        assert_eq!(err.into_upstream(), Some(ChannelLost));
    }

    #[test]
    fn contract_violation_carries_context() {
        let violation = ContractViolation {
            interest: Interest::for_vip("testVip"),
            kind: NotificationKind::BufferStart,
        };
        let err: SubscriptionError<ChannelLost> = violation.clone().into();

        assert_eq!(err.code(), codes::UPSTREAM_CONTRACT_VIOLATION);
        assert!(err.to_string().contains("vip=testVip"));
        assert!(err.to_string().contains("buffer_start"));
        assert!(err.upstream().is_none());
        assert_eq!(violation.code(), err.code());
    }

    #[test]
    fn config_parse_error_keeps_source() {
        let parse = toml::from_str::<toml::Value>("= broken").unwrap_err();
        let err = ConfigError::from(parse);
        assert_eq!(err.code(), codes::CONFIG_PARSE);
        assert!(err.source().is_some());
    }
}
