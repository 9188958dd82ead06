#![doc = r#"
# spark-registry

## 设计动机（Why）
- **定位**：服务注册中心读路径的订阅层。消费者按“兴趣”（全量、应用、VIP、实例等）订阅实例变更，
  本 crate 把上游兴趣客户端产生的原始通知流规范化后交付给消费者。
- **核心问题**：上游以“若干变更 + 一个缓冲哨兵”的形式表达一批变更，哨兵本身不携带语义；
  消费者需要的是“单条变更直接送达、多条变更由 `BufferStart`/`BufferEnd` 显式包裹”的流。

## 核心契约（What）
- [`InterestRegistry::for_interest`] 每次调用恰好建立一个上游订阅，并为其配备独占的
  [`NotificationBufferNormalizer`]；
- 哨兵到达时：累积为空则不输出，累积一条则原样输出，累积多条则包裹为一个批次；
- 上游错误原样转交（[`SubscriptionError::Upstream`]），上游完成或订阅取消时未释放的累积变更被丢弃；
- 丢弃 [`NormalizedStream`] 即取消订阅，上游订阅被同步释放。

## 实现策略（How）
- 规范化器是纯同步状态机，不依赖任何运行时；订阅流以拉取方式驱动上游 `Stream`；
- 错误以 `thiserror` 枚举表达并附带稳定错误码（见 [`error::codes`]）；
- 日志统一经由 `tracing`，宿主可用 [`init_tracing`] 安装 `fmt` + `EnvFilter` 订阅者；
- 配置以 TOML 表达，见 [`Settings`]。

## 风险与考量（Trade-offs）
- 上游若从不发送哨兵，累积区会无界增长；本层不做超时冲刷，节奏完全由上游决定。
"#]
#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod instance;
pub mod interest;
pub mod normalizer;
pub mod notification;
pub mod observability;
pub mod registry;
pub mod source;
pub mod stream;
pub mod test_stubs;

pub use config::{RegistryConfig, Settings, UpstreamDelimiterPolicy};
pub use error::{ConfigError, ContractViolation, InterestError, ObservabilityError, SubscriptionError};
pub use instance::{InstanceInfo, InstanceInfoBuilder, InstanceStatus};
pub use interest::{Interest, InterestSet, MatchOperator, Pattern};
pub use normalizer::{NotificationBufferNormalizer, RawEventOutcome};
pub use notification::{ChangeNotification, NotificationKind};
pub use observability::{
    SubscriptionMetrics, SubscriptionSnapshot, TracingConfig, build_filter, init_tracing,
    parse_filter,
};
pub use registry::{InterestRegistry, SubscriptionId};
pub use source::{InterestSource, RawFeed};
pub use stream::NormalizedStream;
