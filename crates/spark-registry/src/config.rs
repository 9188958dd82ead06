//! 注册中心配置。
//!
//! # 模块定位（Why）
//! - 读路径注册中心只有少量可调参数：上游定界标记的处理策略与日志初始化参数；
//!   统一收敛到可由 TOML 文件加载的 [`Settings`]，避免在宿主进程里散落硬编码。
//!
//! # 契约说明（What）
//! - 所有字段均有默认值，空文件即为合法配置；
//! - 未知字段直接报错（`deny_unknown_fields`），防止拼写错误被静默忽略。
//!
//! ```toml
//! [registry]
//! upstream_delimiters = "reject"
//!
//! [tracing]
//! filter = "spark_registry=debug,info"
//! ansi = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, observability::TracingConfig};

/// 上游原始流中出现 `BufferStart`/`BufferEnd` 时的处理策略。
///
/// # 教案式说明
/// - **意图 (Why)**：上游契约只承诺推送离散变更与 `BufferSentinel`；对违约输入需要一个明确、可审计的决定。
/// - **契约 (What)**：
///   - `Reject`（默认）：终止订阅并交付 [`crate::SubscriptionError::ContractViolation`]；
///   - `Discard`：丢弃该标记并记录告警日志，当前批次继续累积。
/// - **风险 (Trade-offs)**：`Discard` 适合与已知会回放旧标记的上游对接，但会掩盖上游缺陷，需结合告警使用。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamDelimiterPolicy {
    #[default]
    Reject,
    Discard,
}

/// [`crate::InterestRegistry`] 的运行参数。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    pub upstream_delimiters: UpstreamDelimiterPolicy,
}

impl RegistryConfig {
    #[must_use]
    pub fn with_upstream_delimiters(mut self, policy: UpstreamDelimiterPolicy) -> Self {
        self.upstream_delimiters = policy;
        self
    }
}

/// 宿主进程的完整配置文件。
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub registry: RegistryConfig,
    pub tracing: TracingConfig,
}

impl Settings {
    /// 从 TOML 文本解析配置。
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// 读取并解析 TOML 配置文件。
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let settings = Settings::from_toml_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(
            settings.registry.upstream_delimiters,
            UpstreamDelimiterPolicy::Reject
        );
        assert_eq!(settings.tracing.filter, "info");
    }

    #[test]
    fn explicit_values_are_honoured() {
        let settings = Settings::from_toml_str(
            r#"
            [registry]
            upstream_delimiters = "discard"

            [tracing]
            filter = "spark_registry=trace"
            ansi = false
            with_target = false
            "#,
        )
        .unwrap();

        assert_eq!(
            settings.registry.upstream_delimiters,
            UpstreamDelimiterPolicy::Discard
        );
        assert_eq!(settings.tracing.filter, "spark_registry=trace");
        assert!(!settings.tracing.ansi);
        assert!(!settings.tracing.with_target);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = Settings::from_toml_str(
            r#"
            [registry]
            upstream_delimiter = "discard"
            "#,
        )
        .unwrap_err();
        assert_eq!(err.code(), "config.parse");
    }

    #[test]
    fn missing_file_reports_path() {
        let err = Settings::from_path("/nonexistent/spark-registry.toml").unwrap_err();
        assert_eq!(err.code(), "config.io");
        assert!(err.to_string().contains("spark-registry.toml"));
    }
}
