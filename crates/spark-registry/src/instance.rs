//! 服务实例快照模型。
//!
//! # 模块定位（Why）
//! - 读路径只消费上游推送的实例快照，不负责注册、续约与摘除；这里仅保留兴趣匹配需要的身份与属性字段。
//! - 规范化层对负载类型保持泛型，`InstanceInfo` 是默认负载，也是 [`crate::Interest::matches`] 能理解的唯一结构。
//!
//! # 契约说明（What）
//! - 快照一经构建即不可变；字段通过只读访问器暴露。
//! - 相等性按全部字段的结构比较，与上游产出的内容保持一致。

use std::{fmt, sync::Arc};

/// 实例健康状态。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InstanceStatus {
    Up,
    Down,
    Starting,
    OutOfService,
    #[default]
    Unknown,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InstanceStatus::Up => "UP",
            InstanceStatus::Down => "DOWN",
            InstanceStatus::Starting => "STARTING",
            InstanceStatus::OutOfService => "OUT_OF_SERVICE",
            InstanceStatus::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// 单个注册实例的不可变快照。
///
/// # 教案式说明
/// - **意图 (Why)**：为兴趣谓词提供可匹配的属性集合（应用名、VIP、安全 VIP、实例 ID）。
/// - **契约 (What)**：`id` 在注册中心内唯一；其余属性可缺省，缺省字段不会被任何 `Equals`/`Like` 谓词命中。
/// - **设计权衡 (Trade-offs)**：`id` 使用 `Arc<str>`，同一实例在多条通知之间克隆时不复制字符串。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct InstanceInfo {
    id: Arc<str>,
    app: Option<String>,
    vip_address: Option<String>,
    secure_vip_address: Option<String>,
    status: InstanceStatus,
}

impl InstanceInfo {
    /// 以实例 ID 开始构建快照。
    pub fn builder(id: impl Into<Arc<str>>) -> InstanceInfoBuilder {
        InstanceInfoBuilder {
            info: InstanceInfo {
                id: id.into(),
                app: None,
                vip_address: None,
                secure_vip_address: None,
                status: InstanceStatus::Unknown,
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn app(&self) -> Option<&str> {
        self.app.as_deref()
    }

    pub fn vip_address(&self) -> Option<&str> {
        self.vip_address.as_deref()
    }

    pub fn secure_vip_address(&self) -> Option<&str> {
        self.secure_vip_address.as_deref()
    }

    pub fn status(&self) -> InstanceStatus {
        self.status
    }
}

impl fmt::Display for InstanceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.id, self.status)
    }
}

/// [`InstanceInfo`] 的构建器。
#[derive(Clone, Debug)]
#[must_use]
pub struct InstanceInfoBuilder {
    info: InstanceInfo,
}

impl InstanceInfoBuilder {
    pub fn app(mut self, app: impl Into<String>) -> Self {
        self.info.app = Some(app.into());
        self
    }

    pub fn vip_address(mut self, vip: impl Into<String>) -> Self {
        self.info.vip_address = Some(vip.into());
        self
    }

    pub fn secure_vip_address(mut self, vip: impl Into<String>) -> Self {
        self.info.secure_vip_address = Some(vip.into());
        self
    }

    pub fn status(mut self, status: InstanceStatus) -> Self {
        self.info.status = status;
        self
    }

    pub fn build(self) -> InstanceInfo {
        self.info
    }
}
