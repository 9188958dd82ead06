//! 变更通知模型。
//!
//! # 模块定位（Why）
//! - 上游兴趣源推送的原始流与交付给消费者的规范化流共用同一个封闭和类型，靠穷尽匹配保证新增种类不会静默漏过。
//! - `BufferSentinel` 只存在于上游原始流；`BufferStart`/`BufferEnd` 只由规范化层合成并交付给消费者。
//!
//! # 契约说明（What）
//! - 相等性为结构相等：种类 + 负载 + 兴趣（若有），便于消费者确定性地去重与比较。
//! - 消费者可见的批次必须以同一兴趣的 `BufferStart`/`BufferEnd` 成对包裹，或完全不包裹。

use std::fmt;

use crate::{instance::InstanceInfo, interest::Interest};

/// 通知种类标签，用于日志字段与错误上下文。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Add,
    Modify,
    Delete,
    BufferSentinel,
    BufferStart,
    BufferEnd,
}

impl NotificationKind {
    /// 稳定的小写标签。
    pub const fn as_str(self) -> &'static str {
        match self {
            NotificationKind::Add => "add",
            NotificationKind::Modify => "modify",
            NotificationKind::Delete => "delete",
            NotificationKind::BufferSentinel => "buffer_sentinel",
            NotificationKind::BufferStart => "buffer_start",
            NotificationKind::BufferEnd => "buffer_end",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 单条变更通知或批次标记。
///
/// # 教案式说明
/// - **意图 (Why)**：用一个枚举覆盖离散变更与三类标记，替代运行时类型标记。
/// - **契约 (What)**：
///   - `Add`/`Modify`/`Delete` 携带实例快照；
///   - `BufferSentinel` 不携带兴趣，表示“上游刚交付了一个批次边界”，绝不原样交给消费者；
///   - `BufferStart(I)`/`BufferEnd(I)` 表示“作用于兴趣 `I` 的原子批次从此开始/到此结束”。
/// - **设计权衡 (Trade-offs)**：负载类型保持泛型 `T`，规范化层不关心实例内部结构。
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChangeNotification<T = InstanceInfo> {
    Add(T),
    Modify(T),
    Delete(T),
    BufferSentinel,
    BufferStart(Interest),
    BufferEnd(Interest),
}

impl<T> ChangeNotification<T> {
    pub fn kind(&self) -> NotificationKind {
        match self {
            ChangeNotification::Add(_) => NotificationKind::Add,
            ChangeNotification::Modify(_) => NotificationKind::Modify,
            ChangeNotification::Delete(_) => NotificationKind::Delete,
            ChangeNotification::BufferSentinel => NotificationKind::BufferSentinel,
            ChangeNotification::BufferStart(_) => NotificationKind::BufferStart,
            ChangeNotification::BufferEnd(_) => NotificationKind::BufferEnd,
        }
    }

    /// 离散变更的负载；标记类通知返回 `None`。
    pub fn data(&self) -> Option<&T> {
        match self {
            ChangeNotification::Add(data)
            | ChangeNotification::Modify(data)
            | ChangeNotification::Delete(data) => Some(data),
            ChangeNotification::BufferSentinel
            | ChangeNotification::BufferStart(_)
            | ChangeNotification::BufferEnd(_) => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            ChangeNotification::Add(data)
            | ChangeNotification::Modify(data)
            | ChangeNotification::Delete(data) => Some(data),
            ChangeNotification::BufferSentinel
            | ChangeNotification::BufferStart(_)
            | ChangeNotification::BufferEnd(_) => None,
        }
    }

    /// 是否为携带数据的离散变更。
    pub fn is_change(&self) -> bool {
        self.data().is_some()
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, ChangeNotification::BufferSentinel)
    }

    /// 是否为消费者可见的批次定界标记。
    pub fn is_delimiter(&self) -> bool {
        matches!(
            self,
            ChangeNotification::BufferStart(_) | ChangeNotification::BufferEnd(_)
        )
    }

    pub fn delimiter_interest(&self) -> Option<&Interest> {
        match self {
            ChangeNotification::BufferStart(interest) | ChangeNotification::BufferEnd(interest) => {
                Some(interest)
            }
            _ => None,
        }
    }

    /// 变换负载类型，种类与兴趣保持不变。
    pub fn map<U, F>(self, f: F) -> ChangeNotification<U>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            ChangeNotification::Add(data) => ChangeNotification::Add(f(data)),
            ChangeNotification::Modify(data) => ChangeNotification::Modify(f(data)),
            ChangeNotification::Delete(data) => ChangeNotification::Delete(f(data)),
            ChangeNotification::BufferSentinel => ChangeNotification::BufferSentinel,
            ChangeNotification::BufferStart(interest) => ChangeNotification::BufferStart(interest),
            ChangeNotification::BufferEnd(interest) => ChangeNotification::BufferEnd(interest),
        }
    }
}

impl<T: fmt::Display> fmt::Display for ChangeNotification<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeNotification::Add(data)
            | ChangeNotification::Modify(data)
            | ChangeNotification::Delete(data) => write!(f, "{}({data})", self.kind()),
            ChangeNotification::BufferSentinel => f.write_str("buffer_sentinel"),
            ChangeNotification::BufferStart(interest) | ChangeNotification::BufferEnd(interest) => {
                write!(f, "{}({interest})", self.kind())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_covers_kind_payload_and_interest() {
        let vip = Interest::for_vip("testVip");

        assert_eq!(
            ChangeNotification::<u32>::BufferStart(vip.clone()),
            ChangeNotification::BufferStart(vip.clone())
        );
        assert_ne!(
            ChangeNotification::<u32>::BufferStart(vip.clone()),
            ChangeNotification::BufferEnd(vip.clone())
        );
        assert_ne!(
            ChangeNotification::<u32>::BufferStart(vip),
            ChangeNotification::BufferStart(Interest::for_vip("other"))
        );
        assert_ne!(ChangeNotification::Add(1), ChangeNotification::Modify(1));
        assert_ne!(ChangeNotification::Add(1), ChangeNotification::Add(2));
    }

    #[test]
    fn classification_helpers_agree_with_kind() {
        let add = ChangeNotification::Delete("x");
        assert!(add.is_change());
        assert!(!add.is_delimiter());
        assert_eq!(add.data(), Some(&"x"));
        assert_eq!(add.into_data(), Some("x"));

        let sentinel = ChangeNotification::<&str>::BufferSentinel;
        assert!(sentinel.is_sentinel());
        assert!(!sentinel.is_change());
        assert_eq!(sentinel.delimiter_interest(), None);

        let end = ChangeNotification::<&str>::BufferEnd(Interest::full_registry());
        assert!(end.is_delimiter());
        assert_eq!(end.delimiter_interest(), Some(&Interest::FullRegistry));
        assert_eq!(end.kind().as_str(), "buffer_end");
        assert_eq!(end.into_data(), None);
    }

    #[test]
    fn map_preserves_shape() {
        assert_eq!(
            ChangeNotification::Modify(2).map(|n| n * 10),
            ChangeNotification::Modify(20)
        );
        assert_eq!(
            ChangeNotification::<i32>::BufferSentinel.map(|n| n + 1),
            ChangeNotification::BufferSentinel
        );
    }

    #[test]
    fn display_renders_kind_and_payload() {
        assert_eq!(ChangeNotification::Add("a").to_string(), "add(a)");
        assert_eq!(
            ChangeNotification::<&str>::BufferStart(Interest::for_vip("v")).to_string(),
            "buffer_start(vip=v)"
        );
    }
}
