//! 兴趣（Interest）谓词模型。
//!
//! # 模块定位（Why）
//! - 客户端通过兴趣表达“我关心哪些实例”，例如“VIP `testVip` 背后的全部实例”；注册中心据此向上游建立订阅，
//!   并在批次边界上为 `BufferStart`/`BufferEnd` 打上兴趣标记。
//! - 兴趣需要可比较：两个值相等当且仅当它们选中同一逻辑实例集合。为此所有并集在构造时即被规范化。
//!
//! # 结构说明（What）
//! - [`Pattern`]：匹配运算符（精确 / 正则）+ 原始文本；正则在构造时编译并整串锚定。
//! - [`Interest`]：全量、空集、按应用 / VIP / 安全 VIP / 实例 ID 选择，以及两个以上兴趣的并集。
//! - [`InterestSet`]：并集的规范化成员表，只能经由 [`Interest::for_some`] 构造。
//!
//! # 规范化规则（How）
//! - 并集被展开（嵌套并集合并到同一层）、移除空集、排序并去重；
//! - 含 `FullRegistry` 的并集折叠为 `FullRegistry`；零个成员折叠为 `Empty`，单个成员折叠为该成员本身。

use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use regex::Regex;

use crate::{error::InterestError, instance::InstanceInfo};

/// 属性匹配运算符。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchOperator {
    /// 与属性值逐字节相等。
    Equals,
    /// 正则表达式需匹配整个属性值。
    Like,
}

/// 单个属性的匹配模式。
///
/// # 教案式说明
/// - **意图 (Why)**：`Like` 模式在每次匹配时重新编译代价过高，因此在构造时一次性编译并随值共享。
/// - **契约 (What)**：相等、排序与哈希只依据运算符与原始文本，编译产物不参与比较；
///   因此同一文本构造出的两个模式总是相等。
/// - **风险 (Trade-offs)**：语义等价但文本不同的正则（如 `a+` 与 `aa*`）会被视为不同兴趣，
///   这与上游按文本去重订阅的行为一致。
#[derive(Clone, Debug)]
pub struct Pattern {
    operator: MatchOperator,
    text: Arc<str>,
    regex: Option<Regex>,
}

impl Pattern {
    /// 构造精确匹配模式。
    pub fn equals(text: impl Into<Arc<str>>) -> Self {
        Self {
            operator: MatchOperator::Equals,
            text: text.into(),
            regex: None,
        }
    }

    /// 构造正则匹配模式；表达式会被整串锚定。
    pub fn like(text: impl Into<Arc<str>>) -> Result<Self, InterestError> {
        let text = text.into();
        let regex = Regex::new(&format!("^(?:{text})$")).map_err(|source| {
            InterestError::InvalidPattern {
                pattern: text.to_string(),
                source,
            }
        })?;
        Ok(Self {
            operator: MatchOperator::Like,
            text,
            regex: Some(regex),
        })
    }

    pub fn operator(&self) -> MatchOperator {
        self.operator
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// 判断属性值是否命中；缺省属性永不命中。
    pub fn matches(&self, value: Option<&str>) -> bool {
        let Some(value) = value else {
            return false;
        };
        match (&self.operator, &self.regex) {
            (MatchOperator::Like, Some(regex)) => regex.is_match(value),
            _ => value == &*self.text,
        }
    }

    fn key(&self) -> (MatchOperator, &str) {
        (self.operator, &self.text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Pattern {}

impl Hash for Pattern {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Pattern {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Pattern {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operator {
            MatchOperator::Equals => write!(f, "={}", self.text),
            MatchOperator::Like => write!(f, "~{}", self.text),
        }
    }
}

/// 规范化后的并集成员表：至少两个成员、有序、无重复、不含空集/全量/嵌套并集。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterestSet(Arc<[Interest]>);

impl InterestSet {
    pub fn iter(&self) -> impl Iterator<Item = &Interest> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 规范化后恒为 `false`。
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 实例选择谓词。
///
/// # 教案式说明
/// - **意图 (Why)**：作为订阅键与批次标记的作用域；`BufferStart(I)`/`BufferEnd(I)` 中的 `I` 即订阅时的兴趣。
/// - **契约 (What)**：
///   - 不可变、克隆廉价（内部共享 `Arc`）；
///   - 实现 `Eq + Hash + Ord`，可直接作为映射键或排序；
///   - `Multiple` 只能经由 [`Interest::for_some`] 构造，从而保证“相等即同一集合”的规范化约束。
/// - **设计权衡 (Trade-offs)**：规范化只做结构层面的折叠，不尝试证明两个正则选中同一集合。
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Interest {
    /// 不选中任何实例。
    Empty,
    /// 选中全部实例。
    FullRegistry,
    Application(Pattern),
    Vip(Pattern),
    SecureVip(Pattern),
    Instance(Pattern),
    /// 两个及以上兴趣的并集。
    Multiple(InterestSet),
}

impl Interest {
    pub fn empty() -> Self {
        Interest::Empty
    }

    pub fn full_registry() -> Self {
        Interest::FullRegistry
    }

    pub fn for_application(name: impl Into<Arc<str>>) -> Self {
        Interest::Application(Pattern::equals(name))
    }

    pub fn for_applications<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self::for_some(names.into_iter().map(Self::for_application))
    }

    pub fn for_application_like(regex: impl Into<Arc<str>>) -> Result<Self, InterestError> {
        Pattern::like(regex).map(Interest::Application)
    }

    pub fn for_vip(vip: impl Into<Arc<str>>) -> Self {
        Interest::Vip(Pattern::equals(vip))
    }

    pub fn for_vips<I, S>(vips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self::for_some(vips.into_iter().map(Self::for_vip))
    }

    pub fn for_vip_like(regex: impl Into<Arc<str>>) -> Result<Self, InterestError> {
        Pattern::like(regex).map(Interest::Vip)
    }

    pub fn for_secure_vip(vip: impl Into<Arc<str>>) -> Self {
        Interest::SecureVip(Pattern::equals(vip))
    }

    pub fn for_secure_vips<I, S>(vips: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self::for_some(vips.into_iter().map(Self::for_secure_vip))
    }

    pub fn for_secure_vip_like(regex: impl Into<Arc<str>>) -> Result<Self, InterestError> {
        Pattern::like(regex).map(Interest::SecureVip)
    }

    pub fn for_instance(id: impl Into<Arc<str>>) -> Self {
        Interest::Instance(Pattern::equals(id))
    }

    pub fn for_instances<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self::for_some(ids.into_iter().map(Self::for_instance))
    }

    pub fn for_instance_like(regex: impl Into<Arc<str>>) -> Result<Self, InterestError> {
        Pattern::like(regex).map(Interest::Instance)
    }

    /// 构造并集，并按模块文档中的规则完成规范化。
    ///
    /// - **输入**：任意数量的兴趣，允许包含空集、全量与嵌套并集；
    /// - **输出**：规范化后的单一兴趣；结果与输入顺序、重复次数无关。
    pub fn for_some<I>(interests: I) -> Self
    where
        I: IntoIterator<Item = Interest>,
    {
        let mut members = Vec::new();
        for interest in interests {
            match interest {
                Interest::FullRegistry => return Interest::FullRegistry,
                Interest::Empty => {}
                Interest::Multiple(set) => members.extend(set.iter().cloned()),
                single => members.push(single),
            }
        }
        members.sort();
        members.dedup();

        if members.len() > 1 {
            Interest::Multiple(InterestSet(members.into()))
        } else {
            members.pop().unwrap_or(Interest::Empty)
        }
    }

    /// 判断实例是否落在兴趣选中的集合内。
    pub fn matches(&self, info: &InstanceInfo) -> bool {
        match self {
            Interest::Empty => false,
            Interest::FullRegistry => true,
            Interest::Application(pattern) => pattern.matches(info.app()),
            Interest::Vip(pattern) => pattern.matches(info.vip_address()),
            Interest::SecureVip(pattern) => pattern.matches(info.secure_vip_address()),
            Interest::Instance(pattern) => pattern.matches(Some(info.id())),
            Interest::Multiple(set) => set.iter().any(|member| member.matches(info)),
        }
    }
}

impl fmt::Display for Interest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interest::Empty => f.write_str("none"),
            Interest::FullRegistry => f.write_str("full-registry"),
            Interest::Application(pattern) => write!(f, "app{pattern}"),
            Interest::Vip(pattern) => write!(f, "vip{pattern}"),
            Interest::SecureVip(pattern) => write!(f, "secure-vip{pattern}"),
            Interest::Instance(pattern) => write!(f, "instance{pattern}"),
            Interest::Multiple(set) => {
                f.write_str("[")?;
                for (index, member) in set.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{member}")?;
                }
                f.write_str("]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceInfo;

    fn instance() -> InstanceInfo {
        InstanceInfo::builder("i-42")
            .app("billing")
            .vip_address("billing-vip")
            .build()
    }

    #[test]
    fn union_is_order_and_duplicate_insensitive() {
        let a = Interest::for_vip("a");
        let b = Interest::for_vip("b");

        assert_eq!(
            Interest::for_some([a.clone(), b.clone()]),
            Interest::for_some([b.clone(), a.clone(), a.clone()])
        );
        assert_eq!(Interest::for_vips(["b", "a"]), Interest::for_vips(["a", "b", "b"]));
    }

    #[test]
    fn union_collapses_degenerate_shapes() {
        let a = Interest::for_vip("a");

        assert_eq!(
            Interest::for_some([a.clone(), Interest::full_registry()]),
            Interest::FullRegistry
        );
        assert_eq!(Interest::for_some(Vec::new()), Interest::Empty);
        assert_eq!(Interest::for_some([a.clone(), Interest::empty()]), a);
        assert_eq!(Interest::for_vips(["a", "a"]), a);
    }

    #[test]
    fn nested_unions_are_flattened() {
        let ab = Interest::for_vips(["a", "b"]);
        let nested = Interest::for_some([ab, Interest::for_vip("c")]);
        assert_eq!(nested, Interest::for_vips(["a", "b", "c"]));
        match nested {
            Interest::Multiple(set) => assert_eq!(set.len(), 3),
            other => panic!("并集应保持 Multiple 形态，实际为 {other}"),
        }
    }

    #[test]
    fn matching_follows_attribute_and_operator() {
        let info = instance();

        assert!(Interest::for_vip("billing-vip").matches(&info));
        assert!(!Interest::for_vip("billing").matches(&info));
        assert!(Interest::for_application_like("bill.*").unwrap().matches(&info));
        assert!(!Interest::for_application_like("bill").unwrap().matches(&info));
        assert!(Interest::for_instance("i-42").matches(&info));
        assert!(!Interest::for_secure_vip("billing-vip").matches(&info));
        assert!(Interest::full_registry().matches(&info));
        assert!(!Interest::empty().matches(&info));
        assert!(Interest::for_vips(["other", "billing-vip"]).matches(&info));
    }

    #[test]
    fn pattern_reports_operator_and_text() {
        let exact = Pattern::equals("billing");
        let like = Pattern::like("bill.*").unwrap();

        assert_eq!(exact.operator(), MatchOperator::Equals);
        assert_eq!(like.operator(), MatchOperator::Like);
        assert_eq!(like.as_str(), "bill.*");
        assert_ne!(exact, Pattern::like("billing").unwrap(), "运算符参与相等性");
    }

    #[test]
    fn invalid_regex_is_reported() {
        let err = Interest::for_vip_like("(unclosed").unwrap_err();
        assert_eq!(err.code(), "interest.pattern.invalid");
        assert!(err.to_string().contains("(unclosed"));
    }

    #[test]
    fn display_is_stable() {
        assert_eq!(Interest::for_vip("testVip").to_string(), "vip=testVip");
        assert_eq!(
            Interest::for_some([
                Interest::for_application_like("web-.*").unwrap(),
                Interest::for_vip("testVip"),
            ])
            .to_string(),
            "[app~web-.*, vip=testVip]"
        );
    }
}
