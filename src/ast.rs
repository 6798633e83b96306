use serde::Serialize;

use crate::element::ElementKind;

/// 选择树的节点, 由过滤文档解析而来, 交给测试选择引擎使用
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Selection {
    /// 空过滤器 `<filter />`, 匹配所有测试
    All,
    /// 逻辑与运算 (AND), `<filter>` 下的多个子元素也视为 AND
    And(Vec<Selection>),
    /// 逻辑或运算 (OR)
    Or(Vec<Selection>),
    /// 逻辑非运算 (NOT)
    Not(Box<Selection>),
    /// 按测试ID精确匹配, 例如：`<id>id1,id2</id>`
    Ids(Vec<String>),
    /// 单个条件, 这是选择树的叶子节点
    Match(Matcher),
}

/// 代表一个条件元素, 例如：`<cat re="1">Slow.*</cat>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Matcher {
    pub kind: ElementKind,
    /// 匹配的名称或正则表达式；对于 `prop` 则是属性值
    pub pattern: String,
    pub is_regex: bool,
    /// 仅 `prop` 元素有此字段：属性名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<String>,
}

impl Selection {
    /// 统计叶子条件的数量
    pub fn criteria_count(&self) -> usize {
        match self {
            Selection::All => 0,
            Selection::And(members) | Selection::Or(members) => {
                members.iter().map(Selection::criteria_count).sum()
            }
            Selection::Not(inner) => inner.criteria_count(),
            Selection::Ids(_) | Selection::Match(_) => 1,
        }
    }

    /// 转换为JSON, 供外部选择引擎使用
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
