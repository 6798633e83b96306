//! 过滤文档的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   ├─ parse_element()            (递归下降, 先构建通用的标签树)
//!   │    ├─ 期望 OpenTag "<name"
//!   │    ├─ 解析属性 name="value" (可多个, 不允许重复)
//!   │    ├─ "/>" → 空元素, 结束
//!   │    ├─ ">"  → 解析内容
//!   │    │         ├─ OpenTag → 递归调用 parse_element()
//!   │    │         └─ Text    → 累积文本 (还原实体引用)
//!   │    └─ 期望 CloseTag "</name>", 名称必须匹配
//!   │
//!   └─ filter_selection()         (将标签树转换为 Selection)
//!        ├─ <filter />        → All
//!        ├─ <filter>x</filter> → x
//!        ├─ <filter>x y</filter> → And([x, y])
//!        └─ selection()
//!             ├─ <and>/<or>  → And/Or (至少一个子元素)
//!             ├─ <not>       → Not (恰好一个子元素)
//!             ├─ <id>        → Ids (逗号分隔)
//!             └─ 其他条件     → Match
//! ```
//!
//! ## 支持的语法结构
//!
//! ```text
//! <filter><or><and><cat>cat1</cat><prop re="1" name="prop2">value2</prop></and><not><id>id3,id4</id></not></or></filter>
//! ```
//!
//! - **条件元素**: `id`, `test`, `cat`, `class`, `method`, `namespace`, `prop`, `name`
//! - **正则标记**: `re="1"`
//! - **属性条件**: `<prop name="属性名">属性值</prop>`
//! - **逻辑元素**: `and`, `or`, `not`
//!
//! 标签之间的空白文本会被忽略。元素嵌套深度不得超过 [`MAX_NESTING`]。

use thiserror::Error;

use crate::ast::{Matcher, Selection};
use crate::element::ElementKind;
use crate::lexer::unescape;
use crate::token::{Span, Token, TokenKind};

/// 元素的最大嵌套深度 (含根元素)
pub const MAX_NESTING: usize = 256;

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    depth: usize,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    fn new(message: String, span: Option<Span>) -> Self {
        Self { message, span }
    }

    fn at_position(message: String, span: Span) -> Self {
        Self {
            message,
            span: Some(span),
        }
    }
}

/// 通用的标签树节点, 解析的中间结果
#[derive(Debug)]
struct Markup<'a> {
    name: &'a str,
    span: Span,
    attributes: Vec<(&'a str, String)>,
    children: Vec<Markup<'a>>,
    text: String,
}

impl<'a> Markup<'a> {
    fn new(name: &'a str, span: Span) -> Self {
        Self {
            name,
            span,
            attributes: Vec::new(),
            children: Vec::new(),
            text: String::new(),
        }
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(attr, _)| *attr == name)
            .map(|(_, value)| value.as_str())
    }

    fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, expected: TokenKind) -> Result<&'a Token<'a>, ParseError> {
        match self.peek() {
            Some(token)
                if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) =>
            {
                self.position += 1;
                Ok(token)
            }
            Some(token) => Err(ParseError::at_position(
                format!("Expected {:?}, found {:?}", expected, token.kind),
                token.span,
            )),
            None => Err(ParseError::new(
                format!("Expected {:?}, but reached end of input", expected),
                None,
            )),
        }
    }

    /// 跳过仅包含空白的文本 token
    fn skip_blank_text(&mut self) {
        while let Some(Token {
            kind: TokenKind::Text(text),
            ..
        }) = self.peek()
        {
            if !text.trim().is_empty() {
                break;
            }
            self.position += 1;
        }
    }

    pub fn parse(&mut self) -> Result<Selection, ParseError> {
        self.skip_blank_text();
        let root = self.parse_element()?;
        self.skip_blank_text();

        if let Some(token) = self.peek() {
            return Err(ParseError::at_position(
                format!("Unexpected content after the root element: {:?}", token.kind),
                token.span,
            ));
        }

        let selection = filter_selection(&root)?;
        tracing::debug!(
            criteria = selection.criteria_count(),
            "parsed filter document"
        );
        Ok(selection)
    }

    /// 解析一个元素, 超过最大嵌套深度时返回错误
    fn parse_element(&mut self) -> Result<Markup<'a>, ParseError> {
        if self.depth >= MAX_NESTING {
            return Err(ParseError::new(
                format!("Elements are nested deeper than {} levels", MAX_NESTING),
                self.peek().map(|token| token.span),
            ));
        }
        self.depth += 1;
        let element = self.parse_markup();
        self.depth -= 1;
        element
    }

    fn parse_markup(&mut self) -> Result<Markup<'a>, ParseError> {
        let open = self.expect(TokenKind::OpenTag(""))?;
        let TokenKind::OpenTag(name) = open.kind else {
            return Err(ParseError::at_position(
                "Expected element name".to_string(),
                open.span,
            ));
        };
        let mut element = Markup::new(name, open.span);

        // 解析属性, 直到 ">" 或 "/>"
        loop {
            let Some(token) = self.advance() else {
                return Err(ParseError::new(
                    format!("Unterminated <{}> tag", name),
                    None,
                ));
            };
            match token.kind {
                TokenKind::AttrName(attr) => {
                    self.expect(TokenKind::Eq)?;
                    let value = self.expect(TokenKind::String(""))?;
                    let TokenKind::String(raw) = value.kind else {
                        return Err(ParseError::at_position(
                            "Expected attribute value".to_string(),
                            value.span,
                        ));
                    };
                    if element.attribute(attr).is_some() {
                        return Err(ParseError::at_position(
                            format!("Duplicate attribute '{}' on <{}>", attr, name),
                            token.span,
                        ));
                    }
                    element.attributes.push((attr, unescape(raw).into_owned()));
                }
                TokenKind::SelfClose => return Ok(element),
                TokenKind::TagEnd => break,
                ref other => {
                    return Err(ParseError::at_position(
                        format!("Unexpected {:?} inside <{}> tag", other, name),
                        token.span,
                    ));
                }
            }
        }

        // 解析内容, 直到匹配的结束标签
        loop {
            let Some(token) = self.peek() else {
                return Err(ParseError::new(
                    format!("Missing closing tag </{}>", name),
                    None,
                ));
            };
            match token.kind {
                TokenKind::OpenTag(_) => {
                    let child = self.parse_element()?;
                    element.children.push(child);
                }
                TokenKind::Text(raw) => {
                    self.advance(); // 消费文本
                    element.text.push_str(&unescape(raw));
                }
                TokenKind::CloseTag(closing) => {
                    if closing != name {
                        return Err(ParseError::at_position(
                            format!("Expected </{}>, found </{}>", name, closing),
                            token.span,
                        ));
                    }
                    self.advance(); // 消费结束标签
                    return Ok(element);
                }
                ref other => {
                    return Err(ParseError::at_position(
                        format!("Unexpected {:?} inside <{}>", other, name),
                        token.span,
                    ));
                }
            }
        }
    }
}

/// 根元素必须是 `<filter>`, 多个子元素视为 AND
fn filter_selection(root: &Markup) -> Result<Selection, ParseError> {
    if root.name != ElementKind::Root.tag() {
        return Err(ParseError::at_position(
            format!("Expected <filter> root element, found <{}>", root.name),
            root.span,
        ));
    }
    reject_attributes(root)?;
    reject_text(root)?;

    let mut members = child_selections(root)?;
    if members.len() > 1 {
        Ok(Selection::And(members))
    } else {
        Ok(members.pop().unwrap_or(Selection::All))
    }
}

fn child_selections(element: &Markup) -> Result<Vec<Selection>, ParseError> {
    element.children.iter().map(selection).collect()
}

fn selection(element: &Markup) -> Result<Selection, ParseError> {
    let Some(kind) = ElementKind::from_tag(element.name) else {
        return Err(ParseError::at_position(
            format!("Unknown element <{}>", element.name),
            element.span,
        ));
    };

    match kind {
        ElementKind::Root => Err(ParseError::at_position(
            "<filter> may only appear as the root element".to_string(),
            element.span,
        )),
        ElementKind::And | ElementKind::Or => {
            reject_attributes(element)?;
            reject_text(element)?;
            let members = child_selections(element)?;
            if members.is_empty() {
                return Err(ParseError::at_position(
                    format!("<{}> must contain at least one element", element.name),
                    element.span,
                ));
            }
            if kind == ElementKind::And {
                Ok(Selection::And(members))
            } else {
                Ok(Selection::Or(members))
            }
        }
        ElementKind::Not => {
            reject_attributes(element)?;
            reject_text(element)?;
            let mut members = child_selections(element)?;
            match (members.pop(), members.is_empty()) {
                (Some(inner), true) => Ok(Selection::Not(Box::new(inner))),
                _ => Err(ParseError::at_position(
                    "<not> must contain exactly one element".to_string(),
                    element.span,
                )),
            }
        }
        ElementKind::Id => {
            reject_attributes(element)?;
            reject_children(element)?;
            let ids: Vec<String> = element
                .text
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect();
            if ids.is_empty() {
                return Err(ParseError::at_position(
                    "<id> must list at least one test id".to_string(),
                    element.span,
                ));
            }
            Ok(Selection::Ids(ids))
        }
        kind => criterion_selection(kind, element),
    }
}

fn criterion_selection(kind: ElementKind, element: &Markup) -> Result<Selection, ParseError> {
    reject_children(element)?;
    if !element.has_text() {
        return Err(ParseError::at_position(
            format!("<{}> must not be empty", element.name),
            element.span,
        ));
    }

    let mut is_regex = false;
    let mut property = None;
    for (attr, value) in &element.attributes {
        match *attr {
            "re" if value == "1" => is_regex = true,
            "re" => {
                return Err(ParseError::at_position(
                    format!("Expected re=\"1\", found re=\"{}\"", value),
                    element.span,
                ));
            }
            "name" if kind == ElementKind::Property => property = Some(value.clone()),
            other => {
                return Err(ParseError::at_position(
                    format!("Unexpected attribute '{}' on <{}>", other, element.name),
                    element.span,
                ));
            }
        }
    }

    let has_property_name = matches!(property.as_deref(), Some(name) if !name.trim().is_empty());
    if kind == ElementKind::Property && !has_property_name {
        return Err(ParseError::at_position(
            "<prop> requires a non-empty name attribute".to_string(),
            element.span,
        ));
    }

    Ok(Selection::Match(Matcher {
        kind,
        pattern: element.text.clone(),
        is_regex,
        property,
    }))
}

fn reject_attributes(element: &Markup) -> Result<(), ParseError> {
    match element.attributes.first() {
        Some((attr, _)) => Err(ParseError::at_position(
            format!("Unexpected attribute '{}' on <{}>", attr, element.name),
            element.span,
        )),
        None => Ok(()),
    }
}

fn reject_text(element: &Markup) -> Result<(), ParseError> {
    if element.has_text() {
        return Err(ParseError::at_position(
            format!("Unexpected text inside <{}>", element.name),
            element.span,
        ));
    }
    Ok(())
}

fn reject_children(element: &Markup) -> Result<(), ParseError> {
    match element.children.first() {
        Some(child) => Err(ParseError::at_position(
            format!("Unexpected element <{}> inside <{}>", child.name, element.name),
            child.span,
        )),
        None => Ok(()),
    }
}
