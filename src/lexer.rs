//! 过滤文档的词法分析器

use std::borrow::Cow;

use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
    /// 是否位于标签内部（`<name` 与 `>` 或 `/>` 之间）
    in_tag: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            position: 0,
            in_tag: false,
        }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 跳过空白字符
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }

    /// 读取标签名或属性名
    /// 名称可以包含字母、数字、连字符、下划线和点
    fn read_name(&mut self) -> &'a str {
        let start = self.position;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                self.bump();
            } else {
                break;
            }
        }
        &self.input[start..self.position]
    }

    /// 读取双引号包围的属性值
    /// 注意：开始的引号已经被调用者消费
    fn read_string(&mut self, start: usize) -> Token<'a> {
        let content_start = self.position;
        while let Some(c) = self.peek() {
            if c == '"' {
                break;
            }
            self.bump();
        }
        let content_end = self.position;
        if self.bump().is_none() {
            // 缺少结束引号
            return self.token(TokenKind::Illegal, start);
        }

        let content = &self.input[content_start..content_end];
        self.token(TokenKind::String(content), start)
    }

    /// 读取标签之间的文本，直到下一个 `<` 或输入结束
    fn read_text(&mut self, start: usize) -> Token<'a> {
        while let Some(c) = self.peek() {
            if c == '<' {
                break;
            }
            self.bump();
        }
        self.token(TokenKind::Text(&self.input[start..self.position]), start)
    }

    /// 读取 `<name` 或 `</name>`
    /// 注意：`<` 已经被调用者消费
    fn read_tag(&mut self, start: usize) -> Token<'a> {
        if self.peek() == Some('/') {
            self.bump(); // 消费 '/'
            let name = self.read_name();
            self.skip_whitespace();
            if name.is_empty() || self.peek() != Some('>') {
                return self.token(TokenKind::Illegal, start);
            }
            self.bump(); // 消费 '>'
            return self.token(TokenKind::CloseTag(name), start);
        }

        let name = self.read_name();
        if name.is_empty() {
            return self.token(TokenKind::Illegal, start);
        }
        self.in_tag = true;
        self.token(TokenKind::OpenTag(name), start)
    }

    /// 标签内部：属性、`=`、属性值以及 `>` / `/>`
    fn next_in_tag(&mut self) -> Option<Token<'a>> {
        self.skip_whitespace();
        let start = self.position;
        let c = self.bump()?;

        let token = match c {
            '>' => {
                self.in_tag = false;
                self.token(TokenKind::TagEnd, start)
            }
            '/' if self.peek() == Some('>') => {
                self.bump();
                self.in_tag = false;
                self.token(TokenKind::SelfClose, start)
            }
            '=' => self.token(TokenKind::Eq, start),
            '"' => self.read_string(start),
            c if c.is_alphabetic() => {
                self.position = start;
                let name = self.read_name();
                self.token(TokenKind::AttrName(name), start)
            }
            _ => self.token(TokenKind::Illegal, start),
        };
        Some(token)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.in_tag {
            return self.next_in_tag();
        }

        let start = self.position;
        match self.peek()? {
            '<' => {
                self.bump();
                Some(self.read_tag(start))
            }
            _ => Some(self.read_text(start)),
        }
    }
}

/// 还原文本和属性值中的实体引用
/// 无法识别的实体按原样保留
pub fn unescape(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(index) = rest.find('&') {
        out.push_str(&rest[..index]);
        rest = &rest[index..];

        let decoded = rest
            .find(';')
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}
