//! The token definition for filter documents.

/// A token is a single unit of the document, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Tags
    OpenTag(&'a str),  // "<name"
    CloseTag(&'a str), // "</name>"
    TagEnd,            // ">"
    SelfClose,         // "/>"

    // Attributes
    AttrName(&'a str),
    Eq,              // =
    String(&'a str), // The quoted value, without quotes and still escaped

    // Character data between tags, still escaped
    Text(&'a str),

    // Special
    Illegal, // An illegal/unknown character
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}
