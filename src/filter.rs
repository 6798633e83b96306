//! Public entry point: fresh builders, the cached empty filter and compilation.
//!
//! ```
//! use test_filter::{ExtendWithConnector, ExtendWithCriterion, TestFilter};
//!
//! let document = TestFilter::builder()
//!     .category("cat1", false)?
//!     .and()?
//!     .property("prop2", "value2", true)?
//!     .build()?;
//! assert_eq!(
//!     document.text(),
//!     r#"<filter><cat>cat1</cat><prop re="1" name="prop2">value2</prop></filter>"#
//! );
//! # Ok::<(), test_filter::FilterError>(())
//! ```

use std::fmt;
use std::sync::OnceLock;

use serde::Serialize;

use crate::ast::Selection;
use crate::builder::{ChainElement, Root};
use crate::compiler;
use crate::element::{ElementChain, ElementKind, NodeId};
use crate::error::FilterError;
use crate::lexer::Lexer;
use crate::parser::{ParseError, Parser};

/// Namespace for the facade operations.
pub struct TestFilter;

impl TestFilter {
    /// The process-wide match-all filter, built on first use.
    pub fn empty() -> &'static EmptyFilter {
        static EMPTY: OnceLock<EmptyFilter> = OnceLock::new();
        EMPTY.get_or_init(EmptyFilter::new)
    }

    /// A new, unshared root to build a filter from.
    pub fn builder() -> Root {
        Root::new()
    }

    /// Compiles the chain ending at `leaf`.
    pub fn build<E: ChainElement + ?Sized>(leaf: &E) -> Result<FilterDocument, FilterError> {
        let body = leaf.with_chain(compiler::compile)?;
        Ok(FilterDocument::from_body(&body))
    }
}

/// A root without children; immutable, so it can only be compiled.
#[derive(Debug)]
pub struct EmptyFilter {
    chain: ElementChain,
    document: FilterDocument,
}

impl EmptyFilter {
    fn new() -> Self {
        Self {
            chain: ElementChain::new(),
            document: FilterDocument::from_body(""),
        }
    }

    pub fn document(&self) -> &FilterDocument {
        &self.document
    }
}

impl ChainElement for EmptyFilter {
    fn with_chain<R>(&self, f: impl FnOnce(&ElementChain, NodeId) -> R) -> R {
        f(&self.chain, self.chain.root())
    }
}

/// A compiled filter in the text form consumed by the selection engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FilterDocument {
    text: String,
}

impl FilterDocument {
    fn from_body(body: &str) -> Self {
        let tag = ElementKind::Root.tag();
        let text = if body.is_empty() {
            format!("<{tag} />")
        } else {
            format!("<{tag}>{body}</{tag}>")
        };
        Self { text }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The document without its outer `filter` element.
    pub fn inner(&self) -> &str {
        let tag = ElementKind::Root.tag();
        self.text
            .strip_prefix(&format!("<{tag}>"))
            .and_then(|rest| rest.strip_suffix(&format!("</{tag}>")))
            .unwrap_or("")
    }

    /// `true` for the match-all document.
    pub fn is_empty(&self) -> bool {
        self.inner().is_empty()
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Parses the text into the selection tree handed to the selection engine.
    pub fn parse(&self) -> Result<Selection, ParseError> {
        let tokens: Vec<_> = Lexer::new(&self.text).collect();
        Parser::new(&tokens).parse()
    }
}

impl fmt::Display for FilterDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for FilterDocument {
    fn as_ref(&self) -> &str {
        &self.text
    }
}
