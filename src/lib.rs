//! Fluent builder and compiler for test-selection filter documents.
//!
//! A filter is assembled top-down through a typed fluent interface
//! ([`TestFilter::builder`]) and compiled bottom-up into the document text
//! consumed by the test-selection engine (`<filter>…</filter>`). The text can
//! be parsed back into a [`Selection`] tree for the engine.

pub mod ast;
pub mod builder;
pub mod compiler;
pub mod config;
pub mod element;
pub mod error;
pub mod filter;
pub mod lexer;
pub mod parser;
pub mod script;
pub mod sequence;
pub mod token;

pub use ast::{Matcher, Selection};
pub use builder::{
    ChainElement, CriterionElement, ElementCollection, ExtendWithConnector, ExtendWithCriterion,
    Group, Negation, Root,
};
pub use element::{Criterion, ElementChain, ElementKind, Node, NodeId, Render};
pub use error::FilterError;
pub use filter::{EmptyFilter, FilterDocument, TestFilter};
pub use parser::ParseError;
pub use sequence::ElementSequence;
