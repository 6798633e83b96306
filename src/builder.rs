//! Typed fluent interface over an [`ElementChain`].
//!
//! Which operations are available depends on the position in the chain:
//!
//! ```text
//! Root ──┬─ not() ─► Negation ─► criterion ─┐
//!        └─ criterion ──────────────────────┤
//!                                           ▼
//!                               CriterionElement ── and()/or() ─► Group
//!                                                                   │
//!                               (Group offers the same as Root) ◄───┘
//! ```
//!
//! Handles are cheap to clone and all point into one shared chain. Using a
//! handle whose element already has a child fails with
//! [`FilterError::ChildAlreadySet`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::element::{Criterion, ElementChain, ElementKind, Node, NodeId};
use crate::error::FilterError;
use crate::filter::{FilterDocument, TestFilter};

#[derive(Debug, Clone)]
struct Cursor {
    chain: Rc<RefCell<ElementChain>>,
    id: NodeId,
}

impl Cursor {
    fn new_root() -> Self {
        let chain = ElementChain::new();
        let id = chain.root();
        Self {
            chain: Rc::new(RefCell::new(chain)),
            id,
        }
    }

    fn attach(&self, node: Node) -> Result<Cursor, FilterError> {
        let id = self.chain.borrow_mut().attach(node)?;
        Ok(Cursor {
            chain: Rc::clone(&self.chain),
            id,
        })
    }

    fn attach_structural(&self, kind: ElementKind) -> Result<Cursor, FilterError> {
        self.attach(Node::structural(kind, Some(self.id))?)
    }

    fn attach_criterion(&self, criterion: Criterion) -> Result<Cursor, FilterError> {
        self.attach(Node::criterion(Some(self.id), criterion)?)
    }
}

/// Any element of a chain; the compiler accepts these as leaves.
pub trait ChainElement {
    /// Runs `f` against the chain this element lives in and its own id.
    fn with_chain<R>(&self, f: impl FnOnce(&ElementChain, NodeId) -> R) -> R;

    fn node_id(&self) -> NodeId {
        self.with_chain(|_, id| id)
    }

    /// The element's kind, or `None` if the id is not part of the chain.
    fn kind(&self) -> Option<ElementKind> {
        self.with_chain(|chain, id| chain.get(id).map(Node::kind))
    }

    /// Whether this element's `child` slot is still free.
    fn is_leaf(&self) -> bool {
        self.with_chain(|chain, id| chain.get(id).is_some_and(|node| node.child().is_none()))
    }
}

/// Elements that can be followed by a criterion.
pub trait ExtendWithCriterion {
    /// Makes `criterion` this element's child and returns the new leaf.
    fn attach_criterion(&self, criterion: Criterion) -> Result<CriterionElement, FilterError>;

    fn id<I, S>(&self, test_ids: I) -> Result<CriterionElement, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.attach_criterion(Criterion::ids(test_ids)?)
    }

    fn test(&self, name: &str, is_regex: bool) -> Result<CriterionElement, FilterError> {
        self.attach_criterion(Criterion::new(ElementKind::Test, name, is_regex)?)
    }

    fn category(&self, name: &str, is_regex: bool) -> Result<CriterionElement, FilterError> {
        self.attach_criterion(Criterion::new(ElementKind::Category, name, is_regex)?)
    }

    fn class(&self, name: &str, is_regex: bool) -> Result<CriterionElement, FilterError> {
        self.attach_criterion(Criterion::new(ElementKind::Class, name, is_regex)?)
    }

    fn method(&self, name: &str, is_regex: bool) -> Result<CriterionElement, FilterError> {
        self.attach_criterion(Criterion::new(ElementKind::Method, name, is_regex)?)
    }

    fn namespace(&self, name: &str, is_regex: bool) -> Result<CriterionElement, FilterError> {
        self.attach_criterion(Criterion::new(ElementKind::Namespace, name, is_regex)?)
    }

    fn property(
        &self,
        name: &str,
        value: &str,
        is_regex: bool,
    ) -> Result<CriterionElement, FilterError> {
        self.attach_criterion(Criterion::property(name, value, is_regex)?)
    }

    /// Free-form match on the full test name.
    fn name(&self, pattern: &str, is_regex: bool) -> Result<CriterionElement, FilterError> {
        self.attach_criterion(Criterion::new(ElementKind::Name, pattern, is_regex)?)
    }
}

/// Points where a fresh sub-expression may begin, optionally negated.
pub trait ElementCollection: ExtendWithCriterion {
    fn not(&self) -> Result<Negation, FilterError>;
}

/// Elements that can be followed by a connector.
pub trait ExtendWithConnector {
    fn and(&self) -> Result<Group, FilterError>;
    fn or(&self) -> Result<Group, FilterError>;
}

/// The start of a chain.
#[derive(Debug, Clone)]
pub struct Root {
    cursor: Cursor,
}

impl Root {
    pub(crate) fn new() -> Self {
        Self {
            cursor: Cursor::new_root(),
        }
    }

    /// Whether both handles refer to the same chain.
    pub fn ptr_eq(&self, other: &Root) -> bool {
        Rc::ptr_eq(&self.cursor.chain, &other.cursor.chain)
    }
}

/// The element following an `and()` or `or()` link.
#[derive(Debug, Clone)]
pub struct Group {
    cursor: Cursor,
}

/// A negation; it wraps exactly one criterion.
#[derive(Debug, Clone)]
pub struct Negation {
    cursor: Cursor,
}

/// A criterion leaf.
#[derive(Debug, Clone)]
pub struct CriterionElement {
    cursor: Cursor,
}

impl CriterionElement {
    /// A copy of the predicate held by this element.
    pub fn criterion(&self) -> Option<Criterion> {
        self.with_chain(|chain, id| chain.get(id).and_then(Node::criterion_ref).cloned())
    }

    /// Compiles the chain ending at this element.
    pub fn build(&self) -> Result<FilterDocument, FilterError> {
        TestFilter::build(self)
    }
}

impl ChainElement for Root {
    fn with_chain<R>(&self, f: impl FnOnce(&ElementChain, NodeId) -> R) -> R {
        f(&self.cursor.chain.borrow(), self.cursor.id)
    }
}

impl ChainElement for Group {
    fn with_chain<R>(&self, f: impl FnOnce(&ElementChain, NodeId) -> R) -> R {
        f(&self.cursor.chain.borrow(), self.cursor.id)
    }
}

impl ChainElement for Negation {
    fn with_chain<R>(&self, f: impl FnOnce(&ElementChain, NodeId) -> R) -> R {
        f(&self.cursor.chain.borrow(), self.cursor.id)
    }
}

impl ChainElement for CriterionElement {
    fn with_chain<R>(&self, f: impl FnOnce(&ElementChain, NodeId) -> R) -> R {
        f(&self.cursor.chain.borrow(), self.cursor.id)
    }
}

impl ExtendWithCriterion for Root {
    fn attach_criterion(&self, criterion: Criterion) -> Result<CriterionElement, FilterError> {
        let cursor = self.cursor.attach_criterion(criterion)?;
        Ok(CriterionElement { cursor })
    }
}

impl ExtendWithCriterion for Group {
    fn attach_criterion(&self, criterion: Criterion) -> Result<CriterionElement, FilterError> {
        let cursor = self.cursor.attach_criterion(criterion)?;
        Ok(CriterionElement { cursor })
    }
}

impl ExtendWithCriterion for Negation {
    fn attach_criterion(&self, criterion: Criterion) -> Result<CriterionElement, FilterError> {
        let cursor = self.cursor.attach_criterion(criterion)?;
        Ok(CriterionElement { cursor })
    }
}

impl ElementCollection for Root {
    fn not(&self) -> Result<Negation, FilterError> {
        let cursor = self.cursor.attach_structural(ElementKind::Not)?;
        Ok(Negation { cursor })
    }
}

impl ElementCollection for Group {
    fn not(&self) -> Result<Negation, FilterError> {
        let cursor = self.cursor.attach_structural(ElementKind::Not)?;
        Ok(Negation { cursor })
    }
}

impl ExtendWithConnector for CriterionElement {
    fn and(&self) -> Result<Group, FilterError> {
        let cursor = self.cursor.attach_structural(ElementKind::And)?;
        Ok(Group { cursor })
    }

    fn or(&self) -> Result<Group, FilterError> {
        let cursor = self.cursor.attach_structural(ElementKind::Or)?;
        Ok(Group { cursor })
    }
}
