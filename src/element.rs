//! Element model for filter chains.
//!
//! A chain is stored as an arena of [`Node`]s addressed by [`NodeId`]. Each
//! node owns at most one downstream link (`child`, assignable once) and keeps a
//! plain back-index to the node that created it (`parent`), which is only ever
//! used to validate the chain and to walk it upwards during compilation.

use std::fmt;

use serde::Serialize;

use crate::error::FilterError;

/// The kind of an element in a filter chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    // Structural
    Root,
    And,
    Or,
    Not,

    // Criteria
    Id,
    Test,
    Category,
    Class,
    Method,
    Namespace,
    Property,
    Name,
}

impl ElementKind {
    pub const STRUCTURAL: [ElementKind; 4] = [Self::Root, Self::And, Self::Or, Self::Not];

    pub const CRITERIA: [ElementKind; 8] = [
        Self::Id,
        Self::Test,
        Self::Category,
        Self::Class,
        Self::Method,
        Self::Namespace,
        Self::Property,
        Self::Name,
    ];

    /// The tag name used for this kind in the filter document.
    pub fn tag(self) -> &'static str {
        match self {
            Self::Root => "filter",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::Id => "id",
            Self::Test => "test",
            Self::Category => "cat",
            Self::Class => "class",
            Self::Method => "method",
            Self::Namespace => "namespace",
            Self::Property => "prop",
            Self::Name => "name",
        }
    }

    /// Inverse of [`ElementKind::tag`].
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::STRUCTURAL
            .into_iter()
            .chain(Self::CRITERIA)
            .find(|kind| kind.tag() == tag)
    }

    pub fn is_criterion(self) -> bool {
        !self.is_structural()
    }

    pub fn is_structural(self) -> bool {
        matches!(self, Self::Root | Self::And | Self::Or | Self::Not)
    }

    /// `true` for the two connectors that join links of a chain.
    pub fn is_connector(self) -> bool {
        matches!(self, Self::And | Self::Or)
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Anything that can write itself into a filter document.
pub trait Render {
    /// Tag name wrapping the rendering when `with_tag` is set.
    fn tag(&self) -> &str;

    /// Appends the rendering to `out`; without the tag only the body is written.
    fn render_into(&self, out: &mut String, with_tag: bool);

    fn render(&self, with_tag: bool) -> String {
        let mut out = String::new();
        self.render_into(&mut out, with_tag);
        out
    }
}

/// A single match predicate: the payload of every criterion element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Criterion {
    kind: ElementKind,
    name: String,
    value: Option<String>,
    is_regex: bool,
}

impl Criterion {
    /// Creates any criterion other than [`ElementKind::Property`] and [`ElementKind::Id`],
    /// which have their own constructors.
    pub fn new(kind: ElementKind, name: &str, is_regex: bool) -> Result<Self, FilterError> {
        match kind {
            ElementKind::Property | ElementKind::Id => {
                return Err(FilterError::out_of_range(
                    "kind",
                    format!("{kind:?} needs its dedicated constructor"),
                ));
            }
            kind if !kind.is_criterion() => {
                return Err(FilterError::out_of_range(
                    "kind",
                    format!("{kind:?} is not a criterion kind"),
                ));
            }
            _ => {}
        }

        Ok(Self {
            kind,
            name: require_text("name", name)?,
            value: None,
            is_regex,
        })
    }

    /// A property criterion: `name` becomes an attribute, `value` the body.
    pub fn property(name: &str, value: &str, is_regex: bool) -> Result<Self, FilterError> {
        Ok(Self {
            kind: ElementKind::Property,
            name: require_text("name", name)?,
            value: Some(require_text("value", value)?),
            is_regex,
        })
    }

    /// An id criterion over one or more test ids.
    ///
    /// Entries are trimmed, blank entries are dropped and duplicates keep their
    /// first position. Fails only when nothing is left.
    pub fn ids<I, S>(test_ids: I) -> Result<Self, FilterError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kept: Vec<String> = Vec::new();
        for id in test_ids {
            let id = id.as_ref().trim();
            if !id.is_empty() && !kept.iter().any(|seen| seen == id) {
                kept.push(id.to_string());
            }
        }

        if kept.is_empty() {
            return Err(FilterError::validation(
                "testIds",
                "at least one non-blank test id is required",
            ));
        }

        Ok(Self {
            kind: ElementKind::Id,
            name: kept.join(","),
            value: None,
            is_regex: false,
        })
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    /// The criterion name; for an id criterion, the comma-joined id list.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Present only for property criteria.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn is_regex(&self) -> bool {
        self.is_regex
    }

    /// The individual ids of an id criterion (empty for other kinds).
    pub fn test_ids(&self) -> impl Iterator<Item = &str> {
        let ids = if self.kind == ElementKind::Id {
            Some(self.name.split(','))
        } else {
            None
        };
        ids.into_iter().flatten()
    }

    fn body(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.name)
    }
}

impl Render for Criterion {
    fn tag(&self) -> &str {
        self.kind.tag()
    }

    fn render_into(&self, out: &mut String, with_tag: bool) {
        if !with_tag {
            escape_into(out, self.body());
            return;
        }

        out.push('<');
        out.push_str(self.kind.tag());
        if self.is_regex {
            out.push_str(" re=\"1\"");
        }
        if self.kind == ElementKind::Property {
            out.push_str(" name=\"");
            escape_into(out, &self.name);
            out.push('"');
        }
        out.push('>');
        escape_into(out, self.body());
        out.push_str("</");
        out.push_str(self.kind.tag());
        out.push('>');
    }
}

fn require_text(argument: &'static str, text: &str) -> Result<String, FilterError> {
    if text.trim().is_empty() {
        Err(FilterError::validation(argument, "must not be empty or blank"))
    } else {
        Ok(text.to_string())
    }
}

/// Escapes the characters that would otherwise end a tag, an attribute or an entity.
pub(crate) fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

/// A cell that can go from empty to occupied exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOnce<T>(Option<T>);

impl<T> Default for SetOnce<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T: Copy> SetOnce<T> {
    pub fn get(&self) -> Option<T> {
        self.0
    }

    pub fn is_set(&self) -> bool {
        self.0.is_some()
    }

    /// Stores `value`, handing it back if the cell is already occupied.
    pub fn set(&mut self, value: T) -> Result<(), T> {
        if self.0.is_some() {
            return Err(value);
        }
        self.0 = Some(value);
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn overwrite(&mut self, value: Option<T>) {
        self.0 = value;
    }
}

/// Index of a node inside its [`ElementChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One element of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    kind: ElementKind,
    parent: Option<NodeId>,
    pub(crate) child: SetOnce<NodeId>,
    criterion: Option<Criterion>,
}

impl Node {
    pub fn root() -> Self {
        Self {
            kind: ElementKind::Root,
            parent: None,
            child: SetOnce::default(),
            criterion: None,
        }
    }

    /// A root, conjunction, disjunction or negation element.
    pub fn structural(kind: ElementKind, parent: Option<NodeId>) -> Result<Self, FilterError> {
        if !kind.is_structural() {
            return Err(FilterError::out_of_range(
                "kind",
                format!("{kind:?} is not a structural kind"),
            ));
        }

        match (kind, parent) {
            (ElementKind::Root, Some(_)) => Err(FilterError::validation(
                "parent",
                "a root element cannot have a parent",
            )),
            (ElementKind::Root, None) => Ok(Self::root()),
            (_, None) => Err(FilterError::NullArgument { argument: "parent" }),
            (kind, parent) => Ok(Self {
                kind,
                parent,
                child: SetOnce::default(),
                criterion: None,
            }),
        }
    }

    pub fn criterion(parent: Option<NodeId>, criterion: Criterion) -> Result<Self, FilterError> {
        if parent.is_none() {
            return Err(FilterError::NullArgument { argument: "parent" });
        }

        Ok(Self {
            kind: criterion.kind(),
            parent,
            child: SetOnce::default(),
            criterion: Some(criterion),
        })
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn child(&self) -> Option<NodeId> {
        self.child.get()
    }

    pub fn criterion_ref(&self) -> Option<&Criterion> {
        self.criterion.as_ref()
    }

    fn set_child(&mut self, child: NodeId) -> Result<(), FilterError> {
        self.child
            .set(child)
            .map_err(|_| FilterError::ChildAlreadySet { kind: self.kind })
    }
}

/// Arena holding one chain, root first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementChain {
    nodes: Vec<Node>,
}

impl Default for ElementChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ElementChain {
    /// A chain holding only its root.
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::root()],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a chain owns at least its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Follows `child` links from the root to the current leaf.
    pub fn leaf(&self) -> NodeId {
        let mut current = self.root();
        let mut steps = 0;
        while let Some(child) = self.get(current).and_then(Node::child) {
            if steps == self.nodes.len() {
                break;
            }
            current = child;
            steps += 1;
        }
        current
    }

    /// Stores `node` and makes it the child of its parent.
    pub fn attach(&mut self, node: Node) -> Result<NodeId, FilterError> {
        let Some(parent) = node.parent() else {
            return Err(FilterError::validation(
                "node",
                "a chain has exactly one root and it cannot be attached",
            ));
        };

        let id = NodeId(self.nodes.len());
        let parent_node = self.nodes.get_mut(parent.0).ok_or_else(|| {
            FilterError::inconsistent(format!("parent {parent} is not part of this chain"))
        })?;
        parent_node.set_child(id)?;
        self.nodes.push(node);
        Ok(id)
    }

    #[cfg(test)]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_table() {
        let tags: Vec<_> = ElementKind::STRUCTURAL
            .into_iter()
            .chain(ElementKind::CRITERIA)
            .map(ElementKind::tag)
            .collect();
        assert_eq!(
            tags,
            vec![
                "filter", "and", "or", "not", "id", "test", "cat", "class", "method",
                "namespace", "prop", "name",
            ]
        );
        for kind in ElementKind::CRITERIA {
            assert_eq!(ElementKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ElementKind::from_tag("category"), None);
    }

    #[test]
    fn test_non_root_without_parent_is_null_argument() {
        for kind in [ElementKind::And, ElementKind::Or, ElementKind::Not] {
            assert_eq!(
                Node::structural(kind, None),
                Err(FilterError::NullArgument { argument: "parent" })
            );
        }
        for kind in ElementKind::CRITERIA {
            let criterion = match kind {
                ElementKind::Id => Criterion::ids(["a"]).unwrap(),
                ElementKind::Property => Criterion::property("p", "v", false).unwrap(),
                kind => Criterion::new(kind, "x", false).unwrap(),
            };
            assert_eq!(
                Node::criterion(None, criterion),
                Err(FilterError::NullArgument { argument: "parent" })
            );
        }
    }

    #[test]
    fn test_root_with_parent_is_validation_error() {
        let chain = ElementChain::new();
        let result = Node::structural(ElementKind::Root, Some(chain.root()));
        assert!(matches!(
            result,
            Err(FilterError::Validation { argument: "parent", .. })
        ));
    }

    #[test]
    fn test_unsupported_kind_is_out_of_range() {
        let err = Node::structural(ElementKind::Category, Some(NodeId(0))).unwrap_err();
        match err {
            FilterError::OutOfRange { argument, value } => {
                assert_eq!(argument, "kind");
                assert!(value.contains("Category"));
            }
            other => panic!("expected range error, got {other:?}"),
        }
        assert!(matches!(
            Criterion::new(ElementKind::And, "x", false),
            Err(FilterError::OutOfRange { .. })
        ));
        assert!(matches!(
            Criterion::new(ElementKind::Property, "x", false),
            Err(FilterError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_blank_name_and_value_rejected() {
        assert!(matches!(
            Criterion::new(ElementKind::Test, "  ", false),
            Err(FilterError::Validation { argument: "name", .. })
        ));
        assert!(matches!(
            Criterion::property("p", "", false),
            Err(FilterError::Validation { argument: "value", .. })
        ));
        assert!(matches!(
            Criterion::property("", "v", false),
            Err(FilterError::Validation { argument: "name", .. })
        ));
    }

    #[test]
    fn test_ids_filter_blank_and_duplicates() {
        let criterion = Criterion::ids(["id1", "", " ", "id2", "id1"]).unwrap();
        assert_eq!(criterion.name(), "id1,id2");
        assert_eq!(criterion.test_ids().collect::<Vec<_>>(), vec!["id1", "id2"]);

        let single = Criterion::ids(["only"]).unwrap();
        assert_eq!(single.render(true), "<id>only</id>");

        assert!(matches!(
            Criterion::ids(["", "  "]),
            Err(FilterError::Validation { argument: "testIds", .. })
        ));
        assert!(Criterion::ids(Vec::<String>::new()).is_err());
    }

    #[test]
    fn test_criterion_rendering() {
        let test = Criterion::new(ElementKind::Test, "test1", true).unwrap();
        assert_eq!(test.render(true), r#"<test re="1">test1</test>"#);
        assert_eq!(test.render(false), "test1");

        let prop = Criterion::property("prop2", "value2", true).unwrap();
        assert_eq!(prop.render(true), r#"<prop re="1" name="prop2">value2</prop>"#);
        assert_eq!(prop.render(false), "value2");

        let cat = Criterion::new(ElementKind::Category, "cat1", false).unwrap();
        assert_eq!(cat.render(true), "<cat>cat1</cat>");

        let ns = Criterion::new(ElementKind::Namespace, "A<B>&\"C\"", false).unwrap();
        assert_eq!(
            ns.render(true),
            "<namespace>A&lt;B&gt;&amp;&quot;C&quot;</namespace>"
        );
    }

    #[test]
    fn test_set_once() {
        let mut cell = SetOnce::default();
        assert!(!cell.is_set());
        assert_eq!(cell.set(1), Ok(()));
        assert_eq!(cell.set(2), Err(2));
        assert_eq!(cell.get(), Some(1));
    }

    #[test]
    fn test_attach_assigns_child_once() {
        let mut chain = ElementChain::new();
        let root = chain.root();
        let cat = Criterion::new(ElementKind::Category, "c", false).unwrap();
        let id = chain.attach(Node::criterion(Some(root), cat.clone()).unwrap()).unwrap();
        assert_eq!(chain.get(root).unwrap().child(), Some(id));
        assert_eq!(chain.leaf(), id);

        let again = chain.attach(Node::criterion(Some(root), cat).unwrap());
        assert_eq!(
            again,
            Err(FilterError::ChildAlreadySet {
                kind: ElementKind::Root
            })
        );
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn test_attach_rejects_foreign_parent_and_roots() {
        let mut chain = ElementChain::new();
        let stray = Node::structural(ElementKind::And, Some(NodeId(42))).unwrap();
        assert!(matches!(
            chain.attach(stray),
            Err(FilterError::Inconsistent { .. })
        ));
        assert!(matches!(
            chain.attach(Node::root()),
            Err(FilterError::Validation { argument: "node", .. })
        ));
    }
}
