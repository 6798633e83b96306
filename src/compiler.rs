//! Compiler that folds a finished element chain into filter document text.
//!
//! Compilation happens in two passes over the chain:
//!
//! 1. An upward walk from the leaf to the root validates every link and
//!    collects the chain as alternating terms and connectors.
//! 2. A left-to-right fold groups consecutive links that use the same
//!    connector into one run. When the connector changes, the run built so
//!    far is closed and becomes the first member of the next run.
//!
//! The grouping mirrors the order in which the chain was written; no boolean
//! precedence is applied: `a AND b OR c AND d` groups as `((a AND b) OR c) AND d`.
//! A conjunction run that reaches the root is emitted without its `and`
//! wrapper, since the `filter` element already is one.
//!
//! Closed runs are written out as text immediately. Since a closed run is
//! always the first member of its successor, only the opening tags of the
//! enclosing runs are pending; they are kept on a flat stack and prepended
//! at the end. Neither pass recurses.

use crate::element::{Criterion, ElementChain, ElementKind, Node, NodeId, Render};
use crate::error::FilterError;
use crate::sequence::ElementSequence;

/// A single term of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Criterion(Criterion),
    /// `<not>` around a single criterion.
    Negated(Criterion),
}

impl Render for Fragment {
    fn tag(&self) -> &str {
        match self {
            Fragment::Criterion(criterion) => criterion.tag(),
            Fragment::Negated(_) => ElementKind::Not.tag(),
        }
    }

    fn render_into(&self, out: &mut String, with_tag: bool) {
        match self {
            Fragment::Criterion(criterion) => criterion.render_into(out, with_tag),
            Fragment::Negated(criterion) => {
                if with_tag {
                    out.push_str("<not>");
                }
                criterion.render_into(out, true);
                if with_tag {
                    out.push_str("</not>");
                }
            }
        }
    }
}

/// The run currently being accumulated by the fold.
struct Run {
    /// `None` until the first connector is seen.
    connector: Option<ElementKind>,
    members: ElementSequence<Fragment>,
}

impl Run {
    fn start(connector: Option<ElementKind>, fragment: Fragment) -> Self {
        // Members are always rendered bare; the layout writes the tags.
        let mut members = ElementSequence::new(String::new());
        members.push(fragment);
        Self { connector, members }
    }
}

/// Text output of the fold.
#[derive(Default)]
struct Layout {
    /// Connectors of the runs closed so far, innermost first.
    opened: Vec<ElementKind>,
    /// Everything after the pending opening tags, in document order.
    text: String,
}

impl Layout {
    /// Writes `run` out and closes it with its connector, if any.
    fn close(&mut self, run: Run, wrap: bool) {
        run.members.render_into(&mut self.text, false);
        if let (Some(connector), true) = (run.connector, wrap) {
            self.text.push_str("</");
            self.text.push_str(connector.tag());
            self.text.push('>');
            self.opened.push(connector);
        }
    }

    fn finish(self) -> String {
        let mut body = String::with_capacity(self.text.len() + self.opened.len() * 5);
        for connector in self.opened.iter().rev() {
            body.push('<');
            body.push_str(connector.tag());
            body.push('>');
        }
        body.push_str(&self.text);
        body
    }
}

/// One step of the linearized chain, root to leaf.
enum Link {
    Term(Fragment),
    Connector(ElementKind),
}

/// Compiles the chain ending at `leaf` into the body of a filter document
/// (without the outer `filter` element). The chain is not modified.
pub fn compile(chain: &ElementChain, leaf: NodeId) -> Result<String, FilterError> {
    let links = collect_links(chain, leaf)?;
    let body = fold(links);
    tracing::trace!(nodes = chain.len(), bytes = body.len(), "compiled filter chain");
    Ok(body)
}

/// Walks from `leaf` up to the root, validating each link on the way.
fn collect_links(chain: &ElementChain, leaf: NodeId) -> Result<Vec<Link>, FilterError> {
    let leaf_node = node_at(chain, leaf)?;
    if leaf_node.child().is_some() {
        return Err(FilterError::validation("leaf", "not the true leaf element"));
    }
    if matches!(
        leaf_node.kind(),
        ElementKind::And | ElementKind::Or | ElementKind::Not
    ) {
        return Err(FilterError::validation(
            "leaf",
            format!("chain ends with a dangling `{}`", leaf_node.kind()),
        ));
    }

    let mut links = Vec::new();
    let mut current = leaf;
    let mut node = leaf_node;
    let mut steps = 0;

    loop {
        match node.kind() {
            ElementKind::Root => {}
            ElementKind::And | ElementKind::Or => links.push(Link::Connector(node.kind())),
            ElementKind::Not => match links.pop() {
                Some(Link::Term(Fragment::Criterion(criterion))) => {
                    links.push(Link::Term(Fragment::Negated(criterion)));
                }
                _ => {
                    return Err(FilterError::inconsistent(format!(
                        "negation {current} does not wrap a criterion"
                    )));
                }
            },
            _ => {
                let criterion = node.criterion_ref().ok_or_else(|| {
                    FilterError::inconsistent(format!("criterion {current} has no predicate"))
                })?;
                links.push(Link::Term(Fragment::Criterion(criterion.clone())));
            }
        }

        let Some(parent_id) = node.parent() else {
            if node.kind() != ElementKind::Root {
                return Err(FilterError::inconsistent(format!(
                    "`{}` element {current} has no parent",
                    node.kind()
                )));
            }
            break;
        };

        let parent = node_at(chain, parent_id)?;
        match parent.child() {
            None => {
                return Err(FilterError::inconsistent(format!(
                    "broken forward link: parent {parent_id} of {current} has no child"
                )));
            }
            Some(child) if child != current => {
                return Err(FilterError::inconsistent(format!(
                    "parent {parent_id} points to {child} instead of {current}"
                )));
            }
            Some(_) => {}
        }
        check_link(parent, node)?;

        steps += 1;
        if steps > chain.len() {
            return Err(FilterError::inconsistent("chain contains a cycle"));
        }
        current = parent_id;
        node = parent;
    }

    links.reverse();
    Ok(links)
}

fn node_at(chain: &ElementChain, id: NodeId) -> Result<&Node, FilterError> {
    chain
        .get(id)
        .ok_or_else(|| FilterError::inconsistent(format!("element {id} is not part of the chain")))
}

/// Rejects parent/child pairs the fluent interface can never produce.
fn check_link(parent: &Node, child: &Node) -> Result<(), FilterError> {
    let allowed = match parent.kind() {
        ElementKind::Root | ElementKind::And | ElementKind::Or => {
            child.kind().is_criterion() || child.kind() == ElementKind::Not
        }
        ElementKind::Not => child.kind().is_criterion(),
        _ => child.kind().is_connector(),
    };

    if allowed {
        Ok(())
    } else {
        Err(FilterError::out_of_range(
            "parent",
            format!(
                "{:?} cannot be followed by {:?} (parent: {parent:?})",
                parent.kind(),
                child.kind()
            ),
        ))
    }
}

fn fold(links: Vec<Link>) -> String {
    let mut layout = Layout::default();
    let mut run: Option<Run> = None;
    let mut connector = None;

    for link in links {
        match link {
            Link::Connector(kind) => connector = Some(kind),
            Link::Term(fragment) => {
                run = Some(match (run, connector.take()) {
                    (Some(mut current), Some(kind))
                        if current.connector.map_or(true, |c| c == kind) =>
                    {
                        current.connector = Some(kind);
                        current.members.push(fragment);
                        current
                    }
                    (Some(current), Some(kind)) => {
                        layout.close(current, true);
                        Run::start(Some(kind), fragment)
                    }
                    (_, _) => Run::start(None, fragment),
                });
            }
        }
    }

    if let Some(run) = run {
        let wrap = run.connector != Some(ElementKind::And);
        layout.close(run, wrap);
    }
    layout.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{ChainElement, ElementCollection, ExtendWithConnector, ExtendWithCriterion};
    use crate::filter::TestFilter;

    fn body_of<E: ChainElement>(leaf: &E) -> String {
        leaf.with_chain(|chain, id| compile(chain, id)).unwrap()
    }

    #[test]
    fn test_single_criterion() {
        let leaf = TestFilter::builder().test("test1", true).unwrap();
        assert_eq!(body_of(&leaf), r#"<test re="1">test1</test>"#);
    }

    #[test]
    fn test_root_only_is_empty_body() {
        let root = TestFilter::builder();
        assert_eq!(body_of(&root), "");
    }

    #[test]
    fn test_top_level_conjunction_is_unwrapped() {
        let leaf = TestFilter::builder()
            .category("cat1", false)
            .and_then(|c| c.and())
            .and_then(|g| g.property("prop2", "value2", true))
            .unwrap();
        assert_eq!(
            body_of(&leaf),
            r#"<cat>cat1</cat><prop re="1" name="prop2">value2</prop>"#
        );
    }

    #[test]
    fn test_top_level_disjunction_is_wrapped() {
        let leaf = TestFilter::builder()
            .class("A", false)
            .and_then(|c| c.or())
            .and_then(|g| g.class("B", false))
            .and_then(|c| c.or())
            .and_then(|g| g.class("C", false))
            .unwrap();
        assert_eq!(
            body_of(&leaf),
            "<or><class>A</class><class>B</class><class>C</class></or>"
        );
    }

    #[test]
    fn test_mixed_connectors_nest_left_to_right() {
        let leaf = TestFilter::builder()
            .category("cat1", false)
            .and_then(|c| c.and())
            .and_then(|g| g.property("prop2", "value2", true))
            .and_then(|c| c.or())
            .and_then(|g| g.not())
            .and_then(|n| n.id(["id3", "id4", "id5"]))
            .unwrap();
        assert_eq!(
            body_of(&leaf),
            concat!(
                "<or><and><cat>cat1</cat><prop re=\"1\" name=\"prop2\">value2</prop></and>",
                "<not><id>id3,id4,id5</id></not></or>"
            )
        );
    }

    #[test]
    fn test_disjunction_then_conjunction() {
        let leaf = TestFilter::builder()
            .test("a", false)
            .and_then(|c| c.or())
            .and_then(|g| g.test("b", false))
            .and_then(|c| c.and())
            .and_then(|g| g.test("c", false))
            .unwrap();
        assert_eq!(
            body_of(&leaf),
            "<or><test>a</test><test>b</test></or><test>c</test>"
        );
    }

    #[test]
    fn test_deep_alternation_keeps_closing_left_to_right() {
        // a and b or c and d or e
        let leaf = TestFilter::builder()
            .name("a", false)
            .and_then(|c| c.and())
            .and_then(|g| g.name("b", false))
            .and_then(|c| c.or())
            .and_then(|g| g.name("c", false))
            .and_then(|c| c.and())
            .and_then(|g| g.name("d", false))
            .and_then(|c| c.or())
            .and_then(|g| g.name("e", false))
            .unwrap();
        assert_eq!(
            body_of(&leaf),
            concat!(
                "<or><and><or><and><name>a</name><name>b</name></and>",
                "<name>c</name></or><name>d</name></and><name>e</name></or>"
            )
        );
    }

    #[test]
    fn test_long_alternating_chain() {
        // Every link switches connector, so each run closes inside the next.
        const LINKS: usize = 50_000;
        let mut leaf = TestFilter::builder().test("t0", false).unwrap();
        for i in 0..LINKS {
            let group = if i % 2 == 0 { leaf.or() } else { leaf.and() }.unwrap();
            leaf = group.test("t", false).unwrap();
        }

        let body = body_of(&leaf);
        assert_eq!(body.matches("<test>").count(), LINKS + 1);
        assert_eq!(body.matches("<or>").count(), LINKS / 2);
        assert_eq!(body.matches("<and>").count(), LINKS / 2 - 1);
        assert!(body.starts_with("<or><and><or><and>"));
        assert!(body.ends_with("</and><test>t</test></or><test>t</test>"));
    }

    #[test]
    fn test_flattening_after_connector_change() {
        // a or b and c and d
        let leaf = TestFilter::builder()
            .method("a", false)
            .and_then(|c| c.or())
            .and_then(|g| g.method("b", false))
            .and_then(|c| c.and())
            .and_then(|g| g.method("c", false))
            .and_then(|c| c.and())
            .and_then(|g| g.not())
            .and_then(|n| n.method("d", true))
            .unwrap();
        assert_eq!(
            body_of(&leaf),
            concat!(
                "<or><method>a</method><method>b</method></or>",
                "<method>c</method><not><method re=\"1\">d</method></not>"
            )
        );
    }

    #[test]
    fn test_lone_negation() {
        let leaf = TestFilter::builder()
            .not()
            .and_then(|n| n.namespace("Slow.Tests", false))
            .unwrap();
        assert_eq!(
            body_of(&leaf),
            "<not><namespace>Slow.Tests</namespace></not>"
        );
    }

    #[test]
    fn test_compile_is_read_only() {
        let leaf = TestFilter::builder()
            .category("x", false)
            .and_then(|c| c.or())
            .and_then(|g| g.category("y", false))
            .unwrap();
        let before = leaf.with_chain(|chain, _| chain.clone());
        let first = body_of(&leaf);
        let second = body_of(&leaf);
        assert_eq!(first, second);
        leaf.with_chain(|chain, _| assert_eq!(*chain, before));
    }

    #[test]
    fn test_non_leaf_is_rejected() {
        let root = TestFilter::builder();
        let cat = root.category("c", false).unwrap();
        cat.and().unwrap();
        let err = cat.with_chain(|chain, id| compile(chain, id)).unwrap_err();
        assert!(matches!(err, FilterError::Validation { argument: "leaf", .. }));
        let err = root.with_chain(|chain, id| compile(chain, id)).unwrap_err();
        assert!(matches!(err, FilterError::Validation { argument: "leaf", .. }));
    }

    #[test]
    fn test_dangling_connector_is_rejected() {
        let group = TestFilter::builder().category("c", false).unwrap().or().unwrap();
        let err = group.with_chain(|chain, id| compile(chain, id)).unwrap_err();
        assert!(matches!(err, FilterError::Validation { argument: "leaf", .. }));

        let negation = TestFilter::builder().not().unwrap();
        let err = negation.with_chain(|chain, id| compile(chain, id)).unwrap_err();
        assert!(matches!(err, FilterError::Validation { argument: "leaf", .. }));
    }

    fn cat_and_test_chain() -> (ElementChain, NodeId, NodeId, NodeId) {
        let mut chain = ElementChain::new();
        let root = chain.root();
        let cat = Criterion::new(ElementKind::Category, "c", false).unwrap();
        let cat_id = chain.attach(Node::criterion(Some(root), cat).unwrap()).unwrap();
        let and_id = chain
            .attach(Node::structural(ElementKind::And, Some(cat_id)).unwrap())
            .unwrap();
        let test = Criterion::new(ElementKind::Test, "t", false).unwrap();
        let test_id = chain.attach(Node::criterion(Some(and_id), test).unwrap()).unwrap();
        (chain, cat_id, and_id, test_id)
    }

    #[test]
    fn test_hand_built_chain_compiles() {
        let (chain, _, _, leaf) = cat_and_test_chain();
        assert_eq!(compile(&chain, leaf).unwrap(), "<cat>c</cat><test>t</test>");
    }

    #[test]
    fn test_parent_child_mismatch_is_detected() {
        let (mut chain, cat_id, _, leaf) = cat_and_test_chain();
        // The conjunction's parent now records the leaf as its child.
        chain.get_mut(cat_id).unwrap().child.overwrite(Some(leaf));
        let err = compile(&chain, leaf).unwrap_err();
        assert!(matches!(err, FilterError::Inconsistent { .. }));
    }

    #[test]
    fn test_broken_forward_link_is_detected() {
        let (mut chain, _, and_id, leaf) = cat_and_test_chain();
        chain.get_mut(and_id).unwrap().child.overwrite(None);
        let err = compile(&chain, leaf).unwrap_err();
        match err {
            FilterError::Inconsistent { message } => assert!(message.contains("broken")),
            other => panic!("expected consistency error, got {other:?}"),
        }
    }

    #[test]
    fn test_illegal_pairing_is_out_of_range() {
        let mut chain = ElementChain::new();
        let root = chain.root();
        let and_id = chain
            .attach(Node::structural(ElementKind::And, Some(root)).unwrap())
            .unwrap();
        let test = Criterion::new(ElementKind::Test, "t", false).unwrap();
        let leaf = chain.attach(Node::criterion(Some(and_id), test).unwrap()).unwrap();

        let err = compile(&chain, leaf).unwrap_err();
        match err {
            FilterError::OutOfRange { argument, value } => {
                assert_eq!(argument, "parent");
                assert!(value.contains("Root"));
            }
            other => panic!("expected range error, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_leaf_is_inconsistent() {
        let chain = ElementChain::new();
        let (other, _, _, leaf) = cat_and_test_chain();
        assert!(other.get(leaf).is_some());
        assert!(matches!(
            compile(&chain, leaf),
            Err(FilterError::Inconsistent { .. })
        ));
    }
}
