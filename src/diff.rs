//! Structural tree comparison (spec §4.I).

use crate::header::Header;
use crate::node::Node;
use crate::property::Property;
use crate::tree::Tree;

/// Structurally compares `a` and `b`, returning `(same, only_a, only_b)`.
///
/// Nodes are matched by path. At each matched path, properties are
/// classified by structural equality and child nodes by presence-of-name in
/// the peer; the children only one side has are recorded as bare, childless
/// placeholder nodes rather than full subtrees copied out of the original
/// (spec §9 — this mirrors the reference implementation's actual, if
/// seemingly unintentional, shallow behavior).
pub fn diff(a: &Tree, b: &Tree) -> (Tree, Tree, Tree) {
    let header_same = match (a.header.version, b.header.version) {
        (Some(va), Some(vb)) => Header {
            version: Some(va.max(vb)),
            ..a.header.clone()
        },
        (Some(_), None) => a.header.clone(),
        (None, _) => b.header.clone(),
    };

    let mut same_reservations = Vec::new();
    let mut only_a_reservations = Vec::new();
    let mut only_b_reservations = Vec::new();
    for entry in &a.reservations {
        if b.reservations.contains(entry) {
            same_reservations.push(*entry);
        } else {
            only_a_reservations.push(*entry);
        }
    }
    for entry in &b.reservations {
        if !a.reservations.contains(entry) {
            only_b_reservations.push(*entry);
        }
    }

    let (same_root, only_a_root, only_b_root) = diff_node(&a.root, &b.root);

    (
        Tree {
            header: header_same,
            reservations: same_reservations,
            root: same_root,
        },
        Tree {
            header: a.header.clone(),
            reservations: only_a_reservations,
            root: only_a_root,
        },
        Tree {
            header: b.header.clone(),
            reservations: only_b_reservations,
            root: only_b_root,
        },
    )
}

/// Diffs two like-named nodes, returning `(same, only_a, only_b)` nodes.
fn diff_node(a: &Node, b: &Node) -> (Node, Node, Node) {
    let mut same = Node::new(a.name.clone());
    let mut only_a = Node::new(a.name.clone());
    let mut only_b = Node::new(b.name.clone());

    diff_properties(&a.props, &b.props, &mut same.props, &mut only_a.props);
    diff_properties(&b.props, &a.props, &mut Vec::new(), &mut only_b.props);

    for child in &a.children {
        match b.get_subnode(&child.name) {
            Some(peer) => {
                let (child_same, child_only_a, child_only_b) = diff_node(child, peer);
                same.children.push(child_same);
                if has_content(&child_only_a) {
                    only_a.children.push(child_only_a);
                }
                if has_content(&child_only_b) {
                    only_b.children.push(child_only_b);
                }
            }
            None => only_a.children.push(Node::new(child.name.clone())),
        }
    }
    for child in &b.children {
        if a.get_subnode(&child.name).is_none() {
            only_b.children.push(Node::new(child.name.clone()));
        }
    }

    (same, only_a, only_b)
}

/// Splits `props` (from one side) against `peer_props` (the other side)
/// into the matching-and-equal subset (`same_out`) and the rest
/// (`only_out`).
fn diff_properties(
    props: &[Property],
    peer_props: &[Property],
    same_out: &mut Vec<Property>,
    only_out: &mut Vec<Property>,
) {
    for prop in props {
        if peer_props.contains(prop) {
            same_out.push(prop.clone());
        } else {
            only_out.push(prop.clone());
        }
    }
}

/// Whether a placeholder node ended up with anything worth keeping
/// (properties or further nested diffs), versus being entirely empty.
fn has_content(node: &Node) -> bool {
    !node.props.is_empty() || !node.children.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;

    fn tree_with_cpu_x(value: u32) -> Tree {
        let mut tree = Tree::new();
        let mut cpu = Node::new("cpu");
        cpu.append(Property::Words {
            name: "x".into(),
            values: vec![value],
        });
        tree.root.append(cpu);
        tree
    }

    #[test]
    fn diff_of_identical_trees_is_empty_on_both_sides() {
        let a = tree_with_cpu_x(1);
        let (same, only_a, only_b) = diff(&a, &a);
        assert_eq!(same.root.get_subnode("cpu").unwrap().props.len(), 1);
        assert!(only_a.root.children.is_empty());
        assert!(only_b.root.children.is_empty());
    }

    #[test]
    fn diff_splits_conflicting_property_s6() {
        let a = tree_with_cpu_x(1);
        let b = tree_with_cpu_x(2);

        let (same, only_a, only_b) = diff(&a, &b);

        let same_cpu = same.root.get_subnode("cpu").unwrap();
        assert!(same_cpu.get_property("x").is_none());

        let a_cpu = only_a.root.get_subnode("cpu").unwrap();
        assert_eq!(
            a_cpu.get_property("x"),
            Some(&Property::Words {
                name: "x".into(),
                values: vec![1],
            })
        );

        let b_cpu = only_b.root.get_subnode("cpu").unwrap();
        assert_eq!(
            b_cpu.get_property("x"),
            Some(&Property::Words {
                name: "x".into(),
                values: vec![2],
            })
        );
    }

    #[test]
    fn diff_reports_node_present_only_on_one_side_as_a_placeholder() {
        let a = Tree::new();
        let mut b = Tree::new();
        b.root.append(Node::new("extra"));

        let (_, only_a, only_b) = diff(&a, &b);
        assert!(only_a.root.children.is_empty());
        let placeholder = only_b.root.get_subnode("extra").unwrap();
        assert!(placeholder.props.is_empty());
        assert!(placeholder.children.is_empty());
    }
}
