//! The [`Tree`] container and its operations: `walk`, `search`, `merge`
//! (spec §4.D/§4.I), plus the top-level parse/emit facade (spec §6).

use crate::dtb;
use crate::dts;
use crate::error::Error;
use crate::header::Header;
use crate::node::{Item, Node};
use crate::property::Property;

/// What kind of item [`Tree::search`] should collect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    /// Only match node names.
    Node,
    /// Only match property names.
    Prop,
    /// Match both node and property names.
    Both,
}

/// A Flattened Device Tree: a header, a memory reservation list, and a root node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    /// The DTB header. `version` is `None` for a tree built from scratch
    /// that has never been parsed from, or emitted to, a DTB.
    pub header: Header,
    /// Memory reservation `(address, size)` pairs, in order. The `(0, 0)`
    /// terminator is not part of this logical sequence.
    pub reservations: Vec<(u64, u64)>,
    /// The root node, always named `"/"`.
    pub root: Node,
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

impl Tree {
    /// Creates an empty tree: a root node only, no header version set.
    pub fn new() -> Self {
        Self {
            header: Header::default(),
            reservations: Vec::new(),
            root: Node::new("/"),
        }
    }

    /// Splits a `/`-rooted path into its non-empty component names.
    fn path_components(path: &str) -> impl Iterator<Item = &str> {
        path.split('/').filter(|s| !s.is_empty())
    }

    /// Gets the node at `path` (leading slash optional). With `create`,
    /// intermediate nodes along the path are created as needed.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if some component of `path` doesn't
    /// exist and `create` is false.
    pub fn get_node(&self, path: &str, create: bool) -> Result<&Node, Error> {
        // Immutable lookup can't create, so defer to a read-only walk when
        // `create` is false, and otherwise go through the mutable path and
        // re-borrow immutably.
        if create {
            return Err(Error::invalid_argument(
                "get_node(create=true) requires mutable access; use get_node_mut",
            ));
        }
        let mut node = &self.root;
        for name in Self::path_components(path) {
            node = node
                .get_subnode(name)
                .ok_or_else(|| Error::not_found(format!("path {path:?}")))?;
        }
        Ok(node)
    }

    /// Mutable form of [`Tree::get_node`]; when `create` is true, missing
    /// intermediate nodes are created.
    pub fn get_node_mut(&mut self, path: &str, create: bool) -> Result<&mut Node, Error> {
        let mut node = &mut self.root;
        for name in Self::path_components(path) {
            if node.get_subnode(name).is_none() {
                if create {
                    node.append(Node::new(name));
                } else {
                    return Err(Error::not_found(format!("path {path:?}")));
                }
            }
            node = node
                .get_subnode_mut(name)
                .expect("just verified or created above");
        }
        Ok(node)
    }

    /// Gets a property by name at `path`.
    pub fn get_property(&self, name: &str, path: &str) -> Result<Option<&Property>, Error> {
        Ok(self.get_node(path, false)?.get_property(name))
    }

    /// Sets a property by name at `path`, creating intermediate nodes.
    pub fn set_property(&mut self, prop: Property, path: &str) -> Result<(), Error> {
        self.get_node_mut(path, true)?.set_property(prop);
        Ok(())
    }

    /// Whether a node exists at `path`.
    pub fn exist_node(&self, path: &str) -> bool {
        self.get_node(path, false).is_ok()
    }

    /// Whether a property exists by name at `path`.
    pub fn exist_property(&self, name: &str, path: &str) -> bool {
        self.get_node(path, false)
            .map(|node| node.get_property(name).is_some())
            .unwrap_or(false)
    }

    /// Removes a child node by name at `path`.
    pub fn remove_node(&mut self, name: &str, path: &str) -> Result<Node, Error> {
        self.get_node_mut(path, false)?.remove_subnode(name)
    }

    /// Removes a property by name at `path`.
    pub fn remove_property(&mut self, name: &str, path: &str) -> Result<Property, Error> {
        self.get_node_mut(path, false)?.remove_property(name)
    }

    /// Adds a child node or property at `path`, creating intermediate
    /// nodes when `create` is true.
    pub fn add_item(&mut self, item: impl Into<Item>, path: &str, create: bool) -> Result<(), Error> {
        self.get_node_mut(path, create)?.append(item);
        Ok(())
    }

    /// Walks the subtree rooted at `path` in depth-first pre-order,
    /// yielding `(path, children, properties)` for each visited node.
    ///
    /// When `relative` is true, yielded paths are relative to the starting
    /// node rather than absolute.
    pub fn walk(&self, path: &str, relative: bool) -> Result<Vec<(String, &[Node], &[Property])>, Error> {
        let start = self.get_node(path, false)?;
        let base = normalize_path(path);
        let mut out = Vec::new();
        walk_node(start, &base, "", relative, &mut out);
        Ok(out)
    }

    /// Collects every node and/or property named `name` within the subtree
    /// rooted at `path`, in traversal (insertion) order.
    pub fn search(&self, name: &str, kind: ItemKind, path: &str) -> Result<Vec<Item>, Error> {
        let start = self.get_node(path, false)?;
        let mut out = Vec::new();
        search_node(start, name, kind, &mut out);
        Ok(out)
    }

    /// Recursively merges `other` into `self`.
    ///
    /// The header version becomes the max of the two (when both are set);
    /// reservation entries merge as an idempotent union by `(address,
    /// size)` pair (duplicates skipped), per spec §9.
    pub fn merge(&mut self, other: &Tree, replace: bool) {
        self.header.version = match (self.header.version, other.header.version) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };

        for &entry in &other.reservations {
            if !self.reservations.contains(&entry) {
                self.reservations.push(entry);
            }
        }

        self.root.merge(&other.root, replace);
    }

    /// Renders this tree as DTS text, indenting `tabsize` spaces per
    /// nesting level.
    pub fn to_dts(&self, tabsize: usize) -> String {
        dts::print(self, tabsize)
    }

    /// Serializes this tree into a complete devicetree blob.
    ///
    /// Any of `version`, `last_comp_version`, `boot_cpuid_phys` override
    /// the tree's stored header fields before emission. `version` must end
    /// up set (either already stored, or passed here), or this fails with
    /// [`Error::InvalidArgument`].
    pub fn to_dtb(
        &self,
        version: Option<u32>,
        last_comp_version: Option<u32>,
        boot_cpuid_phys: Option<u32>,
    ) -> Result<Vec<u8>, Error> {
        let mut tree = self.clone();
        if let Some(version) = version {
            tree.header.version = Some(version);
        }
        if let Some(last_comp_version) = last_comp_version {
            tree.header.last_comp_version = last_comp_version;
        }
        if let Some(boot_cpuid_phys) = boot_cpuid_phys {
            tree.header.boot_cpuid_phys = boot_cpuid_phys;
        }
        dtb::encode(&tree)
    }
}

/// Normalizes a path to its `/`-joined, leading-slash-free form (empty
/// string for the root).
fn normalize_path(path: &str) -> String {
    Tree::path_components(path).collect::<Vec<_>>().join("/")
}

/// Depth-first pre-order walk, matching spec §4.I's `walk` contract.
///
/// `abs_path` accumulates from the tree root (used when `relative` is
/// false); `rel_path` accumulates from the node `walk` was called on (used
/// when `relative` is true) — the two diverge whenever `walk` starts below
/// the root, so they're tracked independently rather than derived from one
/// another.
fn walk_node<'a>(
    node: &'a Node,
    abs_path: &str,
    rel_path: &str,
    relative: bool,
    out: &mut Vec<(String, &'a [Node], &'a [Property])>,
) {
    let emitted = if relative {
        rel_path.to_owned()
    } else if abs_path.is_empty() {
        "/".to_owned()
    } else {
        format!("/{abs_path}")
    };
    out.push((emitted, node.children.as_slice(), node.props.as_slice()));
    for child in &node.children {
        let child_abs = if abs_path.is_empty() {
            child.name.clone()
        } else {
            format!("{abs_path}/{}", child.name)
        };
        let child_rel = if rel_path.is_empty() {
            child.name.clone()
        } else {
            format!("{rel_path}/{}", child.name)
        };
        walk_node(child, &child_abs, &child_rel, relative, out);
    }
}

/// Depth-first search for nodes/properties named `name`, matching spec
/// §4.I's `search` contract.
fn search_node(node: &Node, name: &str, kind: ItemKind, out: &mut Vec<Item>) {
    if matches!(kind, ItemKind::Node | ItemKind::Both) && node.name == name {
        out.push(Item::Node(node.clone()));
    }
    if matches!(kind, ItemKind::Prop | ItemKind::Both) {
        for prop in &node.props {
            if prop.name() == name {
                out.push(Item::Prop(prop.clone()));
            }
        }
    }
    for child in &node.children {
        search_node(child, name, kind, out);
    }
}

/// Parses DTS source text into a [`Tree`], resolving any `/incbin/`
/// references relative to `root_dir` on the filesystem.
pub fn parse_dts(text: &str, root_dir: &str) -> Result<Tree, Error> {
    dts::parse_with_loader(text, &dts::loader::FsLoader::new(root_dir))
}

/// Parses DTS source text into a [`Tree`], resolving `/incbin/` references
/// through a caller-supplied loader instead of the filesystem.
pub fn parse_dts_with_loader(text: &str, loader: &dyn dts::loader::IncBinLoader) -> Result<Tree, Error> {
    dts::parse_with_loader(text, loader)
}

/// Parses a devicetree blob, starting at `offset` within `data`.
pub fn parse_dtb(data: &[u8], offset: usize) -> Result<Tree, Error> {
    dtb::decode(data, offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::Property;

    #[test]
    fn get_node_create_makes_intermediate_nodes() {
        let mut tree = Tree::new();
        assert!(tree.get_node("a/b", false).is_err());
        tree.get_node_mut("a/b", true).unwrap();
        assert!(tree.exist_node("a/b"));
        assert!(tree.exist_node("a"));
    }

    #[test]
    fn exist_property_is_false_when_not_found() {
        let tree = Tree::new();
        assert!(!tree.exist_property("missing", ""));
    }

    #[test]
    fn walk_visits_every_node_exactly_once() {
        let mut tree = Tree::new();
        tree.get_node_mut("a/b", true).unwrap();
        tree.get_node_mut("a/c", true).unwrap();
        let visited = tree.walk("", false).unwrap();
        let paths: Vec<_> = visited.iter().map(|(p, ..)| p.clone()).collect();
        assert_eq!(paths.len(), 4); // /, /a, /a/b, /a/c
        assert_eq!(paths.iter().filter(|p| *p == "/a/b").count(), 1);
    }

    #[test]
    fn walk_relative_paths_are_relative_to_the_start_node() {
        let mut tree = Tree::new();
        tree.get_node_mut("a/b", true).unwrap();
        tree.get_node_mut("a/c", true).unwrap();

        let visited = tree.walk("a", true).unwrap();
        let paths: Vec<_> = visited.iter().map(|(p, ..)| p.clone()).collect();
        assert_eq!(paths, vec!["".to_owned(), "b".to_owned(), "c".to_owned()]);
    }

    #[test]
    fn merge_replace_wins_conflicting_property() {
        let mut a = Tree::new();
        a.set_property(
            Property::Words {
                name: "x".into(),
                values: vec![1],
            },
            "cpu",
        )
        .unwrap();
        let mut b = Tree::new();
        b.set_property(
            Property::Words {
                name: "x".into(),
                values: vec![2],
            },
            "cpu",
        )
        .unwrap();

        a.merge(&b, true);
        assert_eq!(
            a.get_property("x", "cpu").unwrap(),
            Some(&Property::Words {
                name: "x".into(),
                values: vec![2],
            })
        );
    }

    #[test]
    fn merge_reservations_dedupes_idempotently() {
        let mut a = Tree::new();
        a.reservations.push((0x1000, 0x10));
        let mut b = Tree::new();
        b.reservations.push((0x1000, 0x10));
        b.reservations.push((0x2000, 0x20));

        a.merge(&b, true);
        assert_eq!(a.reservations, vec![(0x1000, 0x10), (0x2000, 0x20)]);
    }

    #[test]
    fn search_collects_both_nodes_and_properties() {
        let mut tree = Tree::new();
        tree.get_node_mut("cpu", true).unwrap();
        tree.set_property(Property::Empty { name: "x".into() }, "cpu")
            .unwrap();
        tree.set_property(Property::Empty { name: "cpu".into() }, "")
            .unwrap();

        let found = tree.search("cpu", ItemKind::Both, "").unwrap();
        assert_eq!(found.len(), 2);
    }
}
