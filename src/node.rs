//! The in-memory tree node (spec §4.D).
//!
//! A [`Node`] owns its children and properties outright; per spec §9, no
//! parent back-pointer is stored on the struct. Path computation instead
//! happens during traversal (see [`crate::tree::Tree::walk`] and
//! [`crate::tree::Tree::get_node`]), and the DTB/DTS parsers each track
//! ancestry with a parser-local stack of in-progress frames rather than by
//! writing back-pointers into the tree they are building.

use crate::error::Error;
use crate::property::Property;

/// An ordered container of child nodes and properties.
///
/// Child names need not be unique within a parent (the format allows
/// addressed siblings like `foo@0` and `foo@1`); property names, however,
/// are unique within a node — [`Node::append`] treats re-adding an existing
/// property name as last-write-wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// This node's name (`"/"` for the root).
    pub name: String,
    /// Child nodes, in document order.
    pub children: Vec<Node>,
    /// Properties, in document order.
    pub props: Vec<Property>,
}

/// Either a child [`Node`] or a [`Property`], for use with [`Node::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// A child node.
    Node(Node),
    /// A property.
    Prop(Property),
}

impl From<Node> for Item {
    fn from(node: Node) -> Self {
        Self::Node(node)
    }
}

impl From<Property> for Item {
    fn from(prop: Property) -> Self {
        Self::Prop(prop)
    }
}

impl Node {
    /// Creates a new, empty node with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            props: Vec::new(),
        }
    }

    /// The first child with the given name, if any.
    pub fn get_subnode(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Mutable access to the first child with the given name, if any.
    pub fn get_subnode_mut(&mut self, name: &str) -> Option<&mut Node> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// The first property with the given name, if any.
    pub fn get_property(&self, name: &str) -> Option<&Property> {
        self.props.iter().find(|p| p.name() == name)
    }

    /// Sets a property by name, overwriting any existing property with the
    /// same name in place (preserving its position), or appending if none
    /// existed.
    pub fn set_property(&mut self, prop: Property) {
        if let Some(existing) = self.props.iter_mut().find(|p| p.name() == prop.name()) {
            *existing = prop;
        } else {
            self.props.push(prop);
        }
    }

    /// Appends a child node or property.
    pub fn append(&mut self, item: impl Into<Item>) {
        match item.into() {
            Item::Node(node) => self.children.push(node),
            Item::Prop(prop) => self.set_property(prop),
        }
    }

    /// Removes the first child with the given name.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if no such child exists.
    pub fn remove_subnode(&mut self, name: &str) -> Result<Node, Error> {
        let index = self
            .children
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| Error::not_found(format!("subnode {name:?}")))?;
        Ok(self.children.remove(index))
    }

    /// Removes the first property with the given name.
    ///
    /// # Errors
    /// Returns [`Error::NotFound`] if no such property exists.
    pub fn remove_property(&mut self, name: &str) -> Result<Property, Error> {
        let index = self
            .props
            .iter()
            .position(|p| p.name() == name)
            .ok_or_else(|| Error::not_found(format!("property {name:?}")))?;
        Ok(self.props.remove(index))
    }

    /// Recursively merges `other` into `self`.
    ///
    /// For each property in `other`: overwritten in place when `replace`
    /// is true and a name collision exists, otherwise the existing
    /// property is kept; novel properties are appended. For each child in
    /// `other`: recurses into the like-named child if one exists, else
    /// appends a clone.
    pub fn merge(&mut self, other: &Node, replace: bool) {
        for prop in &other.props {
            let exists = self.props.iter().any(|p| p.name() == prop.name());
            if exists {
                if replace {
                    self.set_property(prop.clone());
                }
            } else {
                self.props.push(prop.clone());
            }
        }

        for child in &other.children {
            if let Some(existing) = self.get_subnode_mut(&child.name) {
                existing.merge(child, replace);
            } else {
                self.children.push(child.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_sets_property_last_write_wins() {
        let mut node = Node::new("foo");
        node.append(Property::Words {
            name: "x".into(),
            values: vec![1],
        });
        node.append(Property::Words {
            name: "x".into(),
            values: vec![2],
        });
        assert_eq!(node.props.len(), 1);
        assert_eq!(
            node.get_property("x"),
            Some(&Property::Words {
                name: "x".into(),
                values: vec![2],
            })
        );
    }

    #[test]
    fn remove_subnode_errs_when_absent() {
        let mut node = Node::new("/");
        assert!(node.remove_subnode("missing").is_err());
    }

    #[test]
    fn merge_replace_overwrites_properties() {
        let mut a = Node::new("cpu");
        a.append(Property::Words {
            name: "x".into(),
            values: vec![1],
        });
        let mut b = Node::new("cpu");
        b.append(Property::Words {
            name: "x".into(),
            values: vec![2],
        });

        a.merge(&b, true);
        assert_eq!(
            a.get_property("x"),
            Some(&Property::Words {
                name: "x".into(),
                values: vec![2],
            })
        );
    }

    #[test]
    fn merge_no_replace_keeps_existing() {
        let mut a = Node::new("cpu");
        a.append(Property::Words {
            name: "x".into(),
            values: vec![1],
        });
        let mut b = Node::new("cpu");
        b.append(Property::Words {
            name: "x".into(),
            values: vec![2],
        });

        a.merge(&b, false);
        assert_eq!(
            a.get_property("x"),
            Some(&Property::Words {
                name: "x".into(),
                values: vec![1],
            })
        );
    }

    #[test]
    fn merge_recurses_into_matching_children() {
        let mut a = Node::new("/");
        a.append(Node::new("cpu"));
        let mut b = Node::new("/");
        let mut b_cpu = Node::new("cpu");
        b_cpu.append(Property::Empty { name: "y".into() });
        b.append(b_cpu);

        a.merge(&b, true);
        assert_eq!(a.children.len(), 1);
        assert!(a.get_subnode("cpu").unwrap().get_property("y").is_some());
    }
}
