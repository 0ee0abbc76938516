use std::fmt::{Debug, Display};

use thiserror::Error;

use super::{EdgeLength, NodeId};

/// Errors raised by the child list of a [`Node`].
#[derive(Error, Debug)]
pub enum NodeError {
    /// The child list does not contain the requested id
    #[error("Node {parent} does not have child {child}.")]
    HasNoChild {
        /// Node whose child list was searched
        parent: NodeId,
        /// Missing child
        child: NodeId,
    },
}

/// Arena entry of a [`Tree`](super::Tree).
///
/// Links to other nodes are [`NodeId`] indices into the same arena. Only the
/// `children` list owns structure, `parent` is a back reference.
#[derive(Clone)]
pub struct Node {
    /// Position of the node in the arena
    pub id: NodeId,
    /// Label, tips are usually named and inner nodes often are not
    pub name: Option<String>,
    /// Parent node, `None` only for the root
    pub parent: Option<NodeId>,
    /// Ordered children, empty for a tip
    pub children: Vec<NodeId>,
    /// Length of the branch above the node
    pub parent_edge: Option<EdgeLength>,
    /// Bracket comment read from the newick string, written back verbatim
    pub comment: Option<String>,
    /// Transient flag used by marking passes (taxa selection, root paths,
    /// unmatched bipartitions)
    pub mark: bool,
    /// Number of leaves in the subtree rooted at this node
    pub(crate) leaves: usize,
    // Whether the node is deleted or not
    pub(crate) deleted: bool,
}

impl Node {
    /// Creates an unlinked, unnamed node
    pub fn new() -> Self {
        Self {
            id: 0,
            name: None,
            parent: None,
            children: vec![],
            parent_edge: None,
            comment: None,
            mark: false,
            leaves: 1,
            deleted: false,
        }
    }

    /// Creates an unlinked tip with a label
    pub fn new_named(name: &str) -> Self {
        Self {
            name: Some(String::from(name)),
            ..Self::new()
        }
    }

    /// Links the node below `parent` with a branch of the given length.
    /// The parent's child list is left untouched, see [`Node::add_child`].
    pub fn set_parent(&mut self, parent: NodeId, parent_edge: Option<EdgeLength>) {
        self.parent = Some(parent);
        self.parent_edge = parent_edge;
    }

    /// Number of leaves below this node (1 for a leaf), as of the
    /// last index rebuild of the owning tree.
    pub fn subtree_leaf_count(&self) -> usize {
        self.leaves
    }

    /// Length of the branch above the node, a missing length counts as 0.
    pub fn edge_length(&self) -> EdgeLength {
        self.parent_edge.unwrap_or(0.0)
    }

    /// Turns the arena slot into a tombstone
    pub(crate) fn delete(&mut self) {
        *self = Self::new();
        self.deleted = true;
    }

    /// Appends a child id
    /// ```
    /// use ntree::tree::Node;
    ///
    /// let mut parent = Node::new();
    /// parent.id = 0;
    /// let mut child = Node::new();
    /// child.id = 1;
    ///
    /// child.set_parent(parent.id, Some(0.1));
    /// parent.add_child(child.id);
    ///
    /// assert_eq!(child.parent_edge, Some(0.1));
    /// assert_eq!(parent.children, vec![1]);
    /// ```
    pub fn add_child(&mut self, child: NodeId) {
        self.children.push(child);
    }

    /// Drops a child id, the order of the others is kept
    pub fn remove_child(&mut self, child: &NodeId) -> Result<(), NodeError> {
        let vec_index = self.child_position(child)?;
        self.children.remove(vec_index);

        Ok(())
    }

    /// Puts `new` in the child slot occupied by `old`, keeping the order of
    /// the other children.
    pub fn replace_child(&mut self, old: &NodeId, new: NodeId) -> Result<(), NodeError> {
        let vec_index = self.child_position(old)?;
        self.children[vec_index] = new;

        Ok(())
    }

    fn child_position(&self, child: &NodeId) -> Result<usize, NodeError> {
        self.children
            .iter()
            .position(|node_id| node_id == child)
            .ok_or(NodeError::HasNoChild {
                parent: self.id,
                child: *child,
            })
    }

    pub(crate) fn rescale_edge(&mut self, factor: f64) {
        self.parent_edge = self.parent_edge.map(|edge| edge * factor);
    }

    /// Whether the node has no children
    pub fn is_tip(&self) -> bool {
        self.children.is_empty()
    }

    /// Whether the node has no parent
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    fn format_length(&self, precision: Option<usize>) -> String {
        match precision {
            Some(p) => format!(":{:.*}", p, self.edge_length()),
            None => self
                .parent_edge
                .map(|v| format!(":{v}"))
                .unwrap_or_default(),
        }
    }

    /// Label, branch length and comment of the node as they appear in a
    /// newick string. When a precision is given every length is written,
    /// missing ones as zero.
    pub fn to_newick(&self, precision: Option<usize>) -> String {
        let label = self.name.as_deref().unwrap_or_default();
        let length = self.format_length(precision);
        match &self.comment {
            Some(comment) => format!("{label}{length}[{comment}]"),
            None => format!("{label}{length}"),
        }
    }
}

/// Nodes compare by label, branch length and number of children, not by
/// their position in the arena.
impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        let same_edge = match (self.parent_edge, other.parent_edge) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            (a, b) => a.is_none() && b.is_none(),
        };

        same_edge
            && self.is_root() == other.is_root()
            && self.name == other.name
            && self.children.len() == other.children.len()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Eq for Node {}

/// Short form used by [`Tree::print`](super::Tree::print): label followed
/// by the branch length.
impl Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = self.name.as_deref().unwrap_or("*");
        match self.parent_edge {
            Some(length) => write!(f, "{label} [{length:.3}]"),
            None => write!(f, "{label}"),
        }
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("parent_edge", &self.parent_edge)
            .field("leaves", &self.leaves)
            .field("mark", &self.mark)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_keeps_order() {
        let mut node = Node::new();
        node.children = vec![3, 4, 5];
        node.replace_child(&4, 9).unwrap();
        assert_eq!(node.children, vec![3, 9, 5]);

        assert!(matches!(
            node.replace_child(&4, 1),
            Err(NodeError::HasNoChild { parent: 0, child: 4 })
        ));
    }

    #[test]
    fn newick_label() {
        let mut node = Node::new_named("A");
        assert_eq!(node.to_newick(None), "A");
        assert_eq!(node.to_newick(Some(2)), "A:0.00");

        node.parent_edge = Some(0.75);
        node.comment = Some("&&NHX:S=human".into());
        assert_eq!(node.to_newick(None), "A:0.75[&&NHX:S=human]");
        assert_eq!(node.to_newick(Some(3)), "A:0.750[&&NHX:S=human]");
    }
}
