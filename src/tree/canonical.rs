//! Topological equality of binary rooted trees.
//!
//! Each tree is flattened into a canonical post-order node sequence where,
//! at every inner node, the smaller subtree comes first and subtrees of
//! equal size are ordered by their first differing node. Two trees have the
//! same topology if their sequences agree position by position.

use std::cmp::Ordering;

use super::tree_impl::{Tree, TreeError};
use super::NodeId;

enum Frame {
    Enter(NodeId),
    Split(NodeId, usize),
    Merge(NodeId, usize, usize),
}

impl Tree {
    /// Sort key of a node in the canonical sequence: leaves before inner
    /// nodes, then by label.
    fn canonical_key(&self, id: NodeId) -> (bool, Option<&str>) {
        let node = &self.nodes[id];
        (!node.is_tip(), node.name.as_deref())
    }

    /// Compares two subtrees of the same size by their first differing node
    fn compare_blocks(&self, left: &[NodeId], right: &[NodeId]) -> Ordering {
        left.iter()
            .zip(right.iter())
            .map(|(l, r)| self.canonical_key(*l).cmp(&self.canonical_key(*r)))
            .find(|o| o.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Gets the canonical post-order node sequence of a binary rooted tree.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("(C,(B,A)x)r;").unwrap();
    /// let names: Vec<_> = tree
    ///     .canonical_order()
    ///     .unwrap()
    ///     .iter()
    ///     .map(|id| tree.get(id).unwrap().name.clone().unwrap())
    ///     .collect();
    ///
    /// assert_eq!(names, vec!["C", "A", "B", "x", "r"]);
    /// ```
    pub fn canonical_order(&self) -> Result<Vec<NodeId>, TreeError> {
        if !self.is_binary_rooted() {
            return Err(TreeError::IsNotBinary);
        }

        let root = self.get_root()?;
        let mut sequence = Vec::with_capacity(self.size());
        let mut stack = vec![Frame::Enter(root)];

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Enter(id) => {
                    let node = self.get(&id)?;
                    if node.is_tip() {
                        sequence.push(id);
                    } else {
                        stack.push(Frame::Split(id, sequence.len()));
                        stack.push(Frame::Enter(node.children[0]));
                    }
                }
                Frame::Split(id, left_start) => {
                    stack.push(Frame::Merge(id, left_start, sequence.len()));
                    stack.push(Frame::Enter(self.get(&id)?.children[1]));
                }
                Frame::Merge(id, left_start, right_start) => {
                    let left_len = right_start - left_start;
                    let right_len = sequence.len() - right_start;

                    let swap = match right_len.cmp(&left_len) {
                        Ordering::Less => true,
                        Ordering::Greater => false,
                        Ordering::Equal => {
                            let (left, right) = sequence[left_start..].split_at(left_len);
                            self.compare_blocks(left, right).is_gt()
                        }
                    };
                    if swap {
                        sequence[left_start..].rotate_left(left_len);
                    }

                    sequence.push(id);
                }
            }
        }

        Ok(sequence)
    }

    /// Checks if two binary rooted trees have the same topology and labels,
    /// regardless of the order of children.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,B),C);").unwrap();
    ///
    /// assert!(tree.same_topology(&Tree::from_newick("(C,(B,A));").unwrap()).unwrap());
    /// assert!(!tree.same_topology(&Tree::from_newick("((A,C),B);").unwrap()).unwrap());
    /// ```
    pub fn same_topology(&self, other: &Tree) -> Result<bool, TreeError> {
        let ours = self.canonical_order()?;
        let theirs = other.canonical_order()?;

        if ours.len() != theirs.len() {
            return Ok(false);
        }

        Ok(ours
            .iter()
            .zip(theirs.iter())
            .all(|(a, b)| self.canonical_key(*a) == other.canonical_key(*b)))
    }
}
