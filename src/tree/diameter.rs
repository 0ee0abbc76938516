//! Height and diameter dynamic program.
//!
//! For every inner node the two deepest children are kept, which gives the
//! longest leaf to leaf path through that node and a way back down to the two
//! tips at its ends.

use tracing::debug;

use super::tree_impl::{Tree, TreeError};
use super::{EdgeLength, NodeId};

/// Per node result of the dynamic program
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiameterInfo {
    /// Longest path from the node down to a leaf
    pub height: EdgeLength,
    /// Longest leaf to leaf path through the node, `None` if the node has
    /// fewer than two children
    pub diameter: Option<EdgeLength>,
    /// Position of the deepest child
    pub first: usize,
    /// Position of the second deepest child
    pub second: Option<usize>,
}

/// Side table of [`DiameterInfo`] indexed by [`NodeId`], only inner nodes have
/// an entry.
#[derive(Debug, Clone)]
pub struct DiameterTable {
    info: Vec<Option<DiameterInfo>>,
}

/// Edge holding the midpoint of the diameter of a tree, with the lengths of
/// the two pieces the edge is split into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidpointEdge {
    /// Upper end of the edge
    pub parent: NodeId,
    /// Lower end of the edge
    pub child: NodeId,
    /// Length between the midpoint and `parent`
    pub parent_length: EdgeLength,
    /// Length between the midpoint and `child`
    pub child_length: EdgeLength,
}

impl DiameterTable {
    /// Runs the dynamic program over the inner nodes of the tree, children
    /// before parents.
    pub fn compute(tree: &Tree) -> Result<Self, TreeError> {
        let mut info: Vec<Option<DiameterInfo>> = vec![None; tree.nodes.len()];

        for id in tree.get_inner() {
            let node = tree.get(id)?;

            let mut first: Option<(usize, EdgeLength)> = None;
            let mut second: Option<(usize, EdgeLength)> = None;
            for (i, child) in node.children.iter().enumerate() {
                let child_height = info[*child].map(|c| c.height).unwrap_or(0.0);
                let depth = tree.get(child)?.edge_length() + child_height;

                match first {
                    Some((_, best)) if depth <= best => {
                        if second.map_or(true, |(_, s)| depth > s) {
                            second = Some((i, depth));
                        }
                    }
                    _ => {
                        second = first;
                        first = Some((i, depth));
                    }
                }
            }

            let (first, height) = first.ok_or(TreeError::IsEmpty)?;
            info[*id] = Some(DiameterInfo {
                height,
                diameter: second.map(|(_, depth)| height + depth),
                first,
                second: second.map(|(i, _)| i),
            });
        }

        Ok(Self { info })
    }

    /// Gets the entry of an inner node
    pub fn get(&self, id: &NodeId) -> Option<&DiameterInfo> {
        self.info.get(*id).and_then(|i| i.as_ref())
    }

    /// Gets the inner node with the largest diameter, the first one in
    /// post-order on ties.
    pub fn diametral_node(&self, tree: &Tree) -> Option<(NodeId, EdgeLength)> {
        let mut best: Option<(NodeId, EdgeLength)> = None;
        for id in tree.get_inner() {
            let Some(diameter) = self.get(id).and_then(|i| i.diameter) else {
                continue;
            };
            if best.map_or(true, |(_, d)| diameter > d) {
                best = Some((*id, diameter));
            }
        }
        best
    }

    /// Follows the deepest children down from a node to a leaf
    fn descend(&self, tree: &Tree, from: NodeId) -> Result<NodeId, TreeError> {
        let mut current = from;
        while let Some(info) = self.get(&current) {
            current = tree.get(&current)?.children[info.first];
        }
        Ok(current)
    }
}

impl Tree {
    /// Gets the largest leaf to leaf distance in the tree, `None` if no node
    /// has two children.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A:1,B:2):3,(C:4,D:1):1);").unwrap();
    /// assert_eq!(tree.weighted_diameter().unwrap(), Some(10.0));
    /// ```
    pub fn weighted_diameter(&self) -> Result<Option<EdgeLength>, TreeError> {
        let table = DiameterTable::compute(self)?;
        Ok(table.diametral_node(self).map(|(_, d)| d))
    }

    /// Locates the edge holding the point halfway along the diameter of the
    /// tree.
    ///
    /// The path from the first tip of the diameter is walked up towards the
    /// diametral node until half the diameter is exceeded, if the diametral
    /// node is reached first the path from the second tip is walked instead.
    pub fn midpoint_edge(&self) -> Result<MidpointEdge, TreeError> {
        let table = DiameterTable::compute(self)?;
        let (droot, diameter) =
            table
                .diametral_node(self)
                .ok_or(TreeError::TooFewLeaves {
                    required: 2,
                    found: self.n_leaves(),
                })?;

        let info = table.get(&droot).ok_or(TreeError::NodeNotFound(droot))?;
        let children = &self.get(&droot)?.children;
        let second = info.second.ok_or(TreeError::IsEmpty)?;
        let tip_a = table.descend(self, children[info.first])?;
        let tip_b = table.descend(self, children[second])?;

        let midpoint = diameter / 2.0;

        let walk = |tip: NodeId| -> Result<(NodeId, NodeId, EdgeLength), TreeError> {
            let mut node = tip;
            let mut prev = tip;
            let mut dist = 0.0;
            while node != droot && dist <= midpoint {
                let current = self.get(&node)?;
                dist += current.edge_length();
                prev = node;
                node = current.parent.ok_or(TreeError::RootNotFound)?;
            }
            Ok((node, prev, dist))
        };

        let (mut parent, mut child, mut dist) = walk(tip_a)?;
        if dist <= midpoint {
            (parent, child, dist) = walk(tip_b)?;
        }

        let edge = self.get(&child)?.edge_length();
        let child_length = midpoint - (dist - edge);

        debug!(
            diameter,
            midpoint,
            edge,
            "midpoint found between nodes {parent} and {child}"
        );

        Ok(MidpointEdge {
            parent,
            child,
            parent_length: (edge - child_length).max(0.0),
            child_length,
        })
    }
}
