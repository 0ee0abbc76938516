use std::collections::VecDeque;
use std::fmt::Display;

use itertools::Itertools;
use ptree::{print_tree, TreeBuilder};
use rand::seq::SliceRandom;
use rand::Rng;
use thiserror::Error;

use super::node::{Node, NodeError};
use super::{EdgeLength, NodeId};

use crate::stats::{summarize, Summary};

/// Errors that can occur when reading, writing and manipulating [`Tree`] structs.
#[derive(Error, Debug)]
pub enum TreeError {
    /// The tree is not binary and we are trying to do something
    /// only possible on binary trees
    #[error("This tree is not Binary.")]
    IsNotBinary,
    /// The tree is not rooted and we are trying to do something
    /// only possible on rooted trees
    #[error("This tree is not rooted.")]
    IsNotRooted,
    /// The tree is empty and we are trying to do something that require at least one node
    #[error("This tree is empty.")]
    IsEmpty,
    /// No root node was found in the tree and we are trying to do something
    /// that requires a root node
    #[error("No root node found")]
    RootNotFound,
    /// Some of the leaves in the tree have no name
    #[error("All your leaf nodes must be named.")]
    UnnamedLeaves,
    /// Some of the leaves in the tree share the same name
    #[error("Your leaf names must be unique, found duplicate taxon: {0}")]
    DuplicateLeafNames(String),
    /// The trees we want to compare do not have the same set of leaf names
    #[error("The trees have different taxa, use force mode to prune the differences.")]
    DifferentTaxa,
    /// The tree does not have enough leaves for the requested operation
    #[error("The tree must have at least {required} leaves (found {found}).")]
    TooFewLeaves {
        /// Minimum number of leaves for the operation
        required: usize,
        /// Number of leaves in the tree
        found: usize,
    },
    /// More leaves were selected for pruning than the tree shape allows
    #[error("Number of tips to prune can be at most {max}.")]
    TooManyPruned {
        /// Maximum number of leaves that can be pruned from this tree
        max: usize,
    },
    /// The selected taxa do not form a complete clade
    #[error("The selection is not a complete clade, all tips of a subtree must be chosen.")]
    IncompleteClade,
    /// A requested taxon does not label any leaf of the tree
    #[error("Taxon {0} does not appear in the tree.")]
    TaxonNotFound(String),
    /// None of the requested taxa label a leaf of the tree
    #[error("No matching taxa found.")]
    NoMatchingTaxa,
    /// The two nodes are not joined by an edge
    #[error("Node {child} is not a child of node {parent}.")]
    NotAnEdge {
        /// Expected parent node
        parent: NodeId,
        /// Expected child node
        child: NodeId,
    },
    /// The node was expected to be a leaf
    #[error("Node {0} is not a leaf.")]
    NotALeaf(NodeId),
    /// The requested node with index [`NodeId`] does not exist in the tree
    #[error("There is no node with index: {0}")]
    NodeNotFound(NodeId),
    /// The node with index [`NodeId`] could not be compressed
    #[error("Could not compress node {0}, it does not have exactly one child")]
    CouldNotCompressNode(NodeId),
    /// A structural invariant of the tree does not hold
    #[error("Inconsistent tree structure: {0}")]
    Inconsistent(String),
    /// There was a [`std::io::Error`] when writing the tree
    #[error("Error writing tree")]
    IoError(#[from] std::io::Error),
    /// There was a [`NodeError`] when operating on a node
    #[error("Could not operate on Node")]
    NodeError(#[from] NodeError),
}

/// Shape classes that decide which pruning variant applies to a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeShape {
    /// Every inner node has exactly two children
    BinaryRooted,
    /// The root has three children, every other inner node two
    BinaryUnrooted,
    /// Any other multifurcating tree
    General,
}

impl Display for TreeShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeShape::BinaryRooted => write!(f, "Binary rooted"),
            TreeShape::BinaryUnrooted => write!(f, "Binary unrooted"),
            TreeShape::General => write!(f, "General n-ary"),
        }
    }
}

/// Summary of the structure and branch lengths of a tree
#[derive(Debug, Clone)]
pub struct TreeInfo {
    /// Number of leaves
    pub leaves: usize,
    /// Number of inner nodes, root included
    pub inner: usize,
    /// Number of edges (every node except the root)
    pub edges: usize,
    /// Smallest degree (children + parent) of a non-root inner node
    pub min_inner_degree: usize,
    /// Largest degree (children + parent) of a non-root inner node
    pub max_inner_degree: usize,
    /// Number of children of the root
    pub root_degree: usize,
    /// Length of the edge between the root and its origin
    pub root_length: EdgeLength,
    /// Shape class of the tree
    pub shape: TreeShape,
    /// Statistics over all non-root branch lengths
    pub branch_lengths: Summary,
    /// Largest leaf to leaf distance
    pub diameter: Option<EdgeLength>,
}

impl TreeInfo {
    /// Formats the summary with a given number of decimals
    pub fn report(&self, precision: usize) -> String {
        let bl = &self.branch_lengths;
        let mut out = String::new();
        out += &format!("Leaves (tip nodes): {}\n", self.leaves);
        out += &format!("Inner nodes: {}\n", self.inner);
        out += &format!("Total nodes: {}\n", self.leaves + self.inner);
        out += &format!("Edges: {}\n", self.edges);
        out += &format!("Minimum inner node degree: {}\n", self.min_inner_degree);
        out += &format!("Maximum inner node degree: {}\n", self.max_inner_degree);
        out += &format!("Root degree: {}\n", self.root_degree);
        out += &format!("Root<->Origin length: {:.*}\n", precision, self.root_length);
        out += &format!("Tree shape: {}\n", self.shape);
        out += &format!("Min. branch length: {:.*}\n", precision, bl.min);
        out += &format!("Max. branch length: {:.*}\n", precision, bl.max);
        out += &format!("Mean branch length: {:.*}\n", precision, bl.mean);
        out += &format!("Median branch length: {:.*}\n", precision, bl.median);
        out += &format!("Branch length variance: {:.*}\n", precision, bl.variance);
        out += &format!("Branch length stdev: {:.*}\n", precision, bl.stdev);
        match self.diameter {
            Some(d) => out += &format!("Diameter: {:.*}", precision, d),
            None => out += "Diameter: -",
        }
        out
    }
}

/// A Phylogenetic tree
///
/// Nodes live in an arena and refer to each other through [`NodeId`]
/// indices. The `leaves` and `inner` vectors are derived from the links and
/// are refreshed by [`Tree::rebuild_index`], which every mutating method runs
/// before returning.
#[derive(Debug, Clone)]
pub struct Tree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: Option<NodeId>,
    leaves: Vec<NodeId>,
    inner: Vec<NodeId>,
}

/// Base methods to add and get [`Node`] objects to and from the [`Tree`].
///
/// ----
/// ----
impl Tree {
    /// Create a new empty Tree object
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            leaves: Vec::new(),
            inner: Vec::new(),
        }
    }

    // ############################
    // # ADDING AND GETTING NODES #
    // ############################

    /// Add a new node to the tree. The first node added to an empty tree
    /// becomes its root.
    ///
    /// Adding nodes does not refresh the leaf and inner node index, call
    /// [`Tree::rebuild_index`] once the tree is built.
    pub fn add(&mut self, node: Node) -> NodeId {
        let idx = self.nodes.len();
        let mut node = node;
        node.id = idx;
        node.deleted = false;
        self.nodes.push(node);

        if self.root.is_none() {
            self.root = Some(idx);
        }

        idx
    }

    /// Add a child to one of the tree's nodes.
    ///
    /// # Example
    /// ```
    /// use ntree::tree::{Tree, Node};
    ///
    /// // Create the tree and add a root node
    /// let mut tree = Tree::new();
    /// let root_id = tree.add(Node::new());
    ///
    /// // Add children to the root
    /// let left = tree.add_child(Node::new_named("A"), root_id, None).unwrap();
    /// let right = tree.add_child(Node::new_named("B"), root_id, Some(0.1)).unwrap();
    /// tree.rebuild_index().unwrap();
    ///
    /// assert_eq!(tree.get(&root_id).unwrap().children, vec![left, right]);
    /// assert_eq!(tree.get(&right).unwrap().parent_edge, Some(0.1));
    /// assert_eq!(tree.get_leaves(), &[left, right]);
    /// ```
    pub fn add_child(
        &mut self,
        node: Node,
        parent: NodeId,
        edge: Option<EdgeLength>,
    ) -> Result<NodeId, TreeError> {
        self.get(&parent)?;

        let mut node = node;
        node.set_parent(parent, edge);

        let id = self.add(node);
        self.get_mut(&parent)?.add_child(id);

        Ok(id)
    }

    /// Get a reference to a specific Node of the tree
    pub fn get(&self, id: &NodeId) -> Result<&Node, TreeError> {
        match self.nodes.get(*id) {
            Some(node) if !node.deleted => Ok(node),
            _ => Err(TreeError::NodeNotFound(*id)),
        }
    }

    /// Get a mutable reference to a specific Node of the tree
    pub fn get_mut(&mut self, id: &NodeId) -> Result<&mut Node, TreeError> {
        match self.nodes.get_mut(*id) {
            Some(node) if !node.deleted => Ok(node),
            _ => Err(TreeError::NodeNotFound(*id)),
        }
    }

    /// Iterate over the nodes of the tree that have not been deleted.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|node| !node.deleted)
    }

    /// Get a reference to a node in the tree by name.
    /// Note that this does not check for name unicity, if several nodes
    /// match a name this function will return the first match in the tree.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,B)C,D)E;").unwrap();
    /// let node = tree.get_by_name("C").unwrap();
    ///
    /// assert_eq!(node.children.len(), 2);
    /// assert!(tree.get_by_name("F").is_none());
    /// ```
    pub fn get_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes().find(|node| node.name.as_deref() == Some(name))
    }

    /// Get the id of the first leaf carrying the given label
    pub fn get_leaf_by_name(&self, name: &str) -> Option<NodeId> {
        self.leaves
            .iter()
            .copied()
            .find(|id| self.nodes[*id].name.as_deref() == Some(name))
    }

    /// Search nodes in the tree with a closure.
    pub fn search_nodes(&self, cond: impl Fn(&Node) -> bool) -> Vec<NodeId> {
        self.nodes()
            .filter(|node| cond(node))
            .map(|node| node.id)
            .collect()
    }

    /// Gets the root node. In the case of unrooted trees this node is a "virtual root"
    /// that has exactly 3 children.
    pub fn get_root(&self) -> Result<NodeId, TreeError> {
        self.root.ok_or(TreeError::RootNotFound)
    }

    /// Returns the ids of the leaves of the tree, in post-order
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,B),C);").unwrap();
    /// let names: Vec<_> = tree
    ///     .get_leaves()
    ///     .iter()
    ///     .map(|id| tree.get(id).unwrap().name.clone().unwrap())
    ///     .collect();
    ///
    /// assert_eq!(names, vec!["A", "B", "C"]);
    /// ```
    pub fn get_leaves(&self) -> &[NodeId] {
        &self.leaves
    }

    /// Returns the ids of the inner nodes of the tree in post-order,
    /// the root is the last one.
    pub fn get_inner(&self) -> &[NodeId] {
        &self.inner
    }

    /// Returns a [`Vec`] containing the Names of the leaf nodes of the tree
    pub fn get_leaf_names(&self) -> Vec<Option<String>> {
        self.leaves
            .iter()
            .map(|id| self.nodes[*id].name.clone())
            .collect()
    }

    /// Number of live nodes in the tree
    pub fn size(&self) -> usize {
        self.leaves.len() + self.inner.len()
    }

    /// Number of leaves in the tree
    pub fn n_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Number of inner nodes in the tree (root included)
    pub fn n_inner(&self) -> usize {
        self.inner.len()
    }

    /// Gets the node ids of all the leaves in the subtree rooted at the specified node
    pub fn get_subtree_leaves(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut leaves = vec![];
        for id in self.preorder(root)? {
            if self.nodes[id].is_tip() {
                leaves.push(id)
            }
        }
        Ok(leaves)
    }

    /// Re-derives the leaf and inner node index and the leaf count of every
    /// node from the root, in a single post-order pass.
    ///
    /// This must run after any change to parent/child links before the
    /// index or the leaf counts are read again. Running it twice in a row
    /// changes nothing.
    pub fn rebuild_index(&mut self) -> Result<(), TreeError> {
        let root = self.get_root()?;
        self.get(&root)?;

        let mut leaves = Vec::new();
        let mut inner = Vec::new();
        let mut stack = vec![(root, false)];

        while let Some((id, expanded)) = stack.pop() {
            let node = self.get(&id)?;
            if node.is_tip() {
                leaves.push(id);
                self.nodes[id].leaves = 1;
            } else if expanded {
                let count: usize = node.children.iter().map(|c| self.nodes[*c].leaves).sum();
                self.nodes[id].leaves = count;
                inner.push(id);
            } else {
                stack.push((id, true));
                for child in node.children.iter().rev() {
                    stack.push((*child, false));
                }
            }
        }

        self.leaves = leaves;
        self.inner = inner;

        Ok(())
    }

    /// Verifies the structural invariants of the tree: a single parentless
    /// root, consistent parent and child links, every live node reachable
    /// exactly once from the root, and up to date leaf counts.
    pub fn check(&self) -> Result<(), TreeError> {
        let root = self.get_root()?;
        if self.get(&root)?.parent.is_some() {
            return Err(TreeError::Inconsistent(format!("root {root} has a parent")));
        }

        let mut seen = vec![false; self.nodes.len()];
        for id in self.preorder(&root)? {
            if seen[id] {
                return Err(TreeError::Inconsistent(format!("node {id} reached twice")));
            }
            seen[id] = true;

            let node = &self.nodes[id];
            let mut expected = 0;
            for child in node.children.iter() {
                let child_node = self.get(child)?;
                if child_node.parent != Some(id) {
                    return Err(TreeError::Inconsistent(format!(
                        "node {child} does not point back to its parent {id}"
                    )));
                }
                expected += child_node.leaves;
            }
            let expected = if node.is_tip() { 1 } else { expected };
            if node.leaves != expected {
                return Err(TreeError::Inconsistent(format!(
                    "node {id} has a stale leaf count"
                )));
            }
        }

        let live = self.nodes().count();
        if live != seen.iter().filter(|s| **s).count() || live != self.size() {
            return Err(TreeError::Inconsistent(
                "the node index does not cover the tree".into(),
            ));
        }

        Ok(())
    }
}

/// Methods to traverse the [`Tree`]
///
/// ----
/// ----
impl Tree {
    // ###################
    // # TREE TRAVERSALS #
    // ###################

    /// Returns a vector containing node ids in the same order as the
    /// [preorder](https://en.wikipedia.org/wiki/Tree_traversal#Pre-order,_NLR) tree traversal
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,(C,E)D)B,((H)I)G)F;").unwrap();
    /// let preorder: Vec<_> = tree.preorder(&tree.get_root().unwrap())
    ///     .unwrap()
    ///     .iter()
    ///     .map(|id| tree.get(id).unwrap().name.clone())
    ///     .flatten()
    ///     .collect();
    ///
    /// assert_eq!(preorder, vec!["F", "B", "A", "D", "C", "E", "G", "I", "H"])
    /// ```
    pub fn preorder(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut order = vec![];
        let mut stack = vec![*root];

        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.get(&id)?.children.iter().rev());
        }

        Ok(order)
    }

    /// Returns a vector containing node ids in the same order as the
    /// [postorder](https://en.wikipedia.org/wiki/Tree_traversal#Post-order,_LRN) tree traversal
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,(C,E)D)B,((H)I)G)F;").unwrap();
    /// let postorder: Vec<_> = tree.postorder(&tree.get_root().unwrap())
    ///     .unwrap()
    ///     .iter()
    ///     .map(|id| tree.get(id).unwrap().name.clone())
    ///     .flatten()
    ///     .collect();
    ///
    /// assert_eq!(postorder, vec!["A", "C", "E", "D", "B", "H", "I", "G", "F"])
    /// ```
    pub fn postorder(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut order = vec![];
        let mut stack = vec![*root];

        // Reversed (root, right, left) order is (left, right, root)
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.get(&id)?.children.iter());
        }
        order.reverse();

        Ok(order)
    }

    /// Returns a vector containing node ids in the same order as the
    /// [levelorder](https://en.wikipedia.org/wiki/Tree_traversal#Breadth-first_search) tree traversal
    pub fn levelorder(&self, root: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut order = vec![];
        let mut queue = VecDeque::from([*root]);

        while let Some(id) = queue.pop_front() {
            order.push(id);
            queue.extend(self.get(&id)?.children.iter());
        }

        Ok(order)
    }

    /// Returns the path from the root down to the node, both included
    pub fn get_path_from_root(&self, node: &NodeId) -> Result<Vec<NodeId>, TreeError> {
        let mut path = vec![*node];
        let mut current = self.get(node)?;

        while let Some(parent) = current.parent {
            path.push(parent);
            current = self.get(&parent)?;
        }
        path.reverse();

        Ok(path)
    }

    /// Gets the most recent common ancestor of a set of nodes
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,(C,E)D)B,((H)I)G)F;").unwrap();
    /// let ids: Vec<_> = ["A", "E"]
    ///     .iter()
    ///     .map(|name| tree.get_by_name(name).unwrap().id)
    ///     .collect();
    ///
    /// let mrca = tree.get_common_ancestor(&ids).unwrap();
    /// assert_eq!(tree.get(&mrca).unwrap().name, Some("B".into()));
    /// ```
    pub fn get_common_ancestor(&self, nodes: &[NodeId]) -> Result<NodeId, TreeError> {
        let (first, rest) = nodes.split_first().ok_or(TreeError::IsEmpty)?;
        let mut common = self.get_path_from_root(first)?;

        for node in rest {
            let path = self.get_path_from_root(node)?;
            let shared = common
                .iter()
                .zip(path.iter())
                .take_while(|(a, b)| a == b)
                .count();
            common.truncate(shared);
        }

        common.last().copied().ok_or(TreeError::RootNotFound)
    }
}

/// Methods to get characteristics of a [`Tree`]
///
/// ----
/// ----
impl Tree {
    // #######################################
    // # GETTING CHARACTERISTICS OF THE TREE #
    // #######################################

    /// Checks if every inner node has exactly two children
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// assert!(Tree::from_newick("((A,B),(C,D));").unwrap().is_binary_rooted());
    /// assert!(!Tree::from_newick("(A,B,(C,D));").unwrap().is_binary_rooted());
    /// ```
    pub fn is_binary_rooted(&self) -> bool {
        self.inner
            .iter()
            .all(|id| self.nodes[*id].children.len() == 2)
    }

    /// Checks if the root has three children and every other inner node two
    pub fn is_binary_unrooted(&self) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        self.nodes[root].children.len() == 3
            && self
                .inner
                .iter()
                .filter(|id| **id != root)
                .all(|id| self.nodes[*id].children.len() == 2)
    }

    /// Returns the shape class of the tree
    pub fn shape(&self) -> TreeShape {
        if self.is_binary_rooted() {
            TreeShape::BinaryRooted
        } else if self.is_binary_unrooted() {
            TreeShape::BinaryUnrooted
        } else {
            TreeShape::General
        }
    }

    /// Checks if the root of the tree has exactly two children
    pub fn is_rooted(&self) -> Result<bool, TreeError> {
        let root = self.get(&self.get_root()?)?;
        Ok(root.children.len() == 2)
    }

    /// Checks that every leaf is named and that no two leaves share a name
    pub fn has_unique_tip_names(&self) -> Result<bool, TreeError> {
        let mut names = Vec::with_capacity(self.leaves.len());
        for id in self.leaves.iter() {
            match &self.nodes[*id].name {
                Some(name) => names.push(name),
                None => return Err(TreeError::UnnamedLeaves),
            }
        }

        Ok(names.iter().all_unique())
    }

    /// Gets the lengths of all the branches except the root's own, leaves
    /// first then inner nodes.
    pub fn branch_lengths(&self) -> Vec<EdgeLength> {
        self.leaves
            .iter()
            .chain(self.inner.iter())
            .filter(|id| Some(**id) != self.root)
            .map(|id| self.nodes[*id].edge_length())
            .collect()
    }

    /// Gets the sum of all branch lengths of the tree, the root's own included
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A:1,B:2):0.5,C:3):1;").unwrap();
    /// assert_eq!(tree.length(), 7.5);
    /// ```
    pub fn length(&self) -> EdgeLength {
        self.nodes().map(|node| node.edge_length()).sum()
    }

    /// Collects structural and branch length statistics of the tree
    pub fn info(&self) -> Result<TreeInfo, TreeError> {
        let root = self.get_root()?;
        let root_node = self.get(&root)?;

        let degrees: Vec<_> = self
            .inner
            .iter()
            .filter(|id| **id != root)
            .map(|id| self.nodes[*id].children.len() + 1)
            .collect();

        Ok(TreeInfo {
            leaves: self.n_leaves(),
            inner: self.n_inner(),
            edges: self.size().saturating_sub(1),
            min_inner_degree: degrees.iter().copied().min().unwrap_or(0),
            max_inner_degree: degrees.iter().copied().max().unwrap_or(0),
            root_degree: root_node.children.len(),
            root_length: root_node.edge_length(),
            shape: self.shape(),
            branch_lengths: summarize(&self.branch_lengths()),
            diameter: self.weighted_diameter()?,
        })
    }
}

/// Methods to modify the [`Tree`]
///
/// ----
/// ----
impl Tree {
    // ##################
    // # ALTER THE TREE #
    // ##################

    /// Rescale the branch lengths of the tree
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F;").unwrap();
    /// // Double all branch lengths
    /// tree.rescale(2.0);
    ///
    /// assert_eq!(
    ///     tree.to_newick().unwrap(),
    ///     "(A:0.2,B:0.4,(C:0.6,D:0.8)E:1)F;"
    /// )
    /// ```
    pub fn rescale(&mut self, factor: f64) {
        for node in self.nodes.iter_mut() {
            node.rescale_edge(factor)
        }
    }

    /// Sets every branch length below the root to the same value
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("((A:0.1,B):0.2,C:0.3);").unwrap();
    /// tree.reset_lengths(1.0);
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "((A:1,B:1):1,C:1);");
    /// ```
    pub fn reset_lengths(&mut self, value: EdgeLength) {
        for node in self.nodes.iter_mut() {
            if node.parent.is_some() {
                node.parent_edge = Some(value);
            }
        }
    }

    /// Resets the marks of all nodes
    pub fn reset_marks(&mut self) {
        for node in self.nodes.iter_mut() {
            node.mark = false;
        }
    }

    /// Marks every ancestor of a marked leaf
    pub fn mark_root_paths(&mut self) {
        for i in 0..self.leaves.len() {
            if !self.nodes[self.leaves[i]].mark {
                continue;
            }
            let mut current = self.nodes[self.leaves[i]].parent;
            while let Some(id) = current {
                if self.nodes[id].mark {
                    break;
                }
                self.nodes[id].mark = true;
                current = self.nodes[id].parent;
            }
        }
    }

    /// Randomly permutes the children of every inner node
    pub fn shuffle_children<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<(), TreeError> {
        for i in 0..self.inner.len() {
            let id = self.inner[i];
            self.nodes[id].children.shuffle(rng);
        }
        self.rebuild_index()
    }

    /// Randomly permutes the labels of the leaves, keeping the topology
    pub fn shuffle_labels<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let mut labels = self.get_leaf_names();
        labels.shuffle(rng);
        for (id, label) in self.leaves.iter().zip(labels) {
            self.nodes[*id].name = label;
        }
    }

    /// Detaches the node from its parent, the node becomes parentless
    pub(crate) fn detach(&mut self, id: &NodeId) -> Result<(), TreeError> {
        if let Some(parent) = self.get(id)?.parent {
            self.get_mut(&parent)?.remove_child(id)?;
        }
        self.get_mut(id)?.parent = None;
        Ok(())
    }

    /// Removes a node with exactly one child, the child takes its slot and
    /// the two branch lengths are added up. Returns the child.
    pub(crate) fn splice_out(&mut self, id: &NodeId) -> Result<NodeId, TreeError> {
        let node = self.get(id)?;
        if node.children.len() != 1 {
            return Err(TreeError::CouldNotCompressNode(*id));
        }
        let child = node.children[0];
        let parent = node.parent;
        let length = add_edges(node.parent_edge, self.get(&child)?.parent_edge);

        match parent {
            Some(parent) => self.get_mut(&parent)?.replace_child(id, child)?,
            None => self.root = Some(child),
        }
        let child_node = self.get_mut(&child)?;
        child_node.parent = parent;
        child_node.parent_edge = length;

        self.get_mut(id)?.delete();

        Ok(child)
    }
}

/// Adds two optional branch lengths, the result is missing only if both are
pub(crate) fn add_edges(a: Option<EdgeLength>, b: Option<EdgeLength>) -> Option<EdgeLength> {
    match (a, b) {
        (None, None) => None,
        (a, b) => Some(a.unwrap_or(0.0) + b.unwrap_or(0.0)),
    }
}

impl Tree {
    /// Recursive function that adds node representation to a printable tree builder
    fn print_nodes(&self, root_idx: &NodeId, output_tree: &mut TreeBuilder) -> Result<(), TreeError> {
        let root = self.get(root_idx)?;
        let label = format!("{root}");

        if root.children.is_empty() {
            output_tree.add_empty_child(label);
        } else {
            output_tree.begin_child(label);
            for child_idx in root.children.iter() {
                self.print_nodes(child_idx, output_tree)?;
            }
            output_tree.end_child();
        }

        Ok(())
    }

    /// Print the tree to the console
    pub fn print(&self) -> Result<(), TreeError> {
        let root = self.get_root()?;
        let mut builder = TreeBuilder::new(format!("{}", self.get(&root)?));
        for child_idx in self.get(&root)?.children.iter() {
            self.print_nodes(child_idx, &mut builder)?;
        }
        let tree = builder.build();
        print_tree(&tree)?;
        Ok(())
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::rstest;

    use super::*;

    /// Generates example tree from the tree traversal wikipedia page
    /// https://en.wikipedia.org/wiki/Tree_traversal#Depth-first_search
    fn build_simple_tree() -> Result<Tree, TreeError> {
        let mut tree = Tree::new();
        tree.add(Node::new_named("F")); // 0
        tree.add_child(Node::new_named("B"), 0, None)?; // 1
        tree.add_child(Node::new_named("G"), 0, None)?; // 2
        tree.add_child(Node::new_named("A"), 1, None)?; // 3
        tree.add_child(Node::new_named("D"), 1, None)?; // 4
        tree.add_child(Node::new_named("I"), 2, None)?; // 5
        tree.add_child(Node::new_named("C"), 4, None)?; // 6
        tree.add_child(Node::new_named("E"), 4, None)?; // 7
        tree.add_child(Node::new_named("H"), 5, None)?; // 8
        tree.rebuild_index()?;

        Ok(tree)
    }

    fn get_values(indices: &[usize], tree: &Tree) -> Vec<Option<String>> {
        indices
            .iter()
            .map(|idx| tree.get(idx).unwrap().name.clone())
            .collect()
    }

    #[test]
    fn index_classifies_nodes() {
        let tree = build_simple_tree().unwrap();

        assert_eq!(tree.get_leaves(), &[3, 6, 7, 8]);
        assert_eq!(tree.get_inner(), &[4, 1, 5, 2, 0]);
        assert_eq!(tree.size(), 9);
        assert_eq!(tree.get(&0).unwrap().subtree_leaf_count(), 4);
        assert_eq!(tree.get(&1).unwrap().subtree_leaf_count(), 3);
        assert_eq!(tree.get(&2).unwrap().subtree_leaf_count(), 1);
        tree.check().unwrap();
    }

    #[test]
    fn rebuild_index_is_idempotent() {
        let mut tree = Tree::from_newick("(((A,B)x,(C,D)y)z,E,(F,(G,H)u)v)r;").unwrap();
        let leaves = tree.get_leaves().to_vec();
        let inner = tree.get_inner().to_vec();
        let counts: Vec<_> = tree.nodes().map(|n| n.subtree_leaf_count()).collect();

        tree.rebuild_index().unwrap();
        tree.rebuild_index().unwrap();

        assert_eq!(tree.get_leaves(), &leaves[..]);
        assert_eq!(tree.get_inner(), &inner[..]);
        let after: Vec<_> = tree.nodes().map(|n| n.subtree_leaf_count()).collect();
        assert_eq!(counts, after);
        assert_eq!(*tree.get_inner().last().unwrap(), tree.get_root().unwrap());
    }

    #[test]
    fn deep_caterpillar_index() {
        let mut tree = Tree::new();
        let mut parent = tree.add(Node::new());
        for i in 0..100_000 {
            tree.add_child(Node::new_named(&format!("T{i}")), parent, Some(1.0))
                .unwrap();
            parent = tree.add_child(Node::new(), parent, Some(1.0)).unwrap();
        }
        tree.rebuild_index().unwrap();

        assert_eq!(tree.n_leaves(), 100_001);
        assert_eq!(tree.n_inner(), 100_000);
        assert_eq!(
            tree.get(&tree.get_root().unwrap()).unwrap().subtree_leaf_count(),
            100_001
        );
    }

    #[test]
    fn traversals() {
        let tree = build_simple_tree().unwrap();
        let root = tree.get_root().unwrap();

        let pre = get_values(&tree.preorder(&root).unwrap(), &tree);
        let post = get_values(&tree.postorder(&root).unwrap(), &tree);
        let level = get_values(&tree.levelorder(&root).unwrap(), &tree);

        let to_str = |names: Vec<Option<String>>| names.into_iter().flatten().join("");
        assert_eq!(to_str(pre), "FBADCEGIH");
        assert_eq!(to_str(post), "ACEDBHIGF");
        assert_eq!(to_str(level), "FBGADICEH");
    }

    #[test]
    fn shapes() {
        let test_cases = vec![
            ("((A,B,C)D,E)F;", TreeShape::General),
            ("(A,B,(C,D)E)F;", TreeShape::BinaryUnrooted),
            ("((D,E)B,(F,G)C)A;", TreeShape::BinaryRooted),
            ("(((A,B),C),D,(E,F,G));", TreeShape::General),
        ];

        for (newick, shape) in test_cases {
            assert_eq!(Tree::from_newick(newick).unwrap().shape(), shape, "{newick}")
        }
    }

    #[test]
    fn path_and_mrca() {
        let tree = build_simple_tree().unwrap();
        let path = tree.get_path_from_root(&7).unwrap();
        assert_eq!(path, vec![0, 1, 4, 7]);

        assert_eq!(tree.get_common_ancestor(&[3, 7]).unwrap(), 1);
        assert_eq!(tree.get_common_ancestor(&[6, 8]).unwrap(), 0);
        assert_eq!(tree.get_common_ancestor(&[6]).unwrap(), 6);
    }

    #[test]
    fn unique_tip_names() {
        let test_cases = vec![
            ("(A,B,(C,D)E)F;", true),
            ("(A,B,(C,A)E)F;", false),
        ];

        for (newick, unique) in test_cases {
            let tree = Tree::from_newick(newick).unwrap();
            assert_eq!(tree.has_unique_tip_names().unwrap(), unique);
        }

        let unnamed = Tree::from_newick("(A,,(C,D));").unwrap();
        assert!(matches!(
            unnamed.has_unique_tip_names(),
            Err(TreeError::UnnamedLeaves)
        ));
    }

    #[test]
    fn root_path_marks() {
        let mut tree = build_simple_tree().unwrap();
        tree.get_mut(&6).unwrap().mark = true;
        tree.mark_root_paths();

        let marked: Vec<_> = tree.search_nodes(|n| n.mark);
        assert_eq!(marked, vec![0, 1, 4, 6]);

        tree.reset_marks();
        assert!(tree.search_nodes(|n| n.mark).is_empty());
    }

    #[test]
    fn splice_sums_lengths() {
        let mut tree = Tree::from_newick("((A:1,B:1)x:2,(C:1)y:3)r;").unwrap();
        let y = tree.get_by_name("y").unwrap().id;
        let c = tree.splice_out(&y).unwrap();
        tree.rebuild_index().unwrap();

        assert_eq!(tree.get(&c).unwrap().parent_edge, Some(4.0));
        assert_eq!(tree.to_newick().unwrap(), "((A:1,B:1)x:2,C:4)r;");
        tree.check().unwrap();
    }

    #[test]
    fn info_on_binary_unrooted() {
        let tree = Tree::from_newick("(A:1,B:2,(C:3,D:4):5);").unwrap();
        let info = tree.info().unwrap();

        assert_eq!(info.leaves, 4);
        assert_eq!(info.inner, 2);
        assert_eq!(info.edges, 5);
        assert_eq!(info.min_inner_degree, 3);
        assert_eq!(info.max_inner_degree, 3);
        assert_eq!(info.root_degree, 3);
        assert_eq!(info.shape, TreeShape::BinaryUnrooted);
        assert_eq!(info.branch_lengths.max, 5.0);
        assert_eq!(info.branch_lengths.median, 3.0);
        assert_eq!(info.diameter, Some(11.0));
    }

    #[test]
    fn shuffles_keep_structure() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree = Tree::from_newick("((A,B),(C,(D,E)),F);").unwrap();
        let mut names: Vec<_> = tree.get_leaf_names().into_iter().flatten().collect();

        tree.shuffle_labels(&mut rng);
        tree.shuffle_children(&mut rng).unwrap();
        tree.check().unwrap();

        let mut shuffled: Vec<_> = tree.get_leaf_names().into_iter().flatten().collect();
        names.sort();
        shuffled.sort();
        assert_eq!(names, shuffled);
        assert_eq!(tree.shape(), TreeShape::BinaryUnrooted);
    }

    #[rstest]
    #[case("((A,B),(C,D));", TreeShape::BinaryRooted)]
    #[case("((A,B),(C,(D,E)),F);", TreeShape::BinaryUnrooted)]
    #[case("((A,B,C),(D,E),F);", TreeShape::General)]
    #[case("(A,(B,C,D));", TreeShape::General)]
    fn shape_classes(#[case] newick: &str, #[case] shape: TreeShape) {
        let tree = Tree::from_newick(newick).unwrap();
        assert_eq!(tree.shape(), shape);
    }
}
