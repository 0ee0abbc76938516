use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use super::node::Node;
use super::tree_impl::{add_edges, Tree, TreeError, TreeShape};
use super::NodeId;

/// How leaves are removed from a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PruneMode {
    /// Binary trees stay binary: the parent of a pruned leaf is removed
    /// along with it and the sibling takes its place.
    #[default]
    KeepShape,
    /// Only the leaf is removed, along with ancestors left without
    /// children. Unary nodes may remain.
    General,
}

/// Methods to remove leaves from the [`Tree`]
///
/// ----
/// ----
impl Tree {
    // ######################
    // # PRUNING THE TREE #
    // ######################

    /// Removes the given leaves from the tree and returns the shape class
    /// that decided how they were removed.
    ///
    /// With [`PruneMode::KeepShape`] a binary rooted tree keeps at least 2
    /// leaves and a binary unrooted tree at least 3, any other tree keeps at
    /// least 1. The limit is checked before the tree is modified.
    /// ```
    /// use ntree::tree::{PruneMode, Tree, TreeShape};
    ///
    /// let mut tree = Tree::from_newick("(((A:1,B:1):1,C:1):1,D:1);").unwrap();
    /// let a = tree.get_leaf_by_name("A").unwrap();
    ///
    /// let shape = tree.prune_leaves(&[a], PruneMode::KeepShape).unwrap();
    ///
    /// assert_eq!(shape, TreeShape::BinaryRooted);
    /// assert_eq!(tree.to_newick().unwrap(), "((B:2,C:1):1,D:1);");
    /// ```
    pub fn prune_leaves(
        &mut self,
        leaves: &[NodeId],
        mode: PruneMode,
    ) -> Result<TreeShape, TreeError> {
        let leaves: Vec<NodeId> = leaves.iter().copied().unique().collect();
        for id in leaves.iter() {
            if !self.get(id)?.is_tip() {
                return Err(TreeError::NotALeaf(*id));
            }
        }

        let shape = match mode {
            PruneMode::KeepShape => self.shape(),
            PruneMode::General => TreeShape::General,
        };
        let n = self.n_leaves();
        let max = match shape {
            TreeShape::BinaryRooted => n.saturating_sub(2),
            TreeShape::BinaryUnrooted => n.saturating_sub(3),
            TreeShape::General => n.saturating_sub(1),
        };
        if leaves.len() > max {
            return Err(TreeError::TooManyPruned { max });
        }

        for leaf in leaves.iter() {
            debug!(
                "pruning tip {}",
                self.nodes[*leaf].name.as_deref().unwrap_or_default()
            );
            match shape {
                TreeShape::BinaryRooted => self.prune_rooted(*leaf)?,
                TreeShape::BinaryUnrooted => self.prune_unrooted(*leaf)?,
                TreeShape::General => self.prune_general(*leaf)?,
            }
        }

        self.rebuild_index()?;

        Ok(shape)
    }

    /// Removes the leaves carrying the given labels, see
    /// [`Tree::select_taxa`] for the handling of unknown labels.
    /// ```
    /// use ntree::tree::{PruneMode, Tree};
    ///
    /// let mut tree = Tree::from_newick("((A:1,B:1):1,(C:1,D:1):1);").unwrap();
    /// let labels = vec!["C".to_string(), "Z".to_string()];
    ///
    /// assert!(tree.prune_labels(&labels, PruneMode::KeepShape, false).is_err());
    /// tree.prune_labels(&labels, PruneMode::KeepShape, true).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "((A:1,B:1):1,D:2);");
    /// ```
    pub fn prune_labels(
        &mut self,
        labels: &[String],
        mode: PruneMode,
        force: bool,
    ) -> Result<TreeShape, TreeError> {
        let selected = self.select_taxa(labels, force)?;
        info!("removing {} taxa", selected.len());
        self.prune_leaves(&selected, mode)
    }

    /// Removes `count` leaves chosen uniformly at random
    pub fn prune_random<R: Rng + ?Sized>(
        &mut self,
        count: usize,
        mode: PruneMode,
        rng: &mut R,
    ) -> Result<TreeShape, TreeError> {
        let mut leaves = self.get_leaves().to_vec();
        leaves.shuffle(rng);
        if count < leaves.len() {
            leaves.truncate(count);
        }
        self.prune_leaves(&leaves, mode)
    }

    /// Removes a leaf, then every ancestor left without children
    fn prune_general(&mut self, leaf: NodeId) -> Result<(), TreeError> {
        let mut current = leaf;

        loop {
            let parent = self.get(&current)?.parent;
            self.detach(&current)?;
            self.get_mut(&current)?.delete();

            match parent {
                Some(parent) if self.get(&parent)?.children.is_empty() => current = parent,
                _ => break,
            }
        }

        Ok(())
    }

    /// Removes a leaf and its parent, the sibling taking the parent's place
    /// and absorbing its branch length.
    fn prune_rooted(&mut self, leaf: NodeId) -> Result<(), TreeError> {
        let parent = self.get(&leaf)?.parent.ok_or(TreeError::RootNotFound)?;
        let (sibling, grandparent) = self.sibling_of(leaf, parent)?;

        match grandparent {
            Some(grandparent) => self.splice_sibling(parent, sibling, grandparent)?,
            None => {
                warn!("all taxa from one subtree deleted, root changed");
                self.get_mut(&sibling)?.parent = None;
                self.root = Some(sibling);
            }
        }

        self.get_mut(&parent)?.delete();
        self.get_mut(&leaf)?.delete();

        Ok(())
    }

    /// Same as the rooted case below the root. A leaf hanging from the root
    /// is replaced by a new three child root made of the two children of
    /// the first inner child of the root and the remaining child, which
    /// absorbs the branch length of the removed inner child.
    fn prune_unrooted(&mut self, leaf: NodeId) -> Result<(), TreeError> {
        let parent = self.get(&leaf)?.parent.ok_or(TreeError::RootNotFound)?;
        let grandparent = self.get(&parent)?.parent;

        if let Some(grandparent) = grandparent {
            let (sibling, _) = self.sibling_of(leaf, parent)?;
            self.splice_sibling(parent, sibling, grandparent)?;
            self.get_mut(&parent)?.delete();
            self.get_mut(&leaf)?.delete();
            return Ok(());
        }

        let old_root = self.get(&parent)?;
        let others: Vec<NodeId> = old_root
            .children
            .iter()
            .copied()
            .filter(|c| *c != leaf)
            .collect();
        let u = others
            .iter()
            .copied()
            .find(|c| !self.nodes[*c].is_tip())
            .ok_or(TreeError::TooFewLeaves {
                required: 4,
                found: self.n_leaves(),
            })?;
        let c = others
            .iter()
            .copied()
            .find(|c| *c != u)
            .ok_or(TreeError::IsNotBinary)?;

        let mut root = Node::new();
        root.name = old_root.name.clone();
        root.parent_edge = old_root.parent_edge;
        root.children = self.get(&u)?.children.clone();
        root.children.push(c);
        let children = root.children.clone();

        let new_root = self.add(root);
        for child in children {
            self.get_mut(&child)?.parent = Some(new_root);
        }
        let folded = add_edges(self.get(&c)?.parent_edge, self.get(&u)?.parent_edge);
        self.get_mut(&c)?.parent_edge = folded;

        for id in [parent, u, leaf] {
            self.get_mut(&id)?.delete();
        }
        self.root = Some(new_root);

        Ok(())
    }

    /// Gets the other child of a binary node and the node's own parent
    fn sibling_of(
        &self,
        leaf: NodeId,
        parent: NodeId,
    ) -> Result<(NodeId, Option<NodeId>), TreeError> {
        let node = self.get(&parent)?;
        if node.children.len() != 2 {
            return Err(TreeError::IsNotBinary);
        }
        let sibling = if node.children[0] == leaf {
            node.children[1]
        } else {
            node.children[0]
        };
        Ok((sibling, node.parent))
    }

    fn splice_sibling(
        &mut self,
        parent: NodeId,
        sibling: NodeId,
        grandparent: NodeId,
    ) -> Result<(), TreeError> {
        let length = add_edges(
            self.get(&sibling)?.parent_edge,
            self.get(&parent)?.parent_edge,
        );
        self.get_mut(&grandparent)?.replace_child(&parent, sibling)?;
        let sibling_node = self.get_mut(&sibling)?;
        sibling_node.parent = Some(grandparent);
        sibling_node.parent_edge = length;
        Ok(())
    }

    // ###########################
    // # CONTRACTING UNARY NODES #
    // ###########################

    /// Removes every node with a single child, the child taking its place
    /// and the two branch lengths being added up. Returns the number of
    /// removed nodes.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("(((A:1)u:1,B:1)x:1,(C:1)w:2);").unwrap();
    ///
    /// assert_eq!(tree.contract_unary().unwrap(), 2);
    /// assert_eq!(tree.to_newick().unwrap(), "((A:2,B:1)x:1,C:3);");
    /// ```
    pub fn contract_unary(&mut self) -> Result<usize, TreeError> {
        let root = self.get_root()?;
        let mut contracted = 0;

        for id in self.postorder(&root)? {
            if self.nodes[id].children.len() == 1 {
                self.splice_out(&id)?;
                contracted += 1;
            }
        }

        if contracted > 0 {
            debug!("contracted {contracted} unary nodes");
        }
        self.rebuild_index()?;

        Ok(contracted)
    }

    /// Merges a two child root into its first child that has children of its
    /// own, the other child being added as its last child and absorbing its
    /// branch length. Returns whether the root was merged.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("(A:1,(B:1,C:1)x:2);").unwrap();
    ///
    /// assert!(tree.collapse_binary_root().unwrap());
    /// assert_eq!(tree.to_newick().unwrap(), "(B:1,C:1,A:3)x;");
    /// ```
    pub fn collapse_binary_root(&mut self) -> Result<bool, TreeError> {
        let old_root = self.get_root()?;
        let children = self.get(&old_root)?.children.clone();
        if children.len() != 2 {
            return Ok(false);
        }

        let (new_root, other) = if self.get(&children[0])?.children.len() > 1 {
            (children[0], children[1])
        } else if self.get(&children[1])?.children.len() > 1 {
            (children[1], children[0])
        } else {
            return Ok(false);
        };

        let folded = add_edges(
            self.get(&new_root)?.parent_edge,
            self.get(&other)?.parent_edge,
        );
        let other_node = self.get_mut(&other)?;
        other_node.parent = Some(new_root);
        other_node.parent_edge = folded;

        let root_node = self.get_mut(&new_root)?;
        root_node.add_child(other);
        root_node.parent = None;
        root_node.parent_edge = None;

        self.get_mut(&old_root)?.delete();
        self.root = Some(new_root);

        self.rebuild_index()?;

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::rstest;

    use super::*;

    fn leaf(tree: &Tree, name: &str) -> NodeId {
        tree.get_leaf_by_name(name).unwrap()
    }

    #[test]
    fn prune_cherry_of_rooted_tree() {
        let mut tree = Tree::from_newick("(((A:1,B:1):1,C:1):1,D:1);").unwrap();
        let b = leaf(&tree, "B");

        tree.prune_leaves(&[b], PruneMode::KeepShape).unwrap();

        assert_eq!(tree.n_leaves(), 3);
        assert!(tree.is_binary_rooted());
        assert_eq!(tree.get(&leaf(&tree, "A")).unwrap().parent_edge, Some(2.0));
        assert_eq!(tree.length(), 5.0);
        tree.check().unwrap();
    }

    #[test]
    fn prune_changes_root() {
        let mut tree = Tree::from_newick("((A:1,B:1)x:2,C:1);").unwrap();
        let c = leaf(&tree, "C");

        tree.prune_leaves(&[c], PruneMode::KeepShape).unwrap();

        assert_eq!(tree.to_newick().unwrap(), "(A:1,B:1)x:2;");
        assert_eq!(tree.get_root().unwrap(), tree.get_by_name("x").unwrap().id);
        tree.check().unwrap();
    }

    #[rstest]
    #[case("A", "(C:1,D:1,B:3)r;")]
    #[case("C", "(A:1,B:1,D:3)r;")]
    fn prune_unrooted_tree(#[case] name: &str, #[case] expected: &str) {
        let mut tree = Tree::from_newick("(A:1,B:1,(C:1,D:1)x:2)r;").unwrap();
        let id = leaf(&tree, name);

        let shape = tree.prune_leaves(&[id], PruneMode::KeepShape).unwrap();

        assert_eq!(shape, TreeShape::BinaryUnrooted);
        assert_eq!(tree.to_newick().unwrap(), expected);
        assert!(tree.is_binary_unrooted());
        tree.check().unwrap();
    }

    #[test]
    fn prune_general_tree() {
        let mut tree = Tree::from_newick("((A,B,C)x,((D)y)z,E);").unwrap();
        let d = leaf(&tree, "D");

        let shape = tree.prune_leaves(&[d], PruneMode::KeepShape).unwrap();

        assert_eq!(shape, TreeShape::General);
        assert_eq!(tree.to_newick().unwrap(), "((A,B,C)x,E);");
        tree.check().unwrap();
    }

    #[test]
    fn general_mode_keeps_unary_nodes() {
        let mut tree = Tree::from_newick("((A:1,B:1):1,C:1);").unwrap();
        let a = leaf(&tree, "A");

        tree.prune_leaves(&[a], PruneMode::General).unwrap();

        assert_eq!(tree.to_newick().unwrap(), "((B:1):1,C:1);");
        tree.check().unwrap();
    }

    #[rstest]
    #[case("((A,B),(C,D));", PruneMode::KeepShape, 3, 2)]
    #[case("(A,B,(C,D));", PruneMode::KeepShape, 2, 1)]
    #[case("(A,B,(C,D));", PruneMode::General, 4, 3)]
    #[case("(A,B,C,D);", PruneMode::KeepShape, 4, 3)]
    fn prune_limits(
        #[case] newick: &str,
        #[case] mode: PruneMode,
        #[case] count: usize,
        #[case] expected_max: usize,
    ) {
        let mut tree = Tree::from_newick(newick).unwrap();
        let leaves = tree.get_leaves()[..count].to_vec();

        match tree.prune_leaves(&leaves, mode) {
            Err(TreeError::TooManyPruned { max }) => assert_eq!(max, expected_max),
            other => panic!("expected TooManyPruned, got {other:?}"),
        }
        assert_eq!(tree.to_newick().unwrap(), newick);
    }

    #[test]
    fn prune_inner_node_fails() {
        let mut tree = Tree::from_newick("((A,B)x,(C,D));").unwrap();
        let x = tree.get_by_name("x").unwrap().id;

        assert!(matches!(
            tree.prune_leaves(&[x], PruneMode::KeepShape),
            Err(TreeError::NotALeaf(_))
        ));
    }

    #[test]
    fn prune_by_labels() {
        let mut tree = Tree::from_newick("(A:1,B:1,((C:1,D:1):1,E:1):1);").unwrap();
        let labels: Vec<String> = ["A", "D", "A"].iter().map(|s| s.to_string()).collect();

        tree.prune_labels(&labels, PruneMode::KeepShape, false).unwrap();

        assert_eq!(tree.n_leaves(), 3);
        assert!(tree.is_binary_unrooted());
        assert_eq!(tree.length(), 5.0);
        tree.check().unwrap();

        let missing = vec!["Q".to_string()];
        assert!(matches!(
            tree.prune_labels(&missing, PruneMode::KeepShape, false),
            Err(TreeError::TaxonNotFound(_))
        ));
    }

    #[rstest]
    #[case(1)]
    #[case(5)]
    #[case(8)]
    fn prune_random_leaves(#[case] count: usize) {
        let mut rng = StdRng::seed_from_u64(42);
        let mut tree =
            Tree::from_newick("((((A,B),(C,D)),((E,F),(G,H))),(I,J));").unwrap();

        tree.prune_random(count, PruneMode::KeepShape, &mut rng)
            .unwrap();

        assert_eq!(tree.n_leaves(), 10 - count);
        assert!(tree.is_binary_rooted());
        tree.check().unwrap();
    }

    #[test]
    fn contract_unary_root() {
        let mut tree = Tree::from_newick("(((A:1,B:1)x:2)u:1);").unwrap();

        assert_eq!(tree.contract_unary().unwrap(), 2);
        assert_eq!(tree.to_newick().unwrap(), "(A:1,B:1)x:3;");
        tree.check().unwrap();
    }

    #[test]
    fn collapse_needs_inner_child() {
        let mut tree = Tree::from_newick("(A,B);").unwrap();
        assert!(!tree.collapse_binary_root().unwrap());

        let mut tree = Tree::from_newick("(A,B,C);").unwrap();
        assert!(!tree.collapse_binary_root().unwrap());

        let mut tree = Tree::from_newick("((A:1,B:1)x:2,(C:1,D:1)y:3);").unwrap();
        assert!(tree.collapse_binary_root().unwrap());
        assert_eq!(tree.to_newick().unwrap(), "(A:1,B:1,(C:1,D:1)y:5)x;");
        tree.check().unwrap();
    }
}
