use tracing::{debug, info, warn};

use super::node::Node;
use super::tree_impl::{Tree, TreeError};
use super::{EdgeLength, NodeId};

use crate::taxa::TaxonIndex;

/// Where to place the root of a tree
#[derive(Debug, Clone, PartialEq)]
pub enum RerootPolicy {
    /// Halfway along the longest leaf to leaf path
    Midpoint,
    /// Halfway along the longest branch of the tree
    LongestBranch,
    /// On the branch separating the given taxa from the rest of the tree
    Outgroup(Vec<String>),
}

impl Default for RerootPolicy {
    fn default() -> Self {
        Self::LongestBranch
    }
}

/// Methods to root and unroot the [`Tree`]
///
/// ----
/// ----
impl Tree {
    // #####################
    // # ROOTING THE TREE #
    // #####################

    /// Roots the tree on the edge between `parent` and `child`.
    ///
    /// A new root node is created with `parent` and `child` as its two
    /// children, the branch lengths on either side of it are
    /// `parent_length` and `child_length`. Parent/child links on the path
    /// from the old root to `parent` are reversed, each branch length moving
    /// one step down the path. An old root left with a single child is
    /// removed and its two branches merged.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("(A:1,B:2,(C:3,D:4)x:5);").unwrap();
    /// let x = tree.get_by_name("x").unwrap().id;
    /// let c = tree.get_by_name("C").unwrap().id;
    ///
    /// tree.reroot_at_edge(x, c, 1.0, 2.0).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "(((A:1,B:2):5,D:4)x:1,C:2);");
    /// ```
    pub fn reroot_at_edge(
        &mut self,
        parent: NodeId,
        child: NodeId,
        parent_length: EdgeLength,
        child_length: EdgeLength,
    ) -> Result<(), TreeError> {
        if self.get(&child)?.parent != Some(parent) {
            return Err(TreeError::NotAnEdge { parent, child });
        }
        let path = self.get_path_from_root(&parent)?;
        let old_root = path[0];

        // Lengths move one step down the path, before links are reversed
        for i in 1..path.len() {
            self.nodes[path[i - 1]].parent_edge = self.nodes[path[i]].parent_edge;
        }

        let new_root = self.add(Node::new());

        // Walk up from `parent`, each node adopting its former parent in the
        // slot of the child it is reached from
        let mut new_parent = new_root;
        let mut old_child = child;
        for i in (0..path.len()).rev() {
            let node = path[i];
            match i.checked_sub(1).map(|j| path[j]) {
                Some(old_parent) => self.get_mut(&node)?.replace_child(&old_child, old_parent)?,
                None => self.get_mut(&node)?.remove_child(&old_child)?,
            }
            self.get_mut(&node)?.parent = Some(new_parent);
            new_parent = node;
            old_child = node;
        }

        let root_node = self.get_mut(&new_root)?;
        root_node.children = vec![parent, child];
        root_node.parent = None;
        root_node.parent_edge = None;
        self.root = Some(new_root);

        self.get_mut(&parent)?.parent_edge = Some(parent_length);
        let child_node = self.get_mut(&child)?;
        child_node.parent = Some(new_root);
        child_node.parent_edge = Some(child_length);

        self.tidy(old_root)?;
        if self.get(&new_root)?.children.len() == 1 {
            self.splice_out(&new_root)?;
        }

        debug!("rerooted on edge {parent} -> {child}");

        self.rebuild_index()
    }

    /// Removes a node left without children or with a single child after
    /// surgery, walking up while removals leave further such nodes.
    pub(crate) fn tidy(&mut self, node: NodeId) -> Result<(), TreeError> {
        let mut current = Some(node);

        while let Some(id) = current {
            let node = self.get(&id)?;
            match node.children.len() {
                0 if node.parent.is_some() => {
                    current = node.parent;
                    self.detach(&id)?;
                    self.get_mut(&id)?.delete();
                }
                1 if node.parent.is_some() => {
                    self.splice_out(&id)?;
                    current = None;
                }
                _ => current = None,
            }
        }

        Ok(())
    }

    /// Roots the tree following the given policy.
    ///
    /// Rooting is designed for binary unrooted trees, other shapes are
    /// rerooted all the same after a warning.
    /// ```
    /// use ntree::tree::{Tree, RerootPolicy};
    ///
    /// let mut tree = Tree::from_newick("(A:1,B:1,(C:1,D:1):6);").unwrap();
    /// tree.reroot(&RerootPolicy::LongestBranch).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "((A:1,B:1):3,(C:1,D:1):3);");
    /// ```
    pub fn reroot(&mut self, policy: &RerootPolicy) -> Result<(), TreeError> {
        if !self.is_binary_unrooted() {
            warn!("input tree is not binary unrooted");
        }

        match policy {
            RerootPolicy::Midpoint => {
                let mid = self.midpoint_edge()?;
                info!(
                    "rooting at midpoint, {} from node {}",
                    mid.child_length, mid.child
                );
                self.reroot_at_edge(mid.parent, mid.child, mid.parent_length, mid.child_length)
            }
            RerootPolicy::LongestBranch => {
                let (parent, child, length) = self.longest_branch()?;
                info!("rooting at the middle of the longest branch ({length})");
                self.reroot_at_edge(parent, child, length / 2.0, length / 2.0)
            }
            RerootPolicy::Outgroup(taxa) => {
                let child = self.outgroup_node(taxa)?;
                let parent = self.get(&child)?.parent.ok_or(TreeError::IncompleteClade)?;
                let half = self.get(&child)?.edge_length() / 2.0;
                self.reroot_at_edge(parent, child, half, half)
            }
        }
    }

    /// Finds the longest branch, terminal branches first then inner ones.
    /// The root's own branch is not considered.
    fn longest_branch(&self) -> Result<(NodeId, NodeId, EdgeLength), TreeError> {
        let mut best: Option<(NodeId, NodeId, EdgeLength)> = None;

        for id in self.get_leaves().iter().chain(self.get_inner().iter()) {
            let node = self.get(id)?;
            let Some(parent) = node.parent else {
                continue;
            };
            let length = node.edge_length();
            if best.map_or(true, |(_, _, l)| length > l) {
                best = Some((parent, *id, length));
            }
        }

        best.ok_or(TreeError::TooFewLeaves {
            required: 2,
            found: self.n_leaves(),
        })
    }

    /// Finds the node whose branch separates the given taxa from the rest of
    /// the tree. A single taxon designates its own leaf.
    ///
    /// The marked leaf count of every subtree is compared with its total leaf
    /// count: the outgroup is the highest node whose leaves are exactly the
    /// taxa, or failing that a node whose leaves are exactly the other taxa.
    pub fn outgroup_node(&mut self, taxa: &[String]) -> Result<NodeId, TreeError> {
        if taxa.is_empty() {
            return Err(TreeError::NoMatchingTaxa);
        }

        let index = TaxonIndex::build(self);
        let mut selected = Vec::with_capacity(taxa.len());
        for taxon in taxa {
            let leaf = index
                .lookup(taxon)
                .ok_or_else(|| TreeError::TaxonNotFound(taxon.clone()))?;
            selected.push(self.get_leaves()[leaf]);
        }

        self.reset_marks();
        let mut count = 0;
        for id in selected {
            if !self.nodes[id].mark {
                self.nodes[id].mark = true;
                count += 1;
            }
        }

        if count == 1 {
            let leaf = self.search_nodes(|n| n.mark && n.is_tip());
            self.reset_marks();
            return leaf.first().copied().ok_or(TreeError::NoMatchingTaxa);
        }

        self.mark_root_paths();

        let n = self.n_leaves();
        let mut marked = vec![0usize; self.nodes.len()];
        let mut clade = None;
        let mut complement = None;

        for id in self.get_leaves().iter().chain(self.get_inner().iter()) {
            let node = &self.nodes[*id];
            if node.is_tip() {
                marked[*id] = usize::from(node.mark);
            } else if node.mark {
                marked[*id] = node.children.iter().map(|c| marked[*c]).sum();
            }

            if node.parent.is_none() {
                continue;
            }
            if marked[*id] == count && node.leaves == count {
                clade = Some(*id);
            } else if marked[*id] == 0 && node.leaves == n - count && complement.is_none() {
                complement = Some(*id);
            }
        }

        self.reset_marks();
        clade.or(complement).ok_or(TreeError::IncompleteClade)
    }

    /// Turns a binary rooted tree into a binary unrooted one. Fails with
    /// [`TreeError::IsNotRooted`] on a tree that is already binary unrooted.
    ///
    /// The first inner child of the root becomes the new root and adopts
    /// the other child, whose branch absorbs the length of the new root's
    /// former branch.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("((A:1,B:1):2,(C:1,D:1):3);").unwrap();
    /// tree.unroot().unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "(A:1,B:1,(C:1,D:1):5);");
    /// ```
    pub fn unroot(&mut self) -> Result<(), TreeError> {
        if self.is_binary_unrooted() {
            return Err(TreeError::IsNotRooted);
        }
        if !self.is_binary_rooted() {
            return Err(TreeError::IsNotBinary);
        }
        if self.n_leaves() < 3 {
            return Err(TreeError::TooFewLeaves {
                required: 3,
                found: self.n_leaves(),
            });
        }

        self.collapse_binary_root()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use std::collections::BTreeSet;

    use super::*;
    use crate::bipartition::Bipartitions;
    use crate::tree::TreeShape;

    /// Non trivial splits, each one given by the side without the first taxon
    fn unrooted_splits(tree: &Tree) -> BTreeSet<Vec<String>> {
        let parts = Bipartitions::compute(tree).unwrap();
        let all: BTreeSet<String> = parts.labels().iter().cloned().collect();
        let first = &parts.labels()[0];

        parts
            .label_sets()
            .into_iter()
            .map(|side| {
                let side: BTreeSet<String> = side.into_iter().collect();
                if side.contains(first) {
                    all.difference(&side).cloned().collect::<Vec<_>>()
                } else {
                    side.into_iter().collect()
                }
            })
            .filter(|side| side.len() > 1 && side.len() + 1 < all.len())
            .collect()
    }

    fn root_to_tip(tree: &Tree, name: &str) -> f64 {
        let leaf = tree.get_leaf_by_name(name).unwrap();
        tree.get_path_from_root(&leaf)
            .unwrap()
            .iter()
            .map(|id| tree.get(id).unwrap().edge_length())
            .sum::<f64>()
            - tree.get(&tree.get_root().unwrap()).unwrap().edge_length()
    }

    #[test]
    fn reroot_reverses_path() {
        let mut tree = Tree::from_newick("(A:1,B:2,((C:1,D:1)y:3,E:2)x:5);").unwrap();
        let y = tree.get_by_name("y").unwrap().id;
        let c = tree.get_leaf_by_name("C").unwrap();

        tree.reroot_at_edge(y, c, 0.5, 0.5).unwrap();

        assert_eq!(
            tree.to_newick().unwrap(),
            "((((A:1,B:2):5,E:2)x:3,D:1)y:0.5,C:0.5);"
        );
        assert_eq!(tree.shape(), TreeShape::BinaryRooted);
        assert_eq!(tree.length(), 15.0);
        tree.check().unwrap();
    }

    #[test]
    fn reroot_on_non_edge_fails() {
        let mut tree = Tree::from_newick("(A,B,(C,D)x);").unwrap();
        let a = tree.get_leaf_by_name("A").unwrap();
        let x = tree.get_by_name("x").unwrap().id;
        let before = tree.to_newick().unwrap();

        assert!(matches!(
            tree.reroot_at_edge(x, a, 0.0, 0.0),
            Err(TreeError::NotAnEdge { .. })
        ));
        assert_eq!(tree.to_newick().unwrap(), before);
    }

    #[test]
    fn reroot_rooted_tree_drops_old_root() {
        let mut tree = Tree::from_newick("((A:1,B:1)x:1,(C:1,D:1)y:1)r;").unwrap();
        let y = tree.get_by_name("y").unwrap().id;
        let c = tree.get_leaf_by_name("C").unwrap();

        tree.reroot_at_edge(y, c, 0.5, 0.5).unwrap();

        assert_eq!(tree.to_newick().unwrap(), "(((A:1,B:1)x:2,D:1)y:0.5,C:0.5);");
        assert!(tree.get_by_name("r").is_none());
        tree.check().unwrap();
    }

    #[rstest]
    #[case("(A:1,B:2,(C:1,D:1):3);", "A")]
    #[case("(A:1,B:2,(C:1,D:1):3);", "D")]
    #[case("((A:1,B:1):1,C:2,(D:1,(E:1,F:1):2):1);", "E")]
    fn reroot_then_unroot_roundtrip(#[case] newick: &str, #[case] leaf: &str) {
        let original = Tree::from_newick(newick).unwrap();
        let mut tree = original.clone();

        let child = tree.get_leaf_by_name(leaf).unwrap();
        let parent = tree.get(&child).unwrap().parent.unwrap();
        let half = tree.get(&child).unwrap().edge_length() / 2.0;
        tree.reroot_at_edge(parent, child, half, half).unwrap();
        assert_eq!(tree.shape(), TreeShape::BinaryRooted);

        tree.unroot().unwrap();
        assert_eq!(tree.shape(), TreeShape::BinaryUnrooted);
        assert!((tree.length() - original.length()).abs() < 1e-12);

        assert_eq!(unrooted_splits(&original), unrooted_splits(&tree));
        tree.check().unwrap();
    }

    #[test]
    fn midpoint_balances_sides() {
        let mut tree = Tree::from_newick("(((A:1,B:1):2,C:1):0);").unwrap();
        tree.reroot(&RerootPolicy::Midpoint).unwrap();

        let root = tree.get_root().unwrap();
        let children = tree.get(&root).unwrap().children.clone();
        assert_eq!(children.len(), 2);

        assert_eq!(root_to_tip(&tree, "A"), 2.0);
        assert_eq!(root_to_tip(&tree, "C"), 2.0);
        assert_eq!(tree.weighted_diameter().unwrap(), Some(4.0));
        tree.check().unwrap();
    }

    #[test]
    fn midpoint_unrooted() {
        let mut tree = Tree::from_newick("(A:1,B:2,(C:3,D:8):1);").unwrap();
        tree.reroot(&RerootPolicy::Midpoint).unwrap();

        // Diameter B -> D is 11, the root sits 5.5 away from both ends
        assert_eq!(root_to_tip(&tree, "D"), 5.5);
        assert_eq!(root_to_tip(&tree, "B"), 5.5);
        assert_eq!(tree.n_leaves(), 4);
        tree.check().unwrap();
    }

    #[rstest]
    #[case(vec!["C", "D"], "((A:1,B:1):0.5,(C:1,D:1):0.5);")]
    #[case(vec!["A", "B"], "((A:1,B:1):0.5,(C:1,D:1):0.5);")]
    #[case(vec!["D"], "((C:1,(A:1,B:1):1):0.5,D:0.5);")]
    fn outgroup_rooting(#[case] taxa: Vec<&str>, #[case] expected: &str) {
        let mut tree = Tree::from_newick("(A:1,B:1,(C:1,D:1):1);").unwrap();
        let taxa: Vec<String> = taxa.into_iter().map(String::from).collect();
        tree.reroot(&RerootPolicy::Outgroup(taxa)).unwrap();

        assert_eq!(tree.to_newick().unwrap(), expected);
        tree.check().unwrap();
    }

    #[test]
    fn outgroup_must_be_a_clade() {
        let mut tree = Tree::from_newick("(A:1,B:1,(C:1,D:1):1,E:1);").unwrap();
        let taxa = vec!["A".to_string(), "C".to_string()];
        let before = tree.to_newick().unwrap();

        assert!(matches!(
            tree.reroot(&RerootPolicy::Outgroup(taxa)),
            Err(TreeError::IncompleteClade)
        ));
        assert_eq!(tree.to_newick().unwrap(), before);

        let missing = vec!["A".to_string(), "Z".to_string()];
        assert!(matches!(
            tree.reroot(&RerootPolicy::Outgroup(missing)),
            Err(TreeError::TaxonNotFound(name)) if name == "Z"
        ));
    }

    #[test]
    fn unroot_preconditions() {
        let mut unrooted = Tree::from_newick("(A,B,(C,D));").unwrap();
        assert!(matches!(unrooted.unroot(), Err(TreeError::IsNotRooted)));

        let mut multifurcating = Tree::from_newick("((A,B,C),D);").unwrap();
        assert!(matches!(multifurcating.unroot(), Err(TreeError::IsNotBinary)));

        let mut small = Tree::from_newick("(A,B);").unwrap();
        assert!(matches!(
            small.unroot(),
            Err(TreeError::TooFewLeaves { required: 3, found: 2 })
        ));
    }

    #[test]
    fn unroot_prefers_first_inner_child() {
        let mut tree = Tree::from_newick("(C:2,(A:1,B:1)x:1)r;").unwrap();
        tree.unroot().unwrap();

        assert_eq!(tree.to_newick().unwrap(), "(A:1,B:1,C:3)x;");
        assert_eq!(tree.n_inner(), 1);
        tree.check().unwrap();
    }
}
