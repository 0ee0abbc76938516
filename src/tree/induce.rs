use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use super::prune::PruneMode;
use super::tree_impl::{Tree, TreeError, TreeShape};
use super::NodeId;

/// Methods to restrict a [`Tree`] to a set of taxa
impl Tree {
    /// Keeps only the leaves carrying the given labels, every other leaf is
    /// pruned with [`Tree::prune_leaves`] and the same shape limits apply.
    ///
    /// Every label must name a leaf of the tree.
    /// ```
    /// use ntree::tree::{PruneMode, Tree};
    ///
    /// let mut tree = Tree::from_newick("(((A:1,B:1):1,C:1):1,(D:1,E:1):1);").unwrap();
    /// let labels: Vec<String> = ["A", "C", "E"].iter().map(|s| s.to_string()).collect();
    ///
    /// tree.induce(&labels, PruneMode::KeepShape).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "((A:2,C:1):1,E:2);");
    /// ```
    pub fn induce(&mut self, labels: &[String], mode: PruneMode) -> Result<TreeShape, TreeError> {
        self.select_taxa(labels, false)?;
        let keep: HashSet<&str> = labels.iter().map(String::as_str).collect();

        let removed: Vec<NodeId> = self
            .get_leaves()
            .iter()
            .copied()
            .filter(|id| {
                self.nodes[*id]
                    .name
                    .as_deref()
                    .map_or(true, |label| !keep.contains(label))
            })
            .collect();
        info!("inducing on {} taxa, pruning {}", keep.len(), removed.len());

        self.prune_leaves(&removed, mode)
    }

    /// Copies the subtree rooted at the most recent common ancestor of the
    /// leaves carrying the given labels. The root of the copy has no branch
    /// length.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("(((A:1,B:1)x:1,C:1)y:1,(D:1,E:1)z:1);").unwrap();
    /// let labels = vec!["B".to_string(), "C".to_string()];
    ///
    /// let clade = tree.clade(&labels).unwrap();
    ///
    /// assert_eq!(clade.to_newick().unwrap(), "((A:1,B:1)x:1,C:1)y;");
    /// ```
    pub fn clade(&self, labels: &[String]) -> Result<Tree, TreeError> {
        let leaves = self.select_taxa(labels, false)?;
        let ancestor = self.get_common_ancestor(&leaves)?;

        let mut clade = Tree::new();
        let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
        for id in self.preorder(&ancestor)? {
            let mut node = self.get(&id)?.clone();
            node.children.clear();
            node.mark = false;
            let parent = node.parent.and_then(|p| mapping.get(&p).copied());
            node.parent = parent;
            if parent.is_none() {
                node.parent_edge = None;
            }

            let new_id = clade.add(node);
            if let Some(parent) = parent {
                clade.get_mut(&parent)?.add_child(new_id);
            }
            mapping.insert(id, new_id);
        }

        debug!("copied {} nodes below node {ancestor}", mapping.len());
        clade.rebuild_index()?;

        Ok(clade)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[rstest]
    #[case("((A,B),(C,(D,E)));", &["A", "D", "E"], "(A,(D,E));", TreeShape::BinaryRooted)]
    #[case("(A,B,(C,(D,E)));", &["A", "C", "D"], "(C,D,A);", TreeShape::BinaryUnrooted)]
    #[case("((A,B,C),(D,E));", &["A", "B", "D"], "((A,B),(D));", TreeShape::General)]
    fn induce_keeps_selected_taxa(
        #[case] newick: &str,
        #[case] names: &[&str],
        #[case] expected: &str,
        #[case] shape: TreeShape,
    ) {
        let mut tree = Tree::from_newick(newick).unwrap();

        assert_eq!(tree.induce(&labels(names), PruneMode::KeepShape).unwrap(), shape);
        assert_eq!(tree.to_newick().unwrap(), expected);
        tree.check().unwrap();
    }

    #[test]
    fn induce_on_every_taxon_changes_nothing() {
        let newick = "((A:1,B:1):1,(C:1,D:1):1);";
        let mut tree = Tree::from_newick(newick).unwrap();

        tree.induce(&labels(&["D", "C", "B", "A"]), PruneMode::KeepShape)
            .unwrap();

        assert_eq!(tree.to_newick().unwrap(), newick);
    }

    #[test]
    fn induce_errors() {
        let mut tree = Tree::from_newick("((A,B),(C,D));").unwrap();

        assert!(matches!(
            tree.induce(&labels(&["A", "Z"]), PruneMode::KeepShape),
            Err(TreeError::TaxonNotFound(_))
        ));
        assert!(matches!(
            tree.induce(&labels(&["A"]), PruneMode::KeepShape),
            Err(TreeError::TooManyPruned { max: 2 })
        ));
        assert_eq!(tree.n_leaves(), 4);

        tree.induce(&labels(&["A"]), PruneMode::General).unwrap();
        assert_eq!(tree.get_leaf_names(), vec![Some("A".to_string())]);
    }

    #[rstest]
    #[case(&["A"], "A;")]
    #[case(&["A", "B"], "(A:1,B:1)x;")]
    #[case(&["A", "E"], "(((A:1,B:1)x:1,C:1)y:1,(D:1,E:1)z:1);")]
    fn clade_of_common_ancestor(#[case] names: &[&str], #[case] expected: &str) {
        let tree = Tree::from_newick("(((A:1,B:1)x:1,C:1)y:1,(D:1,E:1)z:1);").unwrap();

        let clade = tree.clade(&labels(names)).unwrap();

        assert_eq!(clade.to_newick().unwrap(), expected);
        clade.check().unwrap();
    }
}
