//! Lookup of leaves by label.
//!
//! The index maps each leaf label to the position of the leaf in
//! [`Tree::get_leaves`]. It is built for a single operation and dropped
//! afterwards, any structural change to the tree invalidates it.

use std::collections::HashMap;

use tracing::warn;

use crate::tree::{NodeId, Tree, TreeError};

/// Maps leaf labels to leaf positions
#[derive(Debug, Clone, Default)]
pub struct TaxonIndex {
    positions: HashMap<String, usize>,
}

impl TaxonIndex {
    /// Builds the index from labels given in leaf order. The first
    /// occurrence of a label wins, the labels seen more than once are
    /// returned next to the index. Unlabelled leaves are skipped.
    /// ```
    /// use ntree::taxa::TaxonIndex;
    ///
    /// let (index, duplicates) = TaxonIndex::from_labels([Some("A"), Some("B"), None, Some("A")]);
    ///
    /// assert_eq!(index.lookup("A"), Some(0));
    /// assert_eq!(index.lookup("B"), Some(1));
    /// assert_eq!(index.lookup("C"), None);
    /// assert_eq!(duplicates, vec!["A"]);
    /// ```
    pub fn from_labels<'a>(labels: impl IntoIterator<Item = Option<&'a str>>) -> (Self, Vec<String>) {
        let mut positions = HashMap::new();
        let mut duplicates = vec![];

        for (i, label) in labels.into_iter().enumerate() {
            let Some(label) = label else {
                continue;
            };
            if positions.contains_key(label) {
                duplicates.push(label.to_string());
            } else {
                positions.insert(label.to_string(), i);
            }
        }

        (Self { positions }, duplicates)
    }

    fn leaf_labels(tree: &Tree) -> impl Iterator<Item = Option<&str>> {
        tree.get_leaves()
            .iter()
            .map(|id| tree.nodes[*id].name.as_deref())
    }

    /// Builds the index of the leaves of a tree, duplicate labels are
    /// reported as warnings.
    pub fn build(tree: &Tree) -> Self {
        let (index, duplicates) = Self::from_labels(Self::leaf_labels(tree));
        for taxon in duplicates {
            warn!("duplicate taxon ({taxon})");
        }
        index
    }

    /// Builds the index of the leaves of a tree, failing on unlabelled
    /// leaves or duplicate labels.
    pub fn build_strict(tree: &Tree) -> Result<Self, TreeError> {
        if Self::leaf_labels(tree).any(|label| label.is_none()) {
            return Err(TreeError::UnnamedLeaves);
        }
        let (index, duplicates) = Self::from_labels(Self::leaf_labels(tree));
        match duplicates.into_iter().next() {
            Some(taxon) => Err(TreeError::DuplicateLeafNames(taxon)),
            None => Ok(index),
        }
    }

    /// Gets the leaf position of a label
    pub fn lookup(&self, label: &str) -> Option<usize> {
        self.positions.get(label).copied()
    }

    /// Checks if a label is in the index
    pub fn contains(&self, label: &str) -> bool {
        self.positions.contains_key(label)
    }

    /// Number of distinct labels in the index
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Checks if the index has no labels
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl Tree {
    /// Finds the leaves carrying the given labels.
    ///
    /// Unknown labels are an error unless `force` is set, in which case they
    /// are reported as warnings and skipped. Labels given twice are reported
    /// and counted once. Fails if no label matches.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
    /// let labels = vec!["B".to_string(), "Z".to_string()];
    ///
    /// assert!(tree.select_taxa(&labels, false).is_err());
    ///
    /// let selected = tree.select_taxa(&labels, true).unwrap();
    /// assert_eq!(selected, vec![tree.get_leaf_by_name("B").unwrap()]);
    /// ```
    pub fn select_taxa(&self, labels: &[String], force: bool) -> Result<Vec<NodeId>, TreeError> {
        let index = TaxonIndex::build(self);
        let mut selected = vec![];

        for label in labels {
            match index.lookup(label) {
                Some(leaf) => {
                    let id = self.get_leaves()[leaf];
                    if selected.contains(&id) {
                        warn!("taxon {label} selected more than once");
                    } else {
                        selected.push(id);
                    }
                }
                None if force => warn!("taxon {label} does not appear in the tree"),
                None => return Err(TreeError::TaxonNotFound(label.clone())),
            }
        }

        if selected.is_empty() {
            return Err(TreeError::NoMatchingTaxa);
        }

        Ok(selected)
    }

    /// Returns the labels that do not appear on any leaf of the tree
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
    /// let labels = vec!["A".to_string(), "E".to_string()];
    ///
    /// assert_eq!(tree.missing_taxa(&labels), vec!["E"]);
    /// ```
    pub fn missing_taxa(&self, labels: &[String]) -> Vec<String> {
        let index = TaxonIndex::build(self);
        labels
            .iter()
            .filter(|label| !index.contains(label))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_index() {
        let tree = Tree::from_newick("((A,B),(C,A));").unwrap();
        assert!(matches!(
            TaxonIndex::build_strict(&tree),
            Err(TreeError::DuplicateLeafNames(name)) if name == "A"
        ));

        let tree = Tree::from_newick("((A,B),(C,));").unwrap();
        assert!(matches!(
            TaxonIndex::build_strict(&tree),
            Err(TreeError::UnnamedLeaves)
        ));

        let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
        let index = TaxonIndex::build_strict(&tree).unwrap();
        assert_eq!(index.len(), 4);
        for (i, id) in tree.get_leaves().iter().enumerate() {
            let name = tree.get(id).unwrap().name.as_deref().unwrap();
            assert_eq!(index.lookup(name), Some(i));
        }
    }

    #[test]
    fn lenient_index_keeps_first() {
        let tree = Tree::from_newick("((A,B),(C,A));").unwrap();
        let index = TaxonIndex::build(&tree);
        assert_eq!(index.len(), 3);
        assert_eq!(index.lookup("A"), Some(0));
    }

    #[test]
    fn selection() {
        let tree = Tree::from_newick("((A,B),(C,D));").unwrap();
        let labels: Vec<String> = ["D", "A", "D"].iter().map(|s| s.to_string()).collect();
        let selected = tree.select_taxa(&labels, false).unwrap();
        assert_eq!(
            selected,
            vec![
                tree.get_leaf_by_name("D").unwrap(),
                tree.get_leaf_by_name("A").unwrap()
            ]
        );

        let none = vec!["X".to_string()];
        assert!(matches!(
            tree.select_taxa(&none, true),
            Err(TreeError::NoMatchingTaxa)
        ));
    }
}
