//! Bipartitions of trees and the comparison of two topologies.
//!
//! Every inner edge of a tree splits its leaves in two. The split is stored
//! as the bitmask of the leaves below the edge, bit `i` standing for the
//! `i`-th leaf label in sorted order. Masks are sorted as multi word
//! unsigned integers so that two trees over the same labels are compared
//! with a single merge walk of their sorted masks.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Display;

use fixedbitset::FixedBitSet;
use tracing::{debug, info};

use crate::taxa::TaxonIndex;
use crate::tree::{NodeId, PruneMode, Tree, TreeError};

/// Orders two masks of the same width as unsigned integers, most
/// significant word first.
fn cmp_masks(a: &FixedBitSet, b: &FixedBitSet) -> Ordering {
    a.as_slice().iter().rev().cmp(b.as_slice().iter().rev())
}

/// The non trivial bipartitions of a tree
#[derive(Debug, Clone)]
pub struct Bipartitions {
    labels: Vec<String>,
    splits: Vec<(NodeId, FixedBitSet)>,
}

impl Bipartitions {
    /// Computes the mask of every inner node except the root, leaves being
    /// numbered by sorted label. Masks are returned in ascending order.
    ///
    /// Leaves must be named and carry distinct labels.
    /// ```
    /// use ntree::bipartition::Bipartitions;
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((D,C),(A,B));").unwrap();
    /// let parts = Bipartitions::compute(&tree).unwrap();
    ///
    /// assert_eq!(parts.labels(), &["A", "B", "C", "D"]);
    /// assert_eq!(parts.bit_strings(), vec!["1100", "0011"]);
    /// ```
    pub fn compute(tree: &Tree) -> Result<Self, TreeError> {
        TaxonIndex::build_strict(tree)?;

        let mut labels: Vec<String> = tree
            .get_leaves()
            .iter()
            .filter_map(|id| tree.nodes[*id].name.clone())
            .collect();
        labels.sort();
        let n = labels.len();

        let bits: HashMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.as_str(), i))
            .collect();

        let mut masks: Vec<Option<FixedBitSet>> = vec![None; tree.nodes.len()];
        for id in tree.get_leaves() {
            let mut mask = FixedBitSet::with_capacity(n);
            if let Some(bit) = tree.nodes[*id].name.as_deref().and_then(|l| bits.get(l)) {
                mask.insert(*bit);
            }
            masks[*id] = Some(mask);
        }

        let root = tree.get_root()?;
        let mut splits = Vec::with_capacity(tree.n_inner().saturating_sub(1));
        for id in tree.get_inner() {
            let mut mask = FixedBitSet::with_capacity(n);
            for child in tree.get(id)?.children.iter() {
                if let Some(child_mask) = &masks[*child] {
                    mask.union_with(child_mask);
                }
            }
            if *id != root {
                splits.push((*id, mask.clone()));
            }
            masks[*id] = Some(mask);
        }

        splits.sort_by(|(_, a), (_, b)| cmp_masks(a, b));

        Ok(Self { labels, splits })
    }

    /// Sorted leaf labels, the label at position `i` owns bit `i`
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Number of bipartitions
    pub fn len(&self) -> usize {
        self.splits.len()
    }

    /// Checks if the tree has no bipartition
    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }

    /// Iterates over the inner nodes and their masks, in mask order
    pub fn iter(&self) -> impl Iterator<Item = &(NodeId, FixedBitSet)> {
        self.splits.iter()
    }

    /// Gets the labels of the leaves below each bipartition
    pub fn label_sets(&self) -> Vec<Vec<String>> {
        self.splits
            .iter()
            .map(|(_, mask)| mask.ones().map(|i| self.labels[i].clone()).collect())
            .collect()
    }

    /// Replaces every mask holding the first label by its complement, so
    /// that both sides of an edge give the same mask, then drops duplicate
    /// masks. The node kept for a duplicate is the first one in mask order.
    /// ```
    /// use ntree::bipartition::Bipartitions;
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((A,B),(C,D,E));").unwrap();
    /// let parts = Bipartitions::compute(&tree).unwrap().canonical_sides();
    ///
    /// assert_eq!(parts.label_sets(), vec![vec!["C", "D", "E"]]);
    /// ```
    pub fn canonical_sides(mut self) -> Self {
        let n = self.labels.len();
        for (_, mask) in self.splits.iter_mut() {
            if n > 0 && mask[0] {
                let mut complement = FixedBitSet::with_capacity(n);
                complement.insert_range(..);
                complement.difference_with(mask);
                *mask = complement;
            }
        }
        self.splits.sort_by(|(_, a), (_, b)| cmp_masks(a, b));
        self.splits.dedup_by(|(_, a), (_, b)| a == b);
        self
    }

    /// Gets each bipartition as a string of `0` and `1`, bit 0 first
    pub fn bit_strings(&self) -> Vec<String> {
        self.splits
            .iter()
            .map(|(_, mask)| {
                (0..self.labels.len())
                    .map(|i| if mask[i] { '1' } else { '0' })
                    .collect()
            })
            .collect()
    }
}

impl Tree {
    /// Lists the bipartitions of the tree once each.
    ///
    /// A copy of the tree has its nodes with a single child contracted and
    /// its two child root merged into a child before the masks are
    /// computed with [`Bipartitions::compute`]. The two sides of the root
    /// are therefore not listed as two splits, and no trivial split is.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("((D,C),((A,B),E));").unwrap();
    /// let parts = tree.bipartitions().unwrap();
    ///
    /// assert_eq!(parts.labels(), &["A", "B", "C", "D", "E"]);
    /// assert_eq!(parts.bit_strings(), vec!["11000", "11001"]);
    /// ```
    pub fn bipartitions(&self) -> Result<Bipartitions, TreeError> {
        let mut tree = self.clone();
        tree.contract_unary()?;
        tree.collapse_binary_root()?;
        Bipartitions::compute(&tree)
    }
}

/// Options of a tree comparison
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompareOptions {
    /// Prune the taxa that only appear in one of the trees before comparing
    pub force: bool,
    /// Merge two child roots into one of their children and compare masks
    /// regardless of their side, so that the root position does not count
    /// as a bipartition. When unset the split at the root of a rooted tree
    /// is compared like any other.
    pub unrooted: bool,
}

/// Result of the comparison of an input tree with a reference tree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Comparison {
    /// Number of bipartitions of the reference tree
    pub reference_splits: usize,
    /// Number of bipartitions of the input tree
    pub input_splits: usize,
    /// Reference bipartitions missing from the input tree
    pub incompatible: usize,
    /// Input bipartitions missing from the reference tree
    pub input_only: usize,
    /// `incompatible / reference_splits`
    pub rf_a: f64,
    /// `(incompatible + input_only) / (reference_splits + input_splits)`
    pub rf_b: f64,
    /// Whether both trees have exactly the same bipartitions
    pub identical: bool,
}

impl Comparison {
    fn new(reference_splits: usize, input_splits: usize, matched: usize) -> Self {
        let incompatible = reference_splits - matched;
        let input_only = input_splits - matched;
        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        Self {
            reference_splits,
            input_splits,
            incompatible,
            input_only,
            rf_a: ratio(incompatible, reference_splits),
            rf_b: ratio(incompatible + input_only, reference_splits + input_splits),
            identical: reference_splits == input_splits && incompatible == 0,
        }
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.incompatible > 0 {
            return write!(
                f,
                "Reference tree has {}/{} incompatible bipartitions with the input tree (RF-a: {:.6} and RF-b: {:.6})",
                self.incompatible, self.reference_splits, self.rf_a, self.rf_b
            );
        }

        write!(
            f,
            "All bipartitions of the reference tree are compatible with the input tree"
        )?;
        if self.identical {
            write!(f, "\nThe two trees are identical")
        } else {
            write!(
                f,
                "\nInput tree contains {} additional bipartitions not in the reference tree (RF-b: {:.6})",
                self.input_only, self.rf_b
            )
        }
    }
}

/// Restricts extracted subtrees by their number of leaves, every bound is
/// optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeFilter {
    /// Exact number of leaves
    pub eq: Option<usize>,
    /// Strict lower bound
    pub gt: Option<usize>,
    /// Strict upper bound
    pub lt: Option<usize>,
}

impl SizeFilter {
    /// Checks if a subtree with `leaves` leaves passes the filter
    pub fn accepts(&self, leaves: usize) -> bool {
        self.eq.map_or(true, |eq| leaves == eq)
            && self.gt.map_or(true, |gt| leaves > gt)
            && self.lt.map_or(true, |lt| leaves < lt)
    }
}

/// Both trees as they were compared, the inner nodes of `input` whose
/// bipartition is missing from `reference` are marked.
#[derive(Debug, Clone)]
pub struct TreeDiff {
    /// Reference tree after contraction and pruning
    pub reference: Tree,
    /// Input tree after contraction and pruning
    pub input: Tree,
    /// Comparison figures
    pub comparison: Comparison,
}

impl TreeDiff {
    /// Gets the inner nodes of the input tree with an unmatched bipartition
    pub fn unmatched(&self) -> Vec<NodeId> {
        self.input
            .get_inner()
            .iter()
            .copied()
            .filter(|id| self.input.nodes[*id].mark)
            .collect()
    }

    /// Writes every unmatched subtree of the input tree that passes the
    /// filter as a newick string, without the branch above its root.
    pub fn extract(&self, filter: &SizeFilter) -> Result<Vec<String>, TreeError> {
        let mut subtrees = vec![];
        for id in self.unmatched() {
            if filter.accepts(self.input.get(&id)?.subtree_leaf_count()) {
                subtrees.push(self.input.subtree_to_newick(&id, false, None)?);
            }
        }
        debug!("extracted {} subtrees", subtrees.len());
        Ok(subtrees)
    }
}

/// Removes out-degree 1 nodes, and the two child root if asked
fn prepare(tree: &mut Tree, options: &CompareOptions) -> Result<(), TreeError> {
    tree.contract_unary()?;
    if options.unrooted {
        tree.collapse_binary_root()?;
    }
    Ok(())
}

/// Leaves of `tree` whose label is not in `other`
fn missing_from(tree: &Tree, other: &TaxonIndex) -> Vec<NodeId> {
    tree.get_leaves()
        .iter()
        .copied()
        .filter(|id| {
            tree.nodes[*id]
                .name
                .as_deref()
                .map_or(false, |label| !other.contains(label))
        })
        .collect()
}

/// Prunes from each tree the taxa missing from the other one
fn prune_symmetric_difference(
    reference: &mut Tree,
    input: &mut Tree,
    options: &CompareOptions,
) -> Result<(), TreeError> {
    let reference_index = TaxonIndex::build_strict(reference)?;
    let input_index = TaxonIndex::build_strict(input)?;

    let reference_only = missing_from(reference, &input_index);
    let input_only = missing_from(input, &reference_index);

    info!(
        "need to prune {} from reference and {} from input",
        reference_only.len(),
        input_only.len()
    );

    for (tree, leaves) in [(reference, reference_only), (input, input_only)] {
        if !leaves.is_empty() {
            tree.prune_leaves(&leaves, PruneMode::KeepShape)?;
            prepare(tree, options)?;
        }
    }

    Ok(())
}

/// Compares the bipartitions of an input tree with those of a reference
/// tree.
///
/// Both trees are copied, nodes with a single child are contracted and,
/// with [`CompareOptions::force`], taxa found in only one tree are pruned.
/// The trees must then have at least 4 leaves and the same labels.
///
/// With [`CompareOptions::unrooted`] both sets of masks go through
/// [`Bipartitions::canonical_sides`], so the child order at the root does
/// not matter.
/// ```
/// use ntree::bipartition::{compare, CompareOptions};
/// use ntree::tree::Tree;
///
/// let reference = Tree::from_newick("(((A:1,B:1):1,C:1):1,D:1):0;").unwrap();
/// let input = Tree::from_newick("((A:1,B:1):1,(C:1,D:1):1):0;").unwrap();
///
/// let diff = compare(&reference, &input, &CompareOptions::default()).unwrap();
///
/// assert_eq!(diff.comparison.incompatible, 1);
/// assert_eq!(diff.comparison.rf_a, 0.5);
/// assert!(!diff.comparison.identical);
/// ```
pub fn compare(
    reference: &Tree,
    input: &Tree,
    options: &CompareOptions,
) -> Result<TreeDiff, TreeError> {
    let mut reference = reference.clone();
    let mut input = input.clone();
    prepare(&mut reference, options)?;
    prepare(&mut input, options)?;

    if options.force {
        prune_symmetric_difference(&mut reference, &mut input, options)?;
    }

    for tree in [&reference, &input] {
        if tree.n_leaves() < 4 {
            return Err(TreeError::TooFewLeaves {
                required: 4,
                found: tree.n_leaves(),
            });
        }
    }

    let mut reference_parts = Bipartitions::compute(&reference)?;
    let mut input_parts = Bipartitions::compute(&input)?;
    if options.unrooted {
        reference_parts = reference_parts.canonical_sides();
        input_parts = input_parts.canonical_sides();
    }
    if reference_parts.labels() != input_parts.labels() {
        return Err(TreeError::DifferentTaxa);
    }

    input.reset_marks();
    let mut matched = 0;
    let mut r = 0;
    let mut i = 0;
    while r < reference_parts.len() && i < input_parts.len() {
        let (_, ref_mask) = &reference_parts.splits[r];
        let (node, input_mask) = &input_parts.splits[i];
        match cmp_masks(ref_mask, input_mask) {
            Ordering::Equal => {
                matched += 1;
                r += 1;
                i += 1;
            }
            Ordering::Greater => {
                input.nodes[*node].mark = true;
                i += 1;
            }
            Ordering::Less => r += 1,
        }
    }
    for (node, _) in input_parts.splits[i..].iter() {
        input.nodes[*node].mark = true;
    }

    let comparison = Comparison::new(reference_parts.len(), input_parts.len(), matched);
    debug!(
        matched,
        incompatible = comparison.incompatible,
        "compared bipartitions"
    );

    Ok(TreeDiff {
        reference,
        input,
        comparison,
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("((A,B),(C,D));")]
    #[case("(((A,B),C),D);")]
    #[case("((((A,B),(C,D)),E),((F,G),H));")]
    #[case("(((((((A,B),C),D),E),F),G),H);")]
    fn binary_rooted_split_count(#[case] newick: &str) {
        let tree = Tree::from_newick(newick).unwrap();

        let parts = Bipartitions::compute(&tree).unwrap();
        assert_eq!(parts.len(), tree.n_inner() - 1);

        let listed = tree.bipartitions().unwrap();
        assert_eq!(listed.len(), tree.n_leaves() - 3);
    }

    #[test]
    fn masks_are_sorted() {
        let tree = Tree::from_newick("((((A,B),(C,D)),E),((F,G),H));").unwrap();
        let parts = Bipartitions::compute(&tree).unwrap();

        for pair in parts.splits.windows(2) {
            assert_eq!(cmp_masks(&pair[0].1, &pair[1].1), Ordering::Less);
        }
        assert_eq!(
            parts.label_sets(),
            vec![
                vec!["A", "B"],
                vec!["C", "D"],
                vec!["A", "B", "C", "D"],
                vec!["A", "B", "C", "D", "E"],
                vec!["F", "G"],
                vec!["F", "G", "H"],
            ]
        );
    }

    #[test]
    fn masks_wider_than_a_word() {
        let mut newick = "(".repeat(39) + "T00";
        for i in 1..40 {
            newick += &format!(",T{i:02})");
        }
        newick.push(';');
        let tree = Tree::from_newick(&newick).unwrap();
        let parts = Bipartitions::compute(&tree).unwrap();

        assert_eq!(parts.len(), 38);
        let sizes: Vec<usize> = parts.label_sets().iter().map(|s| s.len()).collect();
        assert_eq!(sizes, (2..40).collect::<Vec<_>>());

        let diff = compare(&tree, &tree, &CompareOptions::default()).unwrap();
        assert!(diff.comparison.identical);
    }

    #[rstest]
    #[case("((A,B),(C,));")]
    #[case("((A,B),(C,A));")]
    fn bipartitions_need_unique_labels(#[case] newick: &str) {
        let tree = Tree::from_newick(newick).unwrap();
        assert!(tree.bipartitions().is_err());
    }

    #[rstest]
    #[case("((A,B),(C,D));")]
    #[case("(A,B,(C,(D,E)));")]
    #[case("((((A,B),(C,D)),E),((F,G),H));")]
    fn self_comparison(#[case] newick: &str) {
        let tree = Tree::from_newick(newick).unwrap();
        let diff = compare(&tree, &tree, &CompareOptions::default()).unwrap();

        assert!(diff.comparison.identical);
        assert_eq!(diff.comparison.incompatible, 0);
        assert_eq!(diff.comparison.rf_a, 0.0);
        assert_eq!(diff.comparison.rf_b, 0.0);
        assert!(diff.unmatched().is_empty());
    }

    #[test]
    fn one_bipartition_apart() {
        let reference = Tree::from_newick("(((A:1,B:1):1,C:1):1,D:1):0;").unwrap();
        let input = Tree::from_newick("((A:1,B:1):1,(C:1,D:1):1):0;").unwrap();

        let diff = compare(&reference, &input, &CompareOptions::default()).unwrap();
        let comparison = diff.comparison;

        assert_eq!(comparison.reference_splits, 2);
        assert_eq!(comparison.input_splits, 2);
        assert_eq!(comparison.incompatible, 1);
        assert_eq!(comparison.input_only, 1);
        assert_eq!(comparison.rf_a, 0.5);
        assert_eq!(comparison.rf_b, 0.5);
        assert!(!comparison.identical);

        assert_eq!(
            diff.extract(&SizeFilter::default()).unwrap(),
            vec!["(C:1,D:1);"]
        );
        let filter = SizeFilter {
            gt: Some(2),
            ..Default::default()
        };
        assert!(diff.extract(&filter).unwrap().is_empty());
    }

    #[test]
    fn root_position_only_counts_when_rooted() {
        let reference = Tree::from_newick("((A,B),(C,D));").unwrap();
        let input = Tree::from_newick("(A,B,(C,D));").unwrap();

        let rooted = compare(&reference, &input, &CompareOptions::default()).unwrap();
        assert_eq!(rooted.comparison.incompatible, 1);

        let options = CompareOptions {
            unrooted: true,
            ..Default::default()
        };
        let unrooted = compare(&reference, &input, &options).unwrap();
        assert!(unrooted.comparison.identical);
    }

    #[rstest]
    #[case("((A,B),(C,D,E));", "((C,D,E),(A,B));")]
    #[case("((A,B),(C,(D,E)));", "((C,(D,E)),(A,B));")]
    #[case("((A,B),C,(D,E));", "(C,(D,E),(B,A));")]
    fn unrooted_ignores_root_child_order(#[case] reference: &str, #[case] input: &str) {
        let reference = Tree::from_newick(reference).unwrap();
        let input = Tree::from_newick(input).unwrap();
        let options = CompareOptions {
            unrooted: true,
            ..Default::default()
        };

        let diff = compare(&reference, &input, &options).unwrap();

        assert!(diff.comparison.identical);
        assert_eq!(diff.comparison.rf_a, 0.0);
        assert_eq!(diff.comparison.rf_b, 0.0);
        assert!(diff.unmatched().is_empty());
    }

    #[test]
    fn canonical_sides_merge_complements() {
        let tree = Tree::from_newick("((A,B),(C,D));").unwrap();

        let parts = Bipartitions::compute(&tree).unwrap();
        assert_eq!(parts.bit_strings(), vec!["1100", "0011"]);

        let parts = parts.canonical_sides();
        assert_eq!(parts.bit_strings(), vec!["0011"]);
    }

    #[rstest]
    #[case("((A,B),(C,D));", vec![vec!["C", "D"]])]
    #[case("((A),(B,C,D));", vec![])]
    #[case("(((A,B)),((C,D),E));", vec![vec!["C", "D"], vec!["C", "D", "E"]])]
    #[case("(A,B,(C,D));", vec![vec!["C", "D"]])]
    fn listing_has_no_repeated_or_trivial_split(
        #[case] newick: &str,
        #[case] expected: Vec<Vec<&str>>,
    ) {
        let tree = Tree::from_newick(newick).unwrap();
        let parts = tree.bipartitions().unwrap();

        assert_eq!(parts.label_sets(), expected);
    }

    #[test]
    fn different_taxa() {
        let reference = Tree::from_newick("(((A,B),C),(D,E));").unwrap();
        let input = Tree::from_newick("(((A,B),C),(D,F));").unwrap();

        assert!(matches!(
            compare(&reference, &input, &CompareOptions::default()),
            Err(TreeError::DifferentTaxa)
        ));

        let options = CompareOptions {
            force: true,
            ..Default::default()
        };
        let diff = compare(&reference, &input, &options).unwrap();
        assert!(diff.comparison.identical);
        assert_eq!(diff.reference.n_leaves(), 4);
        assert_eq!(diff.input.n_leaves(), 4);
    }

    #[test]
    fn force_needs_four_shared_taxa() {
        let reference = Tree::from_newick("((A,B),(C,D));").unwrap();
        let input = Tree::from_newick("((A,B),(C,E));").unwrap();
        let options = CompareOptions {
            force: true,
            ..Default::default()
        };

        assert!(matches!(
            compare(&reference, &input, &options),
            Err(TreeError::TooFewLeaves { required: 4, found: 3 })
        ));
    }

    #[test]
    fn unary_nodes_are_contracted() {
        let reference = Tree::from_newick("(((A,B)),((C,D)));").unwrap();
        let input = Tree::from_newick("((A,B),(C,D));").unwrap();

        let diff = compare(&reference, &input, &CompareOptions::default()).unwrap();
        assert!(diff.comparison.identical);
    }

    #[test]
    fn comparison_report() {
        assert_eq!(
            Comparison::new(2, 2, 1).to_string(),
            "Reference tree has 1/2 incompatible bipartitions with the input tree (RF-a: 0.500000 and RF-b: 0.500000)"
        );
        assert_eq!(
            Comparison::new(1, 2, 1).to_string(),
            "All bipartitions of the reference tree are compatible with the input tree\n\
             Input tree contains 1 additional bipartitions not in the reference tree (RF-b: 0.333333)"
        );
    }
}
