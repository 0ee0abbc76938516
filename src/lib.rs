//! Manipulate the topology of phylogenetic trees in the newick format.
//!
//! The [`tree::Tree`] struct stores a tree as an arena of nodes and offers
//! rerooting, unrooting, pruning and grafting. The [`bipartition`] module
//! compares two trees through their bipartitions and reports
//! Robinson-Foulds style distances, and [`generate`] builds random trees.
//!
//! ```
//! use ntree::bipartition::{compare, CompareOptions};
//! use ntree::tree::Tree;
//!
//! let reference = Tree::from_newick("((A:1,B:1):1,(C:1,D:1):1,E:1);").unwrap();
//! let input = Tree::from_newick("((A:1,C:1):1,(B:1,D:1):1,E:1);").unwrap();
//!
//! let diff = compare(&reference, &input, &CompareOptions::default()).unwrap();
//! assert_eq!(diff.comparison.incompatible, 2);
//! assert!(!diff.comparison.identical);
//! ```

pub mod bipartition;
pub mod distr;
pub mod generate;
pub mod stats;
pub mod taxa;
pub mod tree;
