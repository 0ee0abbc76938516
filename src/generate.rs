//! Random tree generation.
//!
//! Topologies are built by joining randomly chosen pairs of subtrees until
//! two (rooted) or three (unrooted) subtrees remain, which become the
//! children of the root. Every branch length is drawn from a [`Distr`].

use clap::ValueEnum;
use rand::Rng;
use rand_distr::Distribution;
use thiserror::Error;

use crate::distr::{Distr, DistrError, Sampler};
use crate::tree::{Node, NodeId, Tree, TreeError};

/// Errors that can occur when generating trees
#[derive(Error, Debug)]
pub enum GenerateError {
    /// Not enough tips requested for the kind of tree
    #[error("A {kind:?} tree needs at least {required} tips (asked for {tips}).")]
    TooFewTips {
        /// Requested kind of tree
        kind: TreeKind,
        /// Minimum number of tips
        required: usize,
        /// Requested number of tips
        tips: usize,
    },
    /// The branch length distribution could not be set up
    #[error("Could not set up branch length distribution")]
    DistrError(#[from] DistrError),
    /// The tree could not be built
    #[error("Could not build tree")]
    TreeError(#[from] TreeError),
}

/// Kind of binary tree to generate
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, ValueEnum)]
pub enum TreeKind {
    /// Two children at the root
    #[default]
    Rooted,
    /// Three children at the root
    Unrooted,
}

impl TreeKind {
    fn root_degree(&self) -> usize {
        match self {
            TreeKind::Rooted => 2,
            TreeKind::Unrooted => 3,
        }
    }
}

/// Generates a random binary tree with `tips` leaves named `T0`, `T1`, ...
/// ```
/// use ntree::distr::Distr;
/// use ntree::generate::{random_tree, TreeKind};
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(1);
/// let tree = random_tree(10, TreeKind::Unrooted, Distr::Uniform, &mut rng).unwrap();
///
/// assert_eq!(tree.n_leaves(), 10);
/// assert!(tree.is_binary_unrooted());
/// ```
pub fn random_tree<R: Rng + ?Sized>(
    tips: usize,
    kind: TreeKind,
    distr: Distr,
    rng: &mut R,
) -> Result<Tree, GenerateError> {
    let degree = kind.root_degree();
    if tips < degree {
        return Err(GenerateError::TooFewTips {
            kind,
            required: degree,
            tips,
        });
    }

    let sampler = Sampler::<f64>::new(distr)?;
    let mut tree = Tree::new();
    let root = tree.add(Node::new());

    let mut subtrees: Vec<NodeId> = Vec::with_capacity(tips);
    for i in 0..tips {
        let mut tip = Node::new_named(&format!("T{i}"));
        tip.parent_edge = Some(sampler.sample(rng));
        subtrees.push(tree.add(tip));
    }

    while subtrees.len() > degree {
        let a = subtrees.swap_remove(rng.gen_range(0..subtrees.len()));
        let b = subtrees.swap_remove(rng.gen_range(0..subtrees.len()));

        let mut joined = Node::new();
        joined.parent_edge = Some(sampler.sample(rng));
        let joined = tree.add(joined);
        for child in [a, b] {
            tree.get_mut(&child)?.parent = Some(joined);
            tree.get_mut(&joined)?.add_child(child);
        }
        subtrees.push(joined);
    }

    for child in subtrees {
        tree.get_mut(&child)?.parent = Some(root);
        tree.get_mut(&root)?.add_child(child);
    }

    tree.rebuild_index()?;

    Ok(tree)
}

/// Generates a caterpillar tree, each inner node having a leaf and an inner
/// node as children except the deepest one which has two leaves.
/// ```
/// use ntree::distr::Distr;
/// use ntree::generate::caterpillar;
/// use rand::SeedableRng;
///
/// let mut rng = rand::rngs::StdRng::seed_from_u64(1);
/// let tree = caterpillar(5, Distr::Exponential, &mut rng).unwrap();
/// let names: Vec<_> = tree.get_leaf_names().into_iter().flatten().collect();
///
/// assert_eq!(names, vec!["T0", "T1", "T2", "T3", "T4"]);
/// assert!(tree.is_binary_rooted());
/// ```
pub fn caterpillar<R: Rng + ?Sized>(
    tips: usize,
    distr: Distr,
    rng: &mut R,
) -> Result<Tree, GenerateError> {
    if tips < 2 {
        return Err(GenerateError::TooFewTips {
            kind: TreeKind::Rooted,
            required: 2,
            tips,
        });
    }

    let sampler = Sampler::<f64>::new(distr)?;
    let mut tree = Tree::new();
    let mut parent = tree.add(Node::new());

    for i in 0..tips - 1 {
        let tip = Node::new_named(&format!("T{i}"));
        tree.add_child(tip, parent, Some(sampler.sample(rng)))?;
        if i == tips - 2 {
            let last = Node::new_named(&format!("T{}", i + 1));
            tree.add_child(last, parent, Some(sampler.sample(rng)))?;
        } else {
            parent = tree.add_child(Node::new(), parent, Some(sampler.sample(rng)))?;
        }
    }

    tree.rebuild_index()?;

    Ok(tree)
}
