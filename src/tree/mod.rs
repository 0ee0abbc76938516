//! Build and manipulate phylogenetic trees.
//!
//! This module defines the two essential structs to represent phylogenetic trees:
//!  - The [`Node`] struct that represents a node of a phylogenetic tree.
//!  - The [`Tree`] struct, an arena holding a collection of [`Node`] objects
//!    together with cached leaf and inner node indices.
//!
//! Topology surgery (rerooting, pruning, grafting, resolving polytomies)
//! lives in dedicated submodules, each adding an `impl Tree` block.

mod canonical;
mod diameter;
mod graft;
mod induce;
mod newick;
mod node;
mod prune;
mod reroot;
mod resolve;
mod tree_impl;

pub use self::diameter::{DiameterInfo, DiameterTable, MidpointEdge};
pub use self::newick::NewickParseError;
pub use self::node::{Node, NodeError};
pub use self::prune::PruneMode;
pub use self::reroot::RerootPolicy;
pub use self::resolve::ResolveMode;
pub use self::tree_impl::{Tree, TreeError, TreeInfo, TreeShape};

/// A type that represents Identifiers of [`Node`] objects
/// within phylogenetic [`Tree`] object.
pub type NodeId = usize;

/// A type that represents branch lengths between [`Node`] objects
/// within phylogenetic [`Tree`] object.
pub type EdgeLength = f64;
