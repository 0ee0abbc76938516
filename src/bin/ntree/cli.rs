use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

use ntree::distr::Distr;
use ntree::generate::TreeKind;
use ntree::tree::ResolveMode;

/// A command line tool to reroot, prune, graft and compare phylogenetic trees
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write every branch length with this number of decimals
    #[arg(short, long, global = true)]
    pub precision: Option<usize>,

    /// Seed of the random number generator
    #[arg(short, long, global = true)]
    pub seed: Option<u64>,

    /// File to write the resulting trees to instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    /// The command to execute
    pub command: Commands,
}

/// Input file holding one or more newick trees
#[derive(ClapArgs, Debug)]
pub struct Input {
    /// Newick file, trees separated by semicolons
    pub trees: PathBuf,
}

/// How to place the root when no outgroup is given
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, ValueEnum)]
pub enum RootMethod {
    /// Halfway along the longest path between two tips
    #[default]
    Midpoint,
    /// Halfway along the longest branch
    Longest,
}

/// What to shuffle in each tree
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum ShuffleTarget {
    /// Order of the children of every inner node
    Children,
    /// Labels of the tips
    Labels,
}

/// The available commands in the `ntree` tool
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print a summary of the structure and branch lengths of each tree
    Info {
        #[command(flatten)]
        input: Input,
    },

    /// List the tip labels of each tree
    Labels {
        #[command(flatten)]
        input: Input,
    },

    /// List the branches of each tree with their length
    Branches {
        #[command(flatten)]
        input: Input,
    },

    /// Draw each tree in the terminal
    Print {
        #[command(flatten)]
        input: Input,
    },

    /// Root the trees at the midpoint, on the longest branch or above an outgroup
    Root {
        #[command(flatten)]
        input: Input,
        /// Placement of the root when no outgroup is given
        #[arg(value_enum, short, long, default_value_t = RootMethod::Midpoint)]
        method: RootMethod,
        /// Comma separated tips of the outgroup
        #[arg(short = 'g', long, value_delimiter = ',')]
        outgroup: Vec<String>,
    },

    /// Turn binary rooted trees into binary unrooted trees
    Unroot {
        #[command(flatten)]
        input: Input,
    },

    /// Remove tips from the trees
    ///
    /// By default binary trees stay binary: the parent of a removed tip is
    /// removed as well and its remaining child takes its place.
    #[clap(verbatim_doc_comment)]
    Prune {
        #[command(flatten)]
        input: Input,
        /// Comma separated tips to remove
        #[arg(short, long, value_delimiter = ',', required_unless_present = "random")]
        tips: Vec<String>,
        /// Remove this many tips chosen at random
        #[arg(short, long, conflicts_with = "tips")]
        random: Option<usize>,
        /// Only remove the tips and the inner nodes left without children
        #[arg(long)]
        nokeep: bool,
        /// Skip tips that are missing from a tree instead of failing
        #[arg(short, long)]
        force: bool,
    },

    /// Replace a tip of each tree by a subtree
    Attach {
        #[command(flatten)]
        input: Input,
        /// Newick file holding the subtree to graft
        subtree: PathBuf,
        /// Tip to replace
        #[arg(short, long)]
        at: String,
    },

    /// Compare trees to a reference tree through their bipartitions
    ///
    /// This will print, for each tree:
    ///  - the number of reference bipartitions missing from the tree
    ///  - the RF-a (missing / reference bipartitions) and RF-b (symmetric
    ///    difference / all bipartitions) ratios
    ///  - whether the trees are identical
    ///
    /// The split at the root of a rooted tree counts like any other unless
    /// --unrooted is given, so two rootings of the same unrooted tree can differ.
    #[clap(verbatim_doc_comment)]
    Compare {
        /// Reference tree
        reference: PathBuf,
        #[command(flatten)]
        input: Input,
        /// Prune the tips that only appear in one of the trees
        #[arg(short, long)]
        force: bool,
        /// Ignore the position of the root and the side of each bipartition
        #[arg(short, long)]
        unrooted: bool,
        /// Write the subtrees whose bipartition is missing from the reference
        #[arg(short, long)]
        extract: bool,
        /// Only extract subtrees with exactly this many tips
        #[arg(long, requires = "extract")]
        eq: Option<usize>,
        /// Only extract subtrees with more tips
        #[arg(long, requires = "extract")]
        gt: Option<usize>,
        /// Only extract subtrees with fewer tips
        #[arg(long, requires = "extract")]
        lt: Option<usize>,
    },

    /// Restrict a reference tree to the tips of each input tree
    ///
    /// The tips of the reference tree missing from an input tree are pruned,
    /// binary trees staying binary unless --nokeep is given. With --clade the
    /// subtree below the common ancestor of the tips is written instead.
    #[clap(verbatim_doc_comment)]
    Induce {
        /// Reference tree
        reference: PathBuf,
        #[command(flatten)]
        input: Input,
        /// Only remove the tips and the inner nodes left without children
        #[arg(long, conflicts_with = "clade")]
        nokeep: bool,
        /// Write the smallest clade holding the tips without pruning
        #[arg(short, long)]
        clade: bool,
    },

    /// Make trees binary rooted by resolving multifurcations
    Resolve {
        #[command(flatten)]
        input: Input,
        /// How to join the children of a multifurcating node
        #[arg(value_enum, short, long, default_value_t = ResolveMode::Random)]
        mode: ResolveMode,
        /// Length of the new branches
        #[arg(short, long, default_value_t = 0.0)]
        length: f64,
    },

    /// Check if binary rooted trees have the same topology as a reference tree
    Identical {
        /// Reference tree
        reference: PathBuf,
        #[command(flatten)]
        input: Input,
    },

    /// List the bipartitions of each tree
    Bipartitions {
        #[command(flatten)]
        input: Input,
        /// Print bitmasks instead of tip labels
        #[arg(short, long)]
        bitmask: bool,
    },

    /// Multiply every branch length by a factor
    Scale {
        #[command(flatten)]
        input: Input,
        /// Scaling factor
        factor: f64,
    },

    /// Set every branch length to the same value
    ResetLengths {
        #[command(flatten)]
        input: Input,
        /// New branch length
        #[arg(default_value_t = 1.0)]
        value: f64,
    },

    /// Shuffle the order of children or the tip labels
    Shuffle {
        #[command(flatten)]
        input: Input,
        /// What to shuffle
        #[arg(value_enum)]
        target: ShuffleTarget,
    },

    /// Generate random binary trees
    Random {
        /// Number of tips in each tree
        #[arg(short, long, default_value_t = 20)]
        tips: usize,
        /// Number of trees to generate
        #[arg(short = 'n', long, default_value_t = 1)]
        trees: usize,
        /// Number of children of the root
        #[arg(value_enum, short, long, default_value_t = TreeKind::Rooted)]
        kind: TreeKind,
        /// Generate caterpillar trees instead of random topologies
        #[arg(short, long, conflicts_with = "kind")]
        caterpillar: bool,
        /// Distribution of branch lengths
        #[arg(value_enum, short, long, default_value_t = Distr::Uniform)]
        distribution: Distr,
    },

    /// Print a shell completion script
    Completion {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}
