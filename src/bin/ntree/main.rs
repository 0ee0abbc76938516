//! The `ntree` binary is a command line tool, using the `[ntree]` crate.
//! It applies one operation to every tree of a newick file and writes the
//! results to stdout or to a file.

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use indicatif::{ProgressBar, ProgressIterator};
use itertools::Itertools;
use ntree::{
    bipartition::{compare, CompareOptions, SizeFilter},
    generate::{caterpillar, random_tree, GenerateError},
    tree::{NewickParseError, PruneMode, RerootPolicy, Tree, TreeError},
};
use rand::{rngs::StdRng, SeedableRng};
use std::{
    fs::File,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    process,
};
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing::{debug, info};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

/// contains the struct representing the command line arguments
/// parsed by [`clap`] and used to execute this binary
pub mod cli;

use cli::{Commands, RootMethod, ShuffleTarget};

/// Errors reported by the command line tool
#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Parse(#[from] NewickParseError),
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error(transparent)]
    Generate(#[from] GenerateError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{} does not contain any tree", .0.display())]
    NoTree(PathBuf),
}

fn setup_logging(verbosity: u8, quiet: bool) {
    let filter = match (quiet, verbosity) {
        (true, _) => LevelFilter::ERROR,
        (false, 0) => LevelFilter::WARN,
        (false, 1) => LevelFilter::INFO,
        (false, 2) => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .init();

    debug!("log level: {filter}");
}

/// Destination of everything the commands print
struct Output {
    writer: Box<dyn Write>,
    to_file: bool,
    precision: Option<usize>,
}

impl Output {
    fn new(path: Option<&Path>, precision: Option<usize>) -> Result<Self, CliError> {
        let (writer, to_file): (Box<dyn Write>, bool) = match path {
            Some(path) => (Box::new(BufWriter::new(File::create(path)?)), true),
            None => (Box::new(BufWriter::new(io::stdout())), false),
        };
        Ok(Self {
            writer,
            to_file,
            precision,
        })
    }

    fn line(&mut self, text: &str) -> Result<(), CliError> {
        writeln!(self.writer, "{text}")?;
        Ok(())
    }

    fn tree(&mut self, tree: &Tree) -> Result<(), CliError> {
        let newick = match self.precision {
            Some(p) => tree.to_newick_precision(p)?,
            None => tree.to_newick()?,
        };
        self.line(&newick)
    }

    fn progress(&self, len: usize) -> ProgressBar {
        if self.to_file {
            ProgressBar::new(len as u64)
        } else {
            ProgressBar::hidden()
        }
    }
}

/// Runs `f` on every tree of a file. A tree that fails to parse or to
/// process is reported and skipped, the return value tells if all trees
/// succeeded.
fn for_each_tree<F>(path: &Path, out: &mut Output, mut f: F) -> Result<bool, CliError>
where
    F: FnMut(usize, Tree, &mut Output) -> Result<(), CliError>,
{
    let trees = Tree::from_file_all(path)?;
    if trees.is_empty() {
        return Err(CliError::NoTree(path.into()));
    }
    info!("read {} trees from {}", trees.len(), path.display());

    let bar = out.progress(trees.len());
    let mut success = true;
    for (i, parsed) in trees.into_iter().enumerate().progress_with(bar) {
        let result = parsed
            .map_err(CliError::from)
            .and_then(|tree| f(i, tree, out));
        if let Err(e) = result {
            eprintln!("Error: tree {}: {e}", i + 1);
            success = false;
        }
    }

    Ok(success)
}

fn run(args: cli::Args) -> Result<bool, CliError> {
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let precision = args.precision.unwrap_or(6);
    let mut out = Output::new(args.output.as_deref(), args.precision)?;

    let success = match args.command {
        Commands::Info { input } => for_each_tree(&input.trees, &mut out, |i, tree, out| {
            out.line(&format!("Tree {}", i + 1))?;
            out.line(&tree.info()?.report(precision))
        })?,

        Commands::Labels { input } => for_each_tree(&input.trees, &mut out, |_, tree, out| {
            for name in tree.get_leaf_names() {
                out.line(name.as_deref().unwrap_or(""))?;
            }
            Ok(())
        })?,

        Commands::Branches { input } => for_each_tree(&input.trees, &mut out, |_, tree, out| {
            let root = tree.get_root()?;
            for id in tree.preorder(&root)? {
                let node = tree.get(&id)?;
                if node.parent.is_some() {
                    out.line(&format!(
                        "{}\t{:.*}",
                        node.name.as_deref().unwrap_or("-"),
                        precision,
                        node.edge_length()
                    ))?;
                }
            }
            Ok(())
        })?,

        Commands::Print { input } => for_each_tree(&input.trees, &mut out, |_, tree, _| {
            tree.print()?;
            Ok(())
        })?,

        Commands::Root {
            input,
            method,
            outgroup,
        } => {
            let policy = match (outgroup.is_empty(), method) {
                (false, _) => RerootPolicy::Outgroup(outgroup),
                (true, RootMethod::Midpoint) => RerootPolicy::Midpoint,
                (true, RootMethod::Longest) => RerootPolicy::LongestBranch,
            };
            for_each_tree(&input.trees, &mut out, |_, mut tree, out| {
                tree.reroot(&policy)?;
                out.tree(&tree)
            })?
        }

        Commands::Unroot { input } => for_each_tree(&input.trees, &mut out, |_, mut tree, out| {
            tree.unroot()?;
            out.tree(&tree)
        })?,

        Commands::Prune {
            input,
            tips,
            random,
            nokeep,
            force,
        } => {
            let mode = if nokeep {
                PruneMode::General
            } else {
                PruneMode::KeepShape
            };
            for_each_tree(&input.trees, &mut out, |_, mut tree, out| {
                match random {
                    Some(count) => tree.prune_random(count, mode, &mut rng)?,
                    None => tree.prune_labels(&tips, mode, force)?,
                };
                out.tree(&tree)
            })?
        }

        Commands::Attach { input, subtree, at } => {
            let source = Tree::from_file(&subtree)?;
            for_each_tree(&input.trees, &mut out, |_, mut tree, out| {
                tree.graft(&at, &source)?;
                out.tree(&tree)
            })?
        }

        Commands::Compare {
            reference,
            input,
            force,
            unrooted,
            extract,
            eq,
            gt,
            lt,
        } => {
            let reference = Tree::from_file(&reference)?;
            let options = CompareOptions { force, unrooted };
            let filter = SizeFilter { eq, gt, lt };
            for_each_tree(&input.trees, &mut out, |i, tree, out| {
                let diff = compare(&reference, &tree, &options)?;
                out.line(&format!("Tree {}: {}", i + 1, diff.comparison))?;
                if extract {
                    for subtree in diff.extract(&filter)? {
                        out.line(&subtree)?;
                    }
                }
                Ok(())
            })?
        }

        Commands::Identical { reference, input } => {
            let reference = Tree::from_file(&reference)?;
            for_each_tree(&input.trees, &mut out, |i, tree, out| {
                let verdict = if reference.same_topology(&tree)? {
                    "identical"
                } else {
                    "different"
                };
                out.line(&format!("Tree {}: {verdict}", i + 1))
            })?
        }

        Commands::Induce {
            reference,
            input,
            nokeep,
            clade,
        } => {
            let reference = Tree::from_file(&reference)?;
            let mode = if nokeep {
                PruneMode::General
            } else {
                PruneMode::KeepShape
            };
            for_each_tree(&input.trees, &mut out, |_, tree, out| {
                let labels: Vec<String> = tree.get_leaf_names().into_iter().flatten().collect();
                if clade {
                    out.tree(&reference.clade(&labels)?)
                } else {
                    let mut induced = reference.clone();
                    induced.induce(&labels, mode)?;
                    out.tree(&induced)
                }
            })?
        }

        Commands::Resolve {
            input,
            mode,
            length,
        } => for_each_tree(&input.trees, &mut out, |_, mut tree, out| {
            tree.resolve(mode, Some(length), &mut rng)?;
            out.tree(&tree)
        })?,

        Commands::Bipartitions { input, bitmask } => {
            for_each_tree(&input.trees, &mut out, |_, tree, out| {
                let parts = tree.bipartitions()?;
                if bitmask {
                    for mask in parts.bit_strings() {
                        out.line(&mask)?;
                    }
                } else {
                    for labels in parts.label_sets() {
                        out.line(&labels.iter().join(" "))?;
                    }
                }
                Ok(())
            })?
        }

        Commands::Scale { input, factor } => {
            for_each_tree(&input.trees, &mut out, |_, mut tree, out| {
                tree.rescale(factor);
                out.tree(&tree)
            })?
        }

        Commands::ResetLengths { input, value } => {
            for_each_tree(&input.trees, &mut out, |_, mut tree, out| {
                tree.reset_lengths(value);
                out.tree(&tree)
            })?
        }

        Commands::Shuffle { input, target } => {
            for_each_tree(&input.trees, &mut out, |_, mut tree, out| {
                match target {
                    ShuffleTarget::Children => tree.shuffle_children(&mut rng)?,
                    ShuffleTarget::Labels => tree.shuffle_labels(&mut rng),
                }
                out.tree(&tree)
            })?
        }

        Commands::Random {
            tips,
            trees,
            kind,
            caterpillar: ladder,
            distribution,
        } => {
            let bar = out.progress(trees);
            for _ in (0..trees).progress_with(bar) {
                let tree = if ladder {
                    caterpillar(tips, distribution, &mut rng)?
                } else {
                    random_tree(tips, kind, distribution, &mut rng)?
                };
                out.tree(&tree)?;
            }
            true
        }

        Commands::Completion { shell } => {
            let mut cmd = cli::Args::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
            true
        }
    };

    out.writer.flush()?;
    Ok(success)
}

fn main() {
    let args = cli::Args::parse();
    setup_logging(args.verbose, args.quiet);

    match run(args) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
