use clap::ValueEnum;
use rand::seq::index::sample;
use rand::Rng;
use tracing::debug;

use super::node::Node;
use super::tree_impl::{Tree, TreeError};
use super::{EdgeLength, NodeId};

/// How the children of a multifurcating node are joined into a binary
/// subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ResolveMode {
    /// Two children chosen at random are joined under a new node until
    /// two remain
    Random,
    /// The last two children are joined, then the result with the previous
    /// child, and so on, which gives a caterpillar
    Ladder,
}

impl Tree {
    /// Turns the tree into a binary rooted tree. Nodes with a single child
    /// are contracted first, then every node with more than two children,
    /// the root included, is resolved with new inner nodes whose branches
    /// get `length`. Returns the number of inner nodes added.
    ///
    /// A binary rooted tree is left as it is.
    /// ```
    /// use ntree::tree::{ResolveMode, Tree};
    ///
    /// let mut tree = Tree::from_newick("(A:1,B:1,C:1,D:1);").unwrap();
    /// let mut rng = rand::thread_rng();
    ///
    /// let added = tree.resolve(ResolveMode::Ladder, Some(0.0), &mut rng).unwrap();
    ///
    /// assert_eq!(added, 2);
    /// assert_eq!(tree.to_newick().unwrap(), "(A:1,(B:1,(C:1,D:1):0):0);");
    /// ```
    pub fn resolve<R: Rng + ?Sized>(
        &mut self,
        mode: ResolveMode,
        length: Option<EdgeLength>,
        rng: &mut R,
    ) -> Result<usize, TreeError> {
        if self.is_binary_rooted() {
            return Ok(0);
        }
        self.contract_unary()?;

        let root = self.get_root()?;
        let mut added = 0;
        for id in self.postorder(&root)? {
            let children = self.get(&id)?.children.clone();
            if children.len() <= 2 {
                continue;
            }
            added += children.len() - 2;
            let resolved = match mode {
                ResolveMode::Random => self.join_random(children, length, rng)?,
                ResolveMode::Ladder => self.join_ladder(children, length)?,
            };
            for child in resolved.iter() {
                self.get_mut(child)?.parent = Some(id);
            }
            self.get_mut(&id)?.children = resolved;
        }

        debug!("resolved polytomies with {added} new inner nodes");
        self.rebuild_index()?;

        Ok(added)
    }

    /// Joins two children under a new inner node that is not yet attached
    fn join(
        &mut self,
        left: NodeId,
        right: NodeId,
        length: Option<EdgeLength>,
    ) -> Result<NodeId, TreeError> {
        let mut node = Node::new();
        node.parent_edge = length;
        node.children = vec![left, right];
        let id = self.add(node);
        self.get_mut(&left)?.parent = Some(id);
        self.get_mut(&right)?.parent = Some(id);
        Ok(id)
    }

    fn join_random<R: Rng + ?Sized>(
        &mut self,
        mut children: Vec<NodeId>,
        length: Option<EdgeLength>,
        rng: &mut R,
    ) -> Result<Vec<NodeId>, TreeError> {
        while children.len() > 2 {
            let picked = sample(rng, children.len(), 2);
            let (a, b) = (picked.index(0), picked.index(1));
            let (first, second) = if a < b { (a, b) } else { (b, a) };
            children[first] = self.join(children[first], children[second], length)?;
            children.swap_remove(second);
        }
        Ok(children)
    }

    fn join_ladder(
        &mut self,
        mut children: Vec<NodeId>,
        length: Option<EdgeLength>,
    ) -> Result<Vec<NodeId>, TreeError> {
        while children.len() > 2 {
            let (Some(last), Some(previous)) = (children.pop(), children.pop()) else {
                break;
            };
            let joined = self.join(previous, last, length)?;
            children.push(joined);
        }
        Ok(children)
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("(A,B,C);", "(A,(B,C):0);", 1)]
    #[case("((A,B,C,D)x,E);", "((A,(B,(C,D):0):0)x,E);", 2)]
    #[case("(((A,B)),C,D);", "((A,B),(C,D):0);", 1)]
    fn ladder_resolution(#[case] newick: &str, #[case] expected: &str, #[case] added: usize) {
        let mut tree = Tree::from_newick(newick).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(
            tree.resolve(ResolveMode::Ladder, Some(0.0), &mut rng).unwrap(),
            added
        );
        assert_eq!(tree.to_newick().unwrap(), expected);
        assert!(tree.is_binary_rooted());
        tree.check().unwrap();
    }

    #[rstest]
    #[case("(A,B,C,D,E,F,G,H);")]
    #[case("((A,B,C),(D,E,F,G),H,(I,J));")]
    #[case("(((A:1,B:2,C:3):1)u:2,D:1,E:0.5);")]
    fn random_resolution(#[case] newick: &str) {
        let mut tree = Tree::from_newick(newick).unwrap();
        let leaves = tree.n_leaves();
        let length = tree.length();
        let mut rng = StdRng::seed_from_u64(42);

        tree.resolve(ResolveMode::Random, None, &mut rng).unwrap();

        assert!(tree.is_binary_rooted());
        assert_eq!(tree.n_leaves(), leaves);
        assert_eq!(tree.n_inner(), leaves - 1);
        assert_eq!(tree.length(), length);
        tree.check().unwrap();
    }

    #[test]
    fn binary_rooted_is_unchanged() {
        let newick = "((A:1,B:1):1,(C:1,D:1):1);";
        let mut tree = Tree::from_newick(newick).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        assert_eq!(
            tree.resolve(ResolveMode::Random, Some(0.0), &mut rng).unwrap(),
            0
        );
        assert_eq!(tree.to_newick().unwrap(), newick);
    }
}
