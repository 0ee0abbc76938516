use std::collections::HashMap;

use tracing::debug;

use super::tree_impl::{add_edges, Tree, TreeError};
use super::NodeId;

impl Tree {
    /// Replaces the leaf named `leaf_label` by the whole `source` tree.
    ///
    /// The root of `source` takes the slot of the leaf and its branch
    /// absorbs the length of the leaf's branch, so the total length of the
    /// result is the sum of the lengths of both trees.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let mut tree = Tree::from_newick("((A:1,B:1):1,C:2);").unwrap();
    /// let source = Tree::from_newick("(D:1,E:1):0.5;").unwrap();
    ///
    /// tree.graft("C", &source).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), "((A:1,B:1):1,(D:1,E:1):2.5);");
    /// ```
    pub fn graft(&mut self, leaf_label: &str, source: &Tree) -> Result<(), TreeError> {
        let leaf = self
            .get_leaf_by_name(leaf_label)
            .ok_or_else(|| TreeError::TaxonNotFound(leaf_label.to_string()))?;
        let source_root = source.get_root()?;

        let mut mapping: HashMap<NodeId, NodeId> = HashMap::new();
        for id in source.preorder(&source_root)? {
            let mut node = source.get(&id)?.clone();
            node.children.clear();
            node.mark = false;
            let parent = node.parent.and_then(|p| mapping.get(&p).copied());
            node.parent = parent;

            let new_id = self.add(node);
            if let Some(parent) = parent {
                self.get_mut(&parent)?.add_child(new_id);
            }
            mapping.insert(id, new_id);
        }

        let grafted = *mapping.get(&source_root).ok_or(TreeError::RootNotFound)?;
        let leaf_node = self.get(&leaf)?;
        let parent = leaf_node.parent;
        let length = add_edges(self.get(&grafted)?.parent_edge, leaf_node.parent_edge);

        match parent {
            Some(parent) => self.get_mut(&parent)?.replace_child(&leaf, grafted)?,
            None => self.root = Some(grafted),
        }
        let grafted_node = self.get_mut(&grafted)?;
        grafted_node.parent = parent;
        grafted_node.parent_edge = length;

        self.get_mut(&leaf)?.delete();

        debug!("grafted {} nodes at {leaf_label}", mapping.len());

        self.rebuild_index()
    }
}
