use std::{fs, path::Path};

use thiserror::Error;

use super::node::Node;
use super::tree_impl::{Tree, TreeError};
use super::NodeId;

/// Errors that can occur when parsing newick files.
#[derive(Error, Debug)]
pub enum NewickParseError {
    /// There is whitespace in one of the branch lengths
    #[error("Cannot have whitespace in number field.")]
    WhiteSpaceInNumber,
    /// There is an unclosed bracket in the newick String
    #[error("Missing a closing bracket.")]
    UnclosedBracket,
    /// The newick string is missing a final semi-colon
    #[error("The tree is missing a semi colon at the end.")]
    NoClosingSemicolon,
    /// We are trying to close a subtree but have no parent node.
    #[error("Parent node of subtree not found")]
    NoSubtreeParent,
    /// The newick string contains no tree
    #[error("The newick string is empty.")]
    Empty,
    /// There was a [`TreeError`] when building a tree from the newick string
    #[error("Problem with building the tree.")]
    TreeError(#[from] TreeError),
    /// There was a [`std::num::ParseFloatError`] when parsing branch lengths
    #[error("Could not parse a branch length")]
    FloatError(#[from] std::num::ParseFloatError),
    /// There was a [`std::io::Error`] when reading a newick file
    #[error("Problem reading file")]
    IoError(#[from] std::io::Error),
}

impl Tree {
    /// Splits a text holding several newick trees into one string per tree,
    /// ignoring semicolons within quotes and comments.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let trees = Tree::split_newick("(A,B);\n('x;y',C);[a;b](D,E);");
    /// assert_eq!(trees, vec!["(A,B);", "('x;y',C);", "[a;b](D,E);"]);
    /// ```
    pub fn split_newick(text: &str) -> Vec<&str> {
        let mut trees = vec![];
        let mut start = 0;
        let mut quote: Option<char> = None;
        let mut in_comment = false;

        for (i, c) in text.char_indices() {
            match (c, quote, in_comment) {
                ('"' | '\'', None, false) => quote = Some(c),
                (c, Some(q), _) if c == q => quote = None,
                ('[', None, _) => in_comment = true,
                (']', None, true) => in_comment = false,
                (';', None, false) => {
                    let tree = text[start..=i].trim();
                    if tree != ";" {
                        trees.push(tree);
                    }
                    start = i + 1;
                }
                _ => {}
            }
        }

        trees
    }
}

impl Tree {
    // ########################
    // # READ AND WRITE TREES #
    // ########################

    fn write_subtree(
        &self,
        out: &mut String,
        root: NodeId,
        precision: Option<usize>,
        keep_origin: bool,
    ) -> Result<(), TreeError> {
        let mut stack: Vec<(NodeId, usize)> = vec![(root, 0)];

        while let Some((id, next)) = stack.pop() {
            let node = self.get(&id)?;
            if next < node.children.len() {
                out.push(if next == 0 { '(' } else { ',' });
                stack.push((id, next + 1));
                stack.push((node.children[next], 0));
                continue;
            }

            if !node.is_tip() {
                out.push(')');
            }
            if id == root && !keep_origin {
                let mut origin = node.clone();
                origin.parent_edge = None;
                *out += &origin.to_newick(precision);
            } else {
                *out += &node.to_newick(precision);
            }
        }

        Ok(())
    }

    /// Writes the tree as a newick formatted string
    /// # Example
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let newick = "(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F:0.6;";
    /// let tree = Tree::from_newick(newick).unwrap();
    ///
    /// assert_eq!(tree.to_newick().unwrap(), newick);
    /// ```
    pub fn to_newick(&self) -> Result<String, TreeError> {
        let mut out = String::new();
        self.write_subtree(&mut out, self.get_root()?, None, true)?;
        Ok(out + ";")
    }

    /// Writes the tree as a newick formatted string, every branch length
    /// written with a fixed number of decimals.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("(A:0.1,B,(C:0.3,D:0.4)E:0.5)F;").unwrap();
    ///
    /// assert_eq!(
    ///     tree.to_newick_precision(2).unwrap(),
    ///     "(A:0.10,B:0.00,(C:0.30,D:0.40)E:0.50)F:0.00;"
    /// );
    /// ```
    pub fn to_newick_precision(&self, precision: usize) -> Result<String, TreeError> {
        let mut out = String::new();
        self.write_subtree(&mut out, self.get_root()?, Some(precision), true)?;
        Ok(out + ";")
    }

    /// Writes the subtree rooted at a node as a newick string. Unless
    /// `keep_origin` is set the length of the branch above the node is left out.
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let tree = Tree::from_newick("(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F;").unwrap();
    /// let e = tree.get_by_name("E").unwrap().id;
    ///
    /// assert_eq!(tree.subtree_to_newick(&e, false, None).unwrap(), "(C:0.3,D:0.4)E;");
    /// assert_eq!(tree.subtree_to_newick(&e, true, None).unwrap(), "(C:0.3,D:0.4)E:0.5;");
    /// ```
    pub fn subtree_to_newick(
        &self,
        node: &NodeId,
        keep_origin: bool,
        precision: Option<usize>,
    ) -> Result<String, TreeError> {
        let mut out = String::new();
        self.write_subtree(&mut out, *node, precision, keep_origin)?;
        Ok(out + ";")
    }

    /// Read a newick formatted string and build a [`Tree`] struct from it.
    /// The leaf and inner node index of the returned tree is up to date.
    /// # Example
    /// ```
    /// use ntree::tree::Tree;
    ///
    /// let newick = "(A:0.1,B:0.2,(C:0.3,D:0.4)E:0.5)F;";
    /// let tree = Tree::from_newick(newick).unwrap();
    ///
    /// assert_eq!(tree.size(), 6);
    /// assert_eq!(tree.n_leaves(), 4);
    /// assert_eq!(tree.is_rooted().unwrap(), false);
    /// ```
    pub fn from_newick(newick: &str) -> Result<Self, NewickParseError> {
        #[derive(Debug, PartialEq)]
        enum Field {
            Name,
            Length,
            Comment,
        }

        let mut tree = Tree::new();

        let mut parsing = Field::Name;
        let mut current_name: Option<String> = None;
        let mut current_length: Option<String> = None;
        let mut current_comment: Option<String> = None;
        let mut current_index: Option<NodeId> = None;
        let mut parent_stack: Vec<NodeId> = Vec::new();

        let mut open_delimiters = 0usize;
        let mut quote: Option<char> = None;
        let mut length_closed = false;

        if newick.trim().is_empty() {
            return Err(NewickParseError::Empty);
        }

        for c in newick.chars() {
            // Add character in quotes to name
            if let Some(q) = quote {
                current_name.get_or_insert_with(String::new).push(c);
                if c == q {
                    quote = None;
                }
                continue;
            }

            // Add current character to comment
            if parsing == Field::Comment && c != ']' {
                current_comment.get_or_insert_with(String::new).push(c);
                continue;
            }

            // Skip unquoted whitespace
            if c.is_whitespace() {
                if parsing == Field::Length && current_length.is_some() {
                    length_closed = true;
                }
                continue;
            }

            match c {
                '"' | '\'' if parsing == Field::Name => {
                    quote = Some(c);
                    current_name.get_or_insert_with(String::new).push(c);
                }
                '[' => {
                    parsing = Field::Comment;
                }
                ']' => {
                    parsing = Field::Name;
                }
                '(' => {
                    // Start subtree
                    match parent_stack.last() {
                        None => parent_stack.push(tree.add(Node::new())),
                        Some(parent) => {
                            parent_stack.push(tree.add_child(Node::new(), *parent, None)?)
                        }
                    };
                    open_delimiters += 1;
                }
                ':' => {
                    // Start parsing length
                    parsing = Field::Length;
                    length_closed = false;
                }
                ',' | ')' => {
                    let index = match current_index {
                        Some(index) => index,
                        None => {
                            let parent =
                                parent_stack.last().ok_or(NewickParseError::NoSubtreeParent)?;
                            tree.add_child(Node::new(), *parent, None)?
                        }
                    };

                    let node = tree.get_mut(&index)?;
                    node.name = current_name.take();
                    node.comment = current_comment.take();
                    node.parent_edge = match current_length.take() {
                        Some(length) => Some(length.parse()?),
                        None => None,
                    };

                    current_index = None;
                    parsing = Field::Name;

                    if c == ')' {
                        // Close subtree
                        open_delimiters = open_delimiters
                            .checked_sub(1)
                            .ok_or(NewickParseError::NoSubtreeParent)?;
                        current_index = parent_stack.pop();
                        if current_index.is_none() {
                            return Err(NewickParseError::NoSubtreeParent);
                        }
                    }
                }
                ';' => {
                    // Finish parsing the Tree
                    if open_delimiters != 0 {
                        return Err(NewickParseError::UnclosedBracket);
                    }
                    let index = match current_index {
                        Some(index) => index,
                        None => tree.add(Node::new()),
                    };
                    let node = tree.get_mut(&index)?;
                    node.name = current_name;
                    node.comment = current_comment;
                    if let Some(length) = current_length {
                        node.parent_edge = Some(length.parse()?);
                    }

                    tree.rebuild_index()?;

                    return Ok(tree);
                }
                _ => {
                    // Parse characters in fields
                    match parsing {
                        Field::Name => current_name.get_or_insert_with(String::new).push(c),
                        Field::Length => {
                            if length_closed {
                                return Err(NewickParseError::WhiteSpaceInNumber);
                            }
                            current_length.get_or_insert_with(String::new).push(c)
                        }
                        Field::Comment => unreachable!("comments are consumed above"),
                    };
                }
            }
        }

        Err(NewickParseError::NoClosingSemicolon)
    }

    /// Writes the tree to a newick file
    pub fn to_file(&self, path: &Path) -> Result<(), TreeError> {
        fs::write(path, self.to_newick()? + "\n")?;
        Ok(())
    }

    /// Creates a tree from a newick file
    pub fn from_file(path: &Path) -> Result<Self, NewickParseError> {
        let newick_string = fs::read_to_string(path)?;
        Self::from_newick(&newick_string)
    }

    /// Reads every tree of a newick file, each one is parsed independently
    /// so a malformed tree does not prevent reading the others.
    pub fn from_file_all(path: &Path) -> Result<Vec<Result<Self, NewickParseError>>, NewickParseError> {
        let text = fs::read_to_string(path)?;
        Ok(Self::split_newick(&text)
            .into_iter()
            .map(Self::from_newick)
            .collect())
    }
}
