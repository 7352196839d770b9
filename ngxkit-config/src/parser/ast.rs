//! Generic configuration tree
//!
//! The tree has no knowledge of what any directive means:
//! - [`Directive`]: name + parameters + optional [`Block`]
//! - [`Block`]: ordered children, each a directive or a [`Comment`]
//! - [`Config`]: the root block of one parse
//!
//! Typed views over specific directives live in [`crate::adapter`].

use serde::{Deserialize, Serialize};

/// Root of a parsed configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub block: Block,
}

/// Ordered list of child nodes delimited by `{ }` (or the whole file)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub children: Vec<Node>,
}

/// One child of a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    Directive(Directive),
    Comment(Comment),
}

/// A configuration statement: `name p1 p2 ...;` or `name p1 p2 ... { ... }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directive {
    /// Directive name (e.g. "server", "proxy_pass", "location")
    pub name: String,

    /// Parameters following the name, verbatim and in source order
    #[serde(default)]
    pub parameters: Vec<String>,

    /// Optional block { ... }
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Block>,
}

/// A `#` comment kept as a sibling node
///
/// `trailing` is set when the comment shared its source line with the token
/// before it, so it is written back at the end of that line. Equality only
/// looks at `text` and `trailing`; the position is diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    /// Comment text including the leading `#`
    pub text: String,
    #[serde(default)]
    pub trailing: bool,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub column: usize,
}

impl PartialEq for Comment {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.trailing == other.trailing
    }
}

impl Eq for Comment {}

impl Comment {
    /// A standalone comment; `#` is prepended when missing
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let text = if text.starts_with('#') {
            text
        } else {
            format!("# {}", text)
        };
        Self {
            text,
            trailing: false,
            line: 0,
            column: 0,
        }
    }

    pub fn trailing(mut self) -> Self {
        self.trailing = true;
        self
    }
}

impl Directive {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            block: None,
        }
    }

    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parameter(mut self, parameter: impl Into<String>) -> Self {
        self.parameters.push(parameter.into());
        self
    }

    pub fn with_block(mut self, block: Block) -> Self {
        self.block = Some(block);
        self
    }

    /// Parameter at `index`, if present
    pub fn parameter(&self, index: usize) -> Option<&str> {
        self.parameters.get(index).map(String::as_str)
    }

    pub fn has_block(&self) -> bool {
        self.block.is_some()
    }

    /// Child directives of this directive's block, empty when there is none
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.block.iter().flat_map(Block::directives)
    }
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_children(children: Vec<Node>) -> Self {
        Self { children }
    }

    pub fn push(&mut self, node: impl Into<Node>) {
        self.children.push(node.into());
    }

    pub fn with(mut self, node: impl Into<Node>) -> Self {
        self.push(node);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// Direct child directives, skipping comments
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.children.iter().filter_map(Node::as_directive)
    }

    pub fn directives_mut(&mut self) -> impl Iterator<Item = &mut Directive> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Directive(directive) => Some(directive),
            Node::Comment(_) => None,
        })
    }

    pub fn comments(&self) -> impl Iterator<Item = &Comment> {
        self.children.iter().filter_map(|node| match node {
            Node::Comment(comment) => Some(comment),
            Node::Directive(_) => None,
        })
    }

    /// Every directive in this block and below, depth-first in document order
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![self.children.iter()],
        }
    }

    /// Every directive named `name` in this block and below, in document order
    pub fn find_directives(&self, name: &str) -> Vec<&Directive> {
        self.walk().filter(|d| d.name == name).collect()
    }

    /// Number of directives in this block and below
    pub fn count_directives(&self) -> usize {
        self.walk().count()
    }
}

// Nested blocks are detached and dropped one at a time; the derived drop
// would recurse once per nesting level.
impl Drop for Block {
    fn drop(&mut self) {
        let mut nested: Vec<Block> = detach_blocks(&mut self.children).collect();
        while let Some(mut block) = nested.pop() {
            nested.extend(detach_blocks(&mut block.children));
        }
    }
}

fn detach_blocks(children: &mut [Node]) -> impl Iterator<Item = Block> + '_ {
    children.iter_mut().filter_map(|node| match node {
        Node::Directive(directive) => directive.block.take(),
        Node::Comment(_) => None,
    })
}

/// Depth-first directive iterator returned by [`Block::walk`]
pub struct Walk<'a> {
    stack: Vec<std::slice::Iter<'a, Node>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Directive;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(nodes) = self.stack.last_mut() {
            match nodes.next() {
                Some(Node::Directive(directive)) => {
                    if let Some(block) = &directive.block {
                        self.stack.push(block.children.iter());
                    }
                    return Some(directive);
                }
                Some(Node::Comment(_)) => {}
                None => {
                    self.stack.pop();
                }
            }
        }
        None
    }
}

impl Config {
    pub fn new(block: Block) -> Self {
        Self { block }
    }

    pub fn children(&self) -> &[Node] {
        &self.block.children
    }

    /// Top-level directives
    pub fn directives(&self) -> impl Iterator<Item = &Directive> {
        self.block.directives()
    }

    /// Every directive named `name` anywhere in the tree, in document order
    pub fn find_directives(&self, name: &str) -> Vec<&Directive> {
        self.block.find_directives(name)
    }
}

impl Node {
    pub fn as_directive(&self) -> Option<&Directive> {
        match self {
            Node::Directive(directive) => Some(directive),
            Node::Comment(_) => None,
        }
    }

    pub fn as_comment(&self) -> Option<&Comment> {
        match self {
            Node::Comment(comment) => Some(comment),
            Node::Directive(_) => None,
        }
    }
}

impl From<Directive> for Node {
    fn from(directive: Directive) -> Self {
        Node::Directive(directive)
    }
}

impl From<Comment> for Node {
    fn from(comment: Comment) -> Self {
        Node::Comment(comment)
    }
}
