//! Tree to text
//!
//! Output is normalized: one statement per line, fixed indentation per
//! nesting level, trailing comments kept at the end of their line. Parsing
//! the output yields a tree equal to the input tree.

use crate::parser::ast::{Block, Comment, Config, Directive, Node};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Formatting options for [`dump`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    /// Spaces per nesting level
    pub indent: usize,

    /// Nesting level the top-level statements start at
    pub start_indent: usize,

    /// Blank line before a block directive that follows a sibling
    pub space_before_blocks: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            indent: 4,
            start_indent: 0,
            space_before_blocks: false,
        }
    }
}

/// Style loading error
#[derive(Debug, Error)]
pub enum StyleError {
    #[error("Invalid style: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Style {
    pub fn indented(indent: usize) -> Self {
        Self {
            indent,
            ..Self::default()
        }
    }

    pub fn no_indent() -> Self {
        Self::indented(0)
    }

    pub fn with_space_before_blocks(mut self) -> Self {
        self.space_before_blocks = true;
        self
    }

    /// Load a style from TOML; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, StyleError> {
        Ok(toml::from_str(source)?)
    }
}

struct Dumper<'s> {
    style: &'s Style,
    out: String,
}

/// A block whose children are still being written
struct Frame<'a> {
    nodes: std::slice::Iter<'a, Node>,
    depth: usize,
    previous: Option<&'a Node>,
    /// Depth of the `}` written once the children run out; `None` for the root
    close: Option<usize>,
}

impl<'s> Dumper<'s> {
    fn new(style: &'s Style) -> Self {
        Self {
            style,
            out: String::new(),
        }
    }

    fn begin_line(&mut self, depth: usize) {
        if !self.out.is_empty() {
            self.out.push('\n');
        }
        let width = (self.style.start_indent + depth) * self.style.indent;
        self.out.extend(std::iter::repeat_n(' ', width));
    }

    /// Write the children of `block`, descending into nested blocks with an
    /// explicit stack
    fn block<'a>(&mut self, block: &'a Block, depth: usize, close: Option<usize>) {
        let mut stack = vec![Frame {
            nodes: block.children.iter(),
            depth,
            previous: None,
            close,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(node) = frame.nodes.next() else {
                let close = frame.close;
                stack.pop();
                if let Some(depth) = close {
                    self.begin_line(depth);
                    self.out.push('}');
                }
                continue;
            };
            let depth = frame.depth;
            let previous = frame.previous.replace(node);

            match node {
                Node::Comment(comment) => {
                    let appendable = !matches!(previous, Some(Node::Comment(_)));
                    self.comment(comment, depth, appendable);
                }
                Node::Directive(directive) => {
                    if self.style.space_before_blocks && directive.has_block() && previous.is_some() {
                        self.out.push('\n');
                    }
                    self.begin_line(depth);
                    if let Some(block) = self.header(directive) {
                        stack.push(Frame {
                            nodes: block.children.iter(),
                            depth: depth + 1,
                            previous: None,
                            close: Some(depth),
                        });
                    }
                }
            }
        }
    }

    fn comment(&mut self, comment: &Comment, depth: usize, appendable: bool) {
        if comment.trailing && appendable && !self.out.is_empty() {
            self.out.push(' ');
        } else {
            self.begin_line(depth);
        }
        self.out.push_str(&comment.text);
    }

    /// Write name and parameters, then `;` or ` {`; hands back the block to
    /// descend into
    fn header<'a>(&mut self, directive: &'a Directive) -> Option<&'a Block> {
        self.out.push_str(&directive.name);
        for parameter in &directive.parameters {
            self.out.push(' ');
            self.out.push_str(parameter);
        }

        match &directive.block {
            None => {
                self.out.push(';');
                None
            }
            Some(block) => {
                self.out.push_str(" {");
                Some(block)
            }
        }
    }
}

/// Render a whole configuration, ending with a newline unless empty
pub fn dump(config: &Config, style: &Style) -> String {
    let mut out = dump_block(&config.block, style);
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Render the children of a block at the style's starting depth
pub fn dump_block(block: &Block, style: &Style) -> String {
    let mut dumper = Dumper::new(style);
    dumper.block(block, 0, None);
    dumper.out
}

/// Render one directive (and its block), without a final newline
pub fn dump_directive(directive: &Directive, style: &Style) -> String {
    let mut dumper = Dumper::new(style);
    dumper.begin_line(0);
    if let Some(block) = dumper.header(directive) {
        dumper.block(block, 1, Some(0));
    }
    dumper.out
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&dump(self, &Style::default()))
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&dump_block(self, &Style::default()))
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&dump_directive(self, &Style::default()))
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
