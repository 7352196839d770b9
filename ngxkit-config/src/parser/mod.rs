//! Parser module for nginx-style configuration
//!
//! This module provides the lexer, the generic tree and the parser.

pub mod ast;
pub mod lexer;
pub mod parser;

pub use ast::*;
pub use lexer::{tokenize, Location, Token, TokenKind};
pub use parser::{parse, ParseError, Parser};
