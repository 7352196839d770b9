//! nginx-style configuration parser
//!
//! This crate turns configuration text into an editable tree and back:
//! lexer → parser → [`Config`] tree → dumper. Typed views over specific
//! directives are built on top of the generic tree by [`adapter`]s.
//!
//! # Example
//!
//! ```rust
//! use ngxkit_config::{parse, dump, Style, UpstreamServer};
//!
//! let source = r#"
//!     upstream backend {
//!         server 127.0.0.1:8080 weight=5 down;
//!     }
//! "#;
//!
//! let config = parse(source).unwrap();
//! let upstreams = config.upstreams().unwrap();
//! let server: &UpstreamServer = &upstreams[0].servers()[0];
//! assert_eq!(server.address(), "127.0.0.1:8080");
//! assert_eq!(server.to_string(), "server 127.0.0.1:8080 weight=5 down;");
//!
//! let text = dump(&config, &Style::default());
//! assert_eq!(parse(&text).unwrap(), config);
//! ```

pub mod adapter;
pub mod dumper;
pub mod parser;

pub use adapter::{AdapterError, DirectiveAdapter, DuplicateKeys, Upstream, UpstreamServer};
pub use dumper::{dump, dump_block, dump_directive, Style, StyleError};
pub use parser::{
    parse, tokenize, Block, Comment, Config, Directive, Location, Node, ParseError, Parser, Token,
    TokenKind,
};

/// Parse `source` and render it back with `style`
pub fn format(source: &str, style: &Style) -> Result<String, ParseError> {
    let config = parse(source)?;
    Ok(dump(&config, style))
}

/// Any error this crate can return
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("Style error: {0}")]
    Style(#[from] StyleError),
}
