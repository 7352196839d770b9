//! Directive adapters
//!
//! An adapter is a typed, read-only view over one generic [`Directive`].
//! Building one is a pure conversion (`TryFrom<&Directive>`) that either
//! succeeds or says why the directive has the wrong shape; the tree itself
//! never carries directive-specific fields.

mod upstream;

pub use upstream::{Upstream, UpstreamServer};

use crate::parser::ast::{Config, Directive};
use thiserror::Error;

/// Adapter construction and query errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("Expected a '{expected}' directive, found '{found}'")]
    UnexpectedDirective {
        expected: &'static str,
        found: String,
    },

    #[error("Invalid upstream server: {reason}")]
    InvalidUpstreamServer { reason: String },

    #[error("Invalid upstream: {reason}")]
    InvalidUpstream { reason: String },

    #[error("Duplicate parameter '{key}' in '{directive}' directive")]
    DuplicateParameter { directive: String, key: String },

    #[error("Invalid value '{value}' for parameter '{key}'")]
    InvalidParameter { key: String, value: String },
}

/// What to do when a `key=value` parameter repeats a key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicateKeys {
    /// The last occurrence wins
    #[default]
    LastWins,
    /// The first occurrence wins
    FirstWins,
    /// Fail with [`AdapterError::DuplicateParameter`]
    Reject,
}

/// A typed view constructed from one directive
pub trait DirectiveAdapter<'a>: TryFrom<&'a Directive, Error = AdapterError> {
    /// Name of the directive this adapter understands
    const NAME: &'static str;

    /// The wrapped directive
    fn directive(&self) -> &'a Directive;
}

/// Fail unless `directive` is named `expected`
pub(crate) fn expect_name(directive: &Directive, expected: &'static str) -> Result<(), AdapterError> {
    if directive.name == expected {
        Ok(())
    } else {
        Err(AdapterError::UnexpectedDirective {
            expected,
            found: directive.name.clone(),
        })
    }
}

impl Config {
    /// Adapt every directive named `A::NAME` in the tree, in document order
    pub fn adapt<'a, A: DirectiveAdapter<'a>>(&'a self) -> Result<Vec<A>, AdapterError> {
        self.find_directives(A::NAME)
            .into_iter()
            .map(A::try_from)
            .collect()
    }

    /// All `upstream` groups in the tree
    pub fn upstreams(&self) -> Result<Vec<Upstream<'_>>, AdapterError> {
        self.adapt()
    }
}
