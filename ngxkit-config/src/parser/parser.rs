//! Configuration parser
//!
//! Single pass with one token of lookahead that converts tokens into a
//! [`Config`] tree. Only structure is checked: braces must balance and
//! every directive needs a name and a terminator.

use crate::parser::ast::*;
use crate::parser::lexer::{tokenize, Location, Token, TokenKind};
use ariadne::{Config as ReportConfig, Label, Report, ReportKind, Source};
use std::str::FromStr;
use thiserror::Error;

/// Structural parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unexpected '}}' at line {line}, column {column}: no block is open")]
    UnexpectedBlockEnd {
        line: usize,
        column: usize,
        span: Location,
    },

    #[error("Block opened by '{directive}' at line {line}, column {column} is never closed")]
    UnclosedBlock {
        directive: String,
        line: usize,
        column: usize,
        span: Location,
    },

    #[error("Unexpected '{found}' at line {line}, column {column}: directive has no name")]
    MissingDirectiveName {
        found: String,
        line: usize,
        column: usize,
        span: Location,
    },

    #[error("Directive '{directive}' at line {line}, column {column} is not terminated by ';' or '{{'")]
    UnterminatedDirective {
        directive: String,
        line: usize,
        column: usize,
        span: Location,
    },
}

impl ParseError {
    /// Byte range the error points at
    pub fn span(&self) -> Location {
        match self {
            ParseError::UnexpectedBlockEnd { span, .. }
            | ParseError::UnclosedBlock { span, .. }
            | ParseError::MissingDirectiveName { span, .. }
            | ParseError::UnterminatedDirective { span, .. } => *span,
        }
    }

    /// 1-based (line, column) of the error
    pub fn position(&self) -> (usize, usize) {
        match self {
            ParseError::UnexpectedBlockEnd { line, column, .. }
            | ParseError::UnclosedBlock { line, column, .. }
            | ParseError::MissingDirectiveName { line, column, .. }
            | ParseError::UnterminatedDirective { line, column, .. } => (*line, *column),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ParseError::UnexpectedBlockEnd { .. } => "this brace closes nothing",
            ParseError::UnclosedBlock { .. } => "block opened here",
            ParseError::MissingDirectiveName { .. } => "expected a directive name before this",
            ParseError::UnterminatedDirective { .. } => "directive starts here",
        }
    }

    /// Render a labelled, uncolored diagnostic pointing into `source`
    pub fn report(&self, source_id: &str, source: &str) -> String {
        let range: std::ops::Range<usize> = self.span().into();
        let mut out = Vec::new();
        let written = Report::build(ReportKind::Error, (source_id, range.clone()))
            .with_config(ReportConfig::default().with_color(false))
            .with_message(self.to_string())
            .with_label(Label::new((source_id, range)).with_message(self.label()))
            .finish()
            .write((source_id, Source::from(source)), &mut out);

        match written {
            Ok(()) => String::from_utf8_lossy(&out).into_owned(),
            Err(_) => self.to_string(),
        }
    }
}

type ParseResult<T> = Result<T, ParseError>;

/// A directive whose `{` has been read but not its `}`
struct OpenBlock {
    directive: Directive,
    /// Name token, reported when the block is never closed
    opener: Token,
    block: Block,
}

/// Block that statements are currently added to
fn current<'b>(root: &'b mut Block, open: &'b mut [OpenBlock]) -> &'b mut Block {
    match open.last_mut() {
        Some(frame) => &mut frame.block,
        None => root,
    }
}

/// Parser state
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Line of the last consumed token; decides whether a comment is trailing
    last_line: Option<usize>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            last_line: None,
        }
    }

    /// Create a parser from source text
    pub fn from_source(source: &str) -> Self {
        Self::new(tokenize(source))
    }

    /// Parse the whole token stream into a configuration tree
    ///
    /// Open blocks live on an explicit stack, so nesting depth is bounded by
    /// memory rather than by the call stack.
    pub fn parse(&mut self) -> ParseResult<Config> {
        let mut root = Block::new();
        let mut open: Vec<OpenBlock> = Vec::new();

        loop {
            match self.peek_kind() {
                None => {
                    if let Some(frame) = open.pop() {
                        return Err(ParseError::UnclosedBlock {
                            directive: frame.opener.literal,
                            line: frame.opener.line,
                            column: frame.opener.column,
                            span: frame.opener.span,
                        });
                    }
                    break;
                }
                Some(TokenKind::BlockEnd) => {
                    let token = self.bump();
                    let Some(OpenBlock { mut directive, block, .. }) = open.pop() else {
                        return Err(ParseError::UnexpectedBlockEnd {
                            line: token.line,
                            column: token.column,
                            span: token.span,
                        });
                    };
                    directive.block = Some(block);
                    current(&mut root, &mut open).push(directive);
                }
                Some(TokenKind::Comment) => {
                    let comment = self.parse_comment(true);
                    current(&mut root, &mut open).push(comment);
                }
                Some(TokenKind::Keyword | TokenKind::Variable) => {
                    if let Some(frame) = self.parse_directive(current(&mut root, &mut open))? {
                        open.push(frame);
                    }
                }
                Some(TokenKind::Semicolon | TokenKind::BlockStart) => {
                    let token = self.bump();
                    return Err(ParseError::MissingDirectiveName {
                        found: token.literal,
                        line: token.line,
                        column: token.column,
                        span: token.span,
                    });
                }
            }
        }

        tracing::debug!(directives = root.count_directives(), "parsed configuration");
        Ok(Config::new(root))
    }

    // ========================================
    // Statements
    // ========================================

    /// Parse one directive header
    ///
    /// A `;`-terminated directive is pushed into `block` directly; a `{`
    /// hands back the directive as a newly opened block. Comments met
    /// between the name and the terminator are placed in front of the
    /// directive as standalone comments.
    fn parse_directive(&mut self, block: &mut Block) -> ParseResult<Option<OpenBlock>> {
        let name = self.bump();
        let mut directive = Directive::new(name.literal.clone());

        loop {
            match self.peek_kind() {
                Some(TokenKind::Keyword | TokenKind::Variable) => {
                    directive.parameters.push(self.bump().literal);
                }
                Some(TokenKind::Comment) => {
                    let comment = self.parse_comment(false);
                    block.push(comment);
                }
                Some(TokenKind::Semicolon) => {
                    self.bump();
                    block.push(directive);
                    return Ok(None);
                }
                Some(TokenKind::BlockStart) => {
                    self.bump();
                    return Ok(Some(OpenBlock {
                        directive,
                        opener: name,
                        block: Block::new(),
                    }));
                }
                Some(TokenKind::BlockEnd) | None => {
                    return Err(ParseError::UnterminatedDirective {
                        directive: name.literal,
                        line: name.line,
                        column: name.column,
                        span: name.span,
                    });
                }
            }
        }
    }

    fn parse_comment(&mut self, may_trail: bool) -> Comment {
        let previous = self.last_line;
        let token = self.bump();
        Comment {
            trailing: may_trail && previous == Some(token.line),
            line: token.line,
            column: token.column,
            text: token.literal,
        }
    }

    // ========================================
    // Helper Methods
    // ========================================

    fn peek_kind(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    /// Consume the current token; callers have already peeked it
    fn bump(&mut self) -> Token {
        let token = self.tokens[self.pos].clone();
        self.pos += 1;
        self.last_line = Some(token.line);
        token
    }
}

/// Parse a configuration source string into a tree
pub fn parse(source: &str) -> ParseResult<Config> {
    Parser::from_source(source).parse()
}

impl FromStr for Config {
    type Err = ParseError;

    fn from_str(source: &str) -> Result<Self, Self::Err> {
        parse(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        let config = parse("").unwrap();
        assert!(config.block.is_empty());
        let config = parse("  \n\t").unwrap();
        assert!(config.block.is_empty());
    }

    #[test]
    fn test_parse_simple_directive() {
        let config = parse("worker_processes auto;").unwrap();
        let directive = config.directives().next().unwrap();
        assert_eq!(directive.name, "worker_processes");
        assert_eq!(directive.parameters, vec!["auto"]);
        assert!(directive.block.is_none());
    }

    #[test]
    fn test_parse_directive_without_parameters() {
        let config = parse("ip_hash;").unwrap();
        let directive = config.directives().next().unwrap();
        assert_eq!(directive.name, "ip_hash");
        assert!(directive.parameters.is_empty());
    }

    #[test]
    fn test_parse_nested_blocks() {
        let config = parse(
            r#"
            http {
                server {
                    listen 80;
                    location / {
                        proxy_pass http://backend;
                    }
                }
            }
            "#,
        )
        .unwrap();

        let http = config.directives().next().unwrap();
        assert_eq!(http.name, "http");
        let server = http.directives().next().unwrap();
        assert_eq!(server.name, "server");
        let names: Vec<&str> = server.directives().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["listen", "location"]);
        let location = server.directives().nth(1).unwrap();
        assert_eq!(location.parameters, vec!["/"]);
        assert_eq!(location.directives().next().unwrap().parameters, vec!["http://backend"]);
    }

    #[test]
    fn test_parse_empty_block() {
        let config = parse("events {}").unwrap();
        let events = config.directives().next().unwrap();
        assert_eq!(events.block, Some(Block::new()));
    }

    #[test]
    fn test_variables_keep_dollar() {
        let config = parse("proxy_set_header X-Real-IP $remote_addr;").unwrap();
        let directive = config.directives().next().unwrap();
        assert_eq!(directive.parameters, vec!["X-Real-IP", "$remote_addr"]);
    }

    #[test]
    fn test_variable_as_name() {
        let config = parse("map $uri $dest { $fallback 1; }").unwrap();
        let map = config.directives().next().unwrap();
        assert_eq!(map.parameters, vec!["$uri", "$dest"]);
        assert_eq!(map.directives().next().unwrap().name, "$fallback");
    }

    #[test]
    fn test_trailing_and_standalone_comments() {
        let config = parse("server { # head\n    listen 80; # port\n    # own line\n}").unwrap();
        let server = config.directives().next().unwrap();
        let children = &server.block.as_ref().unwrap().children;
        assert_eq!(children.len(), 4);

        let head = children[0].as_comment().unwrap();
        assert_eq!(head.text, "# head");
        assert!(head.trailing);
        assert_eq!((head.line, head.column), (1, 10));

        assert_eq!(children[1].as_directive().unwrap().name, "listen");
        assert!(children[2].as_comment().unwrap().trailing);
        assert!(!children[3].as_comment().unwrap().trailing);
    }

    #[test]
    fn test_leading_comment_is_standalone() {
        let config = parse("# first\nuser nginx;").unwrap();
        let comment = config.children()[0].as_comment().unwrap();
        assert!(!comment.trailing);
    }

    #[test]
    fn test_comment_after_block_end_trails_block() {
        let config = parse("events {\n} # done\nuser nginx;").unwrap();
        let comment = config.children()[1].as_comment().unwrap();
        assert_eq!(comment.text, "# done");
        assert!(comment.trailing);
    }

    #[test]
    fn test_comment_inside_directive_is_hoisted() {
        let config = parse("listen 80 # old port\n  8080;").unwrap();
        let children = config.children();
        assert_eq!(children.len(), 2);
        let comment = children[0].as_comment().unwrap();
        assert_eq!(comment.text, "# old port");
        assert!(!comment.trailing);
        assert_eq!(children[1].as_directive().unwrap().parameters, vec!["80", "8080"]);
    }

    #[test]
    fn test_extra_block_end_fails() {
        let err = parse("server { } }").unwrap_err();
        assert_eq!(
            err,
            ParseError::UnexpectedBlockEnd {
                line: 1,
                column: 12,
                span: Location { start: 11, end: 12 },
            }
        );
    }

    #[test]
    fn test_unclosed_block_fails() {
        let err = parse("http {\n  server {\n    listen 80;\n  }\n").unwrap_err();
        match err {
            ParseError::UnclosedBlock { directive, line, column, .. } => {
                assert_eq!(directive, "http");
                assert_eq!((line, column), (1, 1));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_name_fails() {
        assert!(matches!(
            parse(";"),
            Err(ParseError::MissingDirectiveName { ref found, .. }) if found == ";"
        ));
        assert!(matches!(
            parse("server { { } }"),
            Err(ParseError::MissingDirectiveName { line: 1, column: 10, .. })
        ));
    }

    #[test]
    fn test_unterminated_directive_fails() {
        assert!(matches!(
            parse("listen 80"),
            Err(ParseError::UnterminatedDirective { ref directive, .. }) if directive == "listen"
        ));
        assert!(matches!(
            parse("server { listen 80 }"),
            Err(ParseError::UnterminatedDirective { line: 1, column: 10, .. })
        ));
    }

    #[test]
    fn test_deep_nesting() {
        let depth = 100_000;
        let source = format!("{}{}", "a{".repeat(depth), "}".repeat(depth));
        let config = parse(&source).unwrap();
        assert_eq!(config.block.count_directives(), depth);

        let err = parse(&"a{".repeat(depth)).unwrap_err();
        assert_eq!(err.position(), (1, 2 * depth - 1));
    }

    #[test]
    fn test_lone_carriage_return_in_comment() {
        let config = parse("# a\rb\nx;").unwrap();
        let children = config.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].as_comment().unwrap().text, "# a\rb");
        assert_eq!(children[1].as_directive().unwrap().name, "x");
    }

    #[test]
    fn test_from_str() {
        let config: Config = "user www-data;".parse().unwrap();
        assert_eq!(config.directives().count(), 1);
    }

    #[test]
    fn test_report_points_at_error() {
        let source = "events {\n}\n}\n";
        let err = parse(source).unwrap_err();
        assert_eq!(err.position(), (3, 1));
        let report = err.report("nginx.conf", source);
        assert!(report.contains("no block is open"));
        assert!(report.contains("nginx.conf"));
        assert!(report.contains("this brace closes nothing"));
    }
}
