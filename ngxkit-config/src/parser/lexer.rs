//! Lexer for nginx-style configuration
//!
//! Tokenizes directives, blocks, comments and variables.
//!
//! Key features:
//! - Whitespace only separates tokens (newlines advance the line counter)
//! - `{`, `}` and `;` are the only structural tokens
//! - `# ...` comments are kept, so they survive a round trip
//! - `$name` is a variable, everything else is a Keyword
//!
//! The lexer is total: every character ends up in a token or in skipped
//! whitespace, so there is no lexer error type.

use logos::{Logos, Span};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte range of a token in the source, for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub start: usize,
    pub end: usize,
}

impl From<Span> for Location {
    fn from(span: Span) -> Self {
        Self {
            start: span.start,
            end: span.end,
        }
    }
}

impl From<Location> for std::ops::Range<usize> {
    fn from(location: Location) -> Self {
        location.start..location.end
    }
}

/// Token kinds
///
/// Keyword covers identifiers, numbers, paths, URLs, quoted strings and
/// regex patterns alike; the lexer does no further classification.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    #[token("{")]
    BlockStart,

    #[token("}")]
    BlockEnd,

    #[token(";")]
    Semicolon,

    /// `#` up to, not including, the `\n` (or `\r\n`) ending the line
    #[regex(r"#[^\n]*")]
    Comment,

    /// `$` followed by the longest run of ASCII identifier characters
    #[regex(r"\$[A-Za-z0-9_]*")]
    Variable,

    // A keyword may contain `$` but never starts with one.
    #[regex(r"[^ \t\r\n\f{};#$][^ \t\r\n\f{};#]*")]
    Keyword,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenKind::BlockStart => "block start",
            TokenKind::BlockEnd => "block end",
            TokenKind::Semicolon => "semicolon",
            TokenKind::Comment => "comment",
            TokenKind::Variable => "variable",
            TokenKind::Keyword => "keyword",
        };
        f.write_str(name)
    }
}

/// A lexed token with its position in the source
///
/// `line` and `column` are 1-based; columns count characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    pub line: usize,
    pub column: usize,
    pub span: Location,
}

impl Token {
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?} at {}:{}", self.kind, self.literal, self.line, self.column)
    }
}

/// Walks the source alongside logos, turning byte offsets into line/column
struct Cursor<'s> {
    source: &'s str,
    offset: usize,
    line: usize,
    column: usize,
}

impl<'s> Cursor<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Advance to `offset` and return the position found there
    fn seek(&mut self, offset: usize) -> (usize, usize) {
        for c in self.source[self.offset..offset].chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.offset = offset;
        (self.line, self.column)
    }
}

/// Tokenize a configuration source string
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();

    for (result, mut span) in TokenKind::lexer(source).spanned() {
        // The Keyword pattern accepts anything the other rules do not, so an
        // error here can only be a slice logos refused; keep it as a keyword.
        let kind = result.unwrap_or(TokenKind::Keyword);
        // A lone `\r` stays inside a comment; only the one before `\n` is cut.
        if matches!(kind, TokenKind::Comment) && source[span.clone()].ends_with('\r') {
            span.end -= 1;
        }
        let (line, column) = cursor.seek(span.start);
        tokens.push(Token {
            kind,
            literal: source[span.clone()].to_string(),
            line,
            column,
            span: span.into(),
        });
    }

    tracing::trace!(tokens = tokens.len(), "tokenized source");
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(tokens: &[Token]) -> Vec<(TokenKind, &str, usize, usize)> {
        tokens
            .iter()
            .map(|t| (t.kind, t.literal.as_str(), t.line, t.column))
            .collect()
    }

    #[test]
    fn test_reverse_proxy_server() {
        let source = concat!(
            "\n",
            "server { # simple reverse-proxy\n",
            "    listen       80;\n",
            "    server_name  gonginx.com www.gonginx.com;\n",
            "    access_log   logs/gonginx.access.log  main;\n",
            "\n",
            "    # serve static files\n",
            "    location ~ ^/(images|javascript|js|css|flash|media|static)/  {\n",
            "      root    /var/www/virtual/gonginx/;\n",
            "      expires 30d;\n",
            "    }\n",
            "\n",
            "    # pass requests for dynamic content\n",
            "    location / {\n",
            "      proxy_pass      http://127.0.0.1:8080;\n",
            "      proxy_set_header   X-Real-IP        $remote_addr;\n",
            "    }\n",
            "  }\n",
        );

        use TokenKind::*;
        let expected = vec![
            (Keyword, "server", 2, 1),
            (BlockStart, "{", 2, 8),
            (Comment, "# simple reverse-proxy", 2, 10),
            (Keyword, "listen", 3, 5),
            (Keyword, "80", 3, 18),
            (Semicolon, ";", 3, 20),
            (Keyword, "server_name", 4, 5),
            (Keyword, "gonginx.com", 4, 18),
            (Keyword, "www.gonginx.com", 4, 30),
            (Semicolon, ";", 4, 45),
            (Keyword, "access_log", 5, 5),
            (Keyword, "logs/gonginx.access.log", 5, 18),
            (Keyword, "main", 5, 43),
            (Semicolon, ";", 5, 47),
            (Comment, "# serve static files", 7, 5),
            (Keyword, "location", 8, 5),
            (Keyword, "~", 8, 14),
            (Keyword, "^/(images|javascript|js|css|flash|media|static)/", 8, 16),
            (BlockStart, "{", 8, 66),
            (Keyword, "root", 9, 7),
            (Keyword, "/var/www/virtual/gonginx/", 9, 15),
            (Semicolon, ";", 9, 40),
            (Keyword, "expires", 10, 7),
            (Keyword, "30d", 10, 15),
            (Semicolon, ";", 10, 18),
            (BlockEnd, "}", 11, 5),
            (Comment, "# pass requests for dynamic content", 13, 5),
            (Keyword, "location", 14, 5),
            (Keyword, "/", 14, 14),
            (BlockStart, "{", 14, 16),
            (Keyword, "proxy_pass", 15, 7),
            (Keyword, "http://127.0.0.1:8080", 15, 23),
            (Semicolon, ";", 15, 44),
            (Keyword, "proxy_set_header", 16, 7),
            (Keyword, "X-Real-IP", 16, 26),
            (Variable, "$remote_addr", 16, 43),
            (Semicolon, ";", 16, 55),
            (BlockEnd, "}", 17, 5),
            (BlockEnd, "}", 18, 3),
        ];

        let tokens = tokenize(source);
        assert_eq!(shape(&tokens), expected);
    }

    #[test]
    fn test_positions_are_one_based_and_monotonic() {
        let tokens = tokenize("a b;\n\tc {\n}\n# end");
        assert!(tokens.iter().all(|t| t.line >= 1 && t.column >= 1));
        assert!(tokens.windows(2).all(|w| w[0].line <= w[1].line));
        // first token after each newline sits right after the leading whitespace
        assert_eq!((tokens[3].line, tokens[3].column), (2, 2));
        assert_eq!((tokens[5].line, tokens[5].column), (3, 1));
        assert_eq!((tokens[6].line, tokens[6].column), (4, 1));
    }

    #[test]
    fn test_structural_tokens_split_keywords() {
        let tokens = tokenize("a{b;c}");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Keyword,
                TokenKind::BlockStart,
                TokenKind::Keyword,
                TokenKind::Semicolon,
                TokenKind::Keyword,
                TokenKind::BlockEnd,
            ]
        );
    }

    #[test]
    fn test_comment_runs_to_end_of_line() {
        let tokens = tokenize("listen 80; # port {not a block};\nroot /;");
        assert_eq!(tokens[3].kind, TokenKind::Comment);
        assert_eq!(tokens[3].literal, "# port {not a block};");
        assert_eq!(tokens[4].literal, "root");
        assert_eq!(tokens[4].line, 2);
    }

    #[test]
    fn test_comment_at_end_of_input() {
        let tokens = tokenize("#");
        assert_eq!(shape(&tokens), vec![(TokenKind::Comment, "#", 1, 1)]);
    }

    #[test]
    fn test_variables() {
        let tokens = tokenize("set $a $b/c $ x$y;");
        assert_eq!(
            shape(&tokens),
            vec![
                (TokenKind::Keyword, "set", 1, 1),
                (TokenKind::Variable, "$a", 1, 5),
                (TokenKind::Variable, "$b", 1, 8),
                (TokenKind::Keyword, "/c", 1, 10),
                (TokenKind::Variable, "$", 1, 13),
                (TokenKind::Keyword, "x$y", 1, 15),
                (TokenKind::Semicolon, ";", 1, 18),
            ]
        );
    }

    #[test]
    fn test_variable_names_are_ascii() {
        let tokens = tokenize("$név;");
        assert_eq!(
            shape(&tokens),
            vec![
                (TokenKind::Variable, "$n", 1, 1),
                (TokenKind::Keyword, "év", 1, 3),
                (TokenKind::Semicolon, ";", 1, 5),
            ]
        );
    }

    #[test]
    fn test_quotes_are_not_special() {
        let tokens = tokenize(r#"add_header X "a b";"#);
        let literals: Vec<&str> = tokens.iter().map(|t| t.literal.as_str()).collect();
        assert_eq!(literals, vec!["add_header", "X", "\"a", "b\"", ";"]);
    }

    #[test]
    fn test_crlf_and_unicode_columns() {
        let tokens = tokenize("# é\r\nname ünï;");
        assert_eq!(tokens[0].literal, "# é");
        assert_eq!((tokens[1].line, tokens[1].column), (2, 1));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 6));
        assert_eq!((tokens[3].line, tokens[3].column), (2, 9));
    }

    #[test]
    fn test_lone_carriage_return_stays_in_comment() {
        let tokens = tokenize("# a\rb\nx;");
        assert_eq!(
            shape(&tokens),
            vec![
                (TokenKind::Comment, "# a\rb", 1, 1),
                (TokenKind::Keyword, "x", 2, 1),
                (TokenKind::Semicolon, ";", 2, 2),
            ]
        );
        assert_eq!(tokens[0].span, Location { start: 0, end: 5 });

        let tokens = tokenize("# a\r\r\nx;");
        assert_eq!(tokens[0].literal, "# a\r");
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(tokenize("").is_empty());
        assert!(tokenize(" \n\t\r\n").is_empty());
    }

    #[test]
    fn test_deterministic() {
        let source = "http { include mime.types; } # tail";
        assert_eq!(tokenize(source), tokenize(source));
    }

    #[test]
    fn test_spans_slice_literals() {
        let source = "events { worker_connections 1024; }";
        for token in tokenize(source) {
            assert_eq!(&source[std::ops::Range::from(token.span)], token.literal);
        }
    }
}
