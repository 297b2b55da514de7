use std::fmt;

use logos::Logos;

use crate::ast::Span;

/// Token kinds. `Display` gives a human-readable tag that is unique among the
/// kinds; it is used in error messages and is not stable across versions.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[logos(skip r"[ \t\r]+")]
#[logos(skip(r"//[^\n]*", allow_greedy = true))]
pub enum TokenKind {
    // Literals
    #[token("true")]
    #[token("false")]
    BoolLiteral,
    #[regex(r"'([^'\\\n]|\\.)*'")]
    CharLiteral,
    #[regex(r"`[^`]*`")]
    DataLiteral,
    #[regex(r"[0-9]+(\.[0-9]+)?")]
    NumberLiteral,
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    StringLiteral,
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    // Keywords
    #[token("and")]
    And,
    #[token("not")]
    Not,
    #[token("or")]
    Or,

    // Operators and punctuation
    #[token("=")]
    Assign,
    #[token(":")]
    Colon,
    #[token(",")]
    Comma,
    #[token("}")]
    CurlyClose,
    #[token("{")]
    CurlyOpen,
    #[token("/")]
    Divide,
    #[token("/=")]
    DivideAssign,
    #[token("==")]
    Equal,
    #[token(">")]
    GreaterThan,
    #[token(">=")]
    GreaterThanEqual,
    #[token("<")]
    LessThan,
    #[token("<=")]
    LessThanEqual,
    #[token("-")]
    Minus,
    #[token("-=")]
    MinusAssign,
    #[token("!=")]
    NotEqual,
    #[token(")")]
    ParenClose,
    #[token("(")]
    ParenOpen,
    #[token("+")]
    Plus,
    #[token("+=")]
    PlusAssign,
    #[token("%")]
    Remainder,
    #[token("%=")]
    RemainderAssign,
    #[token("]")]
    SquareClose,
    #[token("[")]
    SquareOpen,
    #[token("*")]
    Times,
    #[token("*=")]
    TimesAssign,

    // Folded into the previous token's `ends_line` by `lex`; never emitted.
    #[token("\n")]
    Newline,

    Eof,
}

impl TokenKind {
    pub fn tag(self) -> &'static str {
        match self {
            TokenKind::BoolLiteral => "bool literal",
            TokenKind::CharLiteral => "char literal",
            TokenKind::DataLiteral => "data literal",
            TokenKind::NumberLiteral => "number literal",
            TokenKind::StringLiteral => "string literal",
            TokenKind::Identifier => "identifier",
            TokenKind::And => "and",
            TokenKind::Not => "not",
            TokenKind::Or => "or",
            TokenKind::Assign => "=",
            TokenKind::Colon => ":",
            TokenKind::Comma => ",",
            TokenKind::CurlyClose => "}",
            TokenKind::CurlyOpen => "{",
            TokenKind::Divide => "/",
            TokenKind::DivideAssign => "/=",
            TokenKind::Equal => "==",
            TokenKind::GreaterThan => ">",
            TokenKind::GreaterThanEqual => ">=",
            TokenKind::LessThan => "<",
            TokenKind::LessThanEqual => "<=",
            TokenKind::Minus => "-",
            TokenKind::MinusAssign => "-=",
            TokenKind::NotEqual => "!=",
            TokenKind::ParenClose => ")",
            TokenKind::ParenOpen => "(",
            TokenKind::Plus => "+",
            TokenKind::PlusAssign => "+=",
            TokenKind::Remainder => "%",
            TokenKind::RemainderAssign => "%=",
            TokenKind::SquareClose => "]",
            TokenKind::SquareOpen => "[",
            TokenKind::Times => "*",
            TokenKind::TimesAssign => "*=",
            TokenKind::Newline => "new line",
            TokenKind::Eof => "end of file",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A single token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,

    /// Captured from the source. Quoted literals (string, char, data) hold
    /// the text between the delimiters, escapes untouched.
    pub value: String,

    /// True when at least one newline follows this token, ignoring other
    /// whitespace and comments.
    pub ends_line: bool,

    pub span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>) -> Self {
        Token {
            kind,
            value: value.into(),
            ends_line: false,
            span: Span::UNKNOWN,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Eof => write!(f, "{}", self.kind),
            TokenKind::Identifier => write!(f, "\"{}\"", self.value),
            _ => write!(f, "'{}'", self.kind),
        }
    }
}

/// Lex source code into tokens, always terminated by an `Eof` token.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = TokenKind::lexer(source);
    let mut tokens: Vec<Token> = Vec::new();

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = Span { start: range.start, end: range.end };
        match result {
            Ok(TokenKind::Newline) => {
                if let Some(last) = tokens.last_mut() {
                    last.ends_line = true;
                }
            }
            Ok(kind) => {
                let slice = lexer.slice();
                let value = match kind {
                    TokenKind::StringLiteral | TokenKind::CharLiteral | TokenKind::DataLiteral => {
                        &slice[1..slice.len() - 1]
                    }
                    _ => slice,
                };
                tokens.push(Token {
                    kind,
                    value: value.to_string(),
                    ends_line: false,
                    span,
                });
            }
            Err(()) => {
                let snippet = source[range.clone()].to_string();
                return Err(LexError {
                    position: range.start,
                    suggestion: suggest_fix(&snippet),
                    snippet,
                });
            }
        }
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        value: String::new(),
        ends_line: true,
        span: Span { start: source.len(), end: source.len() },
    });
    Ok(tokens)
}

fn suggest_fix(bad_token: &str) -> String {
    match bad_token.chars().next() {
        Some('"') => "Close the string literal with '\"' on the same line.".to_string(),
        Some('\'') => "Close the char literal with a single quote on the same line.".to_string(),
        Some('`') => "Close the data literal with a backtick.".to_string(),
        Some('!') => "Use 'not' for logical negation; '!' is only valid in '!='.".to_string(),
        Some('&') | Some('|') => "Use 'and' / 'or' for logical operators.".to_string(),
        _ => format!("Unexpected character(s): '{bad_token}'."),
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Lex error at position {position}: '{snippet}'. {suggestion}")]
pub struct LexError {
    pub position: usize,
    pub snippet: String,
    pub suggestion: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lex_binary_expression() {
        assert_eq!(
            kinds("a + 12.5 * b"),
            vec![
                TokenKind::Identifier,
                TokenKind::Plus,
                TokenKind::NumberLiteral,
                TokenKind::Times,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_literal_values_strip_delimiters() {
        let tokens = lex(r#""hi there" 'x' `raw` true"#).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].value, "hi there");
        assert_eq!(tokens[1].value, "x");
        assert_eq!(tokens[2].kind, TokenKind::DataLiteral);
        assert_eq!(tokens[2].value, "raw");
        assert_eq!(tokens[3].kind, TokenKind::BoolLiteral);
    }

    #[test]
    fn lex_keywords_beat_identifiers() {
        assert_eq!(
            kinds("a and not b or android"),
            vec![
                TokenKind::Identifier,
                TokenKind::And,
                TokenKind::Not,
                TokenKind::Identifier,
                TokenKind::Or,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lex_compound_operators() {
        assert_eq!(
            kinds("x += 1 != 2 >= 3"),
            vec![
                TokenKind::Identifier,
                TokenKind::PlusAssign,
                TokenKind::NumberLiteral,
                TokenKind::NotEqual,
                TokenKind::NumberLiteral,
                TokenKind::GreaterThanEqual,
                TokenKind::NumberLiteral,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn newlines_mark_end_of_line() {
        let tokens = lex("a = 1\n\n  b = 2 // trailing\nc").unwrap();
        let flags: Vec<(TokenKind, bool)> = tokens.iter().map(|t| (t.kind, t.ends_line)).collect();
        assert_eq!(flags[2], (TokenKind::NumberLiteral, true));
        assert_eq!(flags[5], (TokenKind::NumberLiteral, true));
        assert_eq!(flags[6], (TokenKind::Identifier, false));
        assert!(!tokens.iter().any(|t| t.kind == TokenKind::Newline));
    }

    #[test]
    fn spans_point_into_source() {
        let source = "foo = `bar`";
        let tokens = lex(source).unwrap();
        assert_eq!(&source[tokens[2].span.start..tokens[2].span.end], "`bar`");
        assert_eq!(tokens.last().unwrap().span.start, source.len());
    }

    #[test]
    fn unexpected_character_is_an_error() {
        let err = lex("a = $b").unwrap_err();
        assert_eq!(err.position, 4);
        assert_eq!(err.snippet, "$");
    }

    #[test]
    fn bang_alone_suggests_not() {
        let err = lex("!a").unwrap_err();
        assert!(err.suggestion.contains("not"), "{}", err.suggestion);
    }

    #[test]
    fn token_display() {
        assert_eq!(Token::new(TokenKind::Identifier, "x").to_string(), "\"x\"");
        assert_eq!(Token::new(TokenKind::Plus, "+").to_string(), "'+'");
        assert_eq!(Token::new(TokenKind::Eof, "").to_string(), "end of file");
    }
}
