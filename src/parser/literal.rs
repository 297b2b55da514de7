//! Literal tokens → `Literal` values, with the secondary validation rules
//! whose failures are recoverable.

use crate::ast::{Literal, Span};
use crate::lexer::{Token, TokenKind};
use crate::number::Number;

/// A literal that is well-formed as a token but fails a validation rule.
/// Collected by the parser; parsing continues past it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LiteralError {
    #[error("char literal '{value}' must contain exactly one character")]
    CharLength { value: String, span: Span },

    #[error("invalid escape sequence '\\{escape}' in {kind}")]
    InvalidEscape { escape: char, kind: TokenKind, span: Span },

    #[error("number literal {value} is out of range")]
    NumberRange { value: String, span: Span },
}

impl LiteralError {
    pub fn span(&self) -> Span {
        match self {
            LiteralError::CharLength { span, .. }
            | LiteralError::InvalidEscape { span, .. }
            | LiteralError::NumberRange { span, .. } => *span,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            LiteralError::CharLength { .. } => "OK-P002",
            LiteralError::InvalidEscape { .. } => "OK-P003",
            LiteralError::NumberRange { .. } => "OK-P004",
        }
    }
}

pub(crate) fn is_literal(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::BoolLiteral
            | TokenKind::CharLiteral
            | TokenKind::DataLiteral
            | TokenKind::NumberLiteral
            | TokenKind::StringLiteral
    )
}

/// Build the value for a literal token. Invalid content still produces a
/// placeholder value so the tree stays complete.
pub(crate) fn literal_from_token(token: &Token, errors: &mut Vec<LiteralError>) -> Literal {
    match token.kind {
        TokenKind::BoolLiteral => Literal::Bool(token.value == "true"),
        TokenKind::DataLiteral => Literal::Data(token.value.clone().into_bytes()),
        TokenKind::NumberLiteral => match token.value.parse::<Number>() {
            Ok(n) => Literal::Number(n),
            Err(_) => {
                errors.push(LiteralError::NumberRange {
                    value: token.value.clone(),
                    span: token.span,
                });
                Literal::Number(Number::ZERO)
            }
        },
        TokenKind::StringLiteral => Literal::String(unescape(token, errors)),
        TokenKind::CharLiteral => {
            let before = errors.len();
            let text = unescape(token, errors);
            let mut chars = text.chars();
            let c = chars.next().unwrap_or('\0');
            // A bad escape already explains the literal; don't pile on.
            if errors.len() == before && (text.is_empty() || chars.next().is_some()) {
                errors.push(LiteralError::CharLength {
                    value: token.value.clone(),
                    span: token.span,
                });
            }
            Literal::Char(c)
        }
        _ => unreachable!("literal_from_token called on {}", token.kind),
    }
}

fn unescape(token: &Token, errors: &mut Vec<LiteralError>) -> String {
    let mut out = String::with_capacity(token.value.len());
    let mut chars = token.value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(c @ ('\\' | '"' | '\'')) => out.push(c),
            Some(other) => {
                errors.push(LiteralError::InvalidEscape {
                    escape: other,
                    kind: token.kind,
                    span: token.span,
                });
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(kind: TokenKind, value: &str) -> (Literal, Vec<LiteralError>) {
        let mut errors = Vec::new();
        let lit = literal_from_token(&Token::new(kind, value), &mut errors);
        (lit, errors)
    }

    #[test]
    fn valid_literals() {
        assert_eq!(build(TokenKind::BoolLiteral, "false").0, Literal::Bool(false));
        assert_eq!(build(TokenKind::NumberLiteral, "2.50").0.to_string(), "2.5");
        assert_eq!(build(TokenKind::DataLiteral, "ab").0, Literal::Data(b"ab".to_vec()));
        assert_eq!(build(TokenKind::CharLiteral, "z"), (Literal::Char('z'), vec![]));
    }

    #[test]
    fn escapes_are_decoded() {
        let (lit, errors) = build(TokenKind::StringLiteral, r#"a\tb\"c\\"#);
        assert!(errors.is_empty());
        assert_eq!(lit, Literal::String("a\tb\"c\\".to_string()));
        assert_eq!(build(TokenKind::CharLiteral, r"\n").0, Literal::Char('\n'));
    }

    #[test]
    fn char_must_be_one_character() {
        let (_, errors) = build(TokenKind::CharLiteral, "ab");
        assert!(matches!(errors.as_slice(), [LiteralError::CharLength { .. }]));
        let (_, errors) = build(TokenKind::CharLiteral, "");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn bad_escape_reported_once() {
        let (_, errors) = build(TokenKind::CharLiteral, r"\q");
        assert!(matches!(errors.as_slice(), [LiteralError::InvalidEscape { escape: 'q', .. }]));
        let (lit, errors) = build(TokenKind::StringLiteral, r"x\yz");
        assert_eq!(errors.len(), 1);
        assert_eq!(lit, Literal::String("xyz".to_string()));
    }

    #[test]
    fn huge_number_out_of_range() {
        let (lit, errors) = build(TokenKind::NumberLiteral, &"9".repeat(50));
        assert_eq!(lit, Literal::Number(Number::ZERO));
        assert_eq!(errors[0].code(), "OK-P004");
    }
}
