use std::iter::Peekable;
use std::vec;

use crate::ast::*;
use crate::lexer::{Token, TokenKind};

mod literal;
pub use literal::LiteralError;

/// Reads a token vector by explicit offset. Every `consume_*` method takes the
/// offset to start at and returns the node together with the offset just past
/// it; nothing is committed until the caller threads that offset onward.
pub struct Parser {
    tokens: Vec<Token>,
    diagnostics: Vec<LiteralError>,
}

/// Structural failure. Aborts parsing; there is no usable partial tree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error(
        "expected {expected}{}, got {found}",
        .after.map(|k| format!(" after {k}")).unwrap_or_default()
    )]
    TokenMismatch {
        expected: &'static str,
        after: Option<TokenKind>,
        found: TokenKind,
        span: Span,
    },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::TokenMismatch { span, .. } => *span,
        }
    }

    pub fn code(&self) -> &'static str {
        "OK-P001"
    }
}

type Result<T> = std::result::Result<T, ParseError>;

/// A parsed program plus the recoverable literal diagnostics found on the way.
#[derive(Debug)]
pub struct ParseOutput {
    pub program: Program,
    pub diagnostics: Vec<LiteralError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens = tokens;
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let end = tokens.last().map(|t| t.span.end).unwrap_or(0);
            tokens.push(Token {
                kind: TokenKind::Eof,
                value: String::new(),
                ends_line: true,
                span: Span { start: end, end },
            });
        }
        Parser { tokens, diagnostics: Vec::new() }
    }

    pub fn diagnostics(&self) -> &[LiteralError] {
        &self.diagnostics
    }

    /// Offsets past the end resolve to the trailing `Eof`.
    fn token(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[offset.min(last)]
    }

    fn kind_at(&self, offset: usize) -> TokenKind {
        self.token(offset).kind
    }

    /// True when the token before `offset` ended a line.
    fn line_ended_before(&self, offset: usize) -> bool {
        offset > 0 && self.token(offset - 1).ends_line
    }

    fn mismatch(&self, expected: &'static str, offset: usize) -> ParseError {
        let found = self.token(offset);
        // End of file points just past the last token, on its line.
        let span = match offset.checked_sub(1) {
            Some(prev) if found.kind == TokenKind::Eof => {
                let end = self.token(prev).span.end;
                Span { start: end, end }
            }
            _ => found.span,
        };
        ParseError::TokenMismatch {
            expected,
            after: offset.checked_sub(1).map(|i| self.kind_at(i)),
            found: found.kind,
            span,
        }
    }

    fn expect(&self, offset: usize, kind: TokenKind) -> Result<usize> {
        if self.kind_at(offset) == kind {
            Ok(offset + 1)
        } else {
            Err(self.mismatch(kind.tag(), offset))
        }
    }

    // ---- Program ----

    /// Expression statements until end of file. Each statement must finish
    /// its line.
    pub fn parse_program(&mut self) -> Result<Program> {
        let mut statements = Vec::new();
        let mut offset = 0;

        while self.kind_at(offset) != TokenKind::Eof {
            let (expr, next) = self.consume_expr(offset)?;
            if !self.line_ended_before(next) && self.kind_at(next) != TokenKind::Eof {
                return Err(self.mismatch("end of line", next));
            }
            let span = self.token(offset).span.merge(self.token(next - 1).span);
            statements.push(Spanned::new(expr, span));
            offset = next;
        }

        Ok(Program { statements })
    }

    // ---- Expressions ----

    /// Consume the next maximal expression starting at `offset`.
    pub fn consume_expr(&mut self, offset: usize) -> Result<(Expr, usize)> {
        let start = offset;
        let mut offset = offset;

        let mut first: Option<Expr> = None;
        let mut rest: Vec<(BinaryOp, Expr)> = Vec::new();
        let mut pending: Option<BinaryOp> = None;
        let mut after_operand = false;

        loop {
            // A line boundary ends the expression, but only one crossed
            // inside this expression, not one left by the caller.
            if offset > start && self.line_ended_before(offset) {
                break;
            }

            let kind = self.kind_at(offset);
            if matches!(kind, TokenKind::Colon | TokenKind::Comma | TokenKind::Eof) {
                break;
            }

            if !after_operand {
                let Some((operand, next)) = self.consume_operand(offset)? else {
                    break;
                };
                match pending.take() {
                    Some(op) => rest.push((op, operand)),
                    None => first = Some(operand),
                }
                offset = next;
                after_operand = true;
                continue;
            }

            let Some(op) = BinaryOp::from_token(kind) else {
                break;
            };
            pending = Some(op);
            offset += 1;
            after_operand = false;
        }

        let Some(first) = first else {
            return Err(self.mismatch("expression", start));
        };
        if pending.is_some() {
            return Err(self.mismatch("expression", offset));
        }

        Ok((reduce(first, rest), offset))
    }

    /// One mandatory expression, then any number of `, expr`.
    pub fn consume_exprs(&mut self, offset: usize) -> Result<(Vec<Expr>, usize)> {
        let (expr, mut offset) = self.consume_expr(offset)?;
        let mut exprs = vec![expr];

        while self.kind_at(offset) == TokenKind::Comma {
            let (expr, next) = self.consume_expr(offset + 1)?;
            exprs.push(expr);
            offset = next;
        }

        Ok((exprs, offset))
    }

    /// Try each operand production in priority order. `None` means nothing
    /// here starts an operand and the token is left for the caller.
    fn consume_operand(&mut self, offset: usize) -> Result<Option<(Expr, usize)>> {
        let kind = self.kind_at(offset);

        if literal::is_literal(kind) {
            let lit = literal::literal_from_token(&self.tokens[offset], &mut self.diagnostics);
            return Ok(Some((Expr::Literal(lit), offset + 1)));
        }

        if kind == TokenKind::SquareOpen {
            return self.consume_array(offset).map(Some);
        }

        if kind == TokenKind::CurlyOpen {
            return self.consume_map(offset).map(Some);
        }

        if kind == TokenKind::Identifier
            && self.kind_at(offset + 1) == TokenKind::ParenOpen
            && !self.token(offset).ends_line
        {
            return self.consume_call(offset).map(Some);
        }

        if kind == TokenKind::ParenOpen {
            let (inner, next) = self.consume_expr(offset + 1)?;
            let next = self.expect(next, TokenKind::ParenClose)?;
            return Ok(Some((Expr::Group(Box::new(inner)), next)));
        }

        if let Some(op) = UnaryOp::from_token(kind) {
            let Some((operand, next)) = self.consume_operand(offset + 1)? else {
                return Err(self.mismatch("expression", offset + 1));
            };
            return Ok(Some((Expr::Unary { op, expr: Box::new(operand) }, next)));
        }

        if kind == TokenKind::Identifier {
            return self.consume_identifier(offset).map(Some);
        }

        Ok(None)
    }

    /// `[]` or `[expr, ...]`
    fn consume_array(&mut self, offset: usize) -> Result<(Expr, usize)> {
        let offset = self.expect(offset, TokenKind::SquareOpen)?;
        if self.kind_at(offset) == TokenKind::SquareClose {
            return Ok((Expr::Array(Vec::new()), offset + 1));
        }
        let (items, offset) = self.consume_exprs(offset)?;
        let offset = self.expect(offset, TokenKind::SquareClose)?;
        Ok((Expr::Array(items), offset))
    }

    /// `{}` or `{key: value, ...}`, trailing comma allowed.
    fn consume_map(&mut self, offset: usize) -> Result<(Expr, usize)> {
        let mut offset = self.expect(offset, TokenKind::CurlyOpen)?;
        let mut entries = Vec::new();

        while self.kind_at(offset) != TokenKind::CurlyClose {
            let (key, next) = self.consume_expr(offset)?;
            let next = self.expect(next, TokenKind::Colon)?;
            let (value, next) = self.consume_expr(next)?;
            entries.push((key, value));
            offset = next;

            if self.kind_at(offset) != TokenKind::Comma {
                break;
            }
            offset += 1;
        }

        let offset = self.expect(offset, TokenKind::CurlyClose)?;
        Ok((Expr::Map(entries), offset))
    }

    /// `name()` or `name(expr, ...)`
    fn consume_call(&mut self, offset: usize) -> Result<(Expr, usize)> {
        let name = self.tokens[offset].value.clone();
        let offset = self.expect(offset + 1, TokenKind::ParenOpen)?;
        if self.kind_at(offset) == TokenKind::ParenClose {
            return Ok((Expr::Call { name, args: Vec::new() }, offset + 1));
        }
        let (args, offset) = self.consume_exprs(offset)?;
        let offset = self.expect(offset, TokenKind::ParenClose)?;
        Ok((Expr::Call { name, args }, offset))
    }

    /// An identifier with any number of `[key]` suffixes on the same line.
    fn consume_identifier(&mut self, offset: usize) -> Result<(Expr, usize)> {
        let mut expr = Expr::Identifier(self.tokens[offset].value.clone());
        let mut offset = offset + 1;

        while self.kind_at(offset) == TokenKind::SquareOpen && !self.line_ended_before(offset) {
            let (key, next) = self.consume_expr(offset + 1)?;
            offset = self.expect(next, TokenKind::SquareClose)?;
            expr = Expr::Key { expr: Box::new(expr), key: Box::new(key) };
        }

        Ok((expr, offset))
    }
}

/// Fold an operand/operator chain into a binary tree by precedence
/// climbing. Assignment operators associate to the right, all others to the
/// left.
pub fn reduce(first: Expr, rest: Vec<(BinaryOp, Expr)>) -> Expr {
    let mut rest = rest.into_iter().peekable();
    climb(first, &mut rest, 0)
}

fn climb(
    mut left: Expr,
    rest: &mut Peekable<vec::IntoIter<(BinaryOp, Expr)>>,
    min_precedence: u8,
) -> Expr {
    while rest.peek().is_some_and(|(op, _)| op.precedence() >= min_precedence) {
        let Some((op, mut right)) = rest.next() else {
            break;
        };

        while let Some(next) = rest.peek().map(|(next, _)| *next) {
            let binds_right = next.precedence() > op.precedence()
                || (next.is_assignment() && next.precedence() == op.precedence());
            if !binds_right {
                break;
            }
            let next_min = if next.precedence() > op.precedence() {
                op.precedence() + 1
            } else {
                op.precedence()
            };
            right = climb(right, rest, next_min);
        }

        left = Expr::binary(left, op, right);
    }
    left
}

/// Parse a token stream into a program.
pub fn parse(tokens: Vec<Token>) -> Result<ParseOutput> {
    let mut parser = Parser::new(tokens);
    let program = parser.parse_program()?;
    Ok(ParseOutput { program, diagnostics: parser.diagnostics })
}
