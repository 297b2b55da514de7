//! `ok`: a small dynamically-typed scripting language.
//!
//! Source goes through four stages, each usable on its own:
//!
//! ```text
//! lexer::lex → parser::parse → compiler::compile → vm::Vm::run
//! ```
//!
//! The `*_source` helpers below chain them and fold every failure into one
//! [`Error`].
//!
//! ```
//! let mut out = Vec::new();
//! ok::run_source("total = 0.1 + 0.2\nprint(total)", ok::vm::VmOptions::default(), &mut out).unwrap();
//! assert_eq!(String::from_utf8(out).unwrap(), "0.3\n");
//! ```

use std::io::Write;

pub mod ast;
pub mod compiler;
pub mod diagnostic;
pub mod lexer;
pub mod number;
pub mod parser;
pub mod vm;

use ast::{Program, Spanned};
use compiler::{CompileError, CompiledFunc};
use diagnostic::Diagnostic;
use lexer::LexError;
use parser::{LiteralError, ParseError};
use vm::{Registers, VmError, VmOptions};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// Every invalid literal in the source, in order.
    #[error("{} invalid literal(s)", .0.len())]
    Literals(Vec<LiteralError>),
    #[error(transparent)]
    Compile(#[from] Spanned<CompileError>),
    #[error(transparent)]
    Vm(#[from] VmError),
}

impl Error {
    /// One diagnostic per underlying error.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        match self {
            Error::Lex(e) => vec![e.into()],
            Error::Parse(e) => vec![e.into()],
            Error::Literals(errors) => errors.iter().map(Diagnostic::from).collect(),
            Error::Compile(e) => vec![e.into()],
            Error::Vm(e) => vec![e.into()],
        }
    }
}

/// Lex and parse. Literal diagnostics fail the parse as a batch.
pub fn parse_source(source: &str) -> Result<Program, Error> {
    let tokens = lexer::lex(source)?;
    let output = parser::parse(tokens)?;
    if !output.diagnostics.is_empty() {
        return Err(Error::Literals(output.diagnostics));
    }
    Ok(output.program)
}

pub fn compile_source(source: &str) -> Result<CompiledFunc, Error> {
    let program = parse_source(source)?;
    Ok(compiler::compile(&program)?)
}

/// Compile and run, writing `print` output to `out`.
pub fn run_source(source: &str, options: VmOptions, out: &mut dyn Write) -> Result<Registers, Error> {
    let func = compile_source(source)?;
    Ok(vm::Vm::with_options(&func, options).run(out)?)
}
