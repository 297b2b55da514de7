pub mod ansi;
pub mod json;
pub mod registry;

use crate::ast::{Span, Spanned};
use crate::compiler::CompileError;
use crate::lexer::LexError;
use crate::parser::{LiteralError, ParseError};
use crate::vm::VmError;

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
}

/// A renderable error report, independent of the phase that produced it.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Stable registry code, e.g. `OK-P001`.
    pub code: Option<&'static str>,
    pub message: String,
    pub labels: Vec<Label>,
    /// Index of the failing instruction, for run-time errors.
    pub instruction: Option<usize>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            code: None,
            message: message.into(),
            labels: Vec::new(),
            instruction: None,
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label { span, message: label.into() });
        self
    }

    pub fn with_instruction(mut self, index: usize) -> Self {
        self.instruction = Some(index);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// ---- From impls for each phase's errors ----

impl From<&LexError> for Diagnostic {
    fn from(e: &LexError) -> Self {
        let span = Span {
            start: e.position,
            end: e.position + e.snippet.len().max(1),
        };
        let mut d = Diagnostic::error(format!("unexpected input '{}'", e.snippet))
            .with_code("OK-L001")
            .with_span(span, "here");
        if !e.suggestion.is_empty() {
            d = d.with_suggestion(e.suggestion.clone());
        }
        d
    }
}

impl From<&ParseError> for Diagnostic {
    fn from(e: &ParseError) -> Self {
        let ParseError::TokenMismatch { expected, after, .. } = e;
        let mut d = Diagnostic::error(e.to_string())
            .with_code(e.code())
            .with_span(e.span(), format!("expected {expected}"));
        if *expected == "end of line" {
            d = d.with_suggestion("Put each statement on its own line.");
        } else if let Some(after) = after {
            d = d.with_note(format!("the previous token was {after}"));
        }
        d
    }
}

impl From<&LiteralError> for Diagnostic {
    fn from(e: &LiteralError) -> Self {
        let d = Diagnostic::error(e.to_string())
            .with_code(e.code())
            .with_span(e.span(), "in this literal");
        match e {
            LiteralError::InvalidEscape { .. } => {
                d.with_suggestion("Valid escapes are \\n \\t \\r \\\\ \\\" \\' and \\0.")
            }
            LiteralError::CharLength { .. } => {
                d.with_suggestion("Use double quotes for a string of several characters.")
            }
            LiteralError::NumberRange { .. } => d,
        }
    }
}

impl From<&CompileError> for Diagnostic {
    fn from(e: &CompileError) -> Self {
        let d = Diagnostic::error(e.to_string()).with_code(e.code());
        match e {
            CompileError::UnknownFunction { .. } => d.with_note("the built-in functions are print and len"),
            CompileError::UndefinedVariable { name } => {
                d.with_suggestion(format!("Assign '{name}' before using it."))
            }
            _ => d,
        }
    }
}

impl From<&Spanned<CompileError>> for Diagnostic {
    fn from(e: &Spanned<CompileError>) -> Self {
        Diagnostic::from(&e.node).with_span(e.span, "in this statement")
    }
}

impl From<&VmError> for Diagnostic {
    fn from(e: &VmError) -> Self {
        match e {
            VmError::Instruction { index, opcode, source } => Diagnostic::error(source.to_string())
                .with_code(e.code())
                .with_instruction(*index)
                .with_note(format!("at instruction {index} ({opcode})")),
            VmError::StepLimit { .. } => Diagnostic::error(e.to_string())
                .with_code(e.code())
                .with_suggestion("Raise --max-steps or look for a jump that never ends."),
        }
    }
}
