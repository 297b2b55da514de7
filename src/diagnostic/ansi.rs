use crate::ast::SourceMap;
use super::Diagnostic;

pub struct AnsiRenderer {
    pub use_color: bool,
}

impl AnsiRenderer {
    fn paint(&self, style: &str, s: &str) -> String {
        if self.use_color { format!("\x1b[{style}m{s}\x1b[0m") } else { s.to_string() }
    }

    fn bold(&self, s: &str) -> String {
        self.paint("1", s)
    }

    fn bold_red(&self, s: &str) -> String {
        self.paint("1;31", s)
    }

    fn cyan(&self, s: &str) -> String {
        self.paint("36", s)
    }

    fn dim(&self, s: &str) -> String {
        self.paint("2", s)
    }

    pub fn render(&self, d: &Diagnostic) -> String {
        let mut out = String::new();

        // "error[OK-P001]: message"
        let heading = match d.code {
            Some(code) => format!("error[{code}]"),
            None => "error".to_string(),
        };
        out.push_str(&format!("{}: {}\n", self.bold_red(&heading), self.bold(&d.message)));

        if let (Some(label), Some(source)) = (d.labels.first(), &d.source) {
            let map = SourceMap::new(source);
            let (line, col) = map.lookup(label.span.start);
            let line_text = map.line_text(source, line);

            out.push_str(&format!("  {} {}:{}\n", self.cyan("-->"), line, col));

            let gutter = line.to_string().len();
            let pipe = self.cyan("|");
            let pad = " ".repeat(gutter);

            out.push_str(&format!("{pad} {pipe}\n"));
            let line_num = self.cyan(&format!("{line:>gutter$}"));
            out.push_str(&format!("{line_num} {pipe} {line_text}\n"));

            // Carets stop at the end of the line for spans that run past it.
            let start = col.saturating_sub(1);
            let room = line_text.len().saturating_sub(start).max(1);
            let span_len = label.span.end.saturating_sub(label.span.start).clamp(1, room);
            let carets = self.bold_red(&"^".repeat(span_len));
            let indent = " ".repeat(start);
            if label.message.is_empty() {
                out.push_str(&format!("{pad} {pipe} {indent}{carets}\n"));
            } else {
                out.push_str(&format!("{pad} {pipe} {indent}{carets} {}\n", self.bold_red(&label.message)));
            }
            out.push_str(&format!("{pad} {pipe}\n"));
        }

        for note in &d.notes {
            out.push_str(&format!("  {} note: {}\n", self.dim("="), note));
        }

        if let Some(suggestion) = &d.suggestion {
            out.push_str(&format!("  {} help: {}\n", self.dim("="), suggestion));
        }

        if let Some(code) = d.code {
            out.push_str(&format!("  {} run `ok explain {code}` for details\n", self.dim("=")));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    const SOURCE: &str = "total = price * \nprint(total)";

    fn make_diag(start: usize, end: usize) -> Diagnostic {
        Diagnostic::error("expected expression after *, got identifier")
            .with_code("OK-P001")
            .with_span(Span { start, end }, "expected expression")
            .with_source(SOURCE.to_string())
            .with_note("the previous token was *")
            .with_suggestion("finish the expression")
    }

    #[test]
    fn render_heading_carries_code() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&make_diag(17, 22));
        assert!(out.starts_with("error[OK-P001]: expected expression"), "{out}");
        assert!(out.contains("ok explain OK-P001"), "{out}");
    }

    #[test]
    fn render_points_at_second_line() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&make_diag(17, 22));
        assert!(out.contains("--> 2:1"), "{out}");
        assert!(out.contains("2 | print(total)"), "{out}");
        assert!(out.contains("  | ^^^^^ expected expression"), "{out}");
    }

    #[test]
    fn render_notes_and_help() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&make_diag(17, 22));
        assert!(out.contains("note: the previous token was *"), "{out}");
        assert!(out.contains("help: finish the expression"), "{out}");
    }

    #[test]
    fn render_without_source_has_no_snippet() {
        let r = AnsiRenderer { use_color: false };
        let out = r.render(&Diagnostic::error("undefined variable: x"));
        assert_eq!(out, "error: undefined variable: x\n");
    }

    #[test]
    fn caret_at_end_of_file_is_single() {
        let r = AnsiRenderer { use_color: false };
        let source = "a = 1 +";
        let d = Diagnostic::error("bad")
            .with_span(Span { start: 7, end: 7 }, "")
            .with_source(source.to_string());
        let out = r.render(&d);
        assert!(out.contains(&format!("1 | {source}\n  | {}^\n", " ".repeat(7))), "{out}");
    }

    #[test]
    fn compile_error_points_at_statement() {
        let r = AnsiRenderer { use_color: false };
        let source = "a = 1\n2 = a";
        let e = crate::ast::Spanned::new(crate::compiler::CompileError::InvalidAssignTarget, Span { start: 6, end: 11 });
        let out = r.render(&Diagnostic::from(&e).with_source(source));
        assert!(out.starts_with("error[OK-C006]"), "{out}");
        assert!(out.contains("--> 2:1"), "{out}");
        assert!(out.contains("2 | 2 = a\n  | ^^^^^ in this statement"), "{out}");
    }

    #[test]
    fn color_only_when_asked() {
        let d = make_diag(17, 22);
        assert!(AnsiRenderer { use_color: true }.render(&d).contains("\x1b["));
        assert!(!AnsiRenderer { use_color: false }.render(&d).contains("\x1b["));
    }
}
