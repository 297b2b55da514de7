use serde::Serialize;

use crate::ast::SourceMap;
use super::{Diagnostic, Label};

#[derive(Serialize)]
struct Record<'a> {
    severity: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    message: &'a str,
    labels: Vec<LabelRecord<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    instruction: Option<usize>,
    notes: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<&'a str>,
}

#[derive(Serialize)]
struct LabelRecord<'a> {
    start: usize,
    end: usize,
    message: &'a str,
    /// 1-based; present only when the source is attached.
    #[serde(flatten)]
    position: Option<Position>,
}

#[derive(Serialize)]
struct Position {
    line: usize,
    col: usize,
}

fn label_record<'a>(label: &'a Label, map: Option<&SourceMap>) -> LabelRecord<'a> {
    LabelRecord {
        start: label.span.start,
        end: label.span.end,
        message: &label.message,
        position: map.map(|m| {
            let (line, col) = m.lookup(label.span.start);
            Position { line, col }
        }),
    }
}

/// One diagnostic as a single line of JSON.
pub fn render(d: &Diagnostic) -> String {
    let map = d.source.as_deref().map(SourceMap::new);
    let record = Record {
        severity: "error",
        code: d.code,
        message: &d.message,
        labels: d.labels.iter().map(|l| label_record(l, map.as_ref())).collect(),
        instruction: d.instruction,
        notes: &d.notes,
        suggestion: d.suggestion.as_deref(),
    };
    serde_json::to_string(&record).unwrap_or_else(|e| {
        format!(r#"{{"severity":"error","message":{}}}"#, serde_json::Value::from(e.to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;
    use serde_json::Value;

    fn parse_json(s: &str) -> Value {
        serde_json::from_str(s).expect("valid JSON")
    }

    #[test]
    fn render_basic_error() {
        let v = parse_json(&render(&Diagnostic::error("division by zero")));
        assert_eq!(v["severity"], "error");
        assert_eq!(v["message"], "division by zero");
        assert!(v["labels"].as_array().unwrap().is_empty());
        assert!(v.get("code").is_none());
        assert!(v.get("instruction").is_none());
        assert!(v.get("suggestion").is_none());
    }

    #[test]
    fn render_code_and_location() {
        let d = Diagnostic::error("char literal 'ab' must contain exactly one character")
            .with_code("OK-P002")
            .with_span(Span { start: 10, end: 14 }, "in this literal")
            .with_source("a = 1\nb = 'ab'".to_string());
        let v = parse_json(&render(&d));
        assert_eq!(v["code"], "OK-P002");
        let label = &v["labels"][0];
        assert_eq!(label["start"], 10);
        assert_eq!(label["end"], 14);
        assert_eq!(label["message"], "in this literal");
        assert_eq!(label["line"], 2);
        assert_eq!(label["col"], 5);
    }

    #[test]
    fn render_without_source_has_no_line_col() {
        let d = Diagnostic::error("bad").with_span(Span { start: 5, end: 8 }, "here");
        let v = parse_json(&render(&d));
        assert!(v["labels"][0].get("line").is_none());
        assert!(v["labels"][0].get("col").is_none());
    }

    #[test]
    fn runtime_error_carries_instruction() {
        let d = Diagnostic::error("division by zero")
            .with_code("OK-R006")
            .with_instruction(3)
            .with_note("at instruction 3 (Divide)")
            .with_suggestion("check the divisor");
        let out = render(&d);
        assert!(!out.contains('\n'));
        let v = parse_json(&out);
        assert_eq!(v["instruction"], 3);
        assert_eq!(v["notes"][0], "at instruction 3 (Divide)");
        assert_eq!(v["suggestion"], "check the divisor");
    }
}
