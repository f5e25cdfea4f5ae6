use super::{Diagnostic, Severity};
use crate::ast::SourceMap;

/// One diagnostic as a single-line JSON object.
pub fn render(d: &Diagnostic) -> String {
    let severity = match d.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };

    let mut obj = serde_json::json!({
        "severity": severity,
        "message": d.message,
        "notes": d.notes,
    });

    if let Some(code) = d.code {
        obj["code"] = serde_json::Value::String(code.to_string());
    }

    if let Some(label) = &d.label {
        let mut span = serde_json::json!({
            "start": label.span.start,
            "end": label.span.end,
            "message": label.message,
        });
        if let Some(source) = d.source.as_deref() {
            let (line, col) = SourceMap::new(source).lookup(label.span.start);
            span["line"] = serde_json::Value::from(line);
            span["col"] = serde_json::Value::from(col);
        }
        obj["span"] = span;
    }

    if let Some(s) = &d.suggestion {
        obj["suggestion"] = serde_json::Value::String(s.clone());
    }

    serde_json::to_string(&obj).unwrap_or_else(|_| {
        r#"{"severity":"error","message":"internal error serializing diagnostic"}"#.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    fn parse_json(s: &str) -> serde_json::Value {
        serde_json::from_str(s).expect("valid JSON")
    }

    #[test]
    fn runtime_error_has_code_and_no_span() {
        let d = Diagnostic::error("division by zero").with_code("HSK-R003");
        let v = parse_json(&render(&d));
        assert_eq!(v["severity"], "error");
        assert_eq!(v["code"], "HSK-R003");
        assert!(v.get("span").is_none());
        assert!(v.get("suggestion").is_none());
    }

    #[test]
    fn span_gets_line_and_col_from_source() {
        let d = Diagnostic::error("unknown word: 'x'")
            .with_span(Span::new(6, 7), "here")
            .with_source("1 2 +\nx");
        let v = parse_json(&render(&d));
        assert_eq!(v["span"]["start"], 6);
        assert_eq!(v["span"]["line"], 2);
        assert_eq!(v["span"]["col"], 1);
    }

    #[test]
    fn span_without_source_has_offsets_only() {
        let d = Diagnostic::error("bad").with_span(Span::new(5, 8), "here");
        let v = parse_json(&render(&d));
        assert_eq!(v["span"]["end"], 8);
        assert!(v["span"].get("line").is_none());
    }

    #[test]
    fn warning_with_suggestion_is_one_line() {
        let d = Diagnostic::warning("leftover values")
            .with_note("checked statically")
            .with_suggestion("print the result");
        let out = render(&d);
        assert!(!out.contains('\n'));
        let v = parse_json(&out);
        assert_eq!(v["severity"], "warning");
        assert_eq!(v["notes"][0], "checked statically");
        assert_eq!(v["suggestion"], "print the result");
    }
}
