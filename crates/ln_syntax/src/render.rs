use crate::{Diagnostic, SourceFile};

pub fn render_diagnostic(source: &SourceFile, diag: &Diagnostic) -> String {
    let code_str = diag.code.map(|c| format!(" [{c}]")).unwrap_or_default();
    let mut out = match diag.span {
        Some(span) => {
            let text = source.text.as_str();
            let (line, col) = source.text.line_col(span.start.0);
            let start = (span.start.0 as usize).min(text.len());
            let line_start = text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
            let line_end = text[start..]
                .find('\n')
                .map(|i| start + i)
                .unwrap_or(text.len());
            let near = source.text.slice(span);

            let mut out = format!(
                "{:?}{} [line {}] in {}",
                diag.severity,
                code_str,
                line + 1,
                source.name
            );
            if near.is_empty() {
                out.push_str(" at end");
            } else {
                out.push_str(&format!(" at '{near}'"));
            }
            out.push_str(": ");
            out.push_str(&diag.message);
            out.push_str("\n  | ");
            out.push_str(&text[line_start..line_end]);
            out.push_str("\n  | ");
            out.extend(std::iter::repeat_n(' ', col as usize));
            out.push('^');
            out
        }
        None => format!(
            "{:?}{} in {}: {}",
            diag.severity, code_str, source.name, diag.message
        ),
    };
    if let Some(h) = &diag.help {
        out.push_str("\n  = help: ");
        out.push_str(h);
    }
    out
}

pub fn render_diagnostics(source: &SourceFile, diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for (idx, d) in diagnostics.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        out.push_str(&render_diagnostic(source, d));
    }
    out
}
