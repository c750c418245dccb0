use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start,
            end: other.end,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: String,
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn error(code: &str, message: impl Into<String>, span: Span) -> Self {
        Self {
            code: code.to_string(),
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            span,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileDiagnostic {
    pub path: String,
    pub diagnostic: Diagnostic,
}

const RED: &str = "\x1b[1;31m";
const YELLOW: &str = "\x1b[1;33m";
const DARK_GRAY: &str = "\x1b[90m";
const WHITE: &str = "\x1b[97m";
const RESET: &str = "\x1b[0m";

pub fn file_diagnostics_have_errors(diagnostics: &[FileDiagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|diag| diag.diagnostic.severity == DiagnosticSeverity::Error)
}

/// Renders diagnostics for one file, with a caret frame when the source text is available.
pub fn render_diagnostics(
    diagnostics: &[FileDiagnostic],
    source: Option<&str>,
    use_color: bool,
) -> String {
    let mut output = String::new();
    for (index, diag) in diagnostics.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }
        output.push_str(&render_one(&diag.path, &diag.diagnostic, source, use_color));
    }
    output
}

fn render_one(path: &str, diagnostic: &Diagnostic, source: Option<&str>, use_color: bool) -> String {
    let mut output = String::new();
    let start = &diagnostic.span.start;
    let (label, color) = match diagnostic.severity {
        DiagnosticSeverity::Error => ("error", RED),
        DiagnosticSeverity::Warning => ("warning", YELLOW),
    };
    if use_color {
        output.push_str(&format!(
            "{color}{label}[{}]{RESET} {DARK_GRAY}{}:{}:{}{RESET}\n  {WHITE}{}{RESET}\n",
            diagnostic.code, path, start.line, start.column, diagnostic.message
        ));
    } else {
        output.push_str(&format!(
            "{label}[{}] {}:{}:{}\n  {}\n",
            diagnostic.code, path, start.line, start.column, diagnostic.message
        ));
    }
    if let Some(frame) = source.and_then(|source| source_frame(source, &diagnostic.span, use_color)) {
        output.push_str(&frame);
    }
    output.trim_end().to_string()
}

fn source_frame(source: &str, span: &Span, use_color: bool) -> Option<String> {
    let line = source.lines().nth(span.start.line.checked_sub(1)?)?;
    let line_no = span.start.line;
    let width = line_no.to_string().len();
    let line_len = line.chars().count();

    let start_col = span.start.column.clamp(1, line_len + 1);
    let end_col = if span.start.line == span.end.line {
        span.end.column.max(start_col)
    } else {
        start_col
    };
    let caret_len = end_col
        .min(line_len.max(start_col))
        .saturating_sub(start_col)
        .saturating_add(1);
    let padding = " ".repeat(start_col - 1);
    let carets = "^".repeat(caret_len);

    let mut output = String::new();
    if use_color {
        output.push_str(&format!("{DARK_GRAY}{line_no:>width$} |{RESET} {line}\n"));
        output.push_str(&format!(
            "{DARK_GRAY}{:>width$} |{RESET} {padding}{RED}{carets}{RESET}\n",
            ""
        ));
    } else {
        output.push_str(&format!("{line_no:>width$} | {line}\n"));
        output.push_str(&format!("{:>width$} | {padding}{carets}\n", ""));
    }
    Some(output)
}
