//! Diagnostics and error reporting for run scripts
//!
//! Parse errors and configuration problems are reported with an optional
//! byte span into the script so the CLI can point at the offending line.

use crate::parser::ParseError;
use std::fmt;

/// Byte range into a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// 0-indexed line and column of the span start within `source`
    pub fn location(&self, source: &str) -> SourceLocation {
        let mut line = 0;
        let mut line_start = 0;
        for (offset, ch) in source.char_indices() {
            if offset >= self.start {
                break;
            }
            if ch == '\n' {
                line += 1;
                line_start = offset + 1;
            }
        }
        SourceLocation {
            line,
            column: self.start.saturating_sub(line_start),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Error => write!(f, "error"),
            DiagnosticSeverity::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub message: String,
    pub span: Option<Span>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            message: message.into(),
            span,
        }
    }

    pub fn warning(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            message: message.into(),
            span,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.items.push(diagnostic);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(|d| !d.is_error())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Format a parse error with context from the script
pub fn format_parse_error(error: &ParseError, source: &str) -> String {
    let mut msg = format!("Parse error: {}", error);
    if let Some(span) = error.span() {
        let location = span.location(source);
        if let Some(text) = source.lines().nth(location.line) {
            msg.push_str(&format!("\n  at line {}: {}", location.line + 1, text.trim_end()));
        }
    }
    msg
}

/// Format a diagnostic, with the script line when it has a span
pub fn format_diagnostic(diagnostic: &Diagnostic, source: &str) -> String {
    let mut msg = diagnostic.to_string();
    if let Some(span) = diagnostic.span {
        let location = span.location(source);
        if let Some(text) = source.lines().nth(location.line) {
            msg.push_str(&format!("\n  at line {}: {}", location.line + 1, text.trim_end()));
        }
    }
    msg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_location() {
        let source = "events 10\nseed 3\nbogus line\n";
        let start = source.find("bogus").unwrap();
        let loc = Span::new(start, start + 5).location(source);
        assert_eq!(loc, SourceLocation { line: 2, column: 0 });
    }

    #[test]
    fn test_format_parse_error_shows_line() {
        let source = "events 10\nwat 3\n";
        let start = source.find("wat").unwrap();
        let err = ParseError::new("unknown declaration 'wat'", Some(Span::new(start, start + 5)));
        let text = format_parse_error(&err, source);
        assert!(text.contains("line 2: wat 3"), "{text}");
    }

    #[test]
    fn test_diagnostics_counts() {
        let mut diags = Diagnostics::new();
        assert!(!diags.has_errors());
        diags.push(Diagnostic::warning("no observer", None));
        assert!(!diags.has_errors());
        diags.push(Diagnostic::error("bad step", None));
        assert!(diags.has_errors());
        assert_eq!(diags.errors().count(), 1);
        assert_eq!(diags.warnings().count(), 1);
    }
}
