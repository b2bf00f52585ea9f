//! Type-erased diagnostics shared by every compiler stage.
//!
//! Each stage (scanner, parser, type checker) lowers its own error type into
//! a [`Diagnostic`] record carrying a stable numeric code, a severity, a
//! primary range, and labeled sub-ranges. Diagnostics are accumulated in a
//! [`DiagnosticStore`] and rendered with ariadne at the end of a run, so a
//! single check can report many independent problems.

use std::ops::Range;

use ariadne::{Color, Config, Label, Report, ReportKind, Source};
use serde::Serialize;

use crate::text::{TextFile, TextRange};

/// Stable numeric codes, one per diagnostic kind.
///
/// These are part of the tool's interface: `verify` mode matches
/// `@expect_diagnostic(N)` annotations against them.
pub mod codes {
    pub const UNEXPECTED_TOKEN: u32 = 1001;
    pub const UNEXPECTED_STRING: u32 = 1002;
    pub const BINDING_NOT_FOUND: u32 = 2001;
    pub const TYPE_MISMATCH: u32 = 2002;
    pub const FIELD_NOT_FOUND: u32 = 2003;
    pub const TYPECLASS_MISSING: u32 = 2004;
    pub const INSTANCE_NOT_FOUND: u32 = 2005;
    pub const CLASS_NOT_FOUND: u32 = 2006;
    pub const TUPLE_INDEX_OUT_OF_RANGE: u32 = 2007;
    pub const INVALID_TYPE_FOR_TYPECLASS: u32 = 2008;
    pub const NOT_A_TUPLE: u32 = 2009;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// A labeled sub-range of a diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticLabel {
    pub range: TextRange,
    pub message: String,
}

/// A single, fully lowered diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: u32,
    pub severity: Severity,
    pub message: String,
    /// Primary range the diagnostic points at, if it has one.
    pub range: Option<TextRange>,
    pub labels: Vec<DiagnosticLabel>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn error(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            range: None,
            labels: Vec::new(),
            notes: Vec::new(),
        }
    }

    pub fn with_range(mut self, range: TextRange) -> Self {
        self.range = Some(range);
        self
    }

    pub fn with_label(mut self, range: TextRange, message: impl Into<String>) -> Self {
        self.labels.push(DiagnosticLabel {
            range,
            message: message.into(),
        });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// 1-based line of the primary range, if any. Used by `verify` to match
    /// `@expect_diagnostic` annotations.
    pub fn line(&self) -> Option<u64> {
        self.range.map(|r| r.start.line)
    }
}

/// Buffers diagnostics until the caller decides to render them.
#[derive(Debug, Default)]
pub struct DiagnosticStore {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn has_error(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    /// Sort by source position (diagnostics without a range sort first),
    /// then by code. The sort is stable, so same-position diagnostics keep
    /// emission order.
    pub fn sort(&mut self) {
        self.diagnostics
            .sort_by_key(|d| (d.range.map(|r| r.start), d.code));
    }

    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}

/// Render a diagnostic into a formatted string using ariadne.
///
/// Colors are switched off for test output and non-TTY targets.
pub fn render_diagnostic(diagnostic: &Diagnostic, file: &TextFile, color: bool) -> String {
    let config = Config::default().with_color(color);
    let source_len = file.text().len();

    let clamp = |r: Range<usize>| -> Range<usize> {
        let s = r.start.min(source_len);
        let e = r.end.min(source_len).max(s);
        // ariadne needs at least a one-character span.
        if s == e {
            s..e.saturating_add(1).min(source_len.max(1))
        } else {
            s..e
        }
    };

    let primary = diagnostic
        .range
        .map(|r| clamp(file.byte_range(r)))
        .unwrap_or(0..source_len.min(1));

    let kind = match diagnostic.severity {
        Severity::Error => ReportKind::Error,
        Severity::Warning => ReportKind::Warning,
    };

    let mut builder = Report::build(kind, primary.clone())
        .with_code(format!("E{:04}", diagnostic.code))
        .with_message(&diagnostic.message)
        .with_config(config);

    if diagnostic.labels.is_empty() {
        builder.add_label(
            Label::new(primary)
                .with_message(&diagnostic.message)
                .with_color(Color::Red),
        );
    } else {
        for label in &diagnostic.labels {
            builder.add_label(
                Label::new(clamp(file.byte_range(label.range)))
                    .with_message(&label.message)
                    .with_color(Color::Red),
            );
        }
    }

    if !diagnostic.notes.is_empty() {
        builder.set_note(diagnostic.notes.join("\n"));
    }

    let mut buf = Vec::new();
    builder
        .finish()
        .write(Source::from(file.text()), &mut buf)
        .expect("writing a diagnostic to an in-memory buffer cannot fail");
    // Prefix a file:line:column anchor so tooling can jump to the location.
    let anchor = match diagnostic.range {
        Some(r) => format!("{}:{}:{}\n", file.path(), r.start.line, r.start.column),
        None => format!("{}\n", file.path()),
    };
    anchor + &String::from_utf8_lossy(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::TextLoc;

    fn range(l1: u64, c1: u64, l2: u64, c2: u64) -> TextRange {
        TextRange::new(TextLoc::new(l1, c1), TextLoc::new(l2, c2))
    }

    #[test]
    fn store_tracks_errors() {
        let mut store = DiagnosticStore::new();
        assert!(!store.has_error());
        store.add(Diagnostic::error(codes::TYPE_MISMATCH, "boom"));
        assert!(store.has_error());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn sort_orders_by_position() {
        let mut store = DiagnosticStore::new();
        store.add(Diagnostic::error(codes::TYPE_MISMATCH, "late").with_range(range(3, 1, 3, 2)));
        store.add(Diagnostic::error(codes::BINDING_NOT_FOUND, "early").with_range(range(1, 5, 1, 6)));
        store.sort();
        let messages: Vec<_> = store.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["early", "late"]);
    }

    #[test]
    fn render_includes_code_and_anchor() {
        let file = TextFile::new("demo.bolt", "let a = 1\n");
        let diag = Diagnostic::error(codes::BINDING_NOT_FOUND, "binding 'b' not found")
            .with_range(range(1, 5, 1, 6));
        let out = render_diagnostic(&diag, &file, false);
        assert!(out.starts_with("demo.bolt:1:5"));
        assert!(out.contains("E2001"));
        assert!(out.contains("binding 'b' not found"));
    }
}
