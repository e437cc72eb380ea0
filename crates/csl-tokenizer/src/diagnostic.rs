//! Diagnostics produced by the lexer and parser.

use ariadne::{Color, Label, Report, ReportKind, Source};

use crate::{Position, Region};

/// Diagnostic severity, mirroring LSP severities 1 and 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Error,
    Warning,
}

/// A message anchored to a source region.
///
/// The lexer and parser accumulate these and never abort.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
    pub region: Region,
    pub severity: Severity,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(message: impl Into<String>, region: Region) -> Self {
        Self {
            message: message.into(),
            region,
            severity: Severity::Error,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(message: impl Into<String>, region: Region) -> Self {
        Self {
            message: message.into(),
            region,
            severity: Severity::Warning,
        }
    }

    /// Render this diagnostic with ariadne.
    ///
    /// Returns the formatted report with source context, or a plain
    /// fallback line if the report cannot be written.
    pub fn render(&self, filename: &str, source: &str) -> String {
        let mut output = Vec::new();
        self.write_report(filename, source, &mut output);
        String::from_utf8(output).unwrap_or_else(|_| format!("{}", self))
    }

    /// Write the report to a writer.
    pub fn write_report<W: std::io::Write>(&self, filename: &str, source: &str, writer: W) {
        let start = byte_offset(source, self.region.start);
        let end = byte_offset(source, self.region.end).max(start);
        let range = start..end;

        let (kind, color) = match self.severity {
            Severity::Error => (ReportKind::Error, Color::Red),
            Severity::Warning => (ReportKind::Warning, Color::Yellow),
        };

        let report = Report::build(kind, (filename, range.clone()))
            .with_message(&self.message)
            .with_label(
                Label::new((filename, range))
                    .with_message(&self.message)
                    .with_color(color),
            );
        let _ = report
            .finish()
            .write((filename, Source::from(source)), writer);
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.severity {
            Severity::Error => "Error",
            Severity::Warning => "Warning",
        };
        write!(
            f,
            "{} (line {}, col {}): {}",
            label, self.region.start.line, self.region.start.column, self.message
        )
    }
}

impl std::error::Error for Diagnostic {}

/// Convert a (line, column) position to a byte offset into `source`.
///
/// Columns are counted in characters. Positions past the end of a line or
/// of the text clamp to the nearest valid offset.
pub fn byte_offset(source: &str, pos: Position) -> usize {
    let mut line = 0u32;
    let mut column = 0u32;
    for (idx, ch) in source.char_indices() {
        if line == pos.line && column == pos.column {
            return idx;
        }
        if ch == '\n' {
            if line == pos.line {
                return idx;
            }
            line += 1;
            column = 0;
        } else {
            column += 1;
        }
    }
    source.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let d = Diagnostic::error(
            "Unknown token: $.",
            Region::new(Position::new(2, 4), Position::new(2, 5)),
        );
        assert_eq!(format!("{}", d), "Error (line 2, col 4): Unknown token: $.");
    }

    #[test]
    fn test_byte_offset() {
        let src = "ab\ncde\nf";
        assert_eq!(byte_offset(src, Position::new(0, 0)), 0);
        assert_eq!(byte_offset(src, Position::new(0, 2)), 2);
        assert_eq!(byte_offset(src, Position::new(1, 1)), 4);
        assert_eq!(byte_offset(src, Position::new(2, 0)), 7);
        assert_eq!(byte_offset(src, Position::new(9, 9)), src.len());
    }

    #[test]
    fn test_render_contains_message() {
        let src = "config A {\n  x: strin;\n}";
        let d = Diagnostic::error(
            "Unexpected token in type: strin",
            Region::new(Position::new(1, 5), Position::new(1, 10)),
        );
        let rendered = d.render("test.csl", src);
        assert!(rendered.contains("Unexpected token in type"));
        assert!(rendered.contains("test.csl"));
    }
}
