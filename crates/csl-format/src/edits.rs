//! Minimal line-level edits between a document and its formatted form.

use csl_tokenizer::{Position, Region};
use similar::{ChangeTag, TextDiff};

/// A replacement of `range` by `new_text`, in line/column coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    pub range: Region,
    pub new_text: String,
}

struct EditBuilder {
    start_line: u32,
    end_line: u32,
    new_text: String,
}

/// Diff `original` against `formatted` line by line and return the edits
/// that transform one into the other. Edits replace whole line runs so
/// they stay reviewable.
pub fn compute_edits(original: &str, formatted: &str) -> Vec<TextEdit> {
    if original == formatted {
        return Vec::new();
    }

    let diff = TextDiff::from_lines(original, formatted);
    let mut edits: Vec<TextEdit> = Vec::new();
    let mut builder: Option<EditBuilder> = None;
    let mut cursor = 0u32; // current line in `original`

    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Equal => {
                flush(&mut builder, &mut edits);
                cursor += 1;
            }
            ChangeTag::Delete => {
                let line = cursor;
                cursor += 1;
                match &mut builder {
                    Some(b) if b.end_line == line => b.end_line = line + 1,
                    _ => {
                        flush(&mut builder, &mut edits);
                        builder = Some(EditBuilder {
                            start_line: line,
                            end_line: line + 1,
                            new_text: String::new(),
                        });
                    }
                }
            }
            ChangeTag::Insert => {
                let text = ensure_trailing_newline(change.value());
                match &mut builder {
                    Some(b) => b.new_text.push_str(&text),
                    None => {
                        builder = Some(EditBuilder {
                            start_line: cursor,
                            end_line: cursor,
                            new_text: text,
                        });
                    }
                }
            }
        }
    }
    flush(&mut builder, &mut edits);
    edits
}

fn ensure_trailing_newline(line: &str) -> String {
    if line.ends_with('\n') {
        line.to_string()
    } else {
        format!("{}\n", line)
    }
}

fn flush(builder: &mut Option<EditBuilder>, edits: &mut Vec<TextEdit>) {
    if let Some(b) = builder.take() {
        edits.push(TextEdit {
            range: Region::new(
                Position::new(b.start_line, 0),
                Position::new(b.end_line, 0),
            ),
            new_text: b.new_text,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Apply line-based edits to a document (latest-first so earlier
    /// ranges stay valid).
    fn apply(original: &str, edits: &[TextEdit]) -> String {
        let mut line_starts = vec![0usize];
        for (i, b) in original.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        let offset_of = |line: u32| -> usize {
            line_starts
                .get(line as usize)
                .copied()
                .unwrap_or(original.len())
        };

        let mut sorted: Vec<&TextEdit> = edits.iter().collect();
        sorted.sort_by_key(|e| e.range.start);
        let mut result = original.to_string();
        for edit in sorted.into_iter().rev() {
            let start = offset_of(edit.range.start.line);
            let end = offset_of(edit.range.end.line);
            result.replace_range(start..end, &edit.new_text);
        }
        result
    }

    #[test]
    fn test_no_edits_when_identical() {
        assert!(compute_edits("a\nb\n", "a\nb\n").is_empty());
    }

    #[test]
    fn test_replacement_round_trips() {
        let original = "config A {\nx:string;\n}\n";
        let formatted = "config A {\n  x: string;\n}\n";
        let edits = compute_edits(original, formatted);
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].range.start.line, 1);
        assert_eq!(edits[0].range.end.line, 2);
        assert_eq!(apply(original, &edits), formatted);
    }

    #[test]
    fn test_insertion_and_deletion() {
        let original = "a\nb\nc\n";
        let formatted = "a\nc\nd\n";
        let edits = compute_edits(original, formatted);
        assert_eq!(apply(original, &edits), formatted);
    }

    #[test]
    fn test_disjoint_groups_round_trip() {
        let original = "one\ntwo\nthree\nfour\nfive\n";
        let formatted = "ONE\ntwo\nthree\nfour\nFIVE\n";
        let edits = compute_edits(original, formatted);
        assert_eq!(edits.len(), 2);
        assert_eq!(apply(original, &edits), formatted);
    }
}
