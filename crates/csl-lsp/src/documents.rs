//! Per-document state kept by the server.

use csl_parse::parse;
use csl_repr::{Ast, DefinitionMap};
use csl_tokenizer::{lex_with_options, Diagnostic, TokenList};

/// Everything recomputed for a document on open and on every change.
///
/// Two lex passes run: the comment-free stream feeds the parser and all
/// position-based queries; the with-comments stream exists solely for
/// semantic highlighting.
#[derive(Debug)]
pub struct DocumentData {
    pub text: String,
    pub tokens_no_comment: TokenList,
    pub tokens_with_comment: TokenList,
    pub ast: Ast,
    pub definitions: DefinitionMap,
    pub lex_errors: Vec<Diagnostic>,
    pub lex_warnings: Vec<Diagnostic>,
    pub parse_errors: Vec<Diagnostic>,
    pub parse_warnings: Vec<Diagnostic>,
}

impl DocumentData {
    /// Lex and parse `text`. `multiline_tokens` mirrors the client's
    /// semantic-token capability and only affects the with-comments pass.
    pub fn compute(text: &str, multiline_tokens: bool) -> Self {
        let no_comment = lex_with_options(text, false, true);
        let parsed = parse(&no_comment.tokens);
        let with_comment = lex_with_options(text, true, multiline_tokens);

        DocumentData {
            text: text.to_string(),
            tokens_no_comment: no_comment.tokens,
            tokens_with_comment: with_comment.tokens,
            ast: parsed.ast,
            definitions: parsed.definitions,
            lex_errors: no_comment.errors,
            lex_warnings: no_comment.warnings,
            parse_errors: parsed.errors,
            parse_warnings: parsed.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_populates_everything() {
        let doc = DocumentData::compute("// hi\nconfig A { x: string; }", true);
        assert!(doc.lex_errors.is_empty());
        assert!(doc.parse_errors.is_empty());
        assert_eq!(doc.ast.schema_count(), 1);
        // comment only in the highlighting stream
        assert!(doc
            .tokens_with_comment
            .iter()
            .any(|t| t.kind == csl_tokenizer::TokenKind::Comment));
        assert!(doc
            .tokens_no_comment
            .iter()
            .all(|t| t.kind != csl_tokenizer::TokenKind::Comment));
    }
}
