//! Semantic-token legend and delta encoding.

use csl_tokenizer::{TokenKind, TokenList};

/// The advertised token-type legend, in its fixed order.
pub const TOKEN_TYPES: [&str; 12] = [
    "datetime",
    "duration",
    "number",
    "boolean",
    "keyword",
    "type",
    "identifier",
    "punctuator",
    "operator",
    "comment",
    "string",
    "unknown",
];

/// Index of a token kind in the legend.
pub fn token_type_index(kind: TokenKind) -> u32 {
    let name = kind.as_str();
    TOKEN_TYPES
        .iter()
        .position(|t| *t == name)
        .map(|i| i as u32)
        .unwrap_or(8)
}

/// Encode a token stream into LSP `[deltaLine, deltaStart, length, type,
/// modifiers]` quintuples.
///
/// A token spanning lines reports the length of its source literal; when
/// the client cannot render those, the lexer has already split them.
pub fn encode_tokens(tokens: &TokenList) -> Vec<u32> {
    let mut data = Vec::with_capacity(tokens.len() * 5);
    let mut prev_line = 0u32;
    let mut prev_char = 0u32;

    for token in tokens {
        let start = token.range.start;
        let delta_line = start.line - prev_line;
        let delta_start = if delta_line == 0 {
            start.column - prev_char
        } else {
            start.column
        };
        let length = if token.range.line_span() > 0 {
            token.value.chars().count() as u32
        } else {
            token.range.end.column - start.column
        };

        data.extend_from_slice(&[
            delta_line,
            delta_start,
            length,
            token_type_index(token.kind),
            0,
        ]);

        prev_line = start.line;
        prev_char = start.column;
    }
    data
}

/// A decoded quintuple, used to verify the encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedToken {
    pub line: u32,
    pub start: u32,
    pub length: u32,
    pub token_type: u32,
}

/// Decode quintuples back into absolute positions.
pub fn decode_tokens(data: &[u32]) -> Vec<DecodedToken> {
    let mut out = Vec::with_capacity(data.len() / 5);
    let mut line = 0u32;
    let mut start = 0u32;
    for chunk in data.chunks_exact(5) {
        if chunk[0] > 0 {
            line += chunk[0];
            start = chunk[1];
        } else {
            start += chunk[1];
        }
        out.push(DecodedToken {
            line,
            start,
            length: chunk[2],
            token_type: chunk[3],
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use csl_tokenizer::{lex, Token};

    /// Check that a decoded stream matches the original token positions.
    fn matches_tokens(decoded: &[DecodedToken], tokens: &[Token]) -> bool {
        decoded.len() == tokens.len()
            && decoded.iter().zip(tokens).all(|(d, t)| {
                d.line == t.range.start.line
                    && d.start == t.range.start.column
                    && d.token_type == token_type_index(t.kind)
            })
    }

    #[test]
    fn test_legend_order() {
        assert_eq!(TOKEN_TYPES[0], "datetime");
        assert_eq!(TOKEN_TYPES[6], "identifier");
        assert_eq!(TOKEN_TYPES[11], "unknown");
        assert_eq!(token_type_index(TokenKind::Comment), 9);
        assert_eq!(token_type_index(TokenKind::Keyword), 4);
    }

    #[test]
    fn test_encoding_round_trips() {
        let source = "config A {\n  // note\n  x: string;\n  port: number = 8080;\n}";
        let out = lex(source, true);
        let data = encode_tokens(&out.tokens);
        assert_eq!(data.len() % 5, 0);
        let decoded = decode_tokens(&data);
        assert!(matches_tokens(&decoded, out.tokens.tokens()));
    }

    #[test]
    fn test_single_line_lengths() {
        let out = lex("config Abc", true);
        let data = encode_tokens(&out.tokens);
        // "config" has length 6, "Abc" length 3
        assert_eq!(data[2], 6);
        assert_eq!(data[7], 3);
        // second token is on the same line, 7 columns later
        assert_eq!(data[5], 0);
        assert_eq!(data[6], 7);
    }

    #[test]
    fn test_multiline_token_reports_literal_length() {
        let out = lex("x = \"ab\ncd\";", true);
        let string_token = out
            .tokens
            .iter()
            .find(|t| t.kind == TokenKind::String)
            .unwrap();
        let data = encode_tokens(&out.tokens);
        let decoded = decode_tokens(&data);
        let entry = decoded
            .iter()
            .find(|d| d.token_type == token_type_index(TokenKind::String))
            .unwrap();
        assert_eq!(entry.length, string_token.value.chars().count() as u32);
    }
}
