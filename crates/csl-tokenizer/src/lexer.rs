//! Lexer for the Config Schema Language.
//!
//! The lexer is line oriented: lines are pulled off the input one at a
//! time and glued together while a string literal or quoted identifier
//! remains open, then tokens are consumed from the front of the pending
//! text. Malformed input never aborts the lexer; it produces diagnostics
//! and keeps going.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::quoting::{check_escapes, extract_quoted_identifier_content, unescape};
use crate::{
    DateTimeKind, Diagnostic, Position, Region, SpecialNumberKind, StringKind, Token, TokenKind,
    TokenList, TypeDescriptor,
};

/// Everything the lexer produces for one input.
#[derive(Debug, Default)]
pub struct LexOutput {
    pub tokens: TokenList,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

/// Lex `source`, keeping comment tokens only when `preserve_comments`.
pub fn lex(source: &str, preserve_comments: bool) -> LexOutput {
    lex_with_options(source, preserve_comments, true)
}

/// Lex with explicit control over multi-line token splitting.
///
/// When `multiline_tokens` is false, tokens that span lines are split
/// into one token per line (used for clients that cannot render
/// multi-line semantic tokens).
pub fn lex_with_options(source: &str, preserve_comments: bool, multiline_tokens: bool) -> LexOutput {
    Lexer {
        preserve_comments,
        errors: Vec::new(),
        warnings: Vec::new(),
    }
    .run(source, multiline_tokens)
}

static OFFSET_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{4}-\d{2}-\d{2})[Tt ]([01]\d|2[0-3]):[0-5]\d:[0-5]\d(\.\d+)?([Zz]|[+-]([01]\d|2[0-3]):[0-5]\d)",
    )
    .unwrap()
});
static LOCAL_DATETIME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})[Tt ]([01]\d|2[0-3]):[0-5]\d:[0-5]\d(\.\d+)?").unwrap()
});
static LOCAL_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap());
static LOCAL_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d:[0-5]\d(\.\d+)?").unwrap());

static ISO_DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^P(\d+Y|\d+M|\d+W|\d+D)+(T(\d+H|\d+M|\d+S)+)?").unwrap());
static ISO_TIME_DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^PT(\d+H|\d+M|\d+S)+").unwrap());
static SHORTHAND_DURATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(ms|y|mo|w|d|h|m|s)").unwrap());

static HEX_INT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0x(?:_?[0-9a-fA-F]+)+").unwrap());
static OCT_INT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0o(?:_?[0-7]+)+").unwrap());
static BIN_INT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0b(?:_?[01]+)+").unwrap());
static DEC_INT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:0|[1-9][0-9]*(?:_[0-9]+)*)").unwrap());
static FLOAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:0|[1-9][0-9]*(?:_[0-9]+)*)(?:\.(?:[0-9]+_)*[0-9]+)?(?:e[-+]?[0-9]+(?:_[0-9]+)*)?")
        .unwrap()
});

const KEYWORDS: &[&str] = &[
    "config",
    "constraints",
    "requires",
    "conflicts",
    "with",
    "validate",
    "exists",
    "count_keys",
    "all_keys",
    "wildcard_keys",
    "subset",
    "*",
];

const TYPE_NAMES: &[&str] = &[
    "any{}", "any[]", "string", "number", "boolean", "datetime", "duration",
];

const TWO_CHAR_OPERATORS: &[&str] = &["==", "!=", "<=", ">=", "&&", "||", "<<", ">>"];
const ONE_CHAR_OPERATORS: &[char] = &[
    '~', '!', '+', '-', '*', '/', '%', '<', '>', '&', '^', '|', '=', '?', ':', '.', '@', '[', '(',
    ']', ')',
];

struct Lexer {
    preserve_comments: bool,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
}

impl Lexer {
    fn run(mut self, source: &str, multiline_tokens: bool) -> LexOutput {
        let lines = split_lines(source);
        let mut tokens = TokenList::new();
        let mut pending = String::new();
        let mut pos = Position::default();
        let mut continued = false;

        let count = lines.len();
        for (i, line) in lines.iter().enumerate() {
            let has_more = i + 1 < count;

            if is_blank(line) {
                if line.contains('\r') {
                    let region = Region::new(
                        Position::new(pos.line, 0),
                        Position::new(pos.line, line.chars().count() as u32),
                    );
                    self.errors
                        .push(Diagnostic::error("Line ending is not valid.", region));
                }
                pos.line += 1;
                pos.column = 0;
                if has_more || pending.trim().is_empty() {
                    continue;
                }
            }

            if continued {
                pending.push_str(line);
            } else {
                pending = line.clone();
            }

            if has_incomplete_string_or_id(&pending) {
                continued = true;
                pending.push('\n');
                if has_more {
                    continue;
                }
                let end_col = pending.find('\n').unwrap_or(pending.len()) as u32;
                let region = Region::new(
                    Position::new(pos.line, 0),
                    Position::new(pos.line, end_col),
                );
                self.errors.push(Diagnostic::error(
                    "String literal or quoted identifier is not closed.",
                    region,
                ));
            }
            continued = false;

            self.consume_pending(&mut pending, &mut pos, &mut tokens);

            tokens.flush();
            pos.line += 1;
            pos.column = 0;
        }
        tokens.flush();

        for token in &tokens {
            if token.kind == TokenKind::Unknown {
                self.errors.push(Diagnostic::error(
                    format!("Unknown token: {}.", token.value),
                    token.range,
                ));
            }
        }

        let tokens = if multiline_tokens {
            tokens
        } else {
            split_multiline_tokens(tokens)
        };

        LexOutput {
            tokens,
            errors: self.errors,
            warnings: self.warnings,
        }
    }

    /// Consume recognized tokens from the front of `pending`.
    fn consume_pending(&mut self, pending: &mut String, pos: &mut Position, tokens: &mut TokenList) {
        while !pending.is_empty() {
            let ws = leading_whitespace_len(pending);
            if ws > 0 {
                *pos = pos.advanced_by(&pending[..ws]);
                pending.drain(..ws);
                continue;
            }

            if self.consume_oversized_raw(pending, pos, tokens) {
                continue;
            }

            // Comment
            if pending.starts_with("//") {
                let len = pending.find('\n').unwrap_or(pending.len());
                let content: String = pending[..len].to_string();
                let start = *pos;
                let end = start.advanced_by(&content);
                let region = Region::new(start, end);
                if self.preserve_comments {
                    tokens.push_parts(&content, TokenKind::Comment, None, region);
                } else {
                    tokens.flush();
                }
                if !is_content_valid(&content, StringKind::Basic) {
                    self.errors.push(Diagnostic::error(
                        "Comment contains invalid content.",
                        region,
                    ));
                }
                *pos = end;
                pending.drain(..len);
                continue;
            }

            // String literal
            if let Some((len, kind)) = scan_string(pending) {
                let text: String = pending[..len].to_string();
                let region = self.emit(tokens, pending, pos, len, TokenKind::String, Some(TypeDescriptor::String(kind)));
                if !is_content_valid(&text, kind) {
                    self.errors.push(Diagnostic::error(
                        "String literal contains invalid content.",
                        region,
                    ));
                }
                if matches!(kind, StringKind::Basic | StringKind::MultiLineBasic) {
                    let body = &text[1..text.len() - 1];
                    for bad in check_escapes(body) {
                        self.errors.push(Diagnostic::error(
                            format!("String literal contains invalid escape sequence '{}'.", bad),
                            region,
                        ));
                    }
                }
                continue;
            }

            // Datetime literal
            if let Some((len, kind, date_valid)) = scan_datetime(pending) {
                let region = self.emit(
                    tokens,
                    pending,
                    pos,
                    len,
                    TokenKind::Datetime,
                    Some(TypeDescriptor::DateTime(kind)),
                );
                if !date_valid {
                    self.errors.push(Diagnostic::error(
                        "Datetime literal is not a valid calendar date.",
                        region,
                    ));
                }
                continue;
            }

            // Duration literal
            if let Some(len) = scan_duration(pending) {
                self.emit(
                    tokens,
                    pending,
                    pos,
                    len,
                    TokenKind::Duration,
                    Some(TypeDescriptor::Duration),
                );
                if pending.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
                    let region = Region::new(*pos, Position::new(pos.line, pos.column + 1));
                    self.errors.push(Diagnostic::error(
                        "Duration literal contains invalid suffix",
                        region,
                    ));
                }
                continue;
            }

            // Numeric literal (letters win over a shorter number prefix)
            if let Some((len, desc)) = scan_number(pending) {
                let ident_len = scan_bare_identifier(pending).unwrap_or(0);
                if ident_len <= len {
                    let text: String = pending[..len].to_string();
                    let region = self.emit(tokens, pending, pos, len, TokenKind::Number, Some(desc));
                    if !is_reasonably_grouped(&text) {
                        self.warnings.push(Diagnostic::warning(
                            "Number literal is not grouped reasonably.",
                            region,
                        ));
                    }
                    continue;
                }
            }

            // Boolean literal
            if let Some(len) = scan_exact(pending, &["true", "false"]) {
                self.emit(
                    tokens,
                    pending,
                    pos,
                    len,
                    TokenKind::Boolean,
                    Some(TypeDescriptor::Boolean),
                );
                continue;
            }

            // Keyword
            if let Some(len) = scan_exact(pending, KEYWORDS) {
                self.emit(tokens, pending, pos, len, TokenKind::Keyword, None);
                continue;
            }

            // Built-in type
            if let Some(len) = scan_exact(pending, TYPE_NAMES) {
                self.emit(tokens, pending, pos, len, TokenKind::Type, None);
                continue;
            }

            // Punctuator
            if let Some(len) = scan_punctuator(pending) {
                self.emit(tokens, pending, pos, len, TokenKind::Punctuator, None);
                continue;
            }

            // Operator
            if let Some(len) = scan_operator(pending) {
                self.emit(tokens, pending, pos, len, TokenKind::Operator, None);
                continue;
            }

            // Identifier (bare or quoted)
            if let Some(len) = scan_bare_identifier(pending) {
                self.emit(tokens, pending, pos, len, TokenKind::Identifier, None);
                continue;
            }
            if let Some(len) = scan_quoted_identifier(pending) {
                let raw: String = pending[..len].to_string();
                let start = *pos;
                let end = start.advanced_by(&raw);
                let region = Region::new(start, end);
                let name = extract_quoted_identifier_content(&raw);
                if raw.starts_with('`') {
                    for bad in unescape(&raw[1..raw.len() - 1]).bad_escapes {
                        self.errors.push(Diagnostic::error(
                            format!(
                                "Quoted identifier contains invalid escape sequence '{}'.",
                                bad
                            ),
                            region,
                        ));
                    }
                }
                trace!("token identifier at {:?}: {:?}", region, name);
                tokens.push_parts(name, TokenKind::Identifier, None, region);
                *pos = end;
                pending.drain(..len);
                continue;
            }

            // Unknown content: accumulate one character into the buffered run
            let ch = pending.chars().next().unwrap();
            tokens.buffer_unknown(ch, *pos);
            *pos = pos.advanced_by(&pending[..ch.len_utf8()]);
            pending.drain(..ch.len_utf8());
        }
    }

    /// Push a token covering `len` bytes of `pending` and consume it.
    fn emit(
        &mut self,
        tokens: &mut TokenList,
        pending: &mut String,
        pos: &mut Position,
        len: usize,
        kind: TokenKind,
        prop: Option<TypeDescriptor>,
    ) -> Region {
        let text: String = pending[..len].to_string();
        let start = *pos;
        let end = start.advanced_by(&text);
        let region = Region::new(start, end);
        trace!("token {:?} at {:?}: {:?}", kind, region, text);
        tokens.push_parts(text, kind, prop, region);
        *pos = end;
        pending.drain(..len);
        region
    }

    /// Handle `R"` / `` R` `` openers whose delimiter exceeds 16 characters.
    ///
    /// Emits the error, then consumes through the closing delimiter when one
    /// exists so lexing can continue past the token.
    fn consume_oversized_raw(
        &mut self,
        pending: &mut String,
        pos: &mut Position,
        tokens: &mut TokenList,
    ) -> bool {
        let quote = if pending.starts_with("R\"") {
            '"'
        } else if pending.starts_with("R`") {
            '`'
        } else {
            return false;
        };
        let body = &pending[2..];
        let tag_len = body
            .chars()
            .take_while(|&c| c != '(' && c != '\n')
            .count();
        if tag_len <= 16 {
            return false;
        }
        let tag: String = body.chars().take(tag_len).collect();
        let message = if quote == '"' {
            "Raw string literal delimiter exceeds maximum length"
        } else {
            "Raw quoted identifier delimiter exceeds maximum length"
        };

        let closer = format!("){}{}", tag, quote);
        if let Some(open_paren) = body.find('(') {
            if let Some(close_at) = body[open_paren..].find(closer.as_str()) {
                let total = 2 + open_paren + close_at + closer.len();
                let text: String = pending[..total].to_string();
                let start = *pos;
                let end = start.advanced_by(&text);
                let region = Region::new(start, end);
                self.errors.push(Diagnostic::error(message, region));
                let (kind, prop) = if quote == '"' {
                    let sk = if text.contains('\n') {
                        StringKind::MultiLineRaw
                    } else {
                        StringKind::Raw
                    };
                    (TokenKind::String, Some(TypeDescriptor::String(sk)))
                } else {
                    (TokenKind::Identifier, None)
                };
                tokens.push_parts(text, kind, prop, region);
                *pos = end;
                pending.drain(..total);
                return true;
            }
        }

        // No closing delimiter anywhere; drop the opener so lexing advances.
        let opener_len = 2 + tag.len();
        let text: String = pending[..opener_len].to_string();
        let start = *pos;
        let end = start.advanced_by(&text);
        self.errors
            .push(Diagnostic::error(message, Region::new(start, end)));
        *pos = end;
        pending.drain(..opener_len);
        true
    }
}

/// Split source into logical lines the way a `getline` loop would:
/// `\r` immediately before `\n` is stripped, a trailing newline does not
/// produce an extra empty line.
fn split_lines(source: &str) -> Vec<String> {
    if source.is_empty() {
        return Vec::new();
    }
    let ends_with_nl = source.ends_with('\n');
    let mut pieces: Vec<&str> = source.split('\n').collect();
    if ends_with_nl {
        pieces.pop();
    }
    let n = pieces.len();
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, p)| {
            let followed_by_nl = ends_with_nl || i + 1 < n;
            if followed_by_nl {
                p.strip_suffix('\r').unwrap_or(p).to_string()
            } else {
                p.to_string()
            }
        })
        .collect()
}

fn is_blank(line: &str) -> bool {
    line.chars()
        .all(|c| matches!(c, ' ' | '\t' | '\r' | '\x0b' | '\x0c'))
}

fn leading_whitespace_len(s: &str) -> usize {
    s.char_indices()
        .find(|(_, c)| !matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Whether `s` ends inside an open string literal or quoted identifier,
/// meaning the next source line must be glued on before lexing.
fn has_incomplete_string_or_id(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < s.len() {
        if s[i..].starts_with("//") {
            match s[i..].find('\n') {
                Some(nl) => i += nl + 1,
                None => return false,
            }
        } else if s[i..].starts_with("R\"") || s[i..].starts_with("R`") {
            let quote = bytes[i + 1] as char;
            match raw_span(&s[i..], quote) {
                Some(len) => i += len,
                None => return true,
            }
        } else if bytes[i] == b'"' || bytes[i] == b'`' {
            match delimited_span(&s[i..], bytes[i] as char) {
                Some(len) => i += len,
                None => return true,
            }
        } else {
            i += s[i..].chars().next().map(char::len_utf8).unwrap_or(1);
        }
    }
    false
}

/// Length of a closed `"..."` / `` `...` `` starting at the front of `s`,
/// escapes included. `None` when the closer is missing.
fn delimited_span(s: &str, delim: char) -> Option<usize> {
    let mut chars = s.char_indices().skip(1);
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
        } else if c == delim {
            return Some(i + c.len_utf8());
        }
    }
    None
}

/// Length of a closed raw form `R<q>tag(...)tag<q>` at the front of `s`.
/// The tag may be any length here; size enforcement happens separately.
fn raw_span(s: &str, quote: char) -> Option<usize> {
    let body = &s[2..];
    let open = body.find('(')?;
    if body[..open].contains('\n') {
        return None;
    }
    let tag = &body[..open];
    let closer = format!("){}{}", tag, quote);
    let close_at = body[open..].find(closer.as_str())?;
    Some(2 + open + close_at + closer.len())
}

fn is_raw_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || matches!(
            c,
            '!' | '"'
                | '#'
                | '%'
                | '&'
                | '\''
                | '*'
                | '+'
                | ','
                | '-'
                | '.'
                | '/'
                | ':'
                | ';'
                | '<'
                | '='
                | '>'
                | '?'
                | '['
                | ']'
                | '^'
                | '_'
                | '{'
                | '|'
                | '}'
                | '~'
        )
}

/// Match a string literal at the front of `s`. Returns its byte length and
/// string kind.
fn scan_string(s: &str) -> Option<(usize, StringKind)> {
    if s.starts_with('"') {
        let len = delimited_span(s, '"')?;
        let kind = if s[..len].contains('\n') {
            StringKind::MultiLineBasic
        } else {
            StringKind::Basic
        };
        return Some((len, kind));
    }
    if s.starts_with("R\"") {
        let body = &s[2..];
        let open = body.find('(')?;
        let tag = &body[..open];
        if tag.chars().count() > 16 || !tag.chars().all(is_raw_tag_char) {
            return None;
        }
        let closer = format!("){}\"", tag);
        let close_at = body[open..].find(closer.as_str())?;
        let len = 2 + open + close_at + closer.len();
        let kind = if s[..len].contains('\n') {
            StringKind::MultiLineRaw
        } else {
            StringKind::Raw
        };
        return Some((len, kind));
    }
    None
}

/// Match a quoted identifier (`` `...` `` or `` R`tag(...)tag` ``).
fn scan_quoted_identifier(s: &str) -> Option<usize> {
    if s.starts_with('`') {
        return delimited_span(s, '`');
    }
    if s.starts_with("R`") {
        let body = &s[2..];
        let open = body.find('(')?;
        let tag = &body[..open];
        if tag.chars().count() > 16 || !tag.chars().all(is_raw_tag_char) {
            return None;
        }
        let closer = format!("){}`", tag);
        let close_at = body[open..].find(closer.as_str())?;
        return Some(2 + open + close_at + closer.len());
    }
    None
}

/// Match a datetime literal; the bool is calendar validity.
fn scan_datetime(s: &str) -> Option<(usize, DateTimeKind, bool)> {
    if let Some(m) = OFFSET_DATETIME.captures(s) {
        let full = m.get(0).unwrap();
        let valid = is_valid_date(m.get(1).unwrap().as_str());
        return Some((full.end(), DateTimeKind::OffsetDateTime, valid));
    }
    if let Some(m) = LOCAL_DATETIME.captures(s) {
        let full = m.get(0).unwrap();
        let valid = is_valid_date(m.get(1).unwrap().as_str());
        return Some((full.end(), DateTimeKind::LocalDateTime, valid));
    }
    if let Some(m) = LOCAL_DATE.find(s) {
        let valid = is_valid_date(m.as_str());
        return Some((m.end(), DateTimeKind::LocalDate, valid));
    }
    if let Some(m) = LOCAL_TIME.find(s) {
        return Some((m.end(), DateTimeKind::LocalTime, true));
    }
    None
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn is_valid_date(date: &str) -> bool {
    if date.len() != 10 || date.as_bytes()[4] != b'-' || date.as_bytes()[7] != b'-' {
        return false;
    }
    let year: i32 = match date[..4].parse() {
        Ok(y) => y,
        Err(_) => return false,
    };
    let month: u32 = match date[5..7].parse() {
        Ok(m) => m,
        Err(_) => return false,
    };
    let day: u32 = match date[8..10].parse() {
        Ok(d) => d,
        Err(_) => return false,
    };
    if year < 1 || !(1..=12).contains(&month) {
        return false;
    }
    let days_in_month = [
        31,
        if is_leap_year(year) { 29 } else { 28 },
        31,
        30,
        31,
        30,
        31,
        31,
        30,
        31,
        30,
        31,
    ];
    (1..=days_in_month[(month - 1) as usize]).contains(&day)
}

fn scan_duration(s: &str) -> Option<usize> {
    for re in [&*ISO_DURATION, &*ISO_TIME_DURATION, &*SHORTHAND_DURATION] {
        if let Some(m) = re.find(s) {
            return Some(m.end());
        }
    }
    None
}

fn word_boundary_after(s: &str, len: usize) -> bool {
    match s[len..].chars().next() {
        None => true,
        Some(c) => !(c.is_ascii_alphanumeric() || c == '_' || c == '-'),
    }
}

/// Match a numeric literal (integer, float, or `nan`/`inf`).
fn scan_number(s: &str) -> Option<(usize, TypeDescriptor)> {
    for (word, kind) in [
        ("nan", SpecialNumberKind::NaN),
        ("inf", SpecialNumberKind::Infinity),
    ] {
        if s.starts_with(word) && word_boundary_after(s, word.len()) {
            return Some((word.len(), TypeDescriptor::SpecialNumber(kind)));
        }
    }

    for re in [&*HEX_INT, &*OCT_INT, &*BIN_INT] {
        if let Some(m) = re.find(s) {
            return Some((m.end(), TypeDescriptor::Integer));
        }
    }

    let int_len = DEC_INT.find(s).map(|m| m.end()).unwrap_or(0);
    let float_len = FLOAT.find(s).map(|m| m.end()).unwrap_or(0);
    if int_len == 0 && float_len == 0 {
        return None;
    }
    // `0` directly followed by a base marker is not a number at all
    if int_len.max(float_len) == 1
        && s.starts_with('0')
        && matches!(s[1..].chars().next(), Some('x' | 'o' | 'b'))
    {
        return None;
    }
    if int_len >= float_len {
        Some((int_len, TypeDescriptor::Integer))
    } else {
        Some((float_len, TypeDescriptor::Float))
    }
}

/// Match a bare identifier. `true`/`false` are not identifiers.
fn scan_bare_identifier(s: &str) -> Option<usize> {
    let first = s.chars().next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    let len = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    let word = &s[..len];
    if word == "true" || word == "false" {
        return None;
    }
    Some(len)
}

fn scan_exact(s: &str, candidates: &[&str]) -> Option<usize> {
    for cand in candidates {
        if s.starts_with(cand) && word_boundary_after(s, cand.len()) {
            return Some(cand.len());
        }
    }
    None
}

fn scan_punctuator(s: &str) -> Option<usize> {
    if s.starts_with("=>") {
        return Some(2);
    }
    match s.chars().next()? {
        '{' | '}' | '[' | ']' | ',' | ':' | ';' | '@' => Some(1),
        _ => None,
    }
}

fn scan_operator(s: &str) -> Option<usize> {
    for op in TWO_CHAR_OPERATORS {
        if s.starts_with(op) {
            return Some(2);
        }
    }
    let first = s.chars().next()?;
    if ONE_CHAR_OPERATORS.contains(&first) {
        return Some(1);
    }
    None
}

/// Per-variant control-character validity. Raw and basic single-line
/// strings may not contain most C0 controls; multi-line variants allow
/// `\t`, `\n`, `\r` (only before `\n`).
fn is_content_valid(text: &str, kind: StringKind) -> bool {
    let multiline = matches!(kind, StringKind::MultiLineBasic | StringKind::MultiLineRaw);
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let cp = c as u32;
        if !multiline {
            if cp <= 0x0008 || (0x000A..=0x001F).contains(&cp) || cp == 0x007F {
                return false;
            }
        } else {
            if cp <= 0x0008
                || cp == 0x000B
                || cp == 0x000C
                || (0x000E..=0x001F).contains(&cp)
                || cp == 0x007F
            {
                return false;
            }
            if c == '\r' && chars.peek() != Some(&'\n') {
                return false;
            }
        }
    }
    true
}

/// Digit-grouping policy: with underscores present, all groups after the
/// first must be the same length (>= 2), or the middle groups length 2
/// with a final group of 3. Ungrouped numbers always pass.
fn is_reasonably_grouped(text: &str) -> bool {
    let (mut before, after) = match text.find('.') {
        Some(i) => (&text[..i], &text[i + 1..]),
        None => (text, ""),
    };
    if before.starts_with('+') || before.starts_with('-') {
        before = &before[1..];
    }
    if before.len() > 2 && before.starts_with('0') {
        if matches!(before.as_bytes()[1], b'b' | b'o' | b'x') {
            before = &before[2..];
        }
    }

    if !groups_ok(before, true) {
        return false;
    }
    groups_ok(after, false)
}

fn groups_ok(part: &str, integer_side: bool) -> bool {
    if part.is_empty() {
        return true;
    }
    let groups: Vec<&str> = part.split('_').collect();
    if groups.len() == 1 {
        return true;
    }
    if groups.iter().any(|g| g.is_empty()) {
        return false;
    }
    let sizes: Vec<usize> = groups.iter().map(|g| g.len()).collect();
    let tail = &sizes[1..];
    let all_same = tail.iter().all(|&s| s == tail[0]);
    if all_same {
        return tail[0] != 1;
    }
    if !integer_side {
        return false;
    }
    let mids_ok = sizes[1..sizes.len() - 1].iter().all(|&s| s == 2);
    mids_ok && *sizes.last().unwrap() == 3
}

/// Split tokens spanning multiple lines into one token per line.
fn split_multiline_tokens(tokens: TokenList) -> TokenList {
    let mut out = TokenList::new();
    for token in &tokens {
        if token.range.line_span() == 0 || !token.value.contains('\n') {
            out.push(token.clone());
            continue;
        }
        let mut line = token.range.start.line;
        let mut column = token.range.start.column;
        for segment in token.value.split('\n') {
            if !segment.is_empty() {
                let start = Position::new(line, column);
                let end = Position::new(line, column + segment.chars().count() as u32);
                out.push(Token::new(
                    segment,
                    token.kind,
                    token.prop,
                    Region::new(start, end),
                ));
            }
            line += 1;
            column = 0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds_and_values(source: &str) -> Vec<(TokenKind, String)> {
        let out = lex(source, false);
        out.tokens
            .iter()
            .map(|t| (t.kind, t.value.clone()))
            .collect()
    }

    fn error_messages(source: &str) -> Vec<String> {
        lex(source, false)
            .errors
            .into_iter()
            .map(|d| d.message)
            .collect()
    }

    #[test]
    fn test_minimal_schema_tokens() {
        let tokens = kinds_and_values("config A { x: string; }");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Keyword, "config".into()),
                (TokenKind::Identifier, "A".into()),
                (TokenKind::Punctuator, "{".into()),
                (TokenKind::Identifier, "x".into()),
                (TokenKind::Punctuator, ":".into()),
                (TokenKind::Type, "string".into()),
                (TokenKind::Punctuator, ";".into()),
                (TokenKind::Punctuator, "}".into()),
            ]
        );
    }

    #[test]
    fn test_keyword_boundary() {
        // `config_foo` is an identifier, not `config` + identifier
        let tokens = kinds_and_values("config_foo");
        assert_eq!(tokens, vec![(TokenKind::Identifier, "config_foo".into())]);
    }

    #[test]
    fn test_string_literals() {
        let out = lex(r#""hello" R"x(raw)x""#, false);
        let tokens = out.tokens.tokens();
        assert_eq!(tokens[0].kind, TokenKind::String);
        assert_eq!(
            tokens[0].prop,
            Some(TypeDescriptor::String(StringKind::Basic))
        );
        assert_eq!(tokens[1].value, r#"R"x(raw)x""#);
        assert_eq!(tokens[1].prop, Some(TypeDescriptor::String(StringKind::Raw)));
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_multiline_string_via_continuation() {
        let out = lex("x = \"abc\ndef\";", false);
        let strings: Vec<_> = out
            .tokens
            .iter()
            .filter(|t| t.kind == TokenKind::String)
            .collect();
        assert_eq!(strings.len(), 1);
        assert_eq!(strings[0].value, "\"abc\ndef\"");
        assert_eq!(
            strings[0].prop,
            Some(TypeDescriptor::String(StringKind::MultiLineBasic))
        );
        assert_eq!(strings[0].range.line_span(), 1);
    }

    #[test]
    fn test_unterminated_string() {
        let msgs = error_messages("config A { x: string = \"abc\n; y: number; }");
        assert!(
            msgs.iter()
                .any(|m| m == "String literal or quoted identifier is not closed."),
            "missing unclosed-string error: {:?}",
            msgs
        );
    }

    #[test]
    fn test_raw_tag_boundary() {
        // 16-character tag is fine
        let tag16 = "abcdefghijklmnop";
        let src = format!("R\"{t}(body){t}\"", t = tag16);
        assert!(lex(&src, false).errors.is_empty());

        // 17 characters is an error
        let tag17 = "abcdefghijklmnopq";
        let src = format!("R\"{t}(body){t}\"", t = tag17);
        let msgs: Vec<String> = lex(&src, false).errors.into_iter().map(|d| d.message).collect();
        assert!(
            msgs.iter().any(|m| m.contains("exceeds maximum length")),
            "{:?}",
            msgs
        );
    }

    #[test]
    fn test_quoted_identifier_decoded() {
        let out = lex("`my key`: string;", false);
        assert_eq!(out.tokens[0].kind, TokenKind::Identifier);
        assert_eq!(out.tokens[0].value, "my key");
    }

    #[test]
    fn test_datetime_literals() {
        let out = lex("2024-02-29\n10:30:00\n2024-02-29T10:30:00Z", false);
        let props: Vec<_> = out.tokens.iter().map(|t| t.prop).collect();
        assert_eq!(
            props,
            vec![
                Some(TypeDescriptor::DateTime(DateTimeKind::LocalDate)),
                Some(TypeDescriptor::DateTime(DateTimeKind::LocalTime)),
                Some(TypeDescriptor::DateTime(DateTimeKind::OffsetDateTime)),
            ]
        );
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_datetime_with_space_separator() {
        let out = lex("2024-02-29 10:30:00", false);
        assert_eq!(out.tokens.len(), 1);
        assert_eq!(
            out.tokens[0].prop,
            Some(TypeDescriptor::DateTime(DateTimeKind::LocalDateTime))
        );
    }

    #[test]
    fn test_invalid_calendar_date() {
        let msgs = error_messages("2023-02-29");
        assert!(
            msgs.iter().any(|m| m.contains("not a valid calendar date")),
            "{:?}",
            msgs
        );
    }

    #[test]
    fn test_durations() {
        let out = lex("P1Y2M PT5H 30s 10ms", false);
        assert!(out.tokens.iter().all(|t| t.kind == TokenKind::Duration));
        assert_eq!(out.tokens.len(), 4);
    }

    #[test]
    fn test_duration_trailing_letter() {
        let msgs = error_messages("5sx");
        assert!(
            msgs.iter().any(|m| m.contains("invalid suffix")),
            "{:?}",
            msgs
        );
    }

    #[test]
    fn test_numbers() {
        let out = lex("0 42 1_000 0x1F 3.25 1e10", false);
        let props: Vec<_> = out.tokens.iter().map(|t| t.prop).collect();
        assert_eq!(
            props,
            vec![
                Some(TypeDescriptor::Integer),
                Some(TypeDescriptor::Integer),
                Some(TypeDescriptor::Integer),
                Some(TypeDescriptor::Integer),
                Some(TypeDescriptor::Float),
                Some(TypeDescriptor::Float),
            ]
        );
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_zero_dot_is_not_a_float() {
        let tokens = kinds_and_values("0.");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Number, "0".into()),
                (TokenKind::Operator, ".".into()),
            ]
        );
    }

    #[test]
    fn test_grouping_warnings() {
        assert!(lex("1_000_000", false).warnings.is_empty());
        assert!(lex("1_00_000", false).warnings.is_empty()); // lakh-style middle 2s, final 3
        assert!(!lex("1_0", false).warnings.is_empty());
        assert!(!lex("1_2_3", false).warnings.is_empty());
        assert!(!lex("1_00_0", false).warnings.is_empty());

        // 0x_1 is a valid number with a grouping warning
        let out = lex("0x_1", false);
        assert_eq!(out.tokens.len(), 1);
        assert_eq!(out.tokens[0].kind, TokenKind::Number);
        assert_eq!(out.warnings.len(), 1);
        assert!(out.errors.is_empty());
    }

    #[test]
    fn test_special_numbers() {
        let out = lex("nan inf", false);
        assert_eq!(
            out.tokens[0].prop,
            Some(TypeDescriptor::SpecialNumber(SpecialNumberKind::NaN))
        );
        assert_eq!(
            out.tokens[1].prop,
            Some(TypeDescriptor::SpecialNumber(SpecialNumberKind::Infinity))
        );
        // boundary: `infx` is an identifier
        let tokens = kinds_and_values("infx");
        assert_eq!(tokens, vec![(TokenKind::Identifier, "infx".into())]);
    }

    #[test]
    fn test_unknown_run_flushes_on_recognized_token() {
        let out = lex("$foo", false);
        let tokens = out.tokens.tokens();
        assert_eq!(tokens[0].kind, TokenKind::Unknown);
        assert_eq!(tokens[0].value, "$");
        assert_eq!(tokens[1].kind, TokenKind::Identifier);
        assert_eq!(tokens[1].value, "foo");
        assert!(out.errors.iter().any(|e| e.message == "Unknown token: $."));
    }

    #[test]
    fn test_unknown_run_coalesces() {
        let out = lex("$$$ x", false);
        assert_eq!(out.tokens[0].value, "$$$");
        assert_eq!(out.errors.len(), 1);
    }

    #[test]
    fn test_operators_longest_match() {
        let tokens = kinds_and_values("== != <= >= && || << >> < > = !");
        assert!(tokens.iter().all(|(k, _)| *k == TokenKind::Operator));
        assert_eq!(tokens.len(), 12);
    }

    #[test]
    fn test_arrow_is_punctuator() {
        let tokens = kinds_and_values("a => b");
        assert_eq!(tokens[1], (TokenKind::Punctuator, "=>".into()));
    }

    #[test]
    fn test_comments_preserved_only_on_request() {
        assert_eq!(kinds_and_values("// hi\nx"), vec![(TokenKind::Identifier, "x".into())]);
        let out = lex("// hi\nx", true);
        assert_eq!(out.tokens[0].kind, TokenKind::Comment);
        assert_eq!(out.tokens[0].value, "// hi");
    }

    #[test]
    fn test_stray_carriage_return() {
        let msgs = error_messages(" \r \nx");
        assert!(
            msgs.iter().any(|m| m == "Line ending is not valid."),
            "{:?}",
            msgs
        );
    }

    #[test]
    fn test_positions_cover_source() {
        let out = lex("config A {\n  x: string;\n}", false);
        let tokens = out.tokens.tokens();
        for pair in tokens.windows(2) {
            assert!(
                pair[0].range.end <= pair[1].range.start,
                "overlapping tokens: {:?} / {:?}",
                pair[0],
                pair[1]
            );
        }
        assert_eq!(tokens[3].range.start, Position::new(1, 2)); // `x`
    }

    #[test]
    fn test_multiline_token_splitting() {
        let out = lex_with_options("x = \"ab\ncd\";", false, false);
        let strings: Vec<_> = out
            .tokens
            .iter()
            .filter(|t| t.kind == TokenKind::String)
            .collect();
        assert_eq!(strings.len(), 2);
        assert_eq!(strings[0].value, "\"ab");
        assert_eq!(strings[1].value, "cd\"");
        assert_eq!(strings[1].range.start, Position::new(1, 0));
    }

    #[test]
    fn test_any_types() {
        let tokens = kinds_and_values("any{} any[]");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Type, "any{}".into()),
                (TokenKind::Type, "any[]".into()),
            ]
        );
    }

    #[test]
    fn test_wildcard_keyword() {
        let tokens = kinds_and_values("*: string;");
        assert_eq!(tokens[0], (TokenKind::Keyword, "*".into()));
    }
}
