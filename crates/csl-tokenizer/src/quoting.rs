//! Escape handling for basic strings and backtick-quoted identifiers.

/// Result of unescaping: the decoded text plus any malformed escapes found.
#[derive(Debug, Default)]
pub struct Unescaped {
    pub text: String,
    pub bad_escapes: Vec<String>,
}

/// Decode the escape sequences of a basic string or quoted identifier body.
///
/// Recognized escapes: `\a \b \t \n \v \f \r \" \' \? \\ \`` , octal
/// (1-3 digits), `\x` + hex, `\u` + 4 hex digits, `\U` + 8 hex digits.
/// An unrecognized escape `\c` decodes to `c`.
pub fn unescape(input: &str) -> Unescaped {
    let mut out = Unescaped::default();
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.text.push(ch);
            continue;
        }
        let Some(esc) = chars.next() else {
            out.bad_escapes.push("\\".to_string());
            out.text.push('\\');
            break;
        };
        match esc {
            'a' => out.text.push('\x07'),
            'b' => out.text.push('\x08'),
            't' => out.text.push('\t'),
            'n' => out.text.push('\n'),
            'v' => out.text.push('\x0b'),
            'f' => out.text.push('\x0c'),
            'r' => out.text.push('\r'),
            '"' => out.text.push('"'),
            '\'' => out.text.push('\''),
            '?' => out.text.push('?'),
            '\\' => out.text.push('\\'),
            '`' => out.text.push('`'),
            '0'..='7' => {
                // up to three octal digits, first already consumed
                let mut value = esc.to_digit(8).unwrap();
                for _ in 0..2 {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            chars.next();
                            value = value * 8 + d;
                        }
                        None => break,
                    }
                }
                match char::from_u32(value) {
                    Some(c) => out.text.push(c),
                    None => out.bad_escapes.push(format!("\\{:o}", value)),
                }
            }
            'x' => {
                let mut value = 0u32;
                let mut digits = 0;
                while digits < 2 {
                    match chars.peek().and_then(|c| c.to_digit(16)) {
                        Some(d) => {
                            chars.next();
                            value = value * 16 + d;
                            digits += 1;
                        }
                        None => break,
                    }
                }
                if digits == 0 {
                    out.bad_escapes.push("\\x".to_string());
                } else {
                    match char::from_u32(value) {
                        Some(c) => out.text.push(c),
                        None => out.bad_escapes.push(format!("\\x{:x}", value)),
                    }
                }
            }
            'u' => decode_unicode(&mut chars, 4, &mut out),
            'U' => decode_unicode(&mut chars, 8, &mut out),
            other => out.text.push(other),
        }
    }

    out
}

fn decode_unicode(
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    width: usize,
    out: &mut Unescaped,
) {
    let mut value = 0u32;
    let mut digits = 0;
    while digits < width {
        match chars.peek().and_then(|c| c.to_digit(16)) {
            Some(d) => {
                chars.next();
                value = value.saturating_mul(16).saturating_add(d);
                digits += 1;
            }
            None => break,
        }
    }
    let marker = if width == 4 { "\\u" } else { "\\U" };
    if digits != width {
        out.bad_escapes.push(marker.to_string());
        return;
    }
    match char::from_u32(value) {
        Some(c) => out.text.push(c),
        None => out.bad_escapes.push(format!("{}{:x}", marker, value)),
    }
}

/// Extract the identifier name from a quoted-identifier token's source text.
///
/// `` `name` `` decodes escapes; `` R`tag(name)tag` `` takes the raw body
/// between `(` and `)tag`. Anything else is returned as-is.
pub fn extract_quoted_identifier_content(text: &str) -> String {
    if let Some(body) = text
        .strip_prefix('`')
        .and_then(|rest| rest.strip_suffix('`'))
    {
        return unescape(body).text;
    }
    if let Some(rest) = text.strip_prefix("R`") {
        if let Some(tag_len) = rest.find('(') {
            let tag = &rest[..tag_len];
            let body = &rest[tag_len + 1..];
            let closer = format!("){}`", tag);
            if let Some(stripped) = body.strip_suffix(closer.as_str()) {
                return stripped.to_string();
            }
        }
    }
    text.to_string()
}

/// Scan the body of a basic string (quotes stripped) for malformed escapes.
pub fn check_escapes(body: &str) -> Vec<String> {
    unescape(body).bad_escapes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_escapes() {
        assert_eq!(unescape(r"a\tb\nc").text, "a\tb\nc");
        assert_eq!(unescape(r#"say \"hi\""#).text, "say \"hi\"");
        assert_eq!(unescape(r"back\\slash").text, "back\\slash");
    }

    #[test]
    fn test_unknown_escape_passes_through() {
        assert_eq!(unescape(r"\c\d").text, "cd");
        assert!(unescape(r"\c").bad_escapes.is_empty());
    }

    #[test]
    fn test_octal_and_hex() {
        assert_eq!(unescape(r"\101").text, "A");
        assert_eq!(unescape(r"\x41").text, "A");
        assert_eq!(unescape(r"\x4a").text, "J");
    }

    #[test]
    fn test_unicode_escapes() {
        assert_eq!(unescape("\\u0041").text, "A");
        assert_eq!(unescape("\\U0001F600").text, "\u{1F600}");
        assert_eq!(unescape("\\u00e9").text, "é");
    }

    #[test]
    fn test_malformed_unicode() {
        let u = unescape(r"\u12");
        assert_eq!(u.bad_escapes, vec!["\\u".to_string()]);
        let u = unescape(r"\x");
        assert_eq!(u.bad_escapes, vec!["\\x".to_string()]);
        // surrogate half is not a char
        let u = unescape(r"\ud800");
        assert_eq!(u.bad_escapes.len(), 1);
    }

    #[test]
    fn test_extract_quoted_identifier() {
        assert_eq!(extract_quoted_identifier_content("`my key`"), "my key");
        assert_eq!(extract_quoted_identifier_content(r"`a\`b`"), "a`b");
        assert_eq!(extract_quoted_identifier_content("R`x(weird)name)x`"), "weird)name");
        assert_eq!(extract_quoted_identifier_content("R`(plain)`"), "plain");
        assert_eq!(extract_quoted_identifier_content("bare"), "bare");
    }
}
