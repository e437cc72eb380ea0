//! Path segments, slugs, and display names for generated pages.
//!
//! A nested table is addressed by the sequence of key segments from the
//! schema root. Wildcard children use the segment `*` (or `*[]` for
//! arrays of tables); display names replace those with a placeholder
//! derived from the parent segment.

/// Lowercase, alphanumeric-and-dash slug of one segment.
pub fn slugify(s: &str) -> String {
    if s == "*" {
        return "wildcard".to_string();
    }
    if s == "*[]" {
        return "wildcard-array".to_string();
    }
    if s == "[]" {
        return "array".to_string();
    }
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            out.push(c.to_ascii_lowercase());
        } else if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if c == '`' {
            continue;
        } else {
            out.push('-');
        }
    }
    let trimmed: String = out.trim_matches('-').to_string();
    if trimmed.is_empty() {
        "page".to_string()
    } else {
        trimmed
    }
}

/// `"bin-dependencies"` → `"binDependency"`: camel-cased, with a tiny
/// plural trim so placeholders read naturally.
fn lower_camel_alnum(s: &str) -> String {
    let mut out = String::new();
    let mut upper_next = false;
    for c in s.chars() {
        if c.is_ascii_alphanumeric() {
            let lower = c.to_ascii_lowercase();
            if out.is_empty() {
                out.push(lower);
            } else if upper_next {
                out.push(lower.to_ascii_uppercase());
                upper_next = false;
            } else {
                out.push(lower);
            }
        } else {
            upper_next = !out.is_empty();
        }
    }
    if out.len() > 1 && out.ends_with('s') {
        out.pop();
    }
    if out.is_empty() {
        "key".to_string()
    } else {
        out
    }
}

/// Placeholder identifier for a wildcard key under `parent_path`
/// (parent `services` → `<serviceKey>`).
pub fn dynamic_key_placeholder(parent_path: &[String]) -> String {
    let Some(base) = parent_path.last() else {
        return "<key>".to_string();
    };
    let base = base.strip_suffix("[]").unwrap_or(base);
    if base == "*" || base.is_empty() {
        return "<key>".to_string();
    }
    format!("<{}Key>", lower_camel_alnum(base))
}

/// Display form of one segment given the segments before it.
pub fn display_segment(prefix: &[String], segment: &str) -> String {
    if segment == "*" {
        return dynamic_key_placeholder(prefix);
    }
    if segment == "*[]" {
        return format!("{}[]", dynamic_key_placeholder(prefix));
    }
    segment.to_string()
}

/// Dotted display form of a full path.
pub fn display_path(path: &[String]) -> String {
    let mut segments = Vec::with_capacity(path.len());
    let mut prefix: Vec<String> = Vec::with_capacity(path.len());
    for segment in path {
        segments.push(display_segment(&prefix, segment));
        prefix.push(segment.clone());
    }
    segments.join(".")
}

/// Stable internal key of a path. Uses a delimiter that cannot occur in
/// key names or file names.
pub fn path_key(path: &[String]) -> String {
    path.join("\u{1f}")
}

/// File name of a table page under a (possibly disambiguated) schema slug.
pub fn page_file_for(schema_slug: &str, table_path: &[String]) -> String {
    let mut name = schema_slug.to_string();
    for segment in table_path {
        name.push('-');
        name.push_str(&slugify(segment));
    }
    name.push_str(".html");
    name
}

/// File name of a schema's root page.
pub fn schema_file_for(schema_slug: &str) -> String {
    format!("{}.html", schema_slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(segments: &[&str]) -> Vec<String> {
        segments.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("MySchema"), "myschema");
        assert_eq!(slugify("bin_deps"), "bin-deps");
        assert_eq!(slugify("*"), "wildcard");
        assert_eq!(slugify("*[]"), "wildcard-array");
        assert_eq!(slugify("services[]"), "services");
        assert_eq!(slugify("--"), "page");
    }

    #[test]
    fn test_dynamic_key_placeholder() {
        assert_eq!(dynamic_key_placeholder(&path(&["services"])), "<serviceKey>");
        assert_eq!(
            dynamic_key_placeholder(&path(&["targets[]"])),
            "<targetKey>"
        );
        assert_eq!(dynamic_key_placeholder(&[]), "<key>");
        assert_eq!(dynamic_key_placeholder(&path(&["*"])), "<key>");
    }

    #[test]
    fn test_display_path() {
        assert_eq!(
            display_path(&path(&["services", "*", "ports"])),
            "services.<serviceKey>.ports"
        );
        assert_eq!(display_path(&path(&["a", "b[]"])), "a.b[]");
    }

    #[test]
    fn test_page_files() {
        assert_eq!(schema_file_for("app"), "app.html");
        assert_eq!(
            page_file_for("app", &path(&["services", "*"])),
            "app-services-wildcard.html"
        );
    }
}
