//! Escaping of generated character data.
//!
//! Predefined entities are handled by [`quick_xml::escape`]. On top of that
//! the encoders can write every non-ASCII character as a decimal character
//! reference, which keeps the output readable in any ASCII compatible
//! encoding.

use std::borrow::Cow;

use quick_xml::escape::escape;

/// Like [`quick_xml::escape::escape`], but when `numeric_refs` is set also writes every non-ASCII
/// character as a decimal character reference (`&#233;`).
pub fn escape_with(raw: &str, numeric_refs: bool) -> Cow<str> {
    let escaped = escape(raw);
    if numeric_refs {
        match to_numeric_refs(&escaped) {
            Cow::Borrowed(_) => escaped,
            Cow::Owned(refs) => Cow::Owned(refs),
        }
    } else {
        escaped
    }
}

/// Replaces every non-ASCII character with a decimal character reference.
pub fn to_numeric_refs(text: &str) -> Cow<str> {
    if text.is_ascii() {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            out.push_str("&#");
            out.push_str(&(c as u32).to_string());
            out.push(';');
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quick_xml::escape::unescape;

    #[test]
    fn predefined_only() {
        assert_eq!(escape_with("café <1> & 'x'", false), "café &lt;1&gt; &amp; &apos;x&apos;");
        assert!(matches!(escape_with("plain", false), Cow::Borrowed(_)));
    }

    #[test]
    fn numeric() {
        assert_eq!(escape_with("café <1>", true), "caf&#233; &lt;1&gt;");
        assert_eq!(escape_with("\u{1F600}", true), "&#128512;");
        assert!(matches!(escape_with("plain", true), Cow::Borrowed(_)));
    }

    #[test]
    fn numeric_refs_read_back() {
        assert_eq!(unescape(&escape_with("ü & ☺", true)).unwrap(), "ü & ☺");
    }
}
