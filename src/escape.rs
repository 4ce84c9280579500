//! JSON string escaping straight into the output buffer.
//!
//! Nothing here allocates an escaped copy: unescaped runs are copied with a
//! single `push_str`, and each character that needs escaping is written in
//! place as it is found.

use std::fmt::{self, Write};

const HEX: [u8; 16] = *b"0123456789ABCDEF";

/// Appends `source` to `buf` as JSON string content (without the surrounding
/// quotes).
///
/// Quotation marks, reverse solidus and every control character below
/// U+0020 are escaped. `\n`, `\r` and `\t` use their short forms, the other
/// control characters use `\u00XX`.
pub fn quote(buf: &mut String, source: &str) {
    let bytes = source.as_bytes();
    let mut run_start = 0;

    for (i, &b) in bytes.iter().enumerate() {
        // Multi-byte UTF-8 sequences never contain bytes below 0x80, so
        // checking single bytes is enough to find everything to escape.
        if b >= 0x20 && b != b'"' && b != b'\\' {
            continue;
        }

        if run_start < i {
            buf.push_str(&source[run_start..i]);
        }
        push_escaped(buf, b);
        run_start = i + 1;
    }

    if run_start < bytes.len() {
        buf.push_str(&source[run_start..]);
    }
}

/// Same as [`quote`] restricted to `source[start..end]`.
///
/// Both offsets must lie on character boundaries.
#[inline]
pub fn quote_range(buf: &mut String, source: &str, start: usize, end: usize) {
    quote(buf, &source[start..end]);
}

/// Escapes the `Display` output of `value` into `buf`.
pub fn quote_display(buf: &mut String, value: &dyn fmt::Display) {
    // Writing into a String never fails, and `JsonEscaper` never reports
    // an error of its own.
    let _ = write!(JsonEscaper(buf), "{value}");
}

#[inline]
fn push_escaped(buf: &mut String, b: u8) {
    match b {
        b'"' => buf.push_str("\\\""),
        b'\\' => buf.push_str("\\\\"),
        b'\n' => buf.push_str("\\n"),
        b'\r' => buf.push_str("\\r"),
        b'\t' => buf.push_str("\\t"),
        _ => {
            buf.push_str("\\u00");
            buf.push(HEX[(b >> 4) as usize] as char);
            buf.push(HEX[(b & 0x0f) as usize] as char);
        }
    }
}

/// [`fmt::Write`] adapter escaping everything written through it.
///
/// Lets `Display` values be formatted directly into a JSON string body.
pub struct JsonEscaper<'b>(pub &'b mut String);

impl fmt::Write for JsonEscaper<'_> {
    #[inline]
    fn write_str(&mut self, s: &str) -> fmt::Result {
        quote(self.0, s);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn escaped(s: &str) -> String {
        let mut buf = String::new();
        quote(&mut buf, s);
        buf
    }

    #[test]
    fn plain_text_is_copied() {
        assert_eq!(escaped("hello"), "hello");
        assert_eq!(escaped(""), "");
        assert_eq!(escaped("café 日本語"), "café 日本語");
    }

    #[test]
    fn quotes_and_backslashes() {
        assert_eq!(escaped("say \"hi\""), r#"say \"hi\""#);
        assert_eq!(escaped("back\\slash"), r"back\\slash");
    }

    #[test]
    fn control_characters() {
        assert_eq!(escaped("a\nb"), r"a\nb");
        assert_eq!(escaped("\r\t"), r"\r\t");
        assert_eq!(escaped("\0"), r"\u0000");
        assert_eq!(escaped("\x08\x0c"), r"\u0008\u000C");
        assert_eq!(escaped("\x1f"), r"\u001F");
    }

    #[test]
    fn range_only_copies_the_slice() {
        let mut buf = String::from("x");
        quote_range(&mut buf, "ab\"cd", 1, 4);
        assert_eq!(buf, r#"xb\"c"#);
    }

    #[test]
    fn display_goes_through_escaping() {
        let mut buf = String::new();
        quote_display(&mut buf, &format_args!("{}\n{}", "line \"one\"", 2));
        assert_eq!(buf, r#"line \"one\"\n2"#);
    }

    proptest! {
        #[test]
        fn reparses_to_the_same_text(s in any::<String>()) {
            let mut doc = String::from("\"");
            quote(&mut doc, &s);
            doc.push('"');
            let parsed: String = serde_json::from_str(&doc).unwrap();
            prop_assert_eq!(parsed, s);
        }
    }
}
