//! Tolerant percent decoding for PDF text runs and whitespace cleanup.

use std::sync::LazyLock;

use regex::Regex;

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("static pattern"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("static pattern"));

/// Percent-decode one text run without ever failing.
///
/// Tries a plain decode first. If the token holds `%` signs that do not
/// start a valid escape, those are escaped as `%25` and decoding is retried.
/// When neither attempt yields valid UTF-8 the token is returned as-is.
pub fn safe_decode_token(token: &str) -> String {
    if !token.contains('%') {
        return token.to_string();
    }

    if !has_orphan_percent(token) {
        if let Ok(decoded) = urlencoding::decode(token) {
            return decoded.into_owned();
        }
    }

    let escaped = escape_orphan_percents(token);
    match urlencoding::decode(&escaped) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => token.to_string(),
    }
}

/// Collapse runs of spaces/tabs and repeated newlines, then trim.
pub fn normalize_whitespace(text: &str) -> String {
    let collapsed = HORIZONTAL_WS.replace_all(text, " ");
    let collapsed = BLANK_LINES.replace_all(&collapsed, "\n");
    collapsed.trim().to_string()
}

fn is_escape_at(bytes: &[u8], i: usize) -> bool {
    bytes.len() > i + 2 && bytes[i + 1].is_ascii_hexdigit() && bytes[i + 2].is_ascii_hexdigit()
}

fn has_orphan_percent(token: &str) -> bool {
    let bytes = token.as_bytes();
    bytes
        .iter()
        .enumerate()
        .any(|(i, b)| *b == b'%' && !is_escape_at(bytes, i))
}

fn escape_orphan_percents(token: &str) -> String {
    let bytes = token.as_bytes();
    let mut out = String::with_capacity(token.len() + 4);
    for (i, ch) in token.char_indices() {
        if ch == '%' && !is_escape_at(bytes, i) {
            out.push_str("%25");
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_valid_escapes() {
        assert_eq!(safe_decode_token("Hello%20World"), "Hello World");
    }

    #[test]
    fn orphan_percent_survives() {
        assert_eq!(safe_decode_token("50%off"), "50%off");
        assert_eq!(safe_decode_token("100%"), "100%");
    }

    #[test]
    fn mixed_valid_and_orphan() {
        assert_eq!(safe_decode_token("50%%20off"), "50% off");
    }

    #[test]
    fn invalid_utf8_falls_back_to_raw() {
        assert_eq!(safe_decode_token("bad%FFbyte"), "bad%FFbyte");
    }

    #[test]
    fn plain_tokens_untouched() {
        assert_eq!(safe_decode_token("Total: $500"), "Total: $500");
    }

    #[test]
    fn whitespace_is_collapsed() {
        let raw = "  Item   A\t\tx2 \n\n\nTotal  500  ";
        assert_eq!(normalize_whitespace(raw), "Item A x2 \nTotal 500");
    }
}
