//! Key/value parsing for ENV and LABEL instructions.

use regex::Regex;

lazy_static::lazy_static! {
    /// Whitespace-separated tokens, keeping quoted spans intact.
    static ref ASSIGNMENT_TOKEN: Regex =
        Regex::new(r#"(?:[^\s"']+|"[^"]*"|'[^']*')+"#).unwrap();
}

/// Parse the value of an ENV or LABEL instruction into ordered pairs.
///
/// Handles the modern `KEY=VALUE ...` form and the legacy `KEY VALUE` form.
/// A trailing bare key with no value is dropped. Duplicate keys are kept in
/// encounter order; callers merge them last-write-wins.
pub fn parse_assignments(value: &str) -> Vec<(String, String)> {
    let tokens: Vec<&str> = ASSIGNMENT_TOKEN
        .find_iter(value)
        .map(|m| m.as_str())
        .collect();

    let mut pairs = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i];
        if let Some((key, rest)) = token.split_once('=') {
            if !key.is_empty() {
                pairs.push((key.to_string(), strip_quotes(rest).to_string()));
            }
            i += 1;
        } else if let Some(next) = tokens.get(i + 1) {
            pairs.push((token.to_string(), strip_quotes(next).to_string()));
            i += 2;
        } else {
            i += 1;
        }
    }

    pairs
}

/// Remove one pair of matching surrounding quotes.
pub fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}
