//! Header parameters (`; key=value`), including RFC 2231 extended values.

use crate::charset::decode_text;
use crate::encoding::decode_rfc2047;
use crate::options::CharsetPolicy;
use std::fmt;
use std::fmt::Write as _;

/// Characters that force a parameter value to be quoted (RFC 2045 tspecials).
const TSPECIALS: &str = "()<>@,;:\\\"/[]?=";

/// Ordered parameter list with case-insensitive keys.
///
/// Keys are stored lowercased. Setting an existing key replaces its value
/// in place, so output order follows insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Parameters {
    entries: Vec<(String, String)>,
}

impl Parameters {
    /// Creates an empty parameter list.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Gets a parameter value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a parameter, replacing any existing value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into().to_ascii_lowercase();
        let value = value.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Removes a parameter.
    pub fn remove(&mut self, key: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(key));
    }

    /// Returns an iterator over `(key, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Splits on `sep` outside quoted strings.
fn split_unquoted(s: &str, sep: char) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == sep && !in_quotes => {
                pieces.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&s[start..]);
    pieces
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    let Some(inner) = value.strip_prefix('"') else {
        return value.to_string();
    };
    let inner = inner.strip_suffix('"').unwrap_or(inner);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn percent_decode(s: &str) -> Vec<u8> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_digit(bytes[i + 1]), hex_digit(bytes[i + 2])) {
                out.push((hi << 4) | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn hex_digit(b: u8) -> Option<u8> {
    char::from(b).to_digit(16).and_then(|d| u8::try_from(d).ok())
}

/// One `name*N*=value` piece of an RFC 2231 parameter.
struct Segment {
    index: usize,
    extended: bool,
    value: String,
}

/// Splits `name*N*` into the base name, segment index and extended flag.
fn split_key(key: &str) -> (String, Option<usize>, bool) {
    let (key, extended) = key
        .strip_suffix('*')
        .map_or((key, false), |k| (k, true));
    if let Some((base, index)) = key.rsplit_once('*') {
        if let Ok(index) = index.parse::<usize>() {
            return (base.to_ascii_lowercase(), Some(index), extended);
        }
    }
    (key.to_ascii_lowercase(), None, extended)
}

fn assemble(mut segments: Vec<Segment>, policy: &CharsetPolicy) -> String {
    segments.sort_by_key(|s| s.index);
    let mut charset: Option<String> = None;
    let mut bytes = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        if segment.extended {
            let mut value = segment.value.as_str();
            if i == 0 {
                let mut pieces = value.splitn(3, '\'');
                if let (Some(cs), Some(_lang), Some(rest)) =
                    (pieces.next(), pieces.next(), pieces.next())
                {
                    if !cs.is_empty() {
                        charset = Some(cs.to_string());
                    }
                    value = rest;
                }
            }
            bytes.extend_from_slice(&percent_decode(value));
        } else {
            bytes.extend_from_slice(segment.value.as_bytes());
        }
    }
    decode_text(&bytes, charset.as_deref(), policy, false)
        .unwrap_or_else(|_| String::from_utf8_lossy(&bytes).into_owned())
}

/// Parses `value; key=value; ...` into the leading value and its parameters.
pub(crate) fn parse_header_params(header: &str) -> (String, Parameters) {
    let policy = CharsetPolicy::default();
    let mut pieces = split_unquoted(header, ';').into_iter();
    let head = pieces.next().unwrap_or_default().trim().to_string();

    let mut params = Parameters::new();
    // Extended parameters, keyed by base name, in order of first appearance.
    let mut extended: Vec<(String, Vec<Segment>)> = Vec::new();

    for piece in pieces {
        let Some((key, value)) = piece.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        let (base, index, is_extended) = split_key(key);
        if index.is_none() && !is_extended {
            let mut value = unquote(value);
            if base != "boundary" && value.contains("=?") {
                if let Ok((decoded, _)) = decode_rfc2047(&value, &policy, false) {
                    value = decoded;
                }
            }
            params.set(base, value);
            continue;
        }
        let segment = Segment {
            index: index.unwrap_or(0),
            extended: is_extended,
            value: unquote(value),
        };
        match extended.iter_mut().find(|(name, _)| *name == base) {
            Some((_, segments)) => segments.push(segment),
            None => extended.push((base, vec![segment])),
        }
    }

    for (name, segments) in extended {
        // An extended value wins over a plain one of the same name.
        params.set(name, assemble(segments, &policy));
    }

    (head, params)
}

fn is_attr_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$&+-.^_`|~".contains(&b)
}

impl fmt::Display for Parameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in &self.entries {
            if !value.is_ascii() || value.chars().any(|c| c.is_ascii_control()) {
                write!(f, "; {key}*=utf-8''")?;
                for &b in value.as_bytes() {
                    if is_attr_char(b) {
                        f.write_char(char::from(b))?;
                    } else {
                        write!(f, "%{b:02X}")?;
                    }
                }
            } else if value.is_empty()
                || value.contains(|c: char| c.is_whitespace() || TSPECIALS.contains(c))
            {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "; {key}=\"{escaped}\"")?;
            } else {
                write!(f, "; {key}={value}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let (head, params) = parse_header_params("text/plain; charset=utf-8; format=flowed");
        assert_eq!(head, "text/plain");
        assert_eq!(params.get("charset"), Some("utf-8"));
        assert_eq!(params.get("FORMAT"), Some("flowed"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_parse_quoted_with_semicolon() {
        let (_, params) = parse_header_params(r#"attachment; filename="a;b \"c\".txt""#);
        assert_eq!(params.get("filename"), Some(r#"a;b "c".txt"#));
    }

    #[test]
    fn test_parse_rfc2231() {
        let (_, params) =
            parse_header_params("attachment; filename*=utf-8''%C3%A4%C3%B6%C3%BC.pdf");
        assert_eq!(params.get("filename"), Some("äöü.pdf"));
    }

    #[test]
    fn test_parse_rfc2231_continuations() {
        let (_, params) = parse_header_params(
            "attachment; filename*1=\"part.txt\"; filename*0*=iso-8859-1'fr'r%E9");
        assert_eq!(params.get("filename"), Some("répart.txt"));
    }

    #[test]
    fn test_parse_rfc2047_in_quoted_value() {
        let (_, params) =
            parse_header_params("attachment; filename=\"=?utf-8?B?w6TDtsO8LnBkZg==?=\"");
        assert_eq!(params.get("filename"), Some("äöü.pdf"));
    }

    #[test]
    fn test_display_quotes_and_encodes() {
        let mut params = Parameters::new();
        params.set("boundary", "=_abc");
        params.set("name", "plain.txt");
        params.set("filename", "äöü.pdf");
        assert_eq!(
            params.to_string(),
            "; boundary=\"=_abc\"; name=plain.txt; filename*=utf-8''%C3%A4%C3%B6%C3%BC.pdf"
        );
    }

    #[test]
    fn test_display_parse_agree() {
        let mut params = Parameters::new();
        params.set("filename", "my \"report\" (final).pdf");
        params.set("title", "résumé");
        let (_, parsed) = parse_header_params(&format!("attachment{params}"));
        assert_eq!(parsed, params);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut params = Parameters::new();
        params.set("a", "1");
        params.set("b", "2");
        params.set("A", "3");
        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
        params.remove("a");
        assert_eq!(params.len(), 1);
    }
}
