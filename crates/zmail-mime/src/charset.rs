//! Charset resolution and text decoding.

use crate::error::{Error, Result};
use crate::options::{CharsetPolicy, CharsetPrecedence, UnknownCharset};
use charset::Charset;
use encoding_rs::Encoding;

/// Outcome of resolving a charset for a payload.
#[derive(Debug, Clone, Copy)]
enum Resolved<'a> {
    /// A supported charset, and the length of a byte-order mark to skip.
    Known(Charset, usize),
    /// A label nobody recognizes.
    Unknown(&'a str),
}

/// Returns true if the label names a charset this crate can decode.
#[must_use]
pub fn is_known_charset(label: &str) -> bool {
    Charset::for_label(label.trim().as_bytes()).is_some()
}

fn is_utf8_label(label: &str) -> bool {
    matches!(
        label.trim().to_ascii_lowercase().as_str(),
        "utf-8" | "utf8" | "unicode-1-1-utf-8"
    )
}

fn is_ascii_label(label: &str) -> bool {
    matches!(
        label.trim().to_ascii_lowercase().as_str(),
        "us-ascii" | "ascii" | "ansi_x3.4-1968" | "iso646-us"
    )
}

fn resolve<'a>(
    declared: Option<&'a str>,
    payload: &[u8],
    policy: &'a CharsetPolicy,
) -> Resolved<'a> {
    let bom = Encoding::for_bom(payload);
    let non_ascii_utf8 = !payload.is_ascii() && std::str::from_utf8(payload).is_ok();

    if policy.precedence == CharsetPrecedence::Sniffed {
        if let Some((encoding, len)) = bom {
            return Resolved::Known(Charset::for_encoding(encoding), len);
        }
        if non_ascii_utf8 && !declared.is_some_and(is_utf8_label) {
            return Resolved::Known(Charset::for_encoding(encoding_rs::UTF_8), 0);
        }
    }

    match declared {
        Some(label) => match Charset::for_label(label.trim().as_bytes()) {
            Some(charset) => {
                // A BOM that agrees with the declaration is not content.
                let skip = match bom {
                    Some((encoding, len)) if Charset::for_encoding(encoding) == charset => len,
                    _ => 0,
                };
                Resolved::Known(charset, skip)
            }
            None => Resolved::Unknown(label),
        },
        None => {
            if let Some((encoding, len)) = bom {
                Resolved::Known(Charset::for_encoding(encoding), len)
            } else if std::str::from_utf8(payload).is_ok() {
                Resolved::Known(Charset::for_encoding(encoding_rs::UTF_8), 0)
            } else {
                Charset::for_label(policy.default_charset.as_bytes())
                    .map_or(Resolved::Unknown(&policy.default_charset), |cs| {
                        Resolved::Known(cs, 0)
                    })
            }
        }
    }
}

/// Decodes text in the given charset under a policy.
///
/// In fail-soft mode this never fails: malformed sequences become U+FFFD
/// and unknown charsets use [`CharsetPolicy::unknown`].
///
/// # Errors
///
/// In strict mode, returns [`Error::Encoding`] for unknown charsets and
/// malformed sequences.
pub fn decode_text(
    payload: &[u8],
    declared: Option<&str>,
    policy: &CharsetPolicy,
    strict: bool,
) -> Result<String> {
    match resolve(declared, payload, policy) {
        Resolved::Known(charset, skip) => {
            let (text, malformed) = charset.decode_without_bom_handling(&payload[skip..]);
            if malformed {
                if strict {
                    return Err(Error::Encoding(format!(
                        "malformed {} sequence",
                        charset.name()
                    )));
                }
                tracing::debug!(charset = charset.name(), "replaced malformed sequences");
            }
            Ok(text.into_owned())
        }
        Resolved::Unknown(label) => {
            if strict {
                return Err(Error::Encoding(format!("unknown charset {label:?}")));
            }
            tracing::debug!(label, fallback = ?policy.unknown, "unknown charset");
            Ok(match policy.unknown {
                UnknownCharset::Latin1 => charset::decode_latin1(payload).into_owned(),
                UnknownCharset::Utf8Lossy => String::from_utf8_lossy(payload).into_owned(),
            })
        }
    }
}

/// Returns true when the label table maps an ISO label onto the Windows
/// superset of that charset, as with `iso-8859-1` and `windows-1252`.
fn is_windows_superset(label: &str, encoding: &'static Encoding) -> bool {
    encoding
        .name()
        .strip_prefix("windows-")
        .is_some_and(|page| !label.contains(page))
}

/// Encodes text into the given charset.
///
/// Returns `None` when the charset is unknown, cannot be produced by an
/// encoder, or cannot represent every character of `text`. An ISO label is
/// held to the ISO repertoire even where decoding treats it as the Windows
/// superset, so `€` does not fit `iso-8859-1`.
#[must_use]
pub fn encode_text(text: &str, label: &str) -> Option<Vec<u8>> {
    if is_ascii_label(label) {
        return text.is_ascii().then(|| text.as_bytes().to_vec());
    }
    let label = label.trim();
    let encoding = Encoding::for_label(label.as_bytes())?;
    if encoding.output_encoding() != encoding {
        return None;
    }
    let (bytes, _, had_errors) = encoding.encode(text);
    if had_errors {
        return None;
    }
    // 0x80..=0x9F are C1 controls in the ISO charsets.
    if is_windows_superset(label, encoding) && bytes.iter().any(|b| (0x80..=0x9f).contains(b)) {
        return None;
    }
    Some(bytes.into_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn lenient(payload: &[u8], declared: Option<&str>) -> String {
        decode_text(payload, declared, &CharsetPolicy::default(), false).unwrap()
    }

    #[test]
    fn test_declared_latin1() {
        assert_eq!(lenient(b"caf\xe9", Some("iso-8859-1")), "café");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        assert_eq!(lenient(b"caf\xff", Some("utf-8")), "caf\u{fffd}");
    }

    #[test]
    fn test_invalid_utf8_strict_fails() {
        let err = decode_text(b"caf\xff", Some("utf-8"), &CharsetPolicy::default(), true);
        assert!(matches!(err, Err(Error::Encoding(_))));
    }

    #[test]
    fn test_unknown_charset_preserves_bytes() {
        let text = lenient(b"a\xe9\x80", Some("x-klingon"));
        let back: Vec<u8> = text.chars().map(|c| u8::try_from(u32::from(c)).unwrap()).collect();
        assert_eq!(back, b"a\xe9\x80");
    }

    #[test]
    fn test_unknown_charset_strict_fails() {
        assert!(decode_text(b"abc", Some("x-klingon"), &CharsetPolicy::default(), true).is_err());
    }

    #[test]
    fn test_undeclared_utf8_is_sniffed() {
        assert_eq!(lenient("żółw".as_bytes(), None), "żółw");
    }

    #[test]
    fn test_declared_wins_by_default() {
        // Valid UTF-8, but declared Latin-1.
        assert_eq!(lenient("é".as_bytes(), Some("iso-8859-1")), "Ã©");
    }

    #[test]
    fn test_sniffed_precedence() {
        let policy = CharsetPolicy {
            precedence: CharsetPrecedence::Sniffed,
            ..CharsetPolicy::default()
        };
        let text = decode_text("é".as_bytes(), Some("iso-8859-1"), &policy, false).unwrap();
        assert_eq!(text, "é");
    }

    #[test]
    fn test_matching_bom_is_stripped() {
        assert_eq!(lenient(b"\xef\xbb\xbfhi", Some("utf-8")), "hi");
    }

    #[test]
    fn test_encode_text() {
        assert_eq!(encode_text("léo", "iso-8859-1").unwrap(), b"l\xe9o");
        assert!(encode_text("Māori", "iso-8859-1").is_none());
        assert!(encode_text("léo", "us-ascii").is_none());
        assert_eq!(encode_text("leo", "us-ascii").unwrap(), b"leo");
        assert!(encode_text("x", "x-klingon").is_none());
    }

    #[test]
    fn test_encode_text_keeps_iso_repertoire() {
        assert!(encode_text("5 €", "iso-8859-1").is_none());
        assert!(encode_text("5 €", "latin1").is_none());
        assert!(encode_text("‘quoted’", "ISO-8859-1").is_none());
        assert_eq!(encode_text("5 €", "windows-1252").unwrap(), b"5 \x80");
        assert_eq!(encode_text("5 €", "cp1252").unwrap(), b"5 \x80");
        assert_eq!(encode_text("ÿ", "iso-8859-1").unwrap(), b"\xff");
    }

    #[test]
    fn test_malformed_text_strict_fails() {
        let policy = CharsetPolicy::default();
        let err = decode_text(b"ab\x82", Some("shift_jis"), &policy, true).unwrap_err();
        assert!(matches!(err, Error::Encoding(_)));
        assert!(decode_text(b"ab\x82", Some("shift_jis"), &policy, false).is_ok());
    }

    #[test]
    fn test_is_known_charset() {
        assert!(is_known_charset("UTF-8"));
        assert!(is_known_charset("iso-8859-15"));
        assert!(!is_known_charset("x-klingon"));
    }
}
