//! MIME encoding and decoding utilities.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 header encoding.

use crate::charset::{decode_text, encode_text};
use crate::error::{Error, Result};
use crate::options::CharsetPolicy;
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use std::fmt;

/// Base64 engine that accepts missing padding and sloppy trailing bits.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Maximum encoded line length for body encodings (RFC 2045).
const MAX_LINE_LENGTH: usize = 76;

/// Maximum length of a single encoded-word (RFC 2047 section 2).
const MAX_ENCODED_WORD: usize = 75;

/// Transfer encoding types.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    #[default]
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
    /// Anything else; the payload is kept undecoded.
    Other(String),
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "" | "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::Other(s.to_string()),
        }
    }

    /// Returns true for the identity encodings.
    #[must_use]
    pub const fn is_identity(&self) -> bool {
        matches!(self, Self::SevenBit | Self::EightBit | Self::Binary)
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
            Self::Other(name) => write!(f, "{name}"),
        }
    }
}

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Encodes data as Base64 wrapped at 76 columns with CRLF line breaks.
#[must_use]
pub fn encode_base64_wrapped(data: &[u8]) -> Vec<u8> {
    let encoded = STANDARD.encode(data);
    let mut out = Vec::with_capacity(encoded.len() + encoded.len() / MAX_LINE_LENGTH * 2);
    for (i, chunk) in encoded.as_bytes().chunks(MAX_LINE_LENGTH).enumerate() {
        if i > 0 {
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(chunk);
    }
    out
}

/// Decodes Base64 data.
///
/// Whitespace and characters outside the alphabet are skipped, and padding
/// is optional. A dangling final character is dropped and reported.
///
/// # Errors
///
/// In strict mode, returns an error if anything had to be skipped or
/// dropped.
pub fn decode_base64(data: &[u8], strict: bool) -> Result<(Vec<u8>, bool)> {
    let mut cleaned: Vec<u8> = Vec::with_capacity(data.len());
    let mut damaged = false;
    for &b in data {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' => cleaned.push(b),
            b'=' | b' ' | b'\t' | b'\r' | b'\n' => {}
            _ => damaged = true,
        }
    }
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
        damaged = true;
    }
    if strict && damaged {
        return Err(Error::Encoding("invalid base64 payload".to_string()));
    }
    Ok((LENIENT.decode(&cleaned)?, damaged))
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

fn push_escaped(out: &mut Vec<u8>, b: u8) {
    out.extend_from_slice(&[b'=', HEX[usize::from(b >> 4)], HEX[usize::from(b & 0x0f)]]);
}

/// Encodes bytes using Quoted-Printable encoding (RFC 2045).
///
/// CRLF pairs become hard line breaks. Bare CR and LF are escaped so the
/// payload decodes to exactly the same octets.
#[must_use]
pub fn encode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() + data.len() / 8);
    let mut line_len = 0;
    let mut i = 0;

    while i < data.len() {
        let b = data[i];
        if b == b'\r' && data.get(i + 1) == Some(&b'\n') {
            out.extend_from_slice(b"\r\n");
            line_len = 0;
            i += 2;
            continue;
        }

        let at_line_end =
            i + 1 == data.len() || (data[i + 1] == b'\r' && data.get(i + 2) == Some(&b'\n'));
        let literal = match b {
            b'!'..=b'<' | b'>'..=b'~' => true,
            // Trailing whitespace would be stripped in transit.
            b' ' | b'\t' => !at_line_end,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // Leave room for the soft break '=' unless this ends the line.
        let limit = if at_line_end { MAX_LINE_LENGTH } else { MAX_LINE_LENGTH - 1 };
        if line_len + width > limit {
            out.extend_from_slice(b"=\r\n");
            line_len = 0;
        }

        if literal {
            out.push(b);
        } else {
            push_escaped(&mut out, b);
        }
        line_len += width;
        i += 1;
    }

    out
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks are removed and whitespace added by transports at the
/// end of lines is stripped. A stray `=` is kept literally and reported.
///
/// # Errors
///
/// In strict mode, returns an error for invalid escape sequences.
pub fn decode_quoted_printable(data: &[u8], strict: bool) -> Result<(Vec<u8>, bool)> {
    let mut out = Vec::with_capacity(data.len());
    let mut damaged = false;
    let mut i = 0;

    while i < data.len() {
        match data[i] {
            b'=' => {
                if let (Some(hi), Some(lo)) = (
                    data.get(i + 1).copied().and_then(hex_value),
                    data.get(i + 2).copied().and_then(hex_value),
                ) {
                    out.push((hi << 4) | lo);
                    i += 3;
                    continue;
                }
                // Soft line break, possibly padded with whitespace.
                let mut j = i + 1;
                while j < data.len() && matches!(data[j], b' ' | b'\t') {
                    j += 1;
                }
                if data[j..].starts_with(b"\r\n") {
                    i = j + 2;
                } else if data[j..].starts_with(b"\n") {
                    i = j + 1;
                } else if j == data.len() {
                    i = j;
                } else {
                    if strict {
                        return Err(Error::Encoding(
                            "invalid quoted-printable escape".to_string(),
                        ));
                    }
                    damaged = true;
                    out.push(b'=');
                    i += 1;
                }
            }
            b' ' | b'\t' => {
                let mut j = i;
                while j < data.len() && matches!(data[j], b' ' | b'\t') {
                    j += 1;
                }
                let line_end = j == data.len()
                    || data[j] == b'\n'
                    || data[j..].starts_with(b"\r\n");
                if !line_end {
                    out.extend_from_slice(&data[i..j]);
                }
                i = j;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }

    Ok((out, damaged))
}

/// Returns the Q-encoded form of `bytes` (RFC 2047 section 4.2).
fn q_encode(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() * 3);
    for &b in bytes {
        match b {
            b' ' => out.push(b'_'),
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'!' | b'*' | b'+' | b'-' | b'/' => {
                out.push(b);
            }
            _ => push_escaped(&mut out, b),
        }
    }
    out
}

fn q_decode(text: &str) -> Option<Vec<u8>> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b'=' => {
                let hi = hex_value(*bytes.get(i + 1)?)?;
                let lo = hex_value(*bytes.get(i + 2)?)?;
                out.push((hi << 4) | lo);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Some(out)
}

/// Encodes a header value using RFC 2047 encoding.
///
/// Format: `=?charset?encoding?encoded-text?=`
///
/// The text is encoded in `charset` when it can represent it, otherwise in
/// UTF-8. Q encoding is used unless more than a third of the octets need
/// escaping, in which case B is used. The result is split into as many
/// encoded-words as needed, separated by a space, without splitting a
/// character.
///
/// Text that needs no encoding is returned unchanged.
#[must_use]
pub fn encode_rfc2047(text: &str, charset: &str) -> String {
    if !needs_encoding(text) {
        return text.to_string();
    }
    encode_words(text, charset)
}

/// Always produces encoded-words, even for plain ASCII.
#[must_use]
pub(crate) fn encode_words(text: &str, charset: &str) -> String {
    let fits = encode_text(text, charset).is_some();
    let label = if fits {
        charset.trim().to_ascii_lowercase()
    } else {
        "utf-8".to_string()
    };
    let bytes_of = |s: &str| -> Vec<u8> {
        if fits {
            encode_text(s, &label).unwrap_or_else(|| s.as_bytes().to_vec())
        } else {
            s.as_bytes().to_vec()
        }
    };

    let mut words: Vec<String> = Vec::new();
    let mut chunk = String::new();
    for ch in text.chars() {
        let mut candidate = chunk.clone();
        candidate.push(ch);
        if !chunk.is_empty()
            && encode_word(&bytes_of(&candidate), &label).len() > MAX_ENCODED_WORD
        {
            words.push(encode_word(&bytes_of(&chunk), &label));
            chunk.clear();
        }
        chunk.push(ch);
    }
    if !chunk.is_empty() {
        words.push(encode_word(&bytes_of(&chunk), &label));
    }
    words.join(" ")
}

/// Q encoding while it stays readable, B once a third of the octets
/// would need escaping.
fn encode_word(bytes: &[u8], label: &str) -> String {
    let q = q_encode(bytes);
    let escaped = (q.len() - bytes.len()) / 2;
    if escaped * 3 > bytes.len() {
        format!("=?{label}?B?{}?=", STANDARD.encode(bytes))
    } else {
        format!("=?{label}?Q?{}?=", String::from_utf8_lossy(&q))
    }
}

/// Returns true if a header text must be written as encoded-words.
#[must_use]
pub fn needs_encoding(text: &str) -> bool {
    text.split_ascii_whitespace()
        .any(|w| !w.is_ascii() || (w.contains("=?") && w.contains("?=")))
        || text.chars().any(|c| c.is_ascii_control() && c != '\t')
}

/// One recognized `=?charset?enc?text?=` token.
struct EncodedWord<'a> {
    charset: &'a str,
    bytes: Vec<u8>,
}

fn parse_encoded_word(word: &str) -> Option<EncodedWord<'_>> {
    let inner = word.strip_prefix("=?")?.strip_suffix("?=")?;
    let mut parts = inner.splitn(3, '?');
    let charset = parts.next()?;
    let encoding = parts.next()?;
    let text = parts.next()?;
    if charset.is_empty() || text.contains('?') || text.contains(' ') {
        return None;
    }
    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);
    let bytes = match encoding {
        "B" | "b" => {
            let (bytes, damaged) = decode_base64(text.as_bytes(), false).ok()?;
            if damaged {
                return None;
            }
            bytes
        }
        "Q" | "q" => q_decode(text)?,
        _ => return None,
    };
    Some(EncodedWord { charset, bytes })
}

/// Finds the end of an encoded-word starting at `start`, if any.
fn encoded_word_end(s: &str, start: usize) -> Option<usize> {
    let rest = &s[start..];
    if !rest.starts_with("=?") {
        return None;
    }
    // Skip the charset and encoding sections, then find the closing "?=".
    let mut questions = 0;
    for (i, c) in rest.char_indices().skip(2) {
        if c == '?' {
            questions += 1;
            if questions >= 3 && rest[i..].starts_with("?=") {
                return Some(start + i + 2);
            }
        } else if c.is_whitespace() {
            return None;
        }
    }
    None
}

/// Decodes RFC 2047 encoded-words in a header value.
///
/// Whitespace between adjacent encoded-words is dropped and their octets
/// are joined before charset decoding, so characters split across words
/// survive. Malformed words are kept literally and reported in the second
/// element of the result.
///
/// # Errors
///
/// In strict mode, returns an error for malformed words, unknown charsets
/// and malformed sequences.
pub fn decode_rfc2047(text: &str, policy: &CharsetPolicy, strict: bool) -> Result<(String, bool)> {
    let mut out = String::with_capacity(text.len());
    let mut damaged = false;
    // Octets of adjacent encoded-words not yet converted to text.
    let mut pending: Option<(String, Vec<u8>)> = None;
    // Whitespace seen after the last encoded-word.
    let mut gap = String::new();

    let flush = |out: &mut String, pending: &mut Option<(String, Vec<u8>)>| -> Result<()> {
        if let Some((charset, bytes)) = pending.take() {
            out.push_str(&decode_text(&bytes, Some(&charset), policy, strict)?);
        }
        Ok(())
    };

    let mut i = 0;
    while i < text.len() {
        if let Some(end) = encoded_word_end(text, i) {
            let word = &text[i..end];
            if let Some(ew) = parse_encoded_word(word) {
                let same_charset = pending
                    .as_ref()
                    .is_some_and(|(charset, _)| charset.eq_ignore_ascii_case(ew.charset));
                if same_charset {
                    if let Some((_, bytes)) = &mut pending {
                        bytes.extend_from_slice(&ew.bytes);
                    }
                } else {
                    flush(&mut out, &mut pending)?;
                    pending = Some((ew.charset.to_string(), ew.bytes));
                }
                gap.clear();
                i = end;
                continue;
            }
            if strict {
                return Err(Error::Encoding(format!("malformed encoded-word {word}")));
            }
            damaged = true;
        }

        let c = text[i..].chars().next().unwrap_or_default();
        if c.is_whitespace() && pending.is_some() {
            gap.push(c);
        } else {
            flush(&mut out, &mut pending)?;
            out.push_str(&gap);
            gap.clear();
            out.push(c);
        }
        i += c.len_utf8().max(1);
    }
    flush(&mut out, &mut pending)?;
    out.push_str(&gap);

    Ok((out, damaged))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn decode_header(text: &str) -> String {
        decode_rfc2047(text, &CharsetPolicy::default(), false).unwrap().0
    }

    #[test]
    fn test_transfer_encoding_parse() {
        assert_eq!(TransferEncoding::parse("7bit"), TransferEncoding::SevenBit);
        assert_eq!(TransferEncoding::parse(" Base64 "), TransferEncoding::Base64);
        assert_eq!(
            TransferEncoding::parse("quoted-printable"),
            TransferEncoding::QuotedPrintable
        );
        assert_eq!(
            TransferEncoding::parse("x-uuencode"),
            TransferEncoding::Other("x-uuencode".to_string())
        );
    }

    #[test]
    fn test_base64_encode_decode() {
        let data = b"Hello, World!";
        let encoded = encode_base64(data);
        assert_eq!(encoded, "SGVsbG8sIFdvcmxkIQ==");

        let (decoded, damaged) = decode_base64(encoded.as_bytes(), true).unwrap();
        assert_eq!(decoded, data);
        assert!(!damaged);
    }

    #[test]
    fn test_base64_wrapped() {
        let encoded = encode_base64_wrapped(&[0u8; 100]);
        let lines: Vec<&[u8]> = encoded.split(|&b| b == b'\n').collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].len(), 77); // 76 + '\r'
    }

    #[test]
    fn test_base64_lenient() {
        let (decoded, damaged) = decode_base64(b"SGVs\r\nbG8\r\n", false).unwrap();
        assert_eq!(decoded, b"Hello");
        assert!(!damaged);

        let (decoded, damaged) = decode_base64(b"SGVs*bG8", false).unwrap();
        assert_eq!(decoded, b"Hello");
        assert!(damaged);
        assert!(decode_base64(b"SGVs*bG8", true).is_err());
    }

    #[test]
    fn test_quoted_printable_encode() {
        assert_eq!(encode_quoted_printable(b"Hello, World!"), b"Hello, World!");
        let encoded = encode_quoted_printable("Héllo".as_bytes());
        assert_eq!(encoded, b"H=C3=A9llo");
        assert_eq!(encode_quoted_printable(b"a=b"), b"a=3Db");
    }

    #[test]
    fn test_quoted_printable_trailing_space() {
        assert_eq!(encode_quoted_printable(b"end \r\nnext "), b"end=20\r\nnext=20");
    }

    #[test]
    fn test_quoted_printable_line_length() {
        let encoded = encode_quoted_printable(&[b'x'; 200]);
        for line in encoded.split(|&b| b == b'\n') {
            assert!(line.len() <= MAX_LINE_LENGTH + 1);
        }
        let (decoded, _) = decode_quoted_printable(&encoded, true).unwrap();
        assert_eq!(decoded, vec![b'x'; 200]);
    }

    #[test]
    fn test_quoted_printable_bare_newlines_survive() {
        let data = b"one\ntwo\rthree\r\n";
        let (decoded, _) = decode_quoted_printable(&encode_quoted_printable(data), true).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_quoted_printable_decode() {
        let (decoded, _) = decode_quoted_printable(b"H=C3=A9llo", true).unwrap();
        assert_eq!(decoded, "Héllo".as_bytes());
        let (decoded, _) = decode_quoted_printable(b"h=c3=a9", true).unwrap();
        assert_eq!(decoded, "hé".as_bytes());
    }

    #[test]
    fn test_quoted_printable_soft_line_break() {
        let (decoded, _) = decode_quoted_printable(b"Hello=\r\nWorld", true).unwrap();
        assert_eq!(decoded, b"HelloWorld");
        let (decoded, _) = decode_quoted_printable(b"Hello=  \nWorld", true).unwrap();
        assert_eq!(decoded, b"HelloWorld");
    }

    #[test]
    fn test_quoted_printable_strips_transport_padding() {
        let (decoded, _) = decode_quoted_printable(b"line   \r\nnext", true).unwrap();
        assert_eq!(decoded, b"line\r\nnext");
    }

    #[test]
    fn test_quoted_printable_stray_equals() {
        let (decoded, damaged) = decode_quoted_printable(b"1+1=2", false).unwrap();
        assert_eq!(decoded, b"1+1=2");
        assert!(damaged);
        assert!(decode_quoted_printable(b"1+1=2", true).is_err());
    }

    #[test]
    fn test_rfc2047_encode() {
        assert_eq!(encode_rfc2047("Hello", "utf-8"), "Hello");

        let encoded = encode_rfc2047("Héllo", "utf-8");
        assert!(encoded.starts_with("=?utf-8?"));
        assert!(encoded.ends_with("?="));
        assert_eq!(decode_header(&encoded), "Héllo");
    }

    #[test]
    fn test_rfc2047_encode_charset_fallback() {
        assert_eq!(encode_rfc2047("léo", "iso-8859-1"), "=?iso-8859-1?Q?l=E9o?=");
        assert!(encode_rfc2047("Māori", "iso-8859-1").starts_with("=?utf-8?"));
    }

    #[test]
    fn test_rfc2047_encode_long_text_splits() {
        let text = "Ünïcödé ".repeat(20);
        let encoded = encode_rfc2047(&text, "utf-8");
        for word in encoded.split(' ') {
            assert!(word.len() <= MAX_ENCODED_WORD, "{word}");
        }
        assert_eq!(decode_header(&encoded), text);
    }

    #[test]
    fn test_rfc2047_decode() {
        assert_eq!(decode_header("Hello"), "Hello");
        assert_eq!(decode_header("=?utf-8?B?SMOpbGxv?="), "Héllo");
        assert_eq!(decode_header("=?utf-8?Q?H=C3=A9llo?="), "Héllo");
        assert_eq!(decode_header("=?utf-8?Q?Caf=C3=A9?="), "Café");
    }

    #[test]
    fn test_rfc2047_adjacent_words() {
        assert_eq!(decode_header("=?utf-8?Q?a?= =?utf-8?Q?b?="), "ab");
        assert_eq!(decode_header("=?utf-8?Q?a?= b =?utf-8?Q?c?="), "a b c");
        assert_eq!(decode_header("Re: =?utf-8?Q?caf=C3=A9?= time"), "Re: café time");
    }

    #[test]
    fn test_rfc2047_split_multibyte() {
        // "é" split across two words.
        assert_eq!(decode_header("=?utf-8?Q?caf=C3?= =?utf-8?Q?=A9?="), "café");
    }

    #[test]
    fn test_rfc2047_language_suffix() {
        assert_eq!(decode_header("=?iso-8859-1*fr?Q?l=E9o?="), "léo");
    }

    #[test]
    fn test_rfc2047_malformed_kept() {
        let (text, damaged) =
            decode_rfc2047("=?utf-8?X?abc?=", &CharsetPolicy::default(), false).unwrap();
        assert_eq!(text, "=?utf-8?X?abc?=");
        assert!(damaged);
        assert!(decode_rfc2047("=?utf-8?X?abc?=", &CharsetPolicy::default(), true).is_err());
    }

    #[test]
    fn test_rfc2047_invalid_bytes_replaced() {
        assert_eq!(decode_header("=?utf-8?Q?caf=FF?="), "caf\u{fffd}");
    }
}
