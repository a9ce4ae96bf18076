//! MIME header handling.

use crate::address::{Address, format_addresses, parse_address_header};
use crate::defect::Defect;
use crate::encoding::{decode_rfc2047, encode_base64, encode_words};
use crate::error::{Error, Result};
use crate::options::{DecodeOptions, EncodeOptions, MAX_LINE_OCTETS};
use std::borrow::Cow;
use std::fmt;

/// Headers whose value is an address list.
const ADDRESS_HEADERS: &[&str] = &[
    "from",
    "to",
    "cc",
    "bcc",
    "reply-to",
    "sender",
    "resent-from",
    "resent-to",
    "resent-cc",
    "resent-bcc",
    "resent-sender",
];

/// Octets per encoded-word when re-encoding raw 8-bit header bytes.
const RAW_WORD_OCTETS: usize = 39;

/// A decoded header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// Unfolded text with encoded-words decoded.
    Text(String),
    /// Octets that were not valid UTF-8, kept as received.
    Raw(Vec<u8>),
}

impl HeaderValue {
    /// Returns the text, or `None` for raw values.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Raw(_) => None,
        }
    }

    /// Returns the text, decoding raw octets lossily.
    #[must_use]
    pub fn to_text_lossy(&self) -> Cow<'_, str> {
        match self {
            Self::Text(text) => Cow::Borrowed(text),
            Self::Raw(bytes) => String::from_utf8_lossy(bytes),
        }
    }
}

impl From<String> for HeaderValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for HeaderValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// A single header field.
///
/// Headers read from the wire remember their unfolded wire text so that
/// structured values (addresses, parameters) can be re-parsed before
/// encoded-words are decoded, and so they re-encode unchanged.
#[derive(Debug, Clone)]
pub struct Header {
    name: String,
    value: HeaderValue,
    wire: Option<String>,
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.value == other.value
    }
}

impl Eq for Header {}

impl Header {
    /// Creates a header from decoded text.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: HeaderValue::Text(value.into()),
            wire: None,
        }
    }

    /// Creates a header holding raw octets.
    #[must_use]
    pub fn raw(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: HeaderValue::Raw(bytes.into()),
            wire: None,
        }
    }

    /// Creates a header from already-encoded wire text.
    ///
    /// The text is written out as-is when it is plain ASCII; its decoded
    /// form becomes the value.
    #[must_use]
    pub fn from_wire(name: impl Into<String>, wire: impl Into<String>) -> Self {
        let wire = wire.into();
        let text = decode_rfc2047(&wire, &DecodeOptions::default().charset, false)
            .map_or_else(|_| wire.clone(), |(text, _)| text);
        Self {
            name: name.into(),
            value: HeaderValue::Text(text),
            wire: Some(wire),
        }
    }

    /// Returns the field name as written.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the decoded value.
    #[must_use]
    pub const fn value(&self) -> &HeaderValue {
        &self.value
    }

    /// Returns the decoded value as text, lossily for raw values.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        self.value.to_text_lossy()
    }

    /// Returns the unfolded wire text if known, otherwise the decoded text.
    #[must_use]
    pub fn wire_text(&self) -> Cow<'_, str> {
        self.wire
            .as_deref()
            .map_or_else(|| self.text(), Cow::Borrowed)
    }

    /// Returns true if the name matches, ignoring case.
    #[must_use]
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    fn is_address_list(&self) -> bool {
        ADDRESS_HEADERS.iter().any(|h| self.is(h))
    }

    fn address_list(&self) -> Option<Vec<Address>> {
        if !self.is_address_list() {
            return None;
        }
        parse_address_header(&self.wire_text())
    }

    /// Produces the unfolded value to write.
    fn wire_value(&self, charset: &str) -> String {
        if let Some(wire) = &self.wire {
            if wire.is_ascii() && !wire.bytes().any(|b| b.is_ascii_control() && b != b'\t') {
                return wire.clone();
            }
        }
        match &self.value {
            HeaderValue::Text(text) => {
                let text = text.replace("\r\n", " ").replace(['\r', '\n'], " ");
                // Surrounding whitespace does not survive unfolding.
                let text = text.trim_matches([' ', '\t']);
                if self.is_address_list() {
                    if let Some(list) = parse_address_header(text) {
                        return format_addresses(&list, charset);
                    }
                }
                encode_unstructured(text, charset)
            }
            HeaderValue::Raw(bytes) if bytes.is_ascii() => String::from_utf8_lossy(bytes)
                .replace(|c: char| c.is_ascii_control() && c != '\t', " "),
            HeaderValue::Raw(bytes) => bytes
                .chunks(RAW_WORD_OCTETS)
                .map(|chunk| format!("=?unknown-8bit?B?{}?=", encode_base64(chunk)))
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    /// Formats the header as folded wire lines joined by CRLF, without the
    /// final CRLF. Never produces a line longer than 998 octets.
    #[must_use]
    pub fn to_wire(&self, opts: &EncodeOptions) -> String {
        let line = join_field(&self.name, &self.wire_value(&opts.header_charset));
        if let Some(folded) = fold(&line, opts.max_line_length) {
            return folded;
        }
        // An unbreakable run is too long; encoded-words can always be split.
        // Addresses themselves must stay outside encoded-words.
        let charset = &opts.header_charset;
        let value = match self.address_list() {
            Some(list) => list
                .iter()
                .map(|address| address.to_header_words(charset))
                .collect::<Vec<_>>()
                .join(", "),
            None => encode_words(&self.text(), charset),
        };
        let line = join_field(&self.name, &value);
        fold(&line, opts.max_line_length).unwrap_or(line)
    }
}

fn join_field(name: &str, value: &str) -> String {
    if value.is_empty() {
        format!("{name}:")
    } else {
        format!("{name}: {value}")
    }
}

fn is_wsp(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

fn word_needs_encoding(word: &str) -> bool {
    !word.is_ascii()
        || (word.contains("=?") && word.contains("?="))
        || word.chars().any(|c| c.is_ascii_control())
}

/// Encodes the words of unstructured text that cannot be sent as-is.
///
/// Consecutive words needing encoding share one run of encoded-words so
/// the whitespace between them survives decoding.
fn encode_unstructured(text: &str, charset: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut run = String::new();
    let mut gap = String::new();

    let mut rest = text;
    while !rest.is_empty() {
        let split = rest
            .find(|c: char| (c == ' ' || c == '\t') != rest.starts_with([' ', '\t']))
            .unwrap_or(rest.len());
        let (token, tail) = rest.split_at(split);
        rest = tail;

        if token.starts_with([' ', '\t']) {
            if run.is_empty() {
                out.push_str(token);
            } else {
                gap.push_str(token);
            }
        } else if word_needs_encoding(token) {
            run.push_str(&gap);
            gap.clear();
            run.push_str(token);
        } else {
            if !run.is_empty() {
                out.push_str(&encode_words(&run, charset));
                run.clear();
            }
            out.push_str(&gap);
            gap.clear();
            out.push_str(token);
        }
    }
    if !run.is_empty() {
        out.push_str(&encode_words(&run, charset));
    }
    out.push_str(&gap);
    out
}

/// Folds a header line at whitespace so lines stay within `max` octets
/// where possible.
///
/// Returns `None` if some unbreakable run would exceed the 998-octet limit.
pub(crate) fn fold(line: &str, max: usize) -> Option<String> {
    let mut out = String::with_capacity(line.len() + 8);
    let mut rest = line;
    // Never break between the colon and the first word of the value.
    let mut min = line.find(':').map_or(1, |colon| colon + 2);

    while rest.len() > max {
        let bytes = rest.as_bytes();
        let mut before = None;
        let mut after = None;
        let mut seen_text = false;
        for (i, &b) in bytes.iter().enumerate() {
            if is_wsp(b) && seen_text && i >= min && bytes.get(i + 1).is_some_and(|&n| !is_wsp(n))
            {
                if i <= max {
                    before = Some(i);
                } else {
                    after = Some(i);
                    break;
                }
            }
            seen_text |= !is_wsp(b);
        }
        let Some(at) = before.or(after) else {
            break;
        };
        if at > MAX_LINE_OCTETS {
            return None;
        }
        out.push_str(&rest[..at]);
        out.push_str("\r\n");
        rest = &rest[at..];
        min = 1;
    }

    if rest.len() > MAX_LINE_OCTETS {
        return None;
    }
    out.push_str(rest);
    Some(out)
}

/// Ordered collection of header fields.
///
/// Lookups ignore case; order and duplicates are preserved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<Header>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push(Header::new(name, value));
    }

    /// Appends a header field.
    pub fn push(&mut self, header: Header) {
        self.fields.push(header);
    }

    /// Sets a header value, replacing any existing values.
    ///
    /// The first existing field keeps its position.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.replace(Header::new(name, value));
    }

    /// Replaces all fields named like `header` with it.
    pub fn replace(&mut self, header: Header) {
        match self.fields.iter().position(|h| h.is(&header.name)) {
            Some(index) => {
                let name = header.name.clone();
                self.fields[index] = header;
                let mut seen = false;
                self.fields.retain(|h| {
                    if !h.is(&name) {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.fields.push(header),
        }
    }

    /// Gets the first text value for a header.
    ///
    /// Raw (non-UTF-8) values are not returned here; use
    /// [`Headers::header`].
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.header(name).and_then(|h| h.value.as_text())
    }

    /// Gets the first field with the given name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&Header> {
        self.fields.iter().find(|h| h.is(name))
    }

    /// Gets all text values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|h| h.is(name))
            .filter_map(|h| h.value.as_text())
            .collect()
    }

    /// Returns true if a field with this name exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.header(name).is_some()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|h| !h.is(name));
    }

    /// Returns an iterator over all fields in order.
    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.fields.iter()
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parses a header block.
    ///
    /// Parsing stops at the first empty line. Line endings may be CRLF or
    /// LF.
    ///
    /// # Errors
    ///
    /// Returns an error if the first line is not a header field.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Ok(parse_block(data, true, &DecodeOptions::default())?.headers)
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = &'a Header;
    type IntoIter = std::slice::Iter<'a, Header>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let opts = EncodeOptions::default();
        for header in &self.fields {
            write!(f, "{}\r\n", header.to_wire(&opts))?;
        }
        Ok(())
    }
}

/// A parsed header block and where the body begins.
#[derive(Debug)]
pub(crate) struct HeaderBlock {
    pub headers: Headers,
    pub body_start: usize,
    pub defects: Vec<Defect>,
}

/// Splits `name: value`, validating the field name.
fn split_field(line: &[u8]) -> Option<(&str, &[u8])> {
    let colon = line.iter().position(|&b| b == b':')?;
    let mut name = &line[..colon];
    while let [rest @ .., last] = name {
        if !is_wsp(*last) {
            break;
        }
        name = rest;
    }
    if name.is_empty() || !name.iter().all(|&b| (33..=126).contains(&b)) {
        return None;
    }
    let name = std::str::from_utf8(name).ok()?;
    Some((name, &line[colon + 1..]))
}

fn trim_wsp(mut bytes: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = bytes {
        if !is_wsp(*first) {
            break;
        }
        bytes = rest;
    }
    while let [rest @ .., last] = bytes {
        if !is_wsp(*last) {
            break;
        }
        bytes = rest;
    }
    bytes
}

fn finish_field(
    name: &str,
    raw: &[u8],
    opts: &DecodeOptions,
    defects: &mut Vec<Defect>,
) -> Result<Header> {
    let raw = trim_wsp(raw);
    match String::from_utf8(raw.to_vec()) {
        Ok(wire) => {
            let (text, damaged) = decode_rfc2047(&wire, &opts.charset, opts.strict)?;
            if damaged {
                defects.push(Defect::MalformedEncodedWord(wire.clone()));
            }
            Ok(Header {
                name: name.to_string(),
                value: HeaderValue::Text(text),
                wire: Some(wire),
            })
        }
        Err(err) => {
            if opts.strict {
                return Err(Error::Encoding(format!("header {name} is not valid UTF-8")));
            }
            tracing::debug!(name, "keeping non-UTF-8 header as raw octets");
            defects.push(Defect::NonUtf8Header(name.to_string()));
            Ok(Header::raw(name, err.into_bytes()))
        }
    }
}

/// Parses the header block at the start of `data`.
///
/// For the top-level message (`root`), a first line that is not a header
/// field is a structural error. Inside a multipart it only degrades the
/// part: the whole part becomes body. A malformed line after valid fields
/// ends the block and starts the body. Strict mode turns every such
/// recovery into an error.
pub(crate) fn parse_block(data: &[u8], root: bool, opts: &DecodeOptions) -> Result<HeaderBlock> {
    let mut headers = Headers::new();
    let mut defects = Vec::new();
    let mut current: Option<(&str, Vec<u8>)> = None;
    let mut body_start = data.len();
    let mut pos = 0;
    let mut line_no = 0;

    while pos < data.len() {
        let line_start = pos;
        let end = data[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(data.len(), |i| pos + i + 1);
        pos = end;
        line_no += 1;

        let mut line = &data[line_start..end];
        if let Some(stripped) = line.strip_suffix(b"\n") {
            line = stripped.strip_suffix(b"\r").unwrap_or(stripped);
        }

        if line.is_empty() {
            body_start = end;
            break;
        }
        if root && line_no == 1 && line.starts_with(b"From ") {
            continue;
        }

        if is_wsp(line[0]) {
            if let Some((_, value)) = &mut current {
                value.extend_from_slice(line);
                continue;
            }
        } else if let Some((name, value)) = split_field(line) {
            if let Some((name, raw)) = current.take() {
                headers.push(finish_field(name, &raw, opts, &mut defects)?);
            }
            current = Some((name, value.to_vec()));
            continue;
        }

        // Neither a field nor a continuation of one.
        let orphan = is_wsp(line[0]);
        if current.is_none() {
            if root || opts.strict {
                let reason = if orphan {
                    "continuation line before any header field"
                } else {
                    "expected a header field"
                };
                return Err(Error::structural(line_no, reason));
            }
            tracing::debug!(line = line_no, "part has no parseable headers");
            defects.push(if orphan {
                Defect::OrphanContinuation { line: line_no }
            } else {
                Defect::UnparseableHeaders
            });
        } else {
            if opts.strict {
                return Err(Error::structural(line_no, "expected a header field"));
            }
            tracing::debug!(line = line_no, "malformed header line starts the body");
            defects.push(Defect::InvalidHeaderLine { line: line_no });
        }
        body_start = line_start;
        break;
    }

    if let Some((name, raw)) = current.take() {
        headers.push(finish_field(name, &raw, opts, &mut defects)?);
    }

    Ok(HeaderBlock {
        headers,
        body_start,
        defects,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    fn block(data: &[u8]) -> HeaderBlock {
        parse_block(data, true, &DecodeOptions::default()).unwrap()
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        headers.add("X-Custom", "value1");
        headers.add("X-Custom", "value2");

        assert_eq!(headers.get("content-type"), Some("text/plain"));
        assert_eq!(headers.get_all("x-custom"), vec!["value1", "value2"]);
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn test_headers_set_keeps_position() {
        let mut headers = Headers::new();
        headers.add("A", "1");
        headers.add("B", "2");
        headers.add("a", "3");
        headers.set("A", "4");

        let names: Vec<&str> = headers.iter().map(Header::name).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(headers.get("a"), Some("4"));
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        headers.remove("SUBJECT");
        assert!(headers.get("Subject").is_none());
        assert!(headers.is_empty());
    }

    #[test]
    fn test_parse_unfolds() {
        let data = b"Subject: This is a\r\n long subject\r\nFrom: a@b.c\r\n\r\nbody";
        let b = block(data);
        assert_eq!(b.headers.get("subject"), Some("This is a long subject"));
        assert_eq!(b.headers.get("from"), Some("a@b.c"));
        assert_eq!(&data[b.body_start..], b"body");
        assert!(b.defects.is_empty());
    }

    #[test]
    fn test_parse_keeps_order_and_case() {
        let b = block(b"X-B: 1\nx-a: 2\nX-B: 3\n\n");
        let names: Vec<&str> = b.headers.iter().map(Header::name).collect();
        assert_eq!(names, vec!["X-B", "x-a", "X-B"]);
    }

    #[test]
    fn test_parse_decodes_encoded_words() {
        let b = block(b"Subject: =?utf-8?Q?Caf=C3=A9?=\r\n\r\n");
        assert_eq!(b.headers.get("Subject"), Some("Café"));
        let header = b.headers.header("subject").unwrap();
        assert_eq!(header.wire_text(), "=?utf-8?Q?Caf=C3=A9?=");
    }

    #[test]
    fn test_parse_skips_mbox_line() {
        let b = block(b"From someone@example.com Sat Jan  3 01:05:34 1996\nSubject: x\n\n");
        assert_eq!(b.headers.len(), 1);
    }

    #[test]
    fn test_parse_root_garbage_is_structural() {
        let err = parse_block(b"not a header\n\nbody", true, &DecodeOptions::default());
        assert!(matches!(err, Err(Error::Structural { line: 1, .. })));
        let err = parse_block(b" orphan\nSubject: x\n\n", true, &DecodeOptions::default());
        assert!(matches!(err, Err(Error::Structural { line: 1, .. })));
    }

    #[test]
    fn test_parse_part_garbage_degrades() {
        let b = parse_block(b"just text\n", false, &DecodeOptions::default()).unwrap();
        assert!(b.headers.is_empty());
        assert_eq!(b.body_start, 0);
        assert_eq!(b.defects, vec![Defect::UnparseableHeaders]);
    }

    #[test]
    fn test_parse_bad_line_starts_body() {
        let data = b"Subject: x\nthis is body\nmore\n";
        let b = block(data);
        assert_eq!(b.headers.len(), 1);
        assert_eq!(&data[b.body_start..], b"this is body\nmore\n");
        assert_eq!(b.defects, vec![Defect::InvalidHeaderLine { line: 2 }]);

        let strict = parse_block(data, true, &DecodeOptions::strict());
        assert!(matches!(strict, Err(Error::Structural { line: 2, .. })));
    }

    #[test]
    fn test_parse_non_utf8_is_raw() {
        let b = block(b"Subject: caf\xe9\n\n");
        let header = b.headers.header("subject").unwrap();
        assert_eq!(header.value(), &HeaderValue::Raw(b"caf\xe9".to_vec()));
        assert_eq!(b.defects, vec![Defect::NonUtf8Header("Subject".to_string())]);
        assert!(parse_block(b"Subject: caf\xe9\n\n", true, &DecodeOptions::strict()).is_err());
    }

    #[test]
    fn test_parse_without_blank_line() {
        let b = block(b"Subject: x");
        assert_eq!(b.headers.get("subject"), Some("x"));
        assert_eq!(b.body_start, 10);
    }

    #[test]
    fn test_fold_short_line_untouched() {
        assert_eq!(fold("Subject: hi", 78).unwrap(), "Subject: hi");
    }

    #[test]
    fn test_fold_long_line() {
        let line = format!("Subject: {}", "word ".repeat(40).trim_end());
        let folded = fold(&line, 78).unwrap();
        for l in folded.split("\r\n") {
            assert!(l.len() <= 78, "{l}");
        }
        assert_eq!(folded.replace("\r\n", ""), line);
    }

    #[test]
    fn test_fold_unbreakable_run() {
        let line = format!("X-Long: {}", "a".repeat(1200));
        assert!(fold(&line, 78).is_none());
    }

    #[test]
    fn test_to_wire_encodes_long_token() {
        let header = Header::new("X-Long", "a".repeat(1200));
        let wire = header.to_wire(&EncodeOptions::default());
        assert!(wire.split("\r\n").all(|l| l.len() <= MAX_LINE_OCTETS));
        let b = block(format!("{wire}\r\n\r\n").as_bytes());
        assert_eq!(b.headers.get("x-long"), Some("a".repeat(1200).as_str()));
    }

    #[test]
    fn test_to_wire_encodes_only_needed_words() {
        let header = Header::new("Subject", "Re: Café au lait");
        let wire = header.to_wire(&EncodeOptions::default());
        assert!(wire.starts_with("Subject: Re: =?utf-8?"), "{wire}");
        assert!(wire.ends_with("?= au lait"), "{wire}");
        let b = block(format!("{wire}\r\n\r\n").as_bytes());
        assert_eq!(b.headers.get("subject"), Some("Re: Café au lait"));
    }

    #[test]
    fn test_to_wire_adjacent_words_share_run() {
        let header = Header::new("Subject", "żółw żółw");
        let wire = header.to_wire(&EncodeOptions::default());
        let b = block(format!("{wire}\r\n\r\n").as_bytes());
        assert_eq!(b.headers.get("subject"), Some("żółw żółw"));
    }

    #[test]
    fn test_to_wire_address_list() {
        let header = Header::new("To", "léo <leo@foo.com>, bar@foo.com");
        let opts = EncodeOptions::default().with_header_charset("iso-8859-1");
        assert_eq!(
            header.to_wire(&opts),
            "To: =?iso-8859-1?Q?l=E9o?= <leo@foo.com>, bar@foo.com"
        );
    }

    #[test]
    fn test_to_wire_leaves_free_text_in_address_header() {
        let opts = EncodeOptions::default();
        assert_eq!(Header::new("To", "John Smith").to_wire(&opts), "To: John Smith");
        assert_eq!(
            Header::new("Cc", "team, b@example.com").to_wire(&opts),
            "Cc: team, b@example.com"
        );
    }

    #[test]
    fn test_to_wire_long_display_name_keeps_address_plain() {
        let name = "x".repeat(1200);
        let header = Header::new("To", format!("\"{name}\" <a@example.com>"));
        let wire = header.to_wire(&EncodeOptions::default());
        assert!(wire.split("\r\n").all(|l| l.len() <= MAX_LINE_OCTETS));
        assert!(wire.ends_with(" <a@example.com>"), "{wire}");
        assert!(!wire.contains("example.com?="));

        let list = crate::address::parse_addresses(&wire["To:".len()..].replace("\r\n", ""));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name(), Some(name.as_str()));
        assert_eq!(list[0].email(), "a@example.com");
    }

    #[test]
    fn test_to_wire_reuses_wire_text() {
        let header = Header::from_wire("Subject", "=?iso-8859-1?Q?l=E9o?=");
        assert_eq!(header.text(), "léo");
        assert_eq!(
            header.to_wire(&EncodeOptions::default()),
            "Subject: =?iso-8859-1?Q?l=E9o?="
        );
    }

    #[test]
    fn test_to_wire_strips_line_breaks() {
        let header = Header::new("Subject", "a\r\nBcc: evil@example.com");
        let wire = header.to_wire(&EncodeOptions::default());
        assert!(!wire.contains('\n'));
    }

    #[test]
    fn test_to_wire_raw_octets() {
        let header = Header::raw("Subject", b"caf\xe9".to_vec());
        let wire = header.to_wire(&EncodeOptions::default());
        assert_eq!(wire, "Subject: =?unknown-8bit?B?Y2Fm6Q==?=");
    }

    #[test]
    fn test_display() {
        let mut headers = Headers::new();
        headers.add("Subject", "Hi");
        headers.add("X-Empty", "");
        assert_eq!(headers.to_string(), "Subject: Hi\r\nX-Empty:\r\n");
    }
}
