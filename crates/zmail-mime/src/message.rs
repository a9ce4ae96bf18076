//! MIME message structure and handling.

use crate::address::{Address, parse_addresses};
use crate::charset::decode_text;
use crate::content_type::ContentType;
use crate::decoder::Decoder;
use crate::defect::Defect;
use crate::disposition::{ContentDisposition, DispositionKind};
use crate::encoder::Encoder;
use crate::encoding::TransferEncoding;
use crate::error::Result;
use crate::header::{Header, Headers};
use crate::options::CharsetPolicy;
use chrono::{DateTime, FixedOffset};
use std::borrow::Cow;

/// Body of a MIME part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// A leaf payload, transfer-decoded.
    Single(Vec<u8>),
    /// Child parts of a `multipart/*` part.
    Multipart {
        /// Children in order.
        parts: Vec<Part>,
        /// Text before the first delimiter, if any.
        preamble: Option<Vec<u8>>,
        /// Text after the close delimiter, if any.
        epilogue: Option<Vec<u8>>,
    },
    /// An encapsulated `message/rfc822`.
    Message(Box<Message>),
}

impl Default for Body {
    fn default() -> Self {
        Self::Single(Vec::new())
    }
}

/// MIME message part.
///
/// Content-Type, Content-Transfer-Encoding and Content-Disposition live in
/// typed fields; the encoder regenerates those headers from them and skips
/// any copies left in `headers`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Part {
    /// Part headers, in wire order.
    pub headers: Headers,
    /// Content type.
    pub content_type: ContentType,
    /// Transfer encoding to use; `None` lets the encoder choose.
    pub transfer_encoding: Option<TransferEncoding>,
    /// Content disposition.
    pub disposition: Option<ContentDisposition>,
    /// Part body.
    pub body: Body,
    /// Problems found while decoding this part.
    pub defects: Vec<Defect>,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub fn new(content_type: ContentType, body: Body) -> Self {
        Self {
            content_type,
            body,
            ..Self::default()
        }
    }

    /// Creates a `text/plain; charset=utf-8` part.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::new(
            ContentType::text_plain(),
            Body::Single(text.into().into_bytes()),
        )
    }

    /// Creates a `text/html; charset=utf-8` part.
    #[must_use]
    pub fn html(html: impl Into<String>) -> Self {
        Self::new(
            ContentType::text_html(),
            Body::Single(html.into().into_bytes()),
        )
    }

    /// Creates an attachment part.
    #[must_use]
    pub fn attachment(
        data: impl Into<Vec<u8>>,
        content_type: ContentType,
        filename: impl Into<String>,
    ) -> Self {
        let mut part = Self::new(content_type, Body::Single(data.into()));
        part.disposition = Some(ContentDisposition::attachment().with_filename(filename));
        part
    }

    /// Creates a `multipart/<sub_type>` part.
    #[must_use]
    pub fn multipart(sub_type: &str, parts: Vec<Self>) -> Self {
        Self::new(
            ContentType::multipart(sub_type),
            Body::Multipart {
                parts,
                preamble: None,
                epilogue: None,
            },
        )
    }

    /// Creates a `message/rfc822` part wrapping a message.
    #[must_use]
    pub fn message(message: Message) -> Self {
        Self::new(ContentType::message_rfc822(), Body::Message(Box::new(message)))
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.add(name, value);
        self
    }

    /// Requests a transfer encoding.
    #[must_use]
    pub fn with_transfer_encoding(mut self, encoding: TransferEncoding) -> Self {
        self.transfer_encoding = Some(encoding);
        self
    }

    /// Sets the content disposition.
    #[must_use]
    pub fn with_disposition(mut self, disposition: ContentDisposition) -> Self {
        self.disposition = Some(disposition);
        self
    }

    /// Returns the charset parameter if present.
    #[must_use]
    pub fn charset(&self) -> Option<&str> {
        self.content_type.charset()
    }

    /// Returns the filename from the disposition, or the legacy `name`
    /// content type parameter.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.disposition
            .as_ref()
            .and_then(ContentDisposition::filename)
            .or_else(|| self.content_type.name())
    }

    /// Returns the Content-ID without angle brackets.
    #[must_use]
    pub fn content_id(&self) -> Option<&str> {
        self.headers.get("content-id").map(strip_angle_brackets)
    }

    /// Returns true if the part is declared as an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.disposition
            .as_ref()
            .is_some_and(ContentDisposition::is_attachment)
    }

    /// Returns the leaf payload, or `None` for multipart and message parts.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Single(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the child parts; empty unless multipart.
    #[must_use]
    pub fn parts(&self) -> &[Self] {
        match &self.body {
            Body::Multipart { parts, .. } => parts,
            _ => &[],
        }
    }

    /// Decodes the payload as text with the default charset policy.
    ///
    /// Returns `None` for non-leaf parts. Never fails: undecodable octets
    /// are replaced.
    #[must_use]
    pub fn body_text(&self) -> Option<String> {
        let data = self.payload()?;
        decode_text(data, self.charset(), &CharsetPolicy::default(), false).ok()
    }

    /// Decodes the payload as text under an explicit policy.
    ///
    /// # Errors
    ///
    /// In strict mode, returns an error for unknown charsets and malformed
    /// sequences.
    pub fn body_text_with(&self, policy: &CharsetPolicy, strict: bool) -> Result<Option<String>> {
        self.payload()
            .map(|data| decode_text(data, self.charset(), policy, strict))
            .transpose()
    }

    /// Returns this part and all its descendants, depth first.
    ///
    /// Encapsulated messages are not entered.
    #[must_use]
    pub fn walk(&self) -> Vec<&Self> {
        let mut out = vec![self];
        for child in self.parts() {
            out.extend(child.walk());
        }
        out
    }

    /// Returns the defects of this part and all its descendants.
    #[must_use]
    pub fn all_defects(&self) -> Vec<&Defect> {
        let mut out: Vec<&Defect> = self.defects.iter().collect();
        for child in self.parts() {
            out.extend(child.all_defects());
        }
        if let Body::Message(message) = &self.body {
            out.extend(message.root.all_defects());
        }
        out
    }
}

fn strip_angle_brackets(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(s)
}

/// Which body of the message a leaf is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    /// The plain text body.
    Text,
    /// The HTML body.
    Html,
}

/// Flattened, read-only view of a leaf part.
#[derive(Debug, Clone)]
pub struct MailPart<'a> {
    /// The underlying part.
    pub part: &'a Part,
    /// `type/subtype`.
    pub mime_type: String,
    /// Charset parameter.
    pub charset: Option<String>,
    /// Filename as declared.
    pub filename: Option<String>,
    /// Filename safe to use on a local filesystem.
    pub sanitized_filename: Option<String>,
    /// Disposition kind.
    pub disposition: Option<DispositionKind>,
    /// Content-ID without angle brackets.
    pub content_id: Option<String>,
    /// Set when this leaf is the text or HTML body.
    pub is_body: Option<BodyKind>,
}

impl MailPart<'_> {
    /// Returns the transfer-decoded payload.
    #[must_use]
    pub fn payload(&self) -> Option<&[u8]> {
        self.part.payload()
    }

    /// Returns the payload decoded as text.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        self.part.body_text()
    }
}

/// Reduces a filename to a single path component without characters that
/// are unsafe on common filesystems.
#[must_use]
pub fn sanitize_filename(filename: &str) -> Option<String> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_control() || "<>:\"|?*".contains(c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    (!cleaned.is_empty()).then(|| cleaned.to_string())
}

/// MIME message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    /// The top-level part; its headers are the message headers.
    pub root: Part,
}

impl From<Part> for Message {
    fn from(root: Part) -> Self {
        Self { root }
    }
}

impl Message {
    /// Creates a message from its top-level part.
    #[must_use]
    pub const fn new(root: Part) -> Self {
        Self { root }
    }

    /// Parses a message with the default, fail-soft options.
    ///
    /// # Errors
    ///
    /// Returns an error if the top-level header block is malformed.
    pub fn parse(data: &[u8]) -> Result<Self> {
        Decoder::default().decode(data)
    }

    /// Encodes the message with the default options.
    ///
    /// # Errors
    ///
    /// Returns an error if no collision-free boundary could be found.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Encoder::default().encode(self)
    }

    /// Returns the message headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// Returns the message headers for modification.
    pub const fn headers_mut(&mut self) -> &mut Headers {
        &mut self.root.headers
    }

    /// Returns true if this is a multipart message.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        matches!(self.root.body, Body::Multipart { .. })
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<Cow<'_, str>> {
        self.root.headers.header("subject").map(Header::text)
    }

    /// Gets the first From address.
    #[must_use]
    pub fn from(&self) -> Option<Address> {
        self.addresses("from").into_iter().next()
    }

    /// Gets the To addresses.
    #[must_use]
    pub fn to(&self) -> Vec<Address> {
        self.addresses("to")
    }

    /// Gets the Cc addresses.
    #[must_use]
    pub fn cc(&self) -> Vec<Address> {
        self.addresses("cc")
    }

    /// Gets the Reply-To addresses.
    #[must_use]
    pub fn reply_to(&self) -> Vec<Address> {
        self.addresses("reply-to")
    }

    /// Gets the addresses of every header with the given name.
    ///
    /// Display names are decoded after the list has been split, so encoded
    /// commas cannot break an address apart.
    #[must_use]
    pub fn addresses(&self, name: &str) -> Vec<Address> {
        self.root
            .headers
            .iter()
            .filter(|h| h.is(name))
            .flat_map(|h| parse_addresses(&h.wire_text()))
            .collect()
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<DateTime<FixedOffset>> {
        let text = self.root.headers.get("date")?;
        DateTime::parse_from_rfc2822(text.trim()).ok()
    }

    /// Gets the Message-ID without angle brackets.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.root.headers.get("message-id").map(strip_angle_brackets)
    }

    /// Returns the leaves as [`MailPart`] views, in document order.
    ///
    /// The first inline `text/plain` and `text/html` leaves are marked as
    /// the message bodies.
    #[must_use]
    pub fn mail_parts(&self) -> Vec<MailPart<'_>> {
        let mut text_seen = false;
        let mut html_seen = false;
        self.root
            .walk()
            .into_iter()
            .filter(|p| !matches!(p.body, Body::Multipart { .. }))
            .map(|part| {
                let inline = !part.is_attachment() && part.filename().is_none();
                let is_body = if inline && part.content_type.is("text", "plain") && !text_seen {
                    text_seen = true;
                    Some(BodyKind::Text)
                } else if inline && part.content_type.is("text", "html") && !html_seen {
                    html_seen = true;
                    Some(BodyKind::Html)
                } else {
                    None
                };
                let filename = part.filename().map(ToString::to_string);
                MailPart {
                    part,
                    mime_type: part.content_type.mime_type(),
                    charset: part.charset().map(ToString::to_string),
                    sanitized_filename: filename.as_deref().and_then(sanitize_filename),
                    filename,
                    disposition: part.disposition.as_ref().map(|d| d.kind.clone()),
                    content_id: part.content_id().map(ToString::to_string),
                    is_body,
                }
            })
            .collect()
    }

    /// Finds the plain text body.
    #[must_use]
    pub fn text_part(&self) -> Option<&Part> {
        self.body_part(BodyKind::Text)
    }

    /// Finds the HTML body.
    #[must_use]
    pub fn html_part(&self) -> Option<&Part> {
        self.body_part(BodyKind::Html)
    }

    fn body_part(&self, kind: BodyKind) -> Option<&Part> {
        self.mail_parts()
            .into_iter()
            .find(|p| p.is_body == Some(kind))
            .map(|p| p.part)
    }

    /// Returns the plain text body decoded as text.
    #[must_use]
    pub fn body_text(&self) -> Option<String> {
        self.text_part().and_then(Part::body_text)
    }

    /// Returns every leaf that is not one of the message bodies.
    #[must_use]
    pub fn attachments(&self) -> Vec<&Part> {
        self.mail_parts()
            .into_iter()
            .filter(|p| p.is_body.is_none())
            .map(|p| p.part)
            .collect()
    }
}
