//! Mail composition.
//!
//! [`build_mail`] assembles the MIME tree from bodies and files;
//! [`complete_mail`] adds the addressing headers and encodes the result.

use crate::attachment::{Attachment, EmbeddedFile};
use crate::error::{Error, Result};
use chrono::{DateTime, Local, Utc};
use rand::Rng;
use tracing::debug;
use zmail_mime::encoding::encode_rfc2047;
use zmail_mime::{
    Address, Body, ContentType, EncodeOptions, Encoder, Header, Message, Part, TransferEncoding,
    encode_text, format_addresses,
};

/// Message body text and the charset to send it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    /// Body text.
    pub text: String,
    /// Charset label; UTF-8 is used instead when it cannot hold the text.
    pub charset: String,
}

impl Content {
    /// Creates body content in the given charset.
    #[must_use]
    pub fn new(text: impl Into<String>, charset: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            charset: charset.into(),
        }
    }

    /// Creates UTF-8 body content.
    #[must_use]
    pub fn utf8(text: impl Into<String>) -> Self {
        Self::new(text, "utf-8")
    }
}

/// Converts bare CR and LF line endings to CRLF.
fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "\r\n")
}

fn text_part(content: &Content, sub_type: &str, quoted_printable: bool) -> Part {
    let text = normalize_newlines(&content.text);
    let (data, charset) = match encode_text(&text, &content.charset) {
        Some(data) => (data, content.charset.trim().to_ascii_lowercase()),
        None => {
            debug!(
                charset = %content.charset,
                "Body does not fit charset, using utf-8"
            );
            (text.into_bytes(), "utf-8".to_string())
        }
    };
    let content_type = ContentType::new("text", sub_type).with_parameter("charset", charset);
    let mut part = Part::new(content_type, Body::Single(data));
    if quoted_printable {
        part.transfer_encoding = Some(TransferEncoding::QuotedPrintable);
    }
    part
}

/// Builds the MIME tree of a mail.
///
/// The structure is
/// `multipart/mixed(multipart/related(multipart/alternative(text, html), embeddeds), attachments)`,
/// where each container only exists when it has something to group. With
/// neither text nor html, the body is an empty `text/plain; charset=us-ascii`
/// part.
#[must_use]
pub fn build_mail(
    text: Option<&Content>,
    html: Option<&Content>,
    attachments: &[Attachment],
    embeddeds: &[EmbeddedFile],
    quoted_printable: bool,
) -> Part {
    let text = text.map(|c| text_part(c, "plain", quoted_printable));
    let html = html.map(|c| text_part(c, "html", quoted_printable));

    let mut main = match (text, html) {
        (Some(text), Some(html)) => Part::multipart("alternative", vec![text, html]),
        (Some(part), None) | (None, Some(part)) => part,
        (None, None) => Part::new(ContentType::default(), Body::Single(Vec::new())),
    };

    if !embeddeds.is_empty() {
        let mut parts = vec![main];
        parts.extend(embeddeds.iter().map(EmbeddedFile::to_part));
        main = Part::multipart("related", parts);
    }

    if !attachments.is_empty() {
        let mut parts = vec![main];
        parts.extend(attachments.iter().map(Attachment::to_part));
        main = Part::multipart("mixed", parts);
    }

    main
}

/// Addressing and identification of a mail.
#[derive(Debug, Clone)]
pub struct Mail {
    /// Sender.
    pub sender: Address,
    /// Primary recipients.
    pub to: Vec<Address>,
    /// Carbon copy recipients.
    pub cc: Vec<Address>,
    /// Blind carbon copy recipients; never written to the headers.
    pub bcc: Vec<Address>,
    /// Subject line.
    pub subject: String,
    /// Charset for encoded-words in headers.
    pub charset: String,
    /// Text for a generated Message-ID; `None` writes no Message-ID.
    ///
    /// With an `@`, the part after it becomes the domain.
    pub message_id: Option<String>,
    /// Unix timestamp for the Date header; `None` means now.
    pub date: Option<i64>,
    /// Additional header fields, in order.
    pub headers: Vec<(String, String)>,
    /// Options for the final encoding.
    pub encode_options: EncodeOptions,
}

impl Mail {
    /// Creates a mail from a sender and subject, with UTF-8 headers.
    #[must_use]
    pub fn new(sender: Address, subject: impl Into<String>) -> Self {
        Self {
            sender,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            subject: subject.into(),
            charset: "utf-8".to_string(),
            message_id: None,
            date: None,
            headers: Vec::new(),
            encode_options: EncodeOptions::default(),
        }
    }

    /// Adds a recipient.
    #[must_use]
    pub fn to(mut self, recipient: Address) -> Self {
        self.to.push(recipient);
        self
    }

    /// Adds a CC recipient.
    #[must_use]
    pub fn cc(mut self, recipient: Address) -> Self {
        self.cc.push(recipient);
        self
    }

    /// Adds a BCC recipient.
    #[must_use]
    pub fn bcc(mut self, recipient: Address) -> Self {
        self.bcc.push(recipient);
        self
    }

    /// Sets the header charset.
    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = charset.into();
        self
    }

    /// Requests a generated Message-ID.
    #[must_use]
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Sets the Date header from a Unix timestamp.
    #[must_use]
    pub const fn with_date(mut self, timestamp: i64) -> Self {
        self.date = Some(timestamp);
        self
    }

    /// Adds a header field.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the encoder options.
    #[must_use]
    pub fn with_encode_options(mut self, options: EncodeOptions) -> Self {
        self.encode_options = options;
        self
    }

    /// Returns the SMTP recipients: to, then cc, then bcc.
    #[must_use]
    pub fn recipients(&self) -> Vec<String> {
        self.to
            .iter()
            .chain(&self.cc)
            .chain(&self.bcc)
            .map(|a| a.email().to_string())
            .collect()
    }
}

/// An encoded mail, ready for SMTP submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Encoded message.
    pub payload: Vec<u8>,
    /// Address for `MAIL FROM`.
    pub mail_from: String,
    /// Addresses for `RCPT TO`, including BCC recipients.
    pub rcpt_to: Vec<String>,
    /// The Message-ID written to the payload, with angle brackets.
    pub message_id: Option<String>,
}

fn single_line(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\r', '\n'], " ")
        .trim()
        .to_string()
}

fn validate_field_name(name: &str) -> Result<()> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_graphic() && b != b':') {
        return Err(Error::InvalidHeader(format!("bad field name {name:?}")));
    }
    Ok(())
}

fn format_date(timestamp: Option<i64>) -> Result<String> {
    let utc = match timestamp {
        Some(ts) => DateTime::<Utc>::from_timestamp(ts, 0)
            .ok_or_else(|| Error::InvalidHeader(format!("Date: timestamp {ts} out of range")))?,
        None => Utc::now(),
    };
    Ok(utc.with_timezone(&Local).to_rfc2822())
}

/// Generates `<time.pid.random.id@domain>`.
///
/// The domain comes from `id` when it contains `@`, otherwise it is
/// `localhost`.
#[must_use]
pub fn make_message_id(id: &str) -> String {
    let (id, domain) = id.rsplit_once('@').unwrap_or((id, "localhost"));
    let clean = |s: &str| -> String {
        s.chars()
            .filter(|c| c.is_ascii_graphic() && !"<>@\"()[]\\,;:".contains(*c))
            .collect()
    };
    let centis = Utc::now().timestamp_millis() / 10;
    let random: u32 = rand::thread_rng().r#gen();

    let mut local = format!("{centis}.{}.{random}", std::process::id());
    let id = clean(id);
    if !id.is_empty() {
        local.push('.');
        local.push_str(&id);
    }
    let domain = clean(domain);
    let domain = if domain.is_empty() { "localhost".to_string() } else { domain };
    format!("<{local}@{domain}>")
}

/// Adds From, To, Cc, Subject, Date, Message-ID and extra headers to
/// `part` and encodes it as a message.
///
/// BCC recipients only appear in [`Envelope::rcpt_to`].
///
/// # Errors
///
/// Returns an error if there are no recipients, a header name is invalid,
/// the date is out of range, or encoding fails.
pub fn complete_mail(mut part: Part, mail: &Mail) -> Result<Envelope> {
    let rcpt_to = mail.recipients();
    if rcpt_to.is_empty() {
        return Err(Error::InvalidAddress("No recipients specified".into()));
    }
    for (name, _) in &mail.headers {
        validate_field_name(name)?;
    }

    let charset = mail.charset.as_str();
    let headers = &mut part.headers;
    headers.remove("bcc");
    headers.replace(Header::from_wire(
        "From",
        format_addresses(std::slice::from_ref(&mail.sender), charset),
    ));
    if mail.to.is_empty() {
        headers.remove("to");
    } else {
        headers.replace(Header::from_wire("To", format_addresses(&mail.to, charset)));
    }
    if mail.cc.is_empty() {
        headers.remove("cc");
    } else {
        headers.replace(Header::from_wire("Cc", format_addresses(&mail.cc, charset)));
    }
    headers.replace(Header::from_wire(
        "Subject",
        encode_rfc2047(&single_line(&mail.subject), charset),
    ));
    headers.replace(Header::new("Date", format_date(mail.date)?));

    let message_id = mail.message_id.as_deref().map(make_message_id);
    if let Some(id) = &message_id {
        headers.replace(Header::new("Message-ID", id.as_str()));
    }

    for (name, value) in &mail.headers {
        headers.push(Header::from_wire(
            name.as_str(),
            encode_rfc2047(&single_line(value), charset),
        ));
    }

    let options = mail.encode_options.clone().with_header_charset(charset);
    let payload = Encoder::new(options).encode(&Message::new(part))?;

    debug!(
        recipients = rcpt_to.len(),
        bytes = payload.len(),
        message_id = message_id.as_deref().unwrap_or(""),
        "Composed mail"
    );

    Ok(Envelope {
        payload,
        mail_from: mail.sender.email().to_string(),
        rcpt_to,
        message_id,
    })
}

/// Builds and completes a mail in one step.
///
/// # Errors
///
/// Returns an error under the same conditions as [`complete_mail`].
pub fn compose_mail(
    mail: &Mail,
    text: Option<&Content>,
    html: Option<&Content>,
    attachments: &[Attachment],
    embeddeds: &[EmbeddedFile],
) -> Result<Envelope> {
    complete_mail(build_mail(text, html, attachments, embeddeds, false), mail)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    fn addr(email: &str) -> Address {
        Address::new(email).unwrap()
    }

    fn mime_types(part: &Part) -> Vec<String> {
        part.walk().iter().map(|p| p.content_type.mime_type()).collect()
    }

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\nb\r\nc\rd"), "a\r\nb\r\nc\r\nd");
        assert_eq!(normalize_newlines("plain"), "plain");
    }

    #[test]
    fn test_build_text_only() {
        let text = Content::new("Hello\nworld", "us-ascii");
        let part = build_mail(Some(&text), None, &[], &[], false);
        assert!(part.content_type.is("text", "plain"));
        assert_eq!(part.charset(), Some("us-ascii"));
        assert_eq!(part.payload(), Some(&b"Hello\r\nworld"[..]));
        assert_eq!(part.transfer_encoding, None);
    }

    #[test]
    fn test_build_empty() {
        let part = build_mail(None, None, &[], &[], false);
        assert!(part.content_type.is("text", "plain"));
        assert_eq!(part.charset(), Some("us-ascii"));
        assert_eq!(part.payload(), Some(&b""[..]));
    }

    #[test]
    fn test_build_alternative() {
        let part = build_mail(
            Some(&Content::utf8("text")),
            Some(&Content::utf8("<p>html</p>")),
            &[],
            &[],
            true,
        );
        assert_eq!(
            mime_types(&part),
            vec!["multipart/alternative", "text/plain", "text/html"]
        );
        assert_eq!(
            part.parts()[0].transfer_encoding,
            Some(TransferEncoding::QuotedPrintable)
        );
    }

    #[test]
    fn test_build_full_structure() {
        let attachments = vec![Attachment::new(b"PK".to_vec()).with_filename("a.zip")];
        let embeddeds = vec![EmbeddedFile::new(b"GIF89a".to_vec(), "logo")];
        let part = build_mail(
            Some(&Content::utf8("text")),
            Some(&Content::utf8("<img src=\"cid:logo\">")),
            &attachments,
            &embeddeds,
            false,
        );
        assert_eq!(
            mime_types(&part),
            vec![
                "multipart/mixed",
                "multipart/related",
                "multipart/alternative",
                "text/plain",
                "text/html",
                "application/octet-stream",
                "application/octet-stream",
            ]
        );
    }

    #[test]
    fn test_build_html_with_attachment() {
        let attachments = vec![Attachment::new(b"x".to_vec())];
        let part = build_mail(None, Some(&Content::utf8("<b>hi</b>")), &attachments, &[], false);
        assert_eq!(
            mime_types(&part),
            vec!["multipart/mixed", "text/html", "application/octet-stream"]
        );
    }

    #[test]
    fn test_charset_fallback() {
        let part = build_mail(Some(&Content::new("Māori", "iso-8859-1")), None, &[], &[], false);
        assert_eq!(part.charset(), Some("utf-8"));
        assert_eq!(part.payload(), Some("Māori".as_bytes()));

        let part = build_mail(Some(&Content::new("café", "ISO-8859-1")), None, &[], &[], false);
        assert_eq!(part.charset(), Some("iso-8859-1"));
        assert_eq!(part.payload(), Some(&b"caf\xe9"[..]));
    }

    #[test]
    fn test_make_message_id() {
        let id = make_message_id("zmail");
        assert!(id.starts_with('<'));
        assert!(id.ends_with(".zmail@localhost>"));
        assert_eq!(id.matches('@').count(), 1);

        let id = make_message_id("app@mail.example.com");
        assert!(id.ends_with(".app@mail.example.com>"));

        let id = make_message_id("");
        assert!(id.ends_with("@localhost>"));
        assert!(!id.contains("..@"));
    }

    #[test]
    fn test_complete_mail_headers() {
        let mail = Mail::new(Address::with_name("Me", "me@foo.com").unwrap(), "The subject")
            .to(Address::with_name("Him", "him@bar.com").unwrap())
            .cc(addr("her@bar.com"))
            .bcc(addr("secret@bar.com"))
            .with_date(1_313_558_269)
            .with_header("User-Agent", "zmail");
        let part = build_mail(Some(&Content::new("The text.", "us-ascii")), None, &[], &[], false);
        let envelope = complete_mail(part, &mail).unwrap();

        assert_eq!(envelope.mail_from, "me@foo.com");
        assert_eq!(
            envelope.rcpt_to,
            vec!["him@bar.com", "her@bar.com", "secret@bar.com"]
        );
        assert_eq!(envelope.message_id, None);

        let message = Message::parse(&envelope.payload).unwrap();
        assert_eq!(message.headers().get("from"), Some("Me <me@foo.com>"));
        assert_eq!(message.headers().get("to"), Some("Him <him@bar.com>"));
        assert_eq!(message.headers().get("cc"), Some("her@bar.com"));
        assert_eq!(message.subject().as_deref(), Some("The subject"));
        assert_eq!(message.headers().get("user-agent"), Some("zmail"));
        assert_eq!(message.date().unwrap().timestamp(), 1_313_558_269);
        assert!(!message.headers().contains("bcc"));
        assert!(!message.headers().contains("message-id"));
        assert_eq!(message.body_text().as_deref(), Some("The text."));
    }

    #[test]
    fn test_complete_mail_encodes_subject() {
        let mail = Mail::new(addr("me@foo.com"), "Café\r\nBcc: injected@evil.com")
            .to(addr("him@bar.com"))
            .with_charset("iso-8859-1")
            .with_message_id("zmail@foo.com");
        let envelope = complete_mail(build_mail(None, None, &[], &[], false), &mail).unwrap();

        let raw = String::from_utf8_lossy(&envelope.payload);
        assert!(raw.contains("=?iso-8859-1?"));
        assert!(!raw.contains("\r\nBcc:"));

        let message = Message::parse(&envelope.payload).unwrap();
        assert_eq!(
            message.subject().as_deref(),
            Some("Café Bcc: injected@evil.com")
        );
        let id = envelope.message_id.unwrap();
        assert_eq!(message.message_id(), Some(id.trim_matches(['<', '>'])));
        assert!(id.ends_with("@foo.com>"));
    }

    #[test]
    fn test_complete_mail_drops_existing_bcc() {
        let part = Part::text("x").with_header("Bcc", "hidden@bar.com");
        let mail = Mail::new(addr("me@foo.com"), "s").bcc(addr("hidden@bar.com"));
        let envelope = complete_mail(part, &mail).unwrap();
        let message = Message::parse(&envelope.payload).unwrap();
        assert!(!message.headers().contains("bcc"));
        assert!(!message.headers().contains("to"));
        assert_eq!(envelope.rcpt_to, vec!["hidden@bar.com"]);
    }

    #[test]
    fn test_complete_mail_no_recipients() {
        let mail = Mail::new(addr("me@foo.com"), "s");
        let err = complete_mail(Part::text("x"), &mail).unwrap_err();
        assert!(matches!(err, Error::InvalidAddress(_)));
    }

    #[test]
    fn test_complete_mail_bad_header_name() {
        let mail = Mail::new(addr("me@foo.com"), "s")
            .to(addr("him@bar.com"))
            .with_header("Bad Name", "v");
        let err = complete_mail(Part::text("x"), &mail).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }

    #[test]
    fn test_complete_mail_bad_date() {
        let mail = Mail::new(addr("me@foo.com"), "s")
            .to(addr("him@bar.com"))
            .with_date(i64::MAX);
        let err = complete_mail(Part::text("x"), &mail).unwrap_err();
        assert!(matches!(err, Error::InvalidHeader(_)));
    }

    #[test]
    fn test_compose_mail() {
        let mail = Mail::new(addr("me@foo.com"), "the subject").to(addr("him@bar.com"));
        let attachments = vec![
            Attachment::new(b"attached".to_vec())
                .with_content_type(ContentType::new("text", "plain"))
                .with_filename("text.txt")
                .with_charset("us-ascii"),
        ];
        let envelope = compose_mail(
            &mail,
            Some(&Content::new("Hello world", "us-ascii")),
            None,
            &attachments,
            &[],
        )
        .unwrap();

        let message = Message::parse(&envelope.payload).unwrap();
        assert!(message.root.content_type.is("multipart", "mixed"));
        assert_eq!(message.body_text().as_deref(), Some("Hello world"));
        let found = message.attachments();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename(), Some("text.txt"));
        assert_eq!(found[0].body_text().as_deref(), Some("attached"));
    }
}
