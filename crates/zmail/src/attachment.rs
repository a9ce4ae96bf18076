//! Attachments and embedded files.

use crate::error::Result;
use std::path::Path;
use zmail_mime::{Body, ContentDisposition, ContentType, Part, TransferEncoding};

/// Fallback MIME type for unknown files.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Known extensions, lowercase.
const MIME_TYPES: &[(&str, &str)] = &[
    ("7z", "application/x-7z-compressed"),
    ("avif", "image/avif"),
    ("bmp", "image/bmp"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("eml", "message/rfc822"),
    ("gif", "image/gif"),
    ("gz", "application/gzip"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("ics", "text/calendar"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("md", "text/markdown"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("ogg", "audio/ogg"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("ppt", "application/vnd.ms-powerpoint"),
    (
        "pptx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    ),
    ("rtf", "application/rtf"),
    ("svg", "image/svg+xml"),
    ("tar", "application/x-tar"),
    ("tif", "image/tiff"),
    ("tiff", "image/tiff"),
    ("txt", "text/plain"),
    ("vcf", "text/vcard"),
    ("wav", "audio/wav"),
    ("webp", "image/webp"),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
    ("xml", "application/xml"),
    ("zip", "application/zip"),
];

/// Guesses a MIME type from the file extension.
///
/// Returns [`DEFAULT_MIME_TYPE`] for unknown or missing extensions.
#[must_use]
pub fn guess_mime_type(path: impl AsRef<Path>) -> &'static str {
    let Some(ext) = path.as_ref().extension().and_then(|e| e.to_str()) else {
        return DEFAULT_MIME_TYPE;
    };
    let ext = ext.to_ascii_lowercase();
    MIME_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map_or(DEFAULT_MIME_TYPE, |(_, mime)| *mime)
}

fn content_type_for(mime_type: &str) -> ContentType {
    ContentType::parse(mime_type).unwrap_or_else(|_| ContentType::octet_stream())
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// Builds a leaf part. Text data is already encoded in `charset`; other
/// data is always sent as base64.
fn leaf_part(
    data: &[u8],
    mut content_type: ContentType,
    charset: Option<&str>,
    quoted_printable: bool,
) -> Part {
    if let Some(charset) = charset.filter(|_| content_type.is_text()) {
        content_type.parameters.set("charset", charset);
    }
    let encoding = if quoted_printable && content_type.is_text() {
        Some(TransferEncoding::QuotedPrintable)
    } else if content_type.is_text() {
        None
    } else {
        Some(TransferEncoding::Base64)
    };
    let mut part = Part::new(content_type, Body::Single(data.to_vec()));
    part.transfer_encoding = encoding;
    part
}

/// A file attached to a mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Raw data; for `text/*`, encoded in `charset`.
    pub data: Vec<u8>,
    /// Content type.
    pub content_type: ContentType,
    /// File name offered to the recipient.
    pub filename: Option<String>,
    /// Charset of text data.
    pub charset: Option<String>,
    /// Send text data as quoted-printable.
    pub quoted_printable: bool,
}

impl Attachment {
    /// Creates an `application/octet-stream` attachment.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            content_type: ContentType::octet_stream(),
            filename: None,
            charset: None,
            quoted_printable: false,
        }
    }

    /// Reads a file, naming the attachment after it and guessing its type.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let mut attachment =
            Self::new(data).with_content_type(content_type_for(guess_mime_type(path)));
        attachment.filename = file_name(path);
        Ok(attachment)
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Sets the file name.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the charset of text data.
    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Sends text data as quoted-printable.
    #[must_use]
    pub const fn with_quoted_printable(mut self, quoted_printable: bool) -> Self {
        self.quoted_printable = quoted_printable;
        self
    }

    /// Converts to a MIME part with an `attachment` disposition.
    #[must_use]
    pub fn to_part(&self) -> Part {
        let mut disposition = ContentDisposition::attachment();
        if let Some(filename) = &self.filename {
            disposition = disposition.with_filename(filename.as_str());
        }
        leaf_part(
            &self.data,
            self.content_type.clone(),
            self.charset.as_deref(),
            self.quoted_printable,
        )
        .with_disposition(disposition)
    }
}

/// A file referenced from the message body by `cid:` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedFile {
    /// Raw data; for `text/*`, encoded in `charset`.
    pub data: Vec<u8>,
    /// Content type.
    pub content_type: ContentType,
    /// Content-ID, without angle brackets.
    pub content_id: String,
    /// Charset of text data.
    pub charset: Option<String>,
    /// Optional file name.
    pub filename: Option<String>,
}

impl EmbeddedFile {
    /// Creates an `application/octet-stream` embedded file.
    #[must_use]
    pub fn new(data: impl Into<Vec<u8>>, content_id: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            content_type: ContentType::octet_stream(),
            content_id: content_id.into(),
            charset: None,
            filename: None,
        }
    }

    /// Reads a file; the file name doubles as the Content-ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        let filename = file_name(path);
        let mut embedded = Self::new(data, filename.clone().unwrap_or_default())
            .with_content_type(content_type_for(guess_mime_type(path)));
        embedded.filename = filename;
        Ok(embedded)
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.content_type = content_type;
        self
    }

    /// Sets the file name.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the charset of text data.
    #[must_use]
    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    /// Converts to an inline MIME part carrying `Content-ID: <cid>`.
    #[must_use]
    pub fn to_part(&self) -> Part {
        let mut disposition = ContentDisposition::inline();
        if let Some(filename) = &self.filename {
            disposition = disposition.with_filename(filename.as_str());
        }
        let content_id = self
            .content_id
            .trim()
            .trim_start_matches('<')
            .trim_end_matches('>');
        leaf_part(
            &self.data,
            self.content_type.clone(),
            self.charset.as_deref(),
            false,
        )
        .with_header("Content-ID", format!("<{content_id}>"))
        .with_disposition(disposition)
    }
}
