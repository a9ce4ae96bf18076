//! Non-fatal problems found while decoding.

use std::fmt;

/// A recoverable problem recorded on the part where it was found.
///
/// A part carrying defects is still usable; the decoder has applied the
/// documented fallback for each one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Defect {
    /// A header line was neither a field nor a continuation; the body was
    /// assumed to start there.
    InvalidHeaderLine {
        /// 1-based line number within the part.
        line: usize,
    },
    /// A continuation line appeared before any header field.
    OrphanContinuation {
        /// 1-based line number within the part.
        line: usize,
    },
    /// The part's header block could not be parsed at all; the whole part
    /// was kept as an opaque payload.
    UnparseableHeaders,
    /// A header contained octets that are not valid UTF-8.
    NonUtf8Header(String),
    /// An encoded-word could not be decoded and was kept literally.
    MalformedEncodedWord(String),
    /// The Content-Type header could not be parsed; `text/plain` was assumed.
    InvalidContentType(String),
    /// A multipart part declared no boundary parameter.
    MissingBoundary,
    /// The declared boundary never appears in the body.
    BoundaryNotFound(String),
    /// The closing `--boundary--` delimiter is missing.
    MissingCloseDelimiter(String),
    /// A multipart declared base64 or quoted-printable; the body was
    /// decoded before splitting.
    EncodedMultipart(String),
    /// The base64 payload was damaged; whatever could be decoded was kept.
    InvalidBase64,
    /// The quoted-printable payload contained stray `=` sequences.
    InvalidQuotedPrintable,
    /// The transfer encoding is not known; the payload was kept verbatim.
    UnknownTransferEncoding(String),
    /// The declared charset is not known.
    UnknownCharset(String),
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHeaderLine { line } => write!(f, "invalid header line {line}"),
            Self::OrphanContinuation { line } => {
                write!(f, "continuation line {line} has no header to continue")
            }
            Self::UnparseableHeaders => write!(f, "unparseable header block"),
            Self::NonUtf8Header(name) => write!(f, "header {name} is not valid UTF-8"),
            Self::MalformedEncodedWord(word) => write!(f, "malformed encoded-word {word}"),
            Self::InvalidContentType(value) => write!(f, "invalid content type {value:?}"),
            Self::MissingBoundary => write!(f, "multipart without boundary"),
            Self::BoundaryNotFound(b) => write!(f, "boundary {b:?} not found in body"),
            Self::MissingCloseDelimiter(b) => write!(f, "missing close delimiter for {b:?}"),
            Self::EncodedMultipart(cte) => write!(f, "multipart encoded as {cte}"),
            Self::InvalidBase64 => write!(f, "invalid base64 payload"),
            Self::InvalidQuotedPrintable => write!(f, "invalid quoted-printable payload"),
            Self::UnknownTransferEncoding(cte) => write!(f, "unknown transfer encoding {cte:?}"),
            Self::UnknownCharset(cs) => write!(f, "unknown charset {cs:?}"),
        }
    }
}
