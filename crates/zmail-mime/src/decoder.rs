//! Message decoder: raw bytes to a [`Message`] tree.

use crate::charset::{decode_text, is_known_charset};
use crate::content_type::ContentType;
use crate::defect::Defect;
use crate::disposition::ContentDisposition;
use crate::encoding::{TransferEncoding, decode_base64, decode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::parse_block;
use crate::message::{Body, Message, Part};
use crate::options::DecodeOptions;
use std::borrow::Cow;

/// Multiparts nested deeper than this are kept as opaque payloads.
const MAX_NESTING: usize = 64;

/// Decodes raw messages.
///
/// The decoder holds only its options; every call builds its own state.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    options: DecodeOptions,
}

/// A delimiter line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delimiter {
    Open,
    Close,
}

/// A multipart body cut at its delimiter lines.
#[derive(Debug)]
struct Split<'a> {
    preamble: Option<&'a [u8]>,
    parts: Vec<&'a [u8]>,
    epilogue: Option<&'a [u8]>,
    closed: bool,
}

fn classify(line: &[u8], delimiter: &[u8]) -> Option<Delimiter> {
    let rest = line.strip_prefix(delimiter)?;
    let (kind, rest) = rest
        .strip_prefix(b"--")
        .map_or((Delimiter::Open, rest), |r| (Delimiter::Close, r));
    rest.iter()
        .all(|&b| b == b' ' || b == b'\t')
        .then_some(kind)
}

/// Offset of the line break ending just before `line_start`, which belongs
/// to the delimiter rather than the preceding content.
fn content_end(body: &[u8], line_start: usize) -> usize {
    if body[..line_start].ends_with(b"\r\n") {
        line_start - 2
    } else if body[..line_start].ends_with(b"\n") {
        line_start - 1
    } else {
        line_start
    }
}

/// Splits a multipart body on `--boundary` lines.
///
/// Returns `None` if no delimiter line exists.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Option<Split<'a>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut preamble = None;
    let mut parts = Vec::new();
    let mut current: Option<usize> = None;
    let mut found = false;
    let mut pos = 0;

    while pos < body.len() {
        let line_start = pos;
        pos = body[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(body.len(), |i| pos + i + 1);
        let mut line = &body[line_start..pos];
        if let Some(stripped) = line.strip_suffix(b"\n") {
            line = stripped.strip_suffix(b"\r").unwrap_or(stripped);
        }

        let Some(kind) = classify(line, delimiter) else {
            continue;
        };
        let end = content_end(body, line_start);
        match current {
            Some(start) => parts.push(&body[start..end.max(start)]),
            None if !found && line_start > 0 => preamble = Some(&body[..end]),
            None => {}
        }
        found = true;

        match kind {
            Delimiter::Open => current = Some(pos),
            Delimiter::Close => {
                return Some(Split {
                    preamble,
                    parts,
                    epilogue: (pos < body.len()).then(|| &body[pos..]),
                    closed: true,
                });
            }
        }
    }

    if !found {
        return None;
    }
    if let Some(start) = current {
        parts.push(&body[start..]);
    }
    Some(Split {
        preamble,
        parts,
        epilogue: None,
        closed: false,
    })
}

impl Decoder {
    /// Creates a decoder with the given options.
    #[must_use]
    pub const fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    /// Returns the decoder options.
    #[must_use]
    pub const fn options(&self) -> &DecodeOptions {
        &self.options
    }

    /// Decodes a raw message.
    ///
    /// Problems confined to one part are recorded as [`Defect`]s on that
    /// part and decoding continues.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structural`] if the top-level header block is
    /// malformed. In strict mode, also returns [`Error::Encoding`] for
    /// undecodable content and [`Error::Structural`] for any malformed
    /// header line.
    pub fn decode(&self, data: &[u8]) -> Result<Message> {
        let root = self.decode_part(data, true, false, 0)?;
        Ok(Message::new(root))
    }

    fn decode_part(&self, data: &[u8], root: bool, in_digest: bool, depth: usize) -> Result<Part> {
        let block = parse_block(data, root, &self.options)?;
        let mut defects = block.defects;
        let headers = block.headers;
        let body = &data[block.body_start..];

        let content_type = match headers.header("content-type") {
            Some(header) => ContentType::parse(&header.wire_text()).unwrap_or_else(|err| {
                tracing::warn!(?err, "invalid content type, assuming text/plain");
                defects.push(Defect::InvalidContentType(header.wire_text().into_owned()));
                ContentType::default()
            }),
            None if in_digest => ContentType::message_rfc822(),
            None => ContentType::default(),
        };
        let transfer_encoding = headers
            .header("content-transfer-encoding")
            .map(|h| TransferEncoding::parse(&h.text()));
        let disposition = headers
            .header("content-disposition")
            .map(|h| ContentDisposition::parse(&h.wire_text()));

        let body = if content_type.is_multipart() && depth < MAX_NESTING {
            let body = match &transfer_encoding {
                Some(cte @ (TransferEncoding::Base64 | TransferEncoding::QuotedPrintable)) => {
                    tracing::warn!(encoding = %cte, "multipart with an encoded body");
                    defects.push(Defect::EncodedMultipart(cte.to_string()));
                    Cow::Owned(self.transfer_decode(body, Some(cte), &mut defects)?)
                }
                _ => Cow::Borrowed(body),
            };
            self.decode_multipart(&body, &content_type, depth, &mut defects)?
        } else if content_type.is_message() && depth < MAX_NESTING {
            let payload = self.transfer_decode(body, transfer_encoding.as_ref(), &mut defects)?;
            let nested = self.decode_part(&payload, false, false, depth + 1)?;
            Body::Message(Box::new(Message::new(nested)))
        } else {
            let payload = self.transfer_decode(body, transfer_encoding.as_ref(), &mut defects)?;
            if content_type.is_text() {
                self.check_text(&payload, &content_type, &mut defects)?;
            }
            Body::Single(payload)
        };

        Ok(Part {
            headers,
            content_type,
            transfer_encoding,
            disposition,
            body,
            defects,
        })
    }

    fn decode_multipart(
        &self,
        body: &[u8],
        content_type: &ContentType,
        depth: usize,
        defects: &mut Vec<Defect>,
    ) -> Result<Body> {
        let Some(boundary) = content_type.boundary().filter(|b| !b.is_empty()) else {
            tracing::warn!(mime_type = %content_type.mime_type(), "multipart without boundary");
            defects.push(Defect::MissingBoundary);
            return Ok(Body::Single(body.to_vec()));
        };
        let Some(split) = split_multipart(body, boundary) else {
            tracing::warn!(boundary, "boundary not found, keeping opaque payload");
            defects.push(Defect::BoundaryNotFound(boundary.to_string()));
            return Ok(Body::Single(body.to_vec()));
        };
        if !split.closed {
            tracing::warn!(boundary, parts = split.parts.len(), "multipart is truncated");
            defects.push(Defect::MissingCloseDelimiter(boundary.to_string()));
        }

        let in_digest = content_type.is("multipart", "digest");
        let parts = split
            .parts
            .iter()
            .map(|data| self.decode_part(data, false, in_digest, depth + 1))
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(boundary, parts = parts.len(), "decoded multipart");

        Ok(Body::Multipart {
            parts,
            preamble: split.preamble.map(<[u8]>::to_vec),
            epilogue: split.epilogue.map(<[u8]>::to_vec),
        })
    }

    fn transfer_decode(
        &self,
        body: &[u8],
        encoding: Option<&TransferEncoding>,
        defects: &mut Vec<Defect>,
    ) -> Result<Vec<u8>> {
        let strict = self.options.strict;
        match encoding {
            Some(TransferEncoding::Base64) => {
                let (data, damaged) = decode_base64(body, strict)?;
                if damaged {
                    tracing::debug!("damaged base64 payload");
                    defects.push(Defect::InvalidBase64);
                }
                Ok(data)
            }
            Some(TransferEncoding::QuotedPrintable) => {
                let (data, damaged) = decode_quoted_printable(body, strict)?;
                if damaged {
                    tracing::debug!("damaged quoted-printable payload");
                    defects.push(Defect::InvalidQuotedPrintable);
                }
                Ok(data)
            }
            Some(TransferEncoding::Other(name)) => {
                if strict {
                    return Err(Error::Encoding(format!("unknown transfer encoding {name:?}")));
                }
                tracing::debug!(encoding = %name, "unknown transfer encoding, keeping payload");
                defects.push(Defect::UnknownTransferEncoding(name.clone()));
                Ok(body.to_vec())
            }
            _ => Ok(body.to_vec()),
        }
    }

    /// Records unknown charsets; in strict mode also proves the text
    /// decodes.
    fn check_text(
        &self,
        payload: &[u8],
        content_type: &ContentType,
        defects: &mut Vec<Defect>,
    ) -> Result<()> {
        let charset = content_type.charset();
        if let Some(label) = charset.filter(|l| !is_known_charset(l)) {
            if !self.options.strict {
                defects.push(Defect::UnknownCharset(label.to_string()));
                return Ok(());
            }
        }
        if self.options.strict {
            decode_text(payload, charset, &self.options.charset, true)?;
        }
        Ok(())
    }
}
