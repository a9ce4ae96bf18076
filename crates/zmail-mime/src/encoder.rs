//! Message encoder: a [`Message`] tree to transport-format bytes.

use crate::boundary::{BoundaryGenerator, collides, is_valid};
use crate::encoding::{TransferEncoding, encode_base64_wrapped, encode_quoted_printable};
use crate::error::{Error, Result};
use crate::header::Header;
use crate::message::{Body, Message, Part};
use crate::options::{EncodeOptions, MAX_LINE_OCTETS};

/// Headers regenerated from the typed fields of a part.
const REGENERATED: &[&str] = &[
    "content-type",
    "content-transfer-encoding",
    "content-disposition",
];

/// Encodes messages.
///
/// Output is always CRLF-terminated, lines never exceed 998 octets and no
/// payload octet is altered.
#[derive(Debug, Clone, Default)]
pub struct Encoder {
    options: EncodeOptions,
}

/// Returns true if the payload can be sent without transfer encoding:
/// no NUL, CRLF line breaks only, no line over 998 octets and, unless
/// `allow_8bit`, ASCII only.
fn is_line_safe(payload: &[u8], allow_8bit: bool) -> bool {
    let mut line_len = 0;
    for (i, &b) in payload.iter().enumerate() {
        match b {
            0 => return false,
            b'\r' => {
                if payload.get(i + 1) != Some(&b'\n') {
                    return false;
                }
            }
            b'\n' => {
                if i == 0 || payload[i - 1] != b'\r' {
                    return false;
                }
                line_len = 0;
                continue;
            }
            128..=255 if !allow_8bit => return false,
            _ => {}
        }
        if b != b'\r' {
            line_len += 1;
            if line_len > MAX_LINE_OCTETS {
                return false;
            }
        }
    }
    true
}

/// True when at most a third of the octets would need escaping.
fn is_mostly_ascii(payload: &[u8]) -> bool {
    let escaped = payload
        .iter()
        .filter(|&&b| b >= 128 || (b < 32 && !matches!(b, b'\r' | b'\n' | b'\t')))
        .count();
    escaped * 3 <= payload.len()
}

fn is_ascii_label(label: &str) -> bool {
    matches!(
        label.trim().to_ascii_lowercase().as_str(),
        "us-ascii" | "ascii"
    )
}

impl Encoder {
    /// Creates an encoder with the given options.
    #[must_use]
    pub const fn new(options: EncodeOptions) -> Self {
        Self { options }
    }

    /// Returns the encoder options.
    #[must_use]
    pub const fn options(&self) -> &EncodeOptions {
        &self.options
    }

    /// Encodes a message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BoundaryCollision`] if no collision-free boundary
    /// was found for some multipart within the configured attempts.
    pub fn encode(&self, message: &Message) -> Result<Vec<u8>> {
        let mut boundaries = BoundaryGenerator::new(self.options.boundary_seed);
        self.encode_part(&message.root, true, &mut boundaries)
    }

    fn encode_part(
        &self,
        part: &Part,
        root: bool,
        boundaries: &mut BoundaryGenerator,
    ) -> Result<Vec<u8>> {
        let mut content_type = part.content_type.clone();
        let (body, transfer_encoding) = match &part.body {
            Body::Multipart {
                parts,
                preamble,
                epilogue,
            } => {
                let children = parts
                    .iter()
                    .map(|child| self.encode_part(child, false, boundaries))
                    .collect::<Result<Vec<_>>>()?;
                let boundary = self.choose_boundary(
                    content_type.boundary(),
                    parts,
                    &children,
                    [preamble.as_deref(), epilogue.as_deref()],
                    boundaries,
                )?;
                content_type.parameters.set("boundary", boundary.as_str());
                let body = layout(&boundary, &children, preamble.as_deref(), epilogue.as_deref());
                let encoding = part.transfer_encoding.as_ref().map(|_| identity_for(&body));
                (body, encoding)
            }
            Body::Message(message) => {
                let body = self.encode_part(&message.root, true, boundaries)?;
                let encoding = part.transfer_encoding.as_ref().map(|_| identity_for(&body));
                (body, encoding)
            }
            // A container kept opaque by the decoder.
            Body::Single(payload) if content_type.is_multipart() || content_type.is_message() => {
                (payload.clone(), Some(container_encoding(payload)))
            }
            Body::Single(payload) => {
                let mut force_base64 = false;
                if content_type.is_text()
                    && !payload.is_ascii()
                    && content_type.charset().is_none_or(is_ascii_label)
                {
                    if std::str::from_utf8(payload).is_ok() {
                        content_type.parameters.set("charset", "utf-8");
                    } else {
                        content_type.parameters.set("charset", "unknown-8bit");
                        force_base64 = true;
                    }
                    tracing::debug!(charset = ?content_type.charset(), "relabelled non-ASCII text");
                }
                let encoding = if force_base64 {
                    TransferEncoding::Base64
                } else {
                    let requested = part.transfer_encoding.as_ref();
                    choose_encoding(payload, requested, content_type.is_text())
                };
                let body = match &encoding {
                    TransferEncoding::Base64 => encode_base64_wrapped(payload),
                    TransferEncoding::QuotedPrintable => encode_quoted_printable(payload),
                    _ => payload.clone(),
                };
                (body, Some(encoding))
            }
        };

        let mut out = Vec::with_capacity(body.len() + 512);
        for header in part.headers.iter() {
            if REGENERATED.iter().any(|name| header.is(name)) {
                continue;
            }
            self.write_header(&mut out, header);
        }
        if root && !part.headers.contains("mime-version") {
            self.write_header(&mut out, &Header::new("MIME-Version", "1.0"));
        }
        self.write_header(
            &mut out,
            &Header::from_wire("Content-Type", content_type.to_string()),
        );
        if let Some(encoding) = transfer_encoding {
            self.write_header(
                &mut out,
                &Header::from_wire("Content-Transfer-Encoding", encoding.to_string()),
            );
        }
        if let Some(disposition) = &part.disposition {
            self.write_header(
                &mut out,
                &Header::from_wire("Content-Disposition", disposition.to_string()),
            );
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&body);
        Ok(out)
    }

    fn write_header(&self, out: &mut Vec<u8>, header: &Header) {
        out.extend_from_slice(header.to_wire(&self.options).as_bytes());
        out.extend_from_slice(b"\r\n");
    }

    /// Picks a boundary that occurs in no encoded child, no child payload
    /// and neither the preamble nor the epilogue.
    fn choose_boundary(
        &self,
        declared: Option<&str>,
        parts: &[Part],
        children: &[Vec<u8>],
        extra: [Option<&[u8]>; 2],
        boundaries: &mut BoundaryGenerator,
    ) -> Result<String> {
        let is_clear = |boundary: &str| {
            children.iter().all(|c| !collides(boundary, c))
                && parts
                    .iter()
                    .all(|p| p.payload().is_none_or(|d| !collides(boundary, d)))
                && extra.iter().flatten().all(|d| !collides(boundary, d))
        };

        if let Some(boundary) = declared.filter(|b| is_valid(b)) {
            if is_clear(boundary) {
                return Ok(boundary.to_string());
            }
            tracing::debug!(boundary, "declared boundary collides with content");
        }

        let attempts = self.options.max_boundary_attempts;
        for attempt in 0..attempts {
            let candidate = boundaries.candidate(attempt);
            if is_clear(&candidate) {
                tracing::debug!(boundary = %candidate, attempt, "generated boundary");
                return Ok(candidate);
            }
        }
        tracing::warn!(attempts, "no collision-free boundary");
        Err(Error::BoundaryCollision { attempts })
    }
}

/// `[preamble CRLF] (--B CRLF child CRLF)* --B-- CRLF [epilogue]`
fn layout(
    boundary: &str,
    children: &[Vec<u8>],
    preamble: Option<&[u8]>,
    epilogue: Option<&[u8]>,
) -> Vec<u8> {
    let size = children.iter().map(|c| c.len() + boundary.len() + 8).sum::<usize>();
    let mut out = Vec::with_capacity(size + boundary.len() + 8);
    if let Some(preamble) = preamble {
        out.extend_from_slice(preamble);
        out.extend_from_slice(b"\r\n");
    }
    for child in children {
        out.extend_from_slice(b"--");
        out.extend_from_slice(boundary.as_bytes());
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(child);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"--\r\n");
    if let Some(epilogue) = epilogue {
        out.extend_from_slice(epilogue);
    }
    out
}

fn identity_for(body: &[u8]) -> TransferEncoding {
    if body.is_ascii() {
        TransferEncoding::SevenBit
    } else {
        TransferEncoding::EightBit
    }
}

/// Multipart and message bodies only take an identity encoding.
fn container_encoding(payload: &[u8]) -> TransferEncoding {
    if is_line_safe(payload, false) {
        TransferEncoding::SevenBit
    } else if is_line_safe(payload, true) {
        TransferEncoding::EightBit
    } else {
        TransferEncoding::Binary
    }
}

/// Honours a requested encoding when it is safe for the payload, otherwise
/// picks 7bit, quoted-printable or base64 from the content.
fn choose_encoding(
    payload: &[u8],
    requested: Option<&TransferEncoding>,
    is_text: bool,
) -> TransferEncoding {
    let encoding = match requested {
        Some(TransferEncoding::Base64) => TransferEncoding::Base64,
        Some(TransferEncoding::QuotedPrintable) => TransferEncoding::QuotedPrintable,
        Some(TransferEncoding::SevenBit) if is_line_safe(payload, false) => {
            TransferEncoding::SevenBit
        }
        Some(requested @ (TransferEncoding::EightBit | TransferEncoding::Binary))
            if is_line_safe(payload, true) =>
        {
            requested.clone()
        }
        // The payload of an unknown encoding was kept undecoded.
        Some(TransferEncoding::Other(name)) if is_line_safe(payload, true) => {
            TransferEncoding::Other(name.clone())
        }
        _ if is_line_safe(payload, false) => TransferEncoding::SevenBit,
        _ if is_text && is_mostly_ascii(payload) => TransferEncoding::QuotedPrintable,
        _ => TransferEncoding::Base64,
    };
    tracing::debug!(%encoding, "chose transfer encoding");
    encoding
}
