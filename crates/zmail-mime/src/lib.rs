//! # zmail-mime
//!
//! MIME message decoding and encoding for email.
//!
//! ## Features
//!
//! - **Decoding**: Parse raw RFC 5322/MIME messages into a tree of parts,
//!   recovering from malformed input and recording [`Defect`]s
//! - **Encoding**: Produce transport-safe bytes with collision-free
//!   boundaries, folded headers and per-part transfer encodings
//! - **Headers**: RFC 2047 encoded-words and RFC 2231 parameters
//! - **Charsets**: Explicit, configurable fallback policy
//!
//! ## Quick Start
//!
//! ### Decoding
//!
//! ```
//! use zmail_mime::Message;
//!
//! let raw = b"Subject: =?utf-8?Q?Caf=C3=A9?=\r\n\r\nbody";
//! let message = Message::parse(raw)?;
//! assert_eq!(message.subject().as_deref(), Some("Café"));
//! assert_eq!(message.body_text().as_deref(), Some("body"));
//! # Ok::<(), zmail_mime::Error>(())
//! ```
//!
//! ### Encoding
//!
//! ```
//! use zmail_mime::{Encoder, EncodeOptions, Message, Part};
//!
//! let root = Part::multipart("alternative", vec![
//!     Part::text("Plain text version"),
//!     Part::html("<p>HTML version</p>"),
//! ])
//! .with_header("Subject", "Test");
//!
//! let encoder = Encoder::new(EncodeOptions::new().with_boundary_seed(7));
//! let bytes = encoder.encode(&Message::new(root))?;
//! assert!(bytes.starts_with(b"Subject: Test\r\nMIME-Version: 1.0\r\n"));
//! # Ok::<(), zmail_mime::Error>(())
//! ```
//!
//! ### Strict decoding
//!
//! ```
//! use zmail_mime::{DecodeOptions, Decoder};
//!
//! let raw = b"Content-Type: text/plain; charset=utf-8\r\n\r\ncaf\xff";
//! assert!(Decoder::default().decode(raw).is_ok());
//! assert!(Decoder::new(DecodeOptions::strict()).decode(raw).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod boundary;
mod charset;
mod content_type;
mod decoder;
mod defect;
mod disposition;
mod encoder;
mod error;
mod header;
mod message;
mod options;
mod parameter;

pub mod encoding;

pub use address::{Address, format_addresses, parse_addresses};
pub use charset::{decode_text, encode_text, is_known_charset};
pub use content_type::ContentType;
pub use decoder::Decoder;
pub use defect::Defect;
pub use disposition::{ContentDisposition, DispositionKind};
pub use encoder::Encoder;
pub use encoding::TransferEncoding;
pub use error::{Error, Result};
pub use header::{Header, HeaderValue, Headers};
pub use message::{Body, BodyKind, MailPart, Message, Part, sanitize_filename};
pub use options::{
    CharsetPolicy, CharsetPrecedence, DecodeOptions, EncodeOptions, MAX_LINE_OCTETS,
    UnknownCharset,
};
pub use parameter::Parameters;
