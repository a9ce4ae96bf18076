//! # zmail
//!
//! Compose email messages with text and HTML bodies, embedded files and
//! attachments.
//!
//! ## Features
//!
//! - **Structure**: Builds `multipart/mixed`, `multipart/related` and
//!   `multipart/alternative` containers only when they are needed
//! - **Headers**: Encodes non-ASCII display names and subjects in the
//!   requested charset, falling back to UTF-8
//! - **Envelope**: Returns the payload together with the SMTP sender and
//!   recipients, BCC included
//!
//! ## Quick Start
//!
//! ```
//! use zmail::{Address, Attachment, Content, Mail, compose_mail};
//!
//! let mail = Mail::new(Address::with_name("Me", "me@example.com")?, "Report")
//!     .to(Address::new("you@example.com")?)
//!     .bcc(Address::new("archive@example.com")?)
//!     .with_message_id("reports@example.com");
//!
//! let attachments = [Attachment::new(b"%PDF-1.4".to_vec()).with_filename("report.pdf")];
//! let envelope = compose_mail(
//!     &mail,
//!     Some(&Content::utf8("See attached.")),
//!     None,
//!     &attachments,
//!     &[],
//! )?;
//!
//! assert_eq!(envelope.mail_from, "me@example.com");
//! assert_eq!(envelope.rcpt_to, ["you@example.com", "archive@example.com"]);
//! assert!(envelope.message_id.is_some());
//! # Ok::<(), zmail::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod attachment;
mod compose;
mod error;

pub use attachment::{Attachment, DEFAULT_MIME_TYPE, EmbeddedFile, guess_mime_type};
pub use compose::{
    Content, Envelope, Mail, build_mail, complete_mail, compose_mail, make_message_id,
};
pub use error::{Error, Result};
pub use zmail_mime::{Address, format_addresses};
