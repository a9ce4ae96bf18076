//! Error types for mail composition.

use std::io;

/// Result type alias for composition operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Composition error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// MIME encoding failed.
    #[error("MIME error: {0}")]
    Mime(#[from] zmail_mime::Error),

    /// I/O error while loading a file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid or missing address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Header field that cannot be written.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}
