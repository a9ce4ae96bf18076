//! Error types for MIME operations.

/// Result type alias for MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// MIME error types.
///
/// Decoding is fail-soft by default: problems inside a single part are
/// recorded as [`Defect`](crate::Defect)s and only the variants below that
/// concern the whole message are returned as errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The header block could not be parsed.
    #[error("Malformed header block at line {line}: {reason}")]
    Structural {
        /// 1-based line number of the offending line.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// Undecodable content, surfaced only in strict mode.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// No collision-free multipart boundary could be generated.
    #[error("Could not generate a collision-free boundary after {attempts} attempts")]
    BoundaryCollision {
        /// Number of candidates tried.
        attempts: usize,
    },

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Base64 decode error.
    #[error("Base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

impl Error {
    /// Creates a structural error for the given line.
    #[must_use]
    pub fn structural(line: usize, reason: impl Into<String>) -> Self {
        Self::Structural {
            line,
            reason: reason.into(),
        }
    }

    /// Returns true if this error only occurs in strict mode.
    #[must_use]
    pub const fn is_strict_only(&self) -> bool {
        matches!(self, Self::Encoding(_) | Self::Base64Decode(_))
    }
}
