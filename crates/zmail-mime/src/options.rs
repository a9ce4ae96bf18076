//! Decoder and encoder configuration.
//!
//! Every fallback the codec applies is selected here rather than hidden in
//! the code paths, so callers can pin the behaviour they rely on.

/// Which charset wins when the declaration and the payload disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CharsetPrecedence {
    /// The declared `charset` parameter is authoritative. Sniffing only
    /// happens when nothing is declared.
    #[default]
    Declared,
    /// A byte-order mark, or a payload that is valid non-ASCII UTF-8,
    /// overrides the declaration.
    Sniffed,
}

/// How text in an unrecognized charset is decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum UnknownCharset {
    /// Map every octet to the code point of the same value. Lossless.
    #[default]
    Latin1,
    /// Decode as UTF-8, replacing invalid sequences with U+FFFD.
    Utf8Lossy,
}

/// Charset resolution policy for text payloads and header values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct CharsetPolicy {
    /// Charset assumed for text that declares none and is not valid UTF-8.
    pub default_charset: String,
    /// Declared versus sniffed precedence.
    pub precedence: CharsetPrecedence,
    /// Fallback for unknown charset labels.
    pub unknown: UnknownCharset,
}

impl Default for CharsetPolicy {
    fn default() -> Self {
        Self {
            default_charset: "us-ascii".to_string(),
            precedence: CharsetPrecedence::Declared,
            unknown: UnknownCharset::Latin1,
        }
    }
}

/// Decoder configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DecodeOptions {
    /// Surface encoding problems as errors instead of recovering.
    pub strict: bool,
    /// Charset resolution policy.
    pub charset: CharsetPolicy,
}

impl DecodeOptions {
    /// Creates the default, fail-soft configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a strict configuration.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            strict: true,
            ..Self::default()
        }
    }

    /// Sets strict mode.
    #[must_use]
    pub const fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the charset precedence.
    #[must_use]
    pub const fn with_precedence(mut self, precedence: CharsetPrecedence) -> Self {
        self.charset.precedence = precedence;
        self
    }

    /// Sets the unknown charset fallback.
    #[must_use]
    pub const fn with_unknown_charset(mut self, unknown: UnknownCharset) -> Self {
        self.charset.unknown = unknown;
        self
    }

    /// Sets the charset assumed when none is declared.
    #[must_use]
    pub fn with_default_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset.default_charset = charset.into();
        self
    }
}

/// Hard limit on a line, excluding CRLF (RFC 5322 section 2.1.1).
pub const MAX_LINE_OCTETS: usize = 998;

/// Encoder configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EncodeOptions {
    /// Preferred header line length; longer lines are folded.
    pub max_line_length: usize,
    /// Charset tried first for non-ASCII header text.
    pub header_charset: String,
    /// Boundary candidates tried per multipart before giving up.
    pub max_boundary_attempts: usize,
    /// Seed for boundary generation; `None` draws from the OS.
    pub boundary_seed: Option<u64>,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            max_line_length: 78,
            header_charset: "utf-8".to_string(),
            max_boundary_attempts: 16,
            boundary_seed: None,
        }
    }
}

impl EncodeOptions {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the preferred header line length, clamped to the hard limit.
    #[must_use]
    pub fn with_max_line_length(mut self, len: usize) -> Self {
        self.max_line_length = len.clamp(20, MAX_LINE_OCTETS);
        self
    }

    /// Sets the header charset.
    #[must_use]
    pub fn with_header_charset(mut self, charset: impl Into<String>) -> Self {
        self.header_charset = charset.into();
        self
    }

    /// Sets the number of boundary candidates tried.
    #[must_use]
    pub const fn with_max_boundary_attempts(mut self, attempts: usize) -> Self {
        self.max_boundary_attempts = attempts;
        self
    }

    /// Makes boundary generation deterministic.
    #[must_use]
    pub const fn with_boundary_seed(mut self, seed: u64) -> Self {
        self.boundary_seed = Some(seed);
        self
    }
}
