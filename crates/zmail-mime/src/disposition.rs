//! Content-Disposition handling (RFC 2183).

use crate::parameter::{Parameters, parse_header_params};
use std::fmt;

/// Presentation style of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispositionKind {
    /// Displayed as part of the message.
    Inline,
    /// Offered as a separate file.
    Attachment,
    /// Any other token, lowercased.
    Other(String),
}

impl DispositionKind {
    fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Self::Inline,
            "attachment" => Self::Attachment,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for DispositionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inline => write!(f, "inline"),
            Self::Attachment => write!(f, "attachment"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Content disposition with parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    /// Inline, attachment, or other.
    pub kind: DispositionKind,
    /// Parameters (e.g., filename).
    pub parameters: Parameters,
}

impl ContentDisposition {
    /// Creates an inline disposition.
    #[must_use]
    pub const fn inline() -> Self {
        Self {
            kind: DispositionKind::Inline,
            parameters: Parameters::new(),
        }
    }

    /// Creates an attachment disposition.
    #[must_use]
    pub const fn attachment() -> Self {
        Self {
            kind: DispositionKind::Attachment,
            parameters: Parameters::new(),
        }
    }

    /// Sets the filename parameter.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.parameters.set("filename", filename);
        self
    }

    /// Returns the filename parameter if present.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.parameters.get("filename")
    }

    /// Returns true for attachments.
    #[must_use]
    pub const fn is_attachment(&self) -> bool {
        matches!(self.kind, DispositionKind::Attachment)
    }

    /// Parses a Content-Disposition value. Never fails; an empty value is
    /// read as `attachment`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let (kind, parameters) = parse_header_params(s);
        let kind = if kind.is_empty() {
            DispositionKind::Attachment
        } else {
            DispositionKind::parse(&kind)
        };
        Self { kind, parameters }
    }
}

impl fmt::Display for ContentDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.parameters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attachment() {
        let d = ContentDisposition::parse("Attachment; filename=\"report.pdf\"");
        assert!(d.is_attachment());
        assert_eq!(d.filename(), Some("report.pdf"));
    }

    #[test]
    fn test_parse_other() {
        let d = ContentDisposition::parse("form-data; name=field");
        assert_eq!(d.kind, DispositionKind::Other("form-data".to_string()));
    }

    #[test]
    fn test_display() {
        let d = ContentDisposition::attachment().with_filename("text.txt");
        assert_eq!(d.to_string(), "attachment; filename=text.txt");
        let d = ContentDisposition::inline().with_filename("äöü.png");
        assert_eq!(ContentDisposition::parse(&d.to_string()), d);
    }
}
