//! Email address types.

use crate::encoding::{decode_rfc2047, encode_words};
use crate::error::{Error, Result};
use crate::options::CharsetPolicy;
use std::fmt;

/// Characters that force a display name to be quoted (RFC 5322 specials).
const SPECIALS: &str = "()<>[]:;@\\,.\"";

/// A display name and email address, as found in From/To/Cc headers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Address {
    /// Display name (optional).
    pub name: Option<String>,
    /// Email address; never empty.
    email: String,
}

impl Address {
    /// Creates an address without a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn new(email: impl Into<String>) -> Result<Self> {
        let email = email.into().trim().to_string();
        Self::validate(&email)?;
        Ok(Self { name: None, email })
    }

    /// Creates an address with a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        let mut address = Self::new(email)?;
        let name = name.into();
        if !name.trim().is_empty() {
            address.name = Some(name);
        }
        Ok(address)
    }

    /// Returns the email address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn validate(email: &str) -> Result<()> {
        if email.is_empty() {
            return Err(Error::InvalidAddress("Address cannot be empty".into()));
        }
        if email.contains(|c: char| c.is_whitespace() || c == '<' || c == '>') {
            return Err(Error::InvalidAddress(format!(
                "Address contains invalid characters: {email:?}"
            )));
        }
        Ok(())
    }

    /// Formats the address for a header, encoding a non-ASCII display name
    /// as encoded-words in `charset` (or UTF-8 if `charset` cannot hold it).
    #[must_use]
    pub fn to_header(&self, charset: &str) -> String {
        let Some(name) = self.name.as_deref() else {
            return self.email.clone();
        };
        let name = name.replace(['\r', '\n'], " ");
        if !name.is_ascii() || (name.contains("=?") && name.contains("?=")) {
            format!("{} <{}>", encode_words(&name, charset), self.email)
        } else if name.contains(|c: char| SPECIALS.contains(c)) {
            let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\" <{}>", self.email)
        } else {
            format!("{name} <{}>", self.email)
        }
    }

    /// Formats the address with the display name always written as
    /// encoded-words, which can be split at any character.
    pub(crate) fn to_header_words(&self, charset: &str) -> String {
        match self.name.as_deref() {
            Some(name) => format!(
                "{} <{}>",
                encode_words(&name.replace(['\r', '\n'], " "), charset),
                self.email
            ),
            None => self.email.clone(),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.email),
            None => write!(f, "{}", self.email),
        }
    }
}

/// Formats a list of addresses as a header value.
#[must_use]
pub fn format_addresses(addresses: &[Address], charset: &str) -> String {
    addresses
        .iter()
        .map(|a| a.to_header(charset))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Splits an address list into items, dropping group names.
fn split_items(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut angle = 0usize;
    let mut comment = 0usize;

    for c in text.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes || comment > 0 => {
                current.push(c);
                escaped = true;
            }
            '"' if comment == 0 => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            '(' if !in_quotes => {
                comment += 1;
                current.push(c);
            }
            ')' if !in_quotes && comment > 0 => {
                comment -= 1;
                current.push(c);
            }
            '<' if !in_quotes && comment == 0 => {
                angle += 1;
                current.push(c);
            }
            '>' if !in_quotes && comment == 0 => {
                angle = angle.saturating_sub(1);
                current.push(c);
            }
            // Group display name: `Friends: a@b, c@d;`
            ':' if !in_quotes && comment == 0 && angle == 0 => current.clear(),
            ',' | ';' if !in_quotes && comment == 0 && angle == 0 => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    items.push(current);
    items
}

/// Removes comments, returning the remaining text and the last comment.
fn strip_comments(text: &str) -> (String, Option<String>) {
    let mut out = String::new();
    let mut comment_text = String::new();
    let mut last_comment = None;
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;

    for c in text.chars() {
        if escaped {
            if depth > 0 {
                comment_text.push(c);
            } else {
                out.push(c);
            }
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes || depth > 0 => {
                escaped = true;
                if depth == 0 {
                    out.push(c);
                }
            }
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                out.push(c);
            }
            '(' if !in_quotes => {
                if depth > 0 {
                    comment_text.push(c);
                }
                depth += 1;
            }
            ')' if !in_quotes && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    last_comment = Some(std::mem::take(&mut comment_text));
                } else {
                    comment_text.push(c);
                }
            }
            _ if depth > 0 => comment_text.push(c),
            _ => out.push(c),
        }
    }
    (out, last_comment)
}

fn unquote_phrase(phrase: &str) -> String {
    let mut out = String::new();
    let mut chars = phrase.trim().chars();
    let mut in_quotes = false;
    while let Some(c) = chars.next() {
        match c {
            '"' => in_quotes = !in_quotes,
            '\\' if in_quotes => {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            _ => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn decode_name(raw: &str) -> Option<String> {
    let name = unquote_phrase(raw);
    let name = decode_rfc2047(&name, &CharsetPolicy::default(), false)
        .map_or(name, |(decoded, _)| decoded);
    let name = name.trim().to_string();
    (!name.is_empty()).then_some(name)
}

fn parse_item(item: &str) -> Option<Address> {
    let (text, comment) = strip_comments(item);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let (name, email) = match (text.find('<'), text.rfind('>')) {
        (Some(open), close) => {
            let end = close.filter(|&c| c > open).unwrap_or(text.len());
            let email = &text[open + 1..end];
            // Drop an obsolete source route: <@relay:user@host>
            let email = email.rsplit_once(':').map_or(email, |(_, e)| e);
            (decode_name(&text[..open]), email.trim())
        }
        // A bare addr-spec is a single word with an `@`.
        (None, _) if text.contains('@') && !text.contains(char::is_whitespace) => {
            (comment.as_deref().and_then(decode_name), text)
        }
        (None, _) => return None,
    };

    let email: String = email.chars().filter(|c| !c.is_whitespace()).collect();
    let mut address = Address::new(email).ok()?;
    address.name = name;
    Some(address)
}

/// Parses an address list header value.
///
/// Handles quoted and encoded display names, comments and groups. Items
/// without an email address are skipped.
#[must_use]
pub fn parse_addresses(text: &str) -> Vec<Address> {
    split_items(text)
        .iter()
        .filter_map(|item| parse_item(item))
        .collect()
}

/// Parses an address list header value only if every item in it is an
/// address, so free text is never rewritten as one.
pub(crate) fn parse_address_header(text: &str) -> Option<Vec<Address>> {
    let mut list = Vec::new();
    for item in split_items(text) {
        if item.trim().is_empty() {
            continue;
        }
        list.push(parse_item(&item)?);
    }
    (!list.is_empty()).then_some(list)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone, clippy::manual_string_new, clippy::needless_collect, clippy::unreadable_literal, clippy::used_underscore_items, clippy::similar_names)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.email(), "user@example.com");
        assert!(addr.name().is_none());
    }

    #[test]
    fn test_invalid_address_empty() {
        assert!(Address::new("").is_err());
        assert!(Address::new("   ").is_err());
    }

    #[test]
    fn test_invalid_address_whitespace() {
        assert!(Address::new("a b@example.com").is_err());
    }

    #[test]
    fn test_with_name() {
        let addr = Address::with_name("John Doe", "john@example.com").unwrap();
        assert_eq!(addr.name(), Some("John Doe"));
        assert_eq!(addr.to_string(), "John Doe <john@example.com>");
    }

    #[test]
    fn test_to_header_plain_and_quoted() {
        let addr = Address::with_name("John", "john@foo.com").unwrap();
        assert_eq!(addr.to_header("us-ascii"), "John <john@foo.com>");
        let addr = Address::with_name("Doe, John", "john@foo.com").unwrap();
        assert_eq!(addr.to_header("us-ascii"), "\"Doe, John\" <john@foo.com>");
    }

    #[test]
    fn test_to_header_encoded() {
        let addr = Address::with_name("léo", "leo@foo.com").unwrap();
        assert_eq!(addr.to_header("iso-8859-1"), "=?iso-8859-1?Q?l=E9o?= <leo@foo.com>");
    }

    #[test]
    fn test_format_addresses() {
        let list = vec![
            Address::new("foo@example.com").unwrap(),
            Address::with_name("Bar", "bar@example.com").unwrap(),
        ];
        assert_eq!(
            format_addresses(&list, "us-ascii"),
            "foo@example.com, Bar <bar@example.com>"
        );
    }

    #[test]
    fn test_parse_simple_list() {
        let list = parse_addresses("a@example.com, John <john@example.com>");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].email(), "a@example.com");
        assert_eq!(list[1].name(), Some("John"));
        assert_eq!(list[1].email(), "john@example.com");
    }

    #[test]
    fn test_parse_quoted_name_with_comma() {
        let list = parse_addresses("\"Doe, John\" <john@example.com>, x@y.org");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name(), Some("Doe, John"));
    }

    #[test]
    fn test_parse_encoded_name_with_comma() {
        let list = parse_addresses("=?utf-8?Q?Doe=2C_J=C3=B6hn?= <john@example.com>");
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name(), Some("Doe, Jöhn"));
    }

    #[test]
    fn test_parse_comment_name() {
        let list = parse_addresses("john@example.com (John Doe)");
        assert_eq!(list[0].email(), "john@example.com");
        assert_eq!(list[0].name(), Some("John Doe"));
    }

    #[test]
    fn test_parse_group() {
        let list = parse_addresses("Friends: a@example.com, b@example.com;, c@example.com");
        let emails: Vec<&str> = list.iter().map(Address::email).collect();
        assert_eq!(emails, vec!["a@example.com", "b@example.com", "c@example.com"]);
        assert!(parse_addresses("undisclosed-recipients:;").is_empty());
    }

    #[test]
    fn test_parse_skips_empty_items() {
        let list = parse_addresses(", ,a@example.com,,");
        assert_eq!(list.len(), 1);
        assert!(parse_addresses("John Doe <>").is_empty());
    }

    #[test]
    fn test_parse_rejects_bare_words() {
        assert!(parse_addresses("John Smith").is_empty());
        assert!(parse_addresses("localpart").is_empty());
        assert!(parse_addresses("john @example.com").is_empty());
        assert_eq!(parse_addresses("John Smith, j@example.com").len(), 1);
    }

    #[test]
    fn test_parse_address_header_needs_every_item() {
        assert!(parse_address_header("John Smith, j@example.com").is_none());
        assert!(parse_address_header("undisclosed-recipients:;").is_none());
        let list = parse_address_header("a@example.com, B <b@example.com>,").unwrap();
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_header_round_trip() {
        let list = vec![
            Address::with_name("Māori", "maori@b.com").unwrap(),
            Address::with_name("O'Brien, Pat", "pat@c.com").unwrap(),
        ];
        assert_eq!(parse_addresses(&format_addresses(&list, "utf-8")), list);
    }
}
