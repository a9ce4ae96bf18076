//! Multipart boundary generation.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random octets in the first candidate.
const INITIAL_OCTETS: usize = 16;

/// Octets added per retry.
const GROWTH_OCTETS: usize = 3;

/// RFC 2046 caps boundaries at 70 characters: `=_` plus 68 of base64.
const MAX_OCTETS: usize = 51;

/// Produces boundary candidates.
///
/// Candidates are `=_` followed by URL-safe base64. `=_` never occurs in
/// base64 or quoted-printable output, so only identity-encoded payloads can
/// collide.
pub(crate) struct BoundaryGenerator {
    rng: StdRng,
}

impl BoundaryGenerator {
    /// Creates a generator, deterministic when seeded.
    pub(crate) fn new(seed: Option<u64>) -> Self {
        let rng = seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        Self { rng }
    }

    /// Returns the candidate for the given attempt; later attempts are
    /// longer.
    pub(crate) fn candidate(&mut self, attempt: usize) -> String {
        let len = (INITIAL_OCTETS + GROWTH_OCTETS * attempt).min(MAX_OCTETS);
        let mut bytes = vec![0u8; len];
        self.rng.fill(&mut bytes[..]);
        format!("=_{}", URL_SAFE_NO_PAD.encode(bytes))
    }
}

/// Returns true if `--boundary` occurs anywhere in `data`.
pub(crate) fn collides(boundary: &str, data: &[u8]) -> bool {
    let delimiter = format!("--{boundary}");
    let needle = delimiter.as_bytes();
    data.len() >= needle.len() && data.windows(needle.len()).any(|w| w == needle)
}

/// Returns true if the boundary is syntactically valid (RFC 2046 section 5.1.1).
pub(crate) fn is_valid(boundary: &str) -> bool {
    !boundary.is_empty()
        && boundary.len() <= 70
        && !boundary.ends_with(' ')
        && boundary
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"'()+_,-./:=? ".contains(&b))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_grow() {
        let mut generator = BoundaryGenerator::new(Some(7));
        let first = generator.candidate(0);
        let later = generator.candidate(5);
        assert!(first.starts_with("=_"));
        assert!(later.len() > first.len());
        assert!(generator.candidate(100).len() <= 70);
        assert!(is_valid(&first));
    }

    #[test]
    fn test_seeded_is_deterministic() {
        let a = BoundaryGenerator::new(Some(42)).candidate(0);
        let b = BoundaryGenerator::new(Some(42)).candidate(0);
        assert_eq!(a, b);
    }

    #[test]
    fn test_collides() {
        assert!(collides("AAAA", b"x\r\n--AAAA\r\n"));
        assert!(collides("AAAA", b"--AAAAB"));
        assert!(!collides("AAAA", b"AAAA"));
        assert!(!collides("AAAA", b""));
    }

    #[test]
    fn test_is_valid() {
        assert!(is_valid("simple boundary"));
        assert!(!is_valid(""));
        assert!(!is_valid("trailing "));
        assert!(!is_valid("semi;colon"));
        assert!(!is_valid(&"a".repeat(71)));
    }
}
