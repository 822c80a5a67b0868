//! Short content hashes used as stable identifiers.

use sha2::{Digest, Sha256};

const SHORT_HEX_LEN: usize = 12;

/// First twelve lowercase hex characters of the SHA-256 of `input`.
#[must_use]
pub fn short_hex_digest(input: &[u8]) -> String {
    let digest = Sha256::digest(input);
    digest
        .iter()
        .flat_map(|byte| [byte >> 4, byte & 0x0f])
        .take(SHORT_HEX_LEN)
        .filter_map(|nibble| char::from_digit(u32::from(nibble), 16))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_known_sha256_prefix() {
        // sha256("abc") = ba7816bf8f01cfea...
        assert_eq!(short_hex_digest(b"abc"), "ba7816bf8f01");
        assert_eq!(short_hex_digest(b"").len(), 12);
    }
}
