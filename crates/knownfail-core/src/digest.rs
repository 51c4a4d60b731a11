//! SHA-256 helpers for stable identities of fingerprints and registries.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Digest of an ordered sequence of strings, NUL-separated so that
/// `["ab", "c"]` and `["a", "bc"]` differ.
pub fn sequence_digest<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Sha256::new();
    for item in items {
        hasher.update(item.as_ref().as_bytes());
        hasher.update(b"\0");
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_value() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_sequence_digest_separates_items() {
        assert_ne!(sequence_digest(["ab", "c"]), sequence_digest(["a", "bc"]));
    }

    #[test]
    fn test_sequence_digest_order_sensitive() {
        assert_ne!(sequence_digest(["a", "b"]), sequence_digest(["b", "a"]));
    }
}
