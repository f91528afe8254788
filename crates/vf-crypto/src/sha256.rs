//! # SHA-256 Digests
//!
//! Record fingerprints are computed over the literal hash payload text, not
//! over canonical JSON: the payload format is fixed by the tax authority.

use sha2::{Digest, Sha256};
use vf_core::RecordHash;

/// Fingerprint a record hash payload.
pub fn record_hash(payload: &str) -> RecordHash {
    let digest: [u8; 32] = Sha256::digest(payload.as_bytes()).into();
    RecordHash::from_digest(&digest)
}

/// Lowercase hex SHA-256 of raw bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data).iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_hash_known_vector() {
        assert_eq!(
            record_hash("abc").as_str(),
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
        );
    }

    #[test]
    fn sha256_hex_is_lowercase() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn single_character_change_changes_hash() {
        let a = record_hash("ImporteTotal=176.00");
        let b = record_hash("ImporteTotal=176.01");
        assert_ne!(a, b);
    }
}
