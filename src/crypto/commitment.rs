//! SHA-256 commitment to the content key

use crate::types::Commitment;
use subtle::ConstantTimeEq;

/// Compute the public commitment `H = SHA-256(key)`
pub fn commit(key: &[u8]) -> Commitment {
    Commitment::of(key)
}

/// Check a claimed preimage against a commitment.
///
/// A wrong key is an ordinary `false`, never an error. The comparison runs
/// in constant time.
pub fn verify_commitment(key: &[u8], commitment: &Commitment) -> bool {
    let computed = commit(key);
    computed.0.as_slice().ct_eq(commitment.0.as_slice()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentKey;

    #[test]
    fn test_commit_is_sha256() {
        use sha2::{Digest, Sha256};

        let expected: [u8; 32] = Sha256::digest(b"HELLO").into();
        assert_eq!(commit(b"HELLO").0, expected);
    }

    #[test]
    fn test_commitment_verification() {
        let key = ContentKey::random();
        let commitment = commit(key.as_bytes());

        assert!(verify_commitment(key.as_bytes(), &commitment));
    }

    #[test]
    fn test_commitment_verification_fails_wrong_key() {
        let commitment = commit(b"HELLO");

        assert!(!verify_commitment(b"HELLo", &commitment));
        assert!(!verify_commitment(b"HELLO ", &commitment));
        assert!(!verify_commitment(b"", &commitment));
    }

    #[test]
    fn test_commitment_binding_over_random_keys() {
        let keys: Vec<ContentKey> = (0..16).map(|_| ContentKey::random()).collect();
        for (i, a) in keys.iter().enumerate() {
            let commitment = commit(a.as_bytes());
            for (j, b) in keys.iter().enumerate() {
                assert_eq!(verify_commitment(b.as_bytes(), &commitment), i == j);
            }
        }
    }

    #[test]
    fn test_commitment_hash_deterministic() {
        assert_eq!(commit(b"key material"), commit(b"key material"));
    }

    #[test]
    fn test_empty_key_commitment() {
        assert_eq!(
            commit(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
