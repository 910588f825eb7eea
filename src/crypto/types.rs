//! Cryptographic types for the ZKCP core

use crate::error::Result;
use crate::types::{hex_bytes, Commitment};
use serde::{Deserialize, Serialize};

use super::commitment::{commit, verify_commitment};
use super::keystream::{decrypt, encrypt};

/// Content sealed under `K`, sent to the buyer out-of-band before funding
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedContent {
    /// Keystream ciphertext of the content
    #[serde(with = "hex_bytes")]
    pub ciphertext: Vec<u8>,
    /// Commitment to the key the ciphertext was sealed with
    pub commitment: Commitment,
}

impl EncryptedContent {
    /// Encrypt `plaintext` under `key` and commit to the key
    pub fn seal(plaintext: &[u8], key: &[u8]) -> Result<Self> {
        Ok(Self {
            ciphertext: encrypt(plaintext, key)?,
            commitment: commit(key),
        })
    }

    /// Decrypt with a revealed key.
    ///
    /// Returns `None` when the key does not open the commitment, so a
    /// garbage key never yields garbage plaintext.
    pub fn open(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if !verify_commitment(key, &self.commitment) {
            return Ok(None);
        }
        decrypt(&self.ciphertext, key).map(Some)
    }

    pub fn len(&self) -> usize {
        self.ciphertext.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_open() {
        let sealed = EncryptedContent::seal(b"secret content", b"HELLO").unwrap();

        assert_eq!(sealed.len(), 14);
        assert_eq!(sealed.commitment, commit(b"HELLO"));
        assert_eq!(
            sealed.open(b"HELLO").unwrap(),
            Some(b"secret content".to_vec())
        );
    }

    #[test]
    fn test_open_with_wrong_key() {
        let sealed = EncryptedContent::seal(b"secret content", b"HELLO").unwrap();
        assert_eq!(sealed.open(b"WORLD").unwrap(), None);
    }

    #[test]
    fn test_empty_content() {
        let sealed = EncryptedContent::seal(b"", b"HELLO").unwrap();
        assert!(sealed.is_empty());
        assert_eq!(sealed.open(b"HELLO").unwrap(), Some(Vec::new()));
    }

    #[test]
    fn test_serialization() {
        let sealed = EncryptedContent::seal(b"secret content", b"HELLO").unwrap();
        let json = serde_json::to_string(&sealed).unwrap();
        assert!(json.contains("4088626bf13b4f200caf8e14e79e"));

        let back: EncryptedContent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sealed);
    }
}
